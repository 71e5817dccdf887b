// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Software page-table walker for a RISC-V core without a hardware walker.
//!
//! The firmware reads the supervisor's page tables through a [`PhysMemory`]
//! capability, so the same walk runs against real memory on the board and
//! against a [`sim::RamImage`] on the host.
#![cfg_attr(not(any(test, feature = "sim")), no_std)]

#[macro_use]
extern crate log;

mod arch;
mod defs;
mod walk;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use arch::*;
pub use defs::*;
pub use walk::*;
