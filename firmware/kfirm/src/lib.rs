// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Machine-mode firmware for a RISC-V core that lacks a page-table walker,
//! the M and A extensions, and an SBI implementation.
//!
//! Every trap enters [`Firmware::handle_trap`], which
//!
//! - refills the hardware TLB on a TLB miss ([`tlb`]),
//! - emulates divide, atomic and `time` instructions ([`emulate`]),
//! - replays misaligned loads and stores byte by byte ([`misaligned`]),
//! - answers supervisor calls ([`sbi`]),
//! - and forwards anything else to the supervisor ([`delegate`]).
//!
//! Memory and CSRs are reached through [`page_table::PhysMemory`] and
//! [`kcpu::csr::MachineCsr`], so all of it runs on a host against
//! `page_table::sim::RamImage` and `kcpu::csr::CsrFile`.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

pub mod config;
pub mod console;
mod context;
pub mod delegate;
pub mod emulate;
mod error;
pub mod misaligned;
pub mod sbi;
pub mod tlb;
mod trap;

pub use self::{
    config::FirmwareConfig,
    context::{INSN_BYTES, TrapContext},
    error::{FirmResult, Fault},
    trap::{Firmware, TrapStats},
};

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))] {
        pub mod metal;
    }
}
