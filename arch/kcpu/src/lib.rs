// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Machine-mode CPU abstractions for the RISC-V firmware.
//!
//! Everything that touches a CSR goes through [`csr::MachineCsr`], so the
//! trap handlers built on top run unchanged against [`csr::CsrFile`] on a
//! host.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

mod ctx;
mod xlen;

pub mod csr;
pub mod excp;

pub use self::{
    ctx::{TP_INDEX, TrapFrame},
    xlen::Xlen,
};

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))] {
        mod riscv;
        pub use self::riscv::{MetalCsr, hart_id};
    }
}
