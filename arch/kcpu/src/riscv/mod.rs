// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! CSR access on the hart itself.

use core::arch::asm;

use riscv::register::{
    mcause, mepc, mie, mip, mscratch, mstatus, mtval, mtvec, satp, scause, sepc, stval, stvec,
};

use crate::csr::{Csr, MachineCsr};

/// Raw `csrw` for registers the `riscv` crate only exposes as typed fields
/// or not at all.
macro_rules! csrw {
    ($name:literal, $value:expr) => {
        unsafe { asm!(concat!("csrw ", $name, ", {}"), in(reg) $value) }
    };
}

/// The CSRs of the hart executing this code.
pub struct MetalCsr;

impl MachineCsr for MetalCsr {
    fn read(&self, csr: Csr) -> usize {
        match csr {
            Csr::Stvec => stvec::read().bits(),
            Csr::Sepc => sepc::read(),
            Csr::Scause => scause::read().bits(),
            Csr::Stval => stval::read(),
            Csr::Satp => satp::read().bits(),
            Csr::Mstatus => mstatus::read().bits(),
            Csr::Mie => mie::read().bits(),
            Csr::Mtvec => mtvec::read().bits(),
            Csr::Mscratch => mscratch::read(),
            Csr::Mepc => mepc::read(),
            Csr::Mcause => mcause::read().bits(),
            Csr::Mtval => mtval::read(),
            Csr::Mip => mip::read().bits(),
            Csr::TlbSelect => read_custom::<{ Csr::TlbSelect.number() }>(),
            Csr::TlbPayload => read_custom::<{ Csr::TlbPayload.number() }>(),
            Csr::TlbTag => read_custom::<{ Csr::TlbTag.number() }>(),
        }
    }

    #[allow(unused_unsafe)]
    fn write(&mut self, csr: Csr, value: usize) {
        match csr {
            Csr::Sepc => unsafe { sepc::write(value) },
            Csr::Mscratch => unsafe { mscratch::write(value) },
            Csr::Mepc => unsafe { mepc::write(value) },
            Csr::Stvec => csrw!("stvec", value),
            Csr::Scause => csrw!("scause", value),
            Csr::Stval => csrw!("stval", value),
            Csr::Satp => csrw!("satp", value),
            Csr::Mstatus => csrw!("mstatus", value),
            Csr::Mie => csrw!("mie", value),
            Csr::Mtvec => csrw!("mtvec", value),
            Csr::Mcause => csrw!("mcause", value),
            Csr::Mtval => csrw!("mtval", value),
            Csr::Mip => csrw!("mip", value),
            Csr::TlbSelect => csrw!("0x7c0", value),
            Csr::TlbPayload => csrw!("0x7c1", value),
            Csr::TlbTag => csrw!("0x7c2", value),
        }
    }
}

#[inline]
fn read_custom<const NUM: u16>() -> usize {
    let value: usize;
    unsafe { asm!("csrr {}, {num}", out(reg) value, num = const NUM) };
    value
}

/// Hart id, for log prefixes.
#[inline]
pub fn hart_id() -> usize {
    riscv::register::mhartid::read()
}
