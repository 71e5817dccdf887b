// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Forwarding traps to the supervisor.
//!
//! The core has no `medeleg`/`mideleg`, so every trap arrives in machine
//! mode. Forwarding one means doing by hand what the hart would have done
//! on a supervisor trap, then returning with `mret` into `stvec`.

use kcpu::{
    Xlen,
    csr::{Csr, MStatus, MachineCsr},
};

/// The machine-mode CSRs a forwarded trap is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapSnapshot {
    pub mstatus: usize,
    pub mepc: usize,
    pub mcause: usize,
    pub mtval: usize,
    pub stvec: usize,
}

impl TrapSnapshot {
    pub fn capture<C: MachineCsr + ?Sized>(csr: &C) -> Self {
        Self {
            mstatus: csr.read(Csr::Mstatus),
            mepc: csr.read(Csr::Mepc),
            mcause: csr.read(Csr::Mcause),
            mtval: csr.read(Csr::Mtval),
            stvec: csr.read(Csr::Stvec),
        }
    }
}

/// What forwarding a trap writes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delegation {
    pub mstatus: usize,
    pub sepc: usize,
    pub scause: usize,
    pub stval: usize,
    /// Where `mret` lands: the supervisor trap vector.
    pub mepc: usize,
}

impl Delegation {
    pub fn apply<C: MachineCsr + ?Sized>(&self, csr: &mut C) {
        csr.write(Csr::Mstatus, self.mstatus);
        csr.write(Csr::Sepc, self.sepc);
        csr.write(Csr::Scause, self.scause);
        csr.write(Csr::Stval, self.stval);
        csr.write(Csr::Mepc, self.mepc);
    }
}

/// Computes the supervisor trap entry for `snap`.
///
/// `SPIE` takes `SIE`, `SIE` is cleared, `SPP` records whether the trap came
/// from supervisor mode (the low bit of `MPP`), and `MPP` becomes supervisor
/// so that `mret` enters the handler there. Interrupts honour vectored `stvec`.
pub fn delegate(xlen: Xlen, snap: TrapSnapshot) -> Delegation {
    let old = MStatus::from_bits_retain(snap.mstatus);
    let mut status = old.difference(MStatus::SIE | MStatus::SPIE | MStatus::SPP | MStatus::MPP);
    if old.contains(MStatus::SIE) {
        status |= MStatus::SPIE;
    }
    if old.contains(MStatus::MPP_S) {
        status |= MStatus::SPP;
    }
    status |= MStatus::MPP_S;

    let base = snap.stvec & !0b11;
    let interrupt = snap.mcause & xlen.interrupt_bit() != 0;
    let vector = if snap.stvec & 0b11 == 1 && interrupt {
        let code = snap.mcause & !xlen.interrupt_bit();
        base.wrapping_add(4 * code)
    } else {
        base
    };

    Delegation {
        mstatus: status.bits(),
        sepc: snap.mepc,
        scause: snap.mcause,
        stval: snap.mtval,
        mepc: xlen.truncate(vector),
    }
}

/// Forwards the trap currently described by the machine CSRs.
pub fn delegate_to_supervisor<C: MachineCsr + ?Sized>(xlen: Xlen, csr: &mut C) {
    let snap = TrapSnapshot::capture(csr);
    let delegation = delegate(xlen, snap);
    debug!(
        "delegate cause {:#x} tval {:#x} epc {:#x} -> {:#x}",
        snap.mcause, snap.mtval, snap.mepc, delegation.mepc
    );
    delegation.apply(csr);
}
