// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Trap dispatch.

use kcpu::{
    TrapFrame,
    csr::{Csr, Interrupts, MachineCsr},
    excp::{Exception, Interrupt, TrapCause},
};
use page_table::PhysMemory;

use crate::{
    config::FirmwareConfig,
    context::TrapContext,
    delegate::delegate_to_supervisor,
    emulate::{Emulator, Insn},
    error::FirmResult,
    misaligned,
    sbi::handle_ecall,
    tlb::{TlbAllocator, TlbKind, refill},
};

/// Supervisor calls between two dumps of [`TrapStats`].
const STATS_DUMP_INTERVAL: u64 = 128;

/// Per-kind counts of serviced traps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapStats {
    pub tlb_fills: u64,
    pub div: u64,
    pub divw: u64,
    pub amo: [u64; 5],
    pub lr: u64,
    pub sc: u64,
    pub time_reads: u64,
    pub misaligned: u64,
    pub ecalls: u64,
    pub timer_irqs: u64,
    pub delegated: u64,
}

impl TrapStats {
    pub const fn new() -> Self {
        Self {
            tlb_fills: 0,
            div: 0,
            divw: 0,
            amo: [0; 5],
            lr: 0,
            sc: 0,
            time_reads: 0,
            misaligned: 0,
            ecalls: 0,
            timer_irqs: 0,
            delegated: 0,
        }
    }

    fn count_insn(&mut self, insn: &Insn) {
        let counter = match insn {
            Insn::Divide { word: false, .. } => &mut self.div,
            Insn::Divide { word: true, .. } => &mut self.divw,
            Insn::Amo { op, .. } => &mut self.amo[*op as usize],
            Insn::LoadReserved { .. } => &mut self.lr,
            Insn::StoreConditional { .. } => &mut self.sc,
            Insn::ReadTime { .. } => &mut self.time_reads,
        };
        *counter += 1;
    }

    fn dump(&self) {
        debug!(
            "traps: tlb {} div {} divw {} amo swap/add/xor/and/or {:?} lr {} sc {} time {} \
             misaligned {} ecall {} timer {} delegated {}",
            self.tlb_fills,
            self.div,
            self.divw,
            self.amo,
            self.lr,
            self.sc,
            self.time_reads,
            self.misaligned,
            self.ecalls,
            self.timer_irqs,
            self.delegated
        );
    }
}

/// The firmware: board configuration plus the state kept across traps.
pub struct Firmware {
    config: FirmwareConfig,
    tlb: TlbAllocator,
    emulator: Emulator,
    stats: TrapStats,
}

impl Firmware {
    pub const fn new(config: FirmwareConfig) -> Self {
        Self {
            tlb: TlbAllocator::new(config.tlb_slots),
            config,
            emulator: Emulator::new(),
            stats: TrapStats::new(),
        }
    }

    pub const fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    pub const fn stats(&self) -> &TrapStats {
        &self.stats
    }

    pub const fn emulator(&self) -> &Emulator {
        &self.emulator
    }

    /// Services one trap. Returns with the CSRs set up for `mret`.
    pub fn handle_trap<C: MachineCsr, M: PhysMemory>(
        &mut self,
        frame: &mut TrapFrame,
        csr: &mut C,
        mem: &mut M,
    ) {
        let xlen = self.config.xlen;
        let cause = TrapCause::decode(xlen, csr.read(Csr::Mcause));
        let mut ctx = TrapContext::new(frame, csr, mem, xlen);
        trace!("trap {cause:?} epc {:#x}", ctx.epc());

        match cause {
            TrapCause::Interrupt(irq) => self.handle_interrupt(&mut ctx, irq),
            TrapCause::Exception(Exception::InstructionTlbMiss) => {
                self.tlb_miss(&mut ctx, TlbKind::Instruction)
            }
            TrapCause::Exception(Exception::DataTlbMiss) => self.tlb_miss(&mut ctx, TlbKind::Data),
            TrapCause::Exception(Exception::IllegalInstruction) => {
                let result = self.emulator.emulate(&mut ctx, &self.config);
                if let Ok(insn) = &result {
                    self.stats.count_insn(insn);
                }
                self.complete(&mut ctx, result.map(drop));
            }
            TrapCause::Exception(Exception::LoadMisaligned | Exception::StoreMisaligned) => {
                let result = misaligned::emulate(&mut ctx);
                if result.is_ok() {
                    self.stats.misaligned += 1;
                }
                self.complete(&mut ctx, result.map(drop));
            }
            TrapCause::Exception(Exception::SupervisorEnvCall) => {
                handle_ecall(&mut ctx, &self.config);
                self.stats.ecalls += 1;
                if self.stats.ecalls % STATS_DUMP_INTERVAL == 0 {
                    self.stats.dump();
                }
            }
            TrapCause::Exception(Exception::MachineEnvCall) => {
                warn!("ecall from machine mode at {:#x}, skipped", ctx.epc());
                ctx.advance_pc();
            }
            TrapCause::Exception(_) => self.delegate(&mut ctx),
            TrapCause::Unknown { interrupt: true, code } => {
                warn!("unknown interrupt {code}, ignored");
            }
            TrapCause::Unknown {
                interrupt: false, ..
            } => self.delegate(&mut ctx),
        }
    }

    fn handle_interrupt<C: MachineCsr, M: PhysMemory>(
        &mut self,
        ctx: &mut TrapContext<'_, C, M>,
        irq: Interrupt,
    ) {
        match irq {
            Interrupt::MachineTimer => {
                // Parking the compare value drops the machine timer line;
                // the supervisor sees its own pending bit instead.
                ctx.mem.write_u32(self.config.timer, u32::MAX);
                ctx.csr.set_bits(Csr::Mip, Interrupts::STI.bits());
                self.stats.timer_irqs += 1;
            }
            Interrupt::SupervisorTimer => {
                ctx.csr.clear_bits(Csr::Mip, Interrupts::STI.bits());
                self.delegate(ctx);
            }
            other => warn!("interrupt {other:?} not handled"),
        }
    }

    fn tlb_miss<C: MachineCsr, M: PhysMemory>(
        &mut self,
        ctx: &mut TrapContext<'_, C, M>,
        kind: TlbKind,
    ) {
        if refill(ctx, &mut self.tlb, kind).is_some() {
            self.stats.tlb_fills += 1;
        } else {
            warn!("{kind:?} TLB miss with translation off");
            self.delegate(ctx);
        }
    }

    /// Steps over an emulated instruction, or forwards the failure.
    fn complete<C: MachineCsr, M: PhysMemory>(
        &mut self,
        ctx: &mut TrapContext<'_, C, M>,
        result: FirmResult,
    ) {
        match result {
            Ok(()) => ctx.advance_pc(),
            Err(fault) => {
                debug!("{fault}");
                if let Some((cause, tval)) = fault.raised() {
                    ctx.csr.write(Csr::Mtval, tval);
                    ctx.csr.write(Csr::Mcause, TrapCause::Exception(cause).bits(ctx.xlen));
                }
                self.delegate(ctx);
            }
        }
    }

    fn delegate<C: MachineCsr, M: PhysMemory>(&mut self, ctx: &mut TrapContext<'_, C, M>) {
        self.stats.delegated += 1;
        delegate_to_supervisor(ctx.xlen, &mut *ctx.csr);
    }
}
