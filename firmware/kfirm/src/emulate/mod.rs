// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Emulation of the instructions this core traps as illegal.
//!
//! The core has no divider and no atomic unit, and reads of the `time` CSR
//! trap as well. For an illegal-instruction trap the core puts the
//! instruction word in `mtval`, so nothing has to be fetched.

mod decode;

use kcpu::{Xlen, csr::Csr, csr::MachineCsr, excp::Exception};
use memaddr::{PhysAddr, aligned_to};
use page_table::{PagingFlags, PhysMemory};

pub use self::decode::{AmoOp, AmoWidth, DivOp, Insn, RawInsn, decode};
use crate::{
    config::FirmwareConfig,
    context::TrapContext,
    error::{FirmResult, Fault},
};

/// The single load-reserved address, by physical address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reservation(Option<PhysAddr>);

impl Reservation {
    pub const fn new() -> Self {
        Self(None)
    }

    pub fn set(&mut self, paddr: PhysAddr) {
        self.0 = Some(paddr);
    }

    /// Clears the reservation, reporting whether it was for `paddr`.
    pub fn take_matches(&mut self, paddr: PhysAddr) -> bool {
        self.0.take() == Some(paddr)
    }

    pub const fn get(&self) -> Option<PhysAddr> {
        self.0
    }
}

/// 32-bit divide and remainder with the architectural results for a zero
/// divisor and for signed overflow.
pub const fn divide_word(op: DivOp, a: u32, b: u32) -> u32 {
    match op {
        DivOp::Div if b == 0 => u32::MAX,
        DivOp::Div => (a as i32).wrapping_div(b as i32) as u32,
        DivOp::Divu if b == 0 => u32::MAX,
        DivOp::Divu => a / b,
        DivOp::Rem if b == 0 => a,
        DivOp::Rem => (a as i32).wrapping_rem(b as i32) as u32,
        DivOp::Remu if b == 0 => a,
        DivOp::Remu => a % b,
    }
}

/// 64-bit counterpart of [`divide_word`].
pub const fn divide_double(op: DivOp, a: u64, b: u64) -> u64 {
    match op {
        DivOp::Div if b == 0 => u64::MAX,
        DivOp::Div => (a as i64).wrapping_div(b as i64) as u64,
        DivOp::Divu if b == 0 => u64::MAX,
        DivOp::Divu => a / b,
        DivOp::Rem if b == 0 => a,
        DivOp::Rem => (a as i64).wrapping_rem(b as i64) as u64,
        DivOp::Remu if b == 0 => a,
        DivOp::Remu => a % b,
    }
}

fn load_width<M: PhysMemory>(mem: &M, width: AmoWidth, paddr: PhysAddr) -> u64 {
    match width {
        AmoWidth::Word => mem.read_u32(paddr) as u64,
        AmoWidth::Double => mem.read_u64(paddr),
    }
}

fn store_width<M: PhysMemory>(mem: &mut M, width: AmoWidth, paddr: PhysAddr, value: u64) {
    match width {
        AmoWidth::Word => mem.write_u32(paddr, value as u32),
        AmoWidth::Double => mem.write_u64(paddr, value),
    }
}

/// Instruction emulation and the state it carries between traps.
pub struct Emulator {
    reservation: Reservation,
}

impl Emulator {
    pub const fn new() -> Self {
        Self {
            reservation: Reservation::new(),
        }
    }

    pub const fn reservation(&self) -> Reservation {
        self.reservation
    }

    /// Emulates the instruction in `mtval`. The caller steps the pc on
    /// success and delegates on failure.
    pub fn emulate<C: MachineCsr, M: PhysMemory>(
        &mut self,
        ctx: &mut TrapContext<'_, C, M>,
        config: &FirmwareConfig,
    ) -> FirmResult<Insn> {
        let word = ctx.csr.read(Csr::Mtval) as u32;
        let insn = decode(ctx.xlen, word).ok_or(Fault::DecodeMiss { insn: word })?;
        debug!("emulate {word:#010x} as {insn:?}");
        self.execute(ctx, config, insn)?;
        Ok(insn)
    }

    pub fn execute<C: MachineCsr, M: PhysMemory>(
        &mut self,
        ctx: &mut TrapContext<'_, C, M>,
        config: &FirmwareConfig,
        insn: Insn,
    ) -> FirmResult {
        match insn {
            Insn::Divide {
                op,
                word,
                rd,
                rs1,
                rs2,
            } => {
                let (a, b) = (ctx.reg(rs1), ctx.reg(rs2));
                match (ctx.xlen, word) {
                    (Xlen::X64, false) => {
                        ctx.set_reg(rd, divide_double(op, a as u64, b as u64) as usize)
                    }
                    _ => ctx.set_reg_word(rd, divide_word(op, a as u32, b as u32)),
                }
            }
            Insn::Amo {
                op,
                width,
                rd,
                rs1,
                rs2,
            } => {
                let vaddr = ctx.reg(rs1);
                let paddr = atomic_paddr(
                    ctx,
                    vaddr,
                    width,
                    PagingFlags::READ | PagingFlags::WRITE,
                    Exception::StorePageFault,
                )?;
                let old = load_width(&*ctx.mem, width, paddr);
                let new = op.apply(old, ctx.reg(rs2) as u64);
                store_width(&mut *ctx.mem, width, paddr, new);
                set_loaded(ctx, width, rd, old);
            }
            Insn::LoadReserved { width, rd, rs1 } => {
                let vaddr = ctx.reg(rs1);
                let paddr = atomic_paddr(
                    ctx,
                    vaddr,
                    width,
                    PagingFlags::READ,
                    Exception::LoadPageFault,
                )?;
                let value = load_width(&*ctx.mem, width, paddr);
                set_loaded(ctx, width, rd, value);
                self.reservation.set(paddr);
            }
            Insn::StoreConditional {
                width,
                rd,
                rs1,
                rs2,
            } => {
                let vaddr = ctx.reg(rs1);
                check_atomic_alignment(vaddr, width, Exception::StoreMisaligned)?;
                // A failing store-conditional leaves the dirty bit alone.
                let paddr =
                    ctx.translate_clean(vaddr, PagingFlags::WRITE, Exception::StorePageFault)?;
                if self.reservation.take_matches(paddr) {
                    let paddr =
                        ctx.translate(vaddr, PagingFlags::WRITE, Exception::StorePageFault)?;
                    let value = ctx.reg(rs2) as u64;
                    store_width(&mut *ctx.mem, width, paddr, value);
                    ctx.set_reg(rd, 0);
                } else {
                    debug!("sc to {paddr:?} without a matching reservation");
                    ctx.set_reg(rd, 1);
                }
            }
            Insn::ReadTime { rd, high } => {
                // The board counter is 32 bits wide.
                let value = if high {
                    0
                } else {
                    ctx.mem.read_u32(config.timer) as usize
                };
                ctx.set_reg(rd, value);
            }
        }
        Ok(())
    }
}

/// Translates the address of an atomic access, which must be naturally aligned.
fn atomic_paddr<C: MachineCsr, M: PhysMemory>(
    ctx: &mut TrapContext<'_, C, M>,
    vaddr: usize,
    width: AmoWidth,
    access: PagingFlags,
    cause: Exception,
) -> FirmResult<PhysAddr> {
    let misaligned = match cause {
        Exception::LoadPageFault => Exception::LoadMisaligned,
        _ => Exception::StoreMisaligned,
    };
    check_atomic_alignment(vaddr, width, misaligned)?;
    ctx.translate(vaddr, access, cause)
}

fn check_atomic_alignment(vaddr: usize, width: AmoWidth, cause: Exception) -> FirmResult {
    if aligned_to(vaddr, width.bytes()) {
        Ok(())
    } else {
        Err(Fault::Misaligned { cause, tval: vaddr })
    }
}

/// Word loads are sign-extended into the destination.
fn set_loaded<C: MachineCsr, M: PhysMemory>(
    ctx: &mut TrapContext<'_, C, M>,
    width: AmoWidth,
    rd: usize,
    value: u64,
) {
    match width {
        AmoWidth::Word => ctx.set_reg_word(rd, value as u32),
        AmoWidth::Double => ctx.set_reg(rd, value as usize),
    }
}
