// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Misaligned loads and stores, replayed one byte at a time.

use kcpu::{Xlen, csr::MachineCsr, excp::Exception};
use memaddr::PhysAddr;
use page_table::{PagingFlags, PhysMemory};

use crate::{
    context::TrapContext,
    emulate::RawInsn,
    error::{FirmResult, Fault},
};

const OPCODE_LOAD: u32 = 0b000_0011;
const OPCODE_STORE: u32 = 0b010_0011;

const MAX_ACCESS_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load { signed: bool },
    Store,
}

/// A decoded scalar load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAccess {
    pub kind: AccessKind,
    pub bytes: usize,
    pub base: usize,
    pub offset: isize,
    /// `rd` of a load, `rs2` of a store.
    pub reg: usize,
}

impl MemAccess {
    pub fn decode(xlen: Xlen, insn: u32) -> Option<Self> {
        let raw = RawInsn(insn);
        let rv64 = xlen == Xlen::X64;
        match raw.opcode() {
            OPCODE_LOAD => {
                let (bytes, signed) = match raw.funct3() {
                    0b000 => (1, true),
                    0b001 => (2, true),
                    0b010 => (4, true),
                    0b011 if rv64 => (8, true),
                    0b100 => (1, false),
                    0b101 => (2, false),
                    0b110 if rv64 => (4, false),
                    _ => return None,
                };
                Some(Self {
                    kind: AccessKind::Load { signed },
                    bytes,
                    base: raw.rs1(),
                    offset: raw.imm_i(),
                    reg: raw.rd(),
                })
            }
            OPCODE_STORE => {
                let bytes = match raw.funct3() {
                    0b000 => 1,
                    0b001 => 2,
                    0b010 => 4,
                    0b011 if rv64 => 8,
                    _ => return None,
                };
                Some(Self {
                    kind: AccessKind::Store,
                    bytes,
                    base: raw.rs1(),
                    offset: raw.imm_s(),
                    reg: raw.rs2(),
                })
            }
            _ => None,
        }
    }

    const fn intent(&self) -> (PagingFlags, Exception) {
        match self.kind {
            AccessKind::Load { .. } => (PagingFlags::READ, Exception::LoadPageFault),
            AccessKind::Store => (PagingFlags::WRITE, Exception::StorePageFault),
        }
    }
}

/// Fetches the instruction at the saved pc through the supervisor's tables.
fn fetch<C: MachineCsr, M: PhysMemory>(ctx: &mut TrapContext<'_, C, M>) -> FirmResult<u32> {
    let pc = ctx.epc();
    let paddr = ctx.translate(pc, PagingFlags::EXECUTE, Exception::InstructionPageFault)?;
    Ok(ctx.mem.read_u32(paddr))
}

/// Emulates the misaligned access at the saved pc.
///
/// Every byte is translated before any is moved: the first, then the last,
/// then those between. A failure raises a page fault at the failing byte
/// and leaves memory and registers untouched. The caller steps the pc on
/// success.
pub fn emulate<C: MachineCsr, M: PhysMemory>(
    ctx: &mut TrapContext<'_, C, M>,
) -> FirmResult<MemAccess> {
    let insn = fetch(ctx)?;
    let access = MemAccess::decode(ctx.xlen, insn).ok_or(Fault::DecodeMiss { insn })?;
    let xlen = ctx.xlen;
    let vaddr = xlen.truncate(ctx.reg(access.base).wrapping_add_signed(access.offset));
    let (intent, cause) = access.intent();
    let byte_va = |i: usize| xlen.truncate(vaddr.wrapping_add(i));

    let last = access.bytes - 1;
    let mut paddrs = [PhysAddr::from_usize(0); MAX_ACCESS_BYTES];
    let order = core::iter::once(0)
        .chain(core::iter::once(last))
        .chain(1..last)
        .take(access.bytes);
    for i in order {
        paddrs[i] = ctx.translate(byte_va(i), intent, cause)?;
    }

    match access.kind {
        AccessKind::Load { signed } => {
            let mut value = 0u64;
            for (i, paddr) in paddrs[..access.bytes].iter().enumerate() {
                value |= (ctx.mem.read_u8(*paddr) as u64) << (8 * i);
            }
            if signed && access.bytes < MAX_ACCESS_BYTES {
                let shift = 64 - 8 * access.bytes as u32;
                value = (((value << shift) as i64) >> shift) as u64;
            }
            debug!("misaligned load {vaddr:#x} x{} = {value:#x}", access.reg);
            ctx.set_reg(access.reg, value as usize);
        }
        AccessKind::Store => {
            let value = ctx.reg(access.reg) as u64;
            for (i, paddr) in paddrs[..access.bytes].iter().enumerate() {
                ctx.mem.write_u8(*paddr, (value >> (8 * i)) as u8);
            }
            debug!("misaligned store {vaddr:#x} = {value:#x}");
        }
    }
    Ok(access)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_widths() {
        // lhu a0, 3(a1)
        let access = MemAccess::decode(Xlen::X32, 0x0035_d503).unwrap();
        assert_eq!(access.kind, AccessKind::Load { signed: false });
        assert_eq!((access.bytes, access.base, access.offset, access.reg), (2, 11, 3, 10));
        // ld a0, 0(a1) and lwu a0, 0(a1) are rv64 only
        assert_eq!(MemAccess::decode(Xlen::X32, 0x0005_b503), None);
        assert_eq!(MemAccess::decode(Xlen::X64, 0x0005_b503).map(|a| a.bytes), Some(8));
        assert_eq!(MemAccess::decode(Xlen::X32, 0x0005_e503), None);
        // sw a0, -4(a1)
        let access = MemAccess::decode(Xlen::X32, 0xfea5_ae23).unwrap();
        assert_eq!(access.kind, AccessKind::Store);
        assert_eq!((access.bytes, access.offset, access.reg), (4, -4, 10));
        // flw is not a scalar integer access
        assert_eq!(MemAccess::decode(Xlen::X32, 0x0005_a507), None);
    }
}
