// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use kcpu::{
    TrapFrame, Xlen,
    csr::{Csr, MachineCsr, decode_satp},
    excp::Exception,
};
use memaddr::{PhysAddr, va};
use page_table::{AddressSpaceRoot, PagingFlags, PhysMemory, PtResult, translate, translate_clean};

use crate::error::{FirmResult, Fault};

/// Length of every instruction this firmware steps over.
pub const INSN_BYTES: usize = 4;

/// The interrupted hart, as seen from one trap.
///
/// Borrowed for a single trap and dropped before returning: nothing read
/// through it outlives the invocation.
pub struct TrapContext<'a, C: MachineCsr, M: PhysMemory> {
    pub frame: &'a mut TrapFrame,
    pub csr: &'a mut C,
    pub mem: &'a mut M,
    pub xlen: Xlen,
}

impl<'a, C: MachineCsr, M: PhysMemory> TrapContext<'a, C, M> {
    pub fn new(frame: &'a mut TrapFrame, csr: &'a mut C, mem: &'a mut M, xlen: Xlen) -> Self {
        Self {
            frame,
            csr,
            mem,
            xlen,
        }
    }

    #[inline]
    pub fn reg(&self, index: usize) -> usize {
        self.xlen.truncate(self.frame.get_reg(&*self.csr, index))
    }

    #[inline]
    pub fn set_reg(&mut self, index: usize, value: usize) {
        let value = self.xlen.truncate(value);
        self.frame.set_reg(&mut *self.csr, index, value);
    }

    /// Writes a 32-bit result, sign-extended to the register width.
    #[inline]
    pub fn set_reg_word(&mut self, index: usize, word: u32) {
        let value = self.xlen.sign_extend_word(word);
        self.set_reg(index, value);
    }

    pub fn epc(&self) -> usize {
        self.csr.read(Csr::Mepc)
    }

    /// Steps the saved pc over the trapping instruction.
    pub fn advance_pc(&mut self) {
        let pc = self.xlen.truncate(self.epc().wrapping_add(INSN_BYTES));
        self.csr.write(Csr::Mepc, pc);
    }

    /// The root in `satp` right now.
    pub fn root(&self) -> AddressSpaceRoot {
        decode_satp(self.xlen, self.csr.read(Csr::Satp))
    }

    /// Translates `vaddr` for `access`, reporting a failure as `cause`.
    pub fn translate(
        &mut self,
        vaddr: usize,
        access: PagingFlags,
        cause: Exception,
    ) -> FirmResult<PhysAddr> {
        let root = self.root();
        let result = translate(&mut *self.mem, root, va!(vaddr), access);
        Self::page_fault(result, vaddr, access, cause)
    }

    /// [`Self::translate`] without setting the dirty bit.
    pub fn translate_clean(
        &mut self,
        vaddr: usize,
        access: PagingFlags,
        cause: Exception,
    ) -> FirmResult<PhysAddr> {
        let root = self.root();
        let result = translate_clean(&mut *self.mem, root, va!(vaddr), access);
        Self::page_fault(result, vaddr, access, cause)
    }

    fn page_fault(
        result: PtResult<PhysAddr>,
        vaddr: usize,
        access: PagingFlags,
        cause: Exception,
    ) -> FirmResult<PhysAddr> {
        result.map_err(|err| {
            trace!("{vaddr:#x} {access:?}: {err}");
            Fault::PageFault {
                cause,
                tval: vaddr,
            }
        })
    }
}
