// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::fmt;

use crate::csr::{Csr, MachineCsr};

/// Index of `tp`. While a trap is handled the supervisor's `tp` lives in
/// `mscratch` and `tp` holds the firmware's own pointer.
pub const TP_INDEX: usize = 4;

/// General registers saved at trap entry, indexed by register number.
#[repr(C)]
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub regs: [usize; 32],
}

impl TrapFrame {
    pub const fn new() -> Self {
        Self { regs: [0; 32] }
    }

    /// Reads `x{index}` as the interrupted code sees it.
    pub fn get_reg<C: MachineCsr + ?Sized>(&self, csr: &C, index: usize) -> usize {
        match index & 31 {
            0 => 0,
            TP_INDEX => csr.read(Csr::Mscratch),
            i => self.regs[i],
        }
    }

    /// Writes `x{index}`. Writes to `x0` are dropped.
    pub fn set_reg<C: MachineCsr + ?Sized>(&mut self, csr: &mut C, index: usize, value: usize) {
        match index & 31 {
            0 => {}
            TP_INDEX => csr.write(Csr::Mscratch, value),
            i => self.regs[i] = value,
        }
    }
}

impl fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut list = f.debug_map();
        for (i, r) in self.regs.iter().enumerate().skip(1) {
            list.entry(&format_args!("x{i}"), &format_args!("{r:#x}"));
        }
        list.finish()
    }
}
