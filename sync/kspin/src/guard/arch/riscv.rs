// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! RISC-V machine-mode IRQ save/restore helpers.
use core::arch::asm;

/// Bit 3: Machine Interrupt Enable
const MIE_BIT: usize = 1 << 3;

/// Save MIE and disable interrupts.
#[inline]
pub fn save_disable() -> usize {
    let flags: usize;
    // clear the `MIE` bit, and return the old CSR
    unsafe { asm!("csrrc {}, mstatus, {}", out(reg) flags, const MIE_BIT) };
    flags & MIE_BIT
}

/// Restore MIE according to saved flags.
#[inline]
pub fn restore(flags: usize) {
    // restore the `MIE` bit
    unsafe { asm!("csrrs x0, mstatus, {}", in(reg) flags) };
}
