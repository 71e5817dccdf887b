// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Register width of the hart being serviced.

/// Width of the integer registers.
///
/// Values of an `X32` hart are kept zero-extended in a `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xlen {
    X32,
    X64,
}

impl Xlen {
    #[cfg(target_pointer_width = "32")]
    pub const NATIVE: Self = Self::X32;
    #[cfg(target_pointer_width = "64")]
    pub const NATIVE: Self = Self::X64;

    pub const fn bits(self) -> u32 {
        match self {
            Self::X32 => 32,
            Self::X64 => 64,
        }
    }

    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Mask of the bits a register of this width holds.
    pub const fn mask(self) -> usize {
        match self {
            Self::X32 => u32::MAX as usize,
            Self::X64 => usize::MAX,
        }
    }

    pub const fn truncate(self, value: usize) -> usize {
        value & self.mask()
    }

    /// The top bit of `mcause`.
    pub const fn interrupt_bit(self) -> usize {
        (1u64 << (self.bits() - 1)) as usize
    }

    /// Sign-extends a 32-bit result into a full register.
    pub const fn sign_extend_word(self, word: u32) -> usize {
        self.truncate(word as i32 as isize as usize)
    }
}
