// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Wrappers and helpers for the physical and virtual addresses handled by
//! the machine-mode firmware.
#![cfg_attr(not(test), no_std)]

mod addr;

pub use self::addr::{PhysAddr, VirtAddr};

/// Width of the page offset, shared by every paging mode.
pub const PAGE_SHIFT: usize = 12;
/// Size of a 4 KiB page.
pub const PAGE_SIZE_4K: usize = 1 << PAGE_SHIFT;
/// Mask selecting the offset inside a 4 KiB page.
pub const PAGE_OFFSET_MASK: usize = PAGE_SIZE_4K - 1;

/// Checks whether `addr` is a multiple of `align`.
#[inline]
pub const fn aligned_to(addr: usize, align: usize) -> bool {
    addr & (align - 1) == 0
}
