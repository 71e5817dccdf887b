// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::fmt;

use memaddr::PhysAddr;

use crate::arch::{PagingMode, RvFlags};

bitflags::bitflags! {
    /// Kinds of access a translation is checked against.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PagingFlags: usize {
        const READ    = 1 << 0;
        const WRITE   = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl PagingFlags {
    /// The accesses a leaf with these PTE bits permits.
    pub fn granted_by(pte: RvFlags) -> Self {
        let mut f = Self::empty();
        if pte.contains(RvFlags::R) {
            f |= Self::READ;
        }
        if pte.contains(RvFlags::W) {
            f |= Self::WRITE;
        }
        if pte.contains(RvFlags::X) {
            f |= Self::EXECUTE;
        }
        f
    }
}

/// Why a translation did not produce a usable physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtError {
    /// The PTE visited at `level` has its Valid bit clear (or is a pointer
    /// at the last level).
    NotValid { level: usize },
    /// The leaf is valid but lacks the listed permissions.
    PermissionDenied { missing: PagingFlags },
}

impl fmt::Display for PtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotValid { level } => write!(f, "invalid PTE at level {level}"),
            Self::PermissionDenied { missing } => write!(f, "missing permissions {missing:?}"),
        }
    }
}

pub type PtResult<T = ()> = Result<T, PtError>;

/// Region covered by one leaf PTE, and therefore by one hardware TLB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granule {
    /// 4 KiB page, leaf at level 0.
    Page,
    /// 4 MiB (Sv32) or 2 MiB (Sv39) page, leaf at level 1.
    Mega,
    /// 1 GiB page, leaf at level 2 (Sv39 only).
    Giga,
}

impl Granule {
    /// Granule produced by a leaf found at `level` (0 is the bottom level).
    pub const fn from_level(level: usize) -> Self {
        match level {
            0 => Self::Page,
            1 => Self::Mega,
            _ => Self::Giga,
        }
    }

    pub const fn level(self) -> usize {
        match self {
            Self::Page => 0,
            Self::Mega => 1,
            Self::Giga => 2,
        }
    }

    /// Size code understood by the hardware TLB.
    pub const fn tlb_code(self) -> usize {
        match self {
            Self::Page => 1,
            Self::Mega => 2,
            Self::Giga => 3,
        }
    }

    /// Number of bytes covered under `mode`.
    pub const fn size(self, mode: PagingMode) -> usize {
        1 << (memaddr::PAGE_SHIFT + self.level() * mode.vpn_bits())
    }
}

/// Current address-space root, as decoded from `satp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpaceRoot {
    pub mode: PagingMode,
    pub root_ppn: usize,
}

impl AddressSpaceRoot {
    pub const fn bare() -> Self {
        Self {
            mode: PagingMode::Bare,
            root_ppn: 0,
        }
    }

    pub const fn new(mode: PagingMode, root_ppn: usize) -> Self {
        Self { mode, root_ppn }
    }
}

/// Fixed-width access to physical memory.
///
/// On the board this is a plain dereference of the identity-mapped address.
/// Page-table entries are read and written with a single access of their
/// own width.
pub trait PhysMemory {
    fn read_u8(&self, paddr: PhysAddr) -> u8;
    fn write_u8(&mut self, paddr: PhysAddr, value: u8);
    fn read_u32(&self, paddr: PhysAddr) -> u32;
    fn write_u32(&mut self, paddr: PhysAddr, value: u32);
    fn read_u64(&self, paddr: PhysAddr) -> u64;
    fn write_u64(&mut self, paddr: PhysAddr, value: u64);
}

impl<T: PhysMemory + ?Sized> PhysMemory for &mut T {
    fn read_u8(&self, paddr: PhysAddr) -> u8 {
        (**self).read_u8(paddr)
    }

    fn write_u8(&mut self, paddr: PhysAddr, value: u8) {
        (**self).write_u8(paddr, value)
    }

    fn read_u32(&self, paddr: PhysAddr) -> u32 {
        (**self).read_u32(paddr)
    }

    fn write_u32(&mut self, paddr: PhysAddr, value: u32) {
        (**self).write_u32(paddr, value)
    }

    fn read_u64(&self, paddr: PhysAddr) -> u64 {
        (**self).read_u64(paddr)
    }

    fn write_u64(&mut self, paddr: PhysAddr, value: u64) {
        (**self).write_u64(paddr, value)
    }
}

/// A page-table entry of one paging mode.
pub trait PageTableEntry: Copy + fmt::Debug {
    /// Size of the entry in memory, in bytes.
    const SIZE: usize;

    fn load<M: PhysMemory + ?Sized>(mem: &M, paddr: PhysAddr) -> Self;
    fn store<M: PhysMemory + ?Sized>(self, mem: &mut M, paddr: PhysAddr);

    fn flags(&self) -> RvFlags;
    fn set_flags(&mut self, flags: RvFlags);
    /// The physical page number field.
    fn ppn(&self) -> usize;

    fn is_valid(&self) -> bool {
        self.flags().contains(RvFlags::V)
    }

    /// Any of R/W/X set: the walk terminates at this entry.
    fn is_leaf(&self) -> bool {
        self.flags().intersects(RvFlags::XWR)
    }
}

/// Static description of a paging mode.
pub trait PagingMetaData {
    type Entry: PageTableEntry;

    const MODE: PagingMode;
    const LEVELS: usize;
    /// Width of one virtual page number segment.
    const VPN_BITS: usize;
    const VA_MAX_BITS: usize;

    #[inline]
    fn va_mask() -> usize {
        if Self::VA_MAX_BITS >= usize::BITS as usize {
            usize::MAX
        } else {
            (1 << Self::VA_MAX_BITS) - 1
        }
    }

    /// Index into the table at `level` for the virtual page number `vpn`.
    #[inline]
    fn table_index(vpn: usize, level: usize) -> usize {
        (vpn >> (level * Self::VPN_BITS)) & ((1 << Self::VPN_BITS) - 1)
    }
}
