// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::fmt;

use memaddr::PhysAddr;

use crate::defs::{PageTableEntry, PagingMetaData, PhysMemory};

bitflags::bitflags! {
    /// PTE flag bits 0..=7, identical in Sv32 and Sv39.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RvFlags: usize {
        const V =   1 << 0;
        const R =   1 << 1;
        const W =   1 << 2;
        const X =   1 << 3;
        const U =   1 << 4;
        const G =   1 << 5;
        const A =   1 << 6;
        const D =   1 << 7;

        const XWR = Self::X.bits() | Self::W.bits() | Self::R.bits();
    }
}

impl RvFlags {
    /// The low eight bits of a PTE, packed for the hardware TLB status field.
    pub const fn daguxwrv(self) -> usize {
        self.bits() & 0xff
    }
}

/// Translation scheme selected by the address-space root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// Translation off, virtual equals physical.
    Bare,
    /// 32-bit, two levels of 10-bit indices.
    Sv32,
    /// 64-bit, three levels of 9-bit indices.
    Sv39,
}

impl PagingMode {
    pub const fn levels(self) -> usize {
        match self {
            Self::Bare => 0,
            Self::Sv32 => Sv32MetaData::LEVELS,
            Self::Sv39 => Sv39MetaData::LEVELS,
        }
    }

    pub const fn vpn_bits(self) -> usize {
        match self {
            Self::Bare => 0,
            Self::Sv32 => Sv32MetaData::VPN_BITS,
            Self::Sv39 => Sv39MetaData::VPN_BITS,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Rv32PageEntry(u32);

impl PageTableEntry for Rv32PageEntry {
    const SIZE: usize = 4;

    fn load<M: PhysMemory + ?Sized>(mem: &M, paddr: PhysAddr) -> Self {
        Self(mem.read_u32(paddr))
    }

    fn store<M: PhysMemory + ?Sized>(self, mem: &mut M, paddr: PhysAddr) {
        mem.write_u32(paddr, self.0);
    }

    fn flags(&self) -> RvFlags {
        RvFlags::from_bits_truncate(self.0 as usize)
    }

    fn set_flags(&mut self, flags: RvFlags) {
        self.0 = (self.0 & !0xff) | flags.daguxwrv() as u32;
    }

    fn ppn(&self) -> usize {
        (self.0 >> 10) as usize
    }
}

impl fmt::Debug for Rv32PageEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Rv32PageEntry")
            .field("ppn", &format_args!("{:#x}", self.ppn()))
            .field("flags", &self.flags())
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Rv64PageEntry(u64);

impl Rv64PageEntry {
    const PPN_MASK: u64 = (1 << 44) - 1;
}

impl PageTableEntry for Rv64PageEntry {
    const SIZE: usize = 8;

    fn load<M: PhysMemory + ?Sized>(mem: &M, paddr: PhysAddr) -> Self {
        Self(mem.read_u64(paddr))
    }

    fn store<M: PhysMemory + ?Sized>(self, mem: &mut M, paddr: PhysAddr) {
        mem.write_u64(paddr, self.0);
    }

    fn flags(&self) -> RvFlags {
        RvFlags::from_bits_truncate(self.0 as usize)
    }

    fn set_flags(&mut self, flags: RvFlags) {
        self.0 = (self.0 & !0xff) | flags.daguxwrv() as u64;
    }

    fn ppn(&self) -> usize {
        ((self.0 >> 10) & Self::PPN_MASK) as usize
    }
}

impl fmt::Debug for Rv64PageEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Rv64PageEntry")
            .field("ppn", &format_args!("{:#x}", self.ppn()))
            .field("flags", &self.flags())
            .finish()
    }
}

pub struct Sv32MetaData;

pub struct Sv39MetaData;

impl PagingMetaData for Sv32MetaData {
    type Entry = Rv32PageEntry;

    const MODE: PagingMode = PagingMode::Sv32;
    const LEVELS: usize = 2;
    const VPN_BITS: usize = 10;
    const VA_MAX_BITS: usize = 32;
}

impl PagingMetaData for Sv39MetaData {
    type Entry = Rv64PageEntry;

    const MODE: PagingMode = PagingMode::Sv39;
    const LEVELS: usize = 3;
    const VPN_BITS: usize = 9;
    const VA_MAX_BITS: usize = 39;
}
