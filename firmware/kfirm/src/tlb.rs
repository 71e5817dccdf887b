// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Refilling the hardware TLB.
//!
//! The core raises a TLB-miss trap instead of walking page tables itself.
//! The handler walks to the first leaf or invalid entry and writes one slot
//! through three custom CSRs: select, payload, then tag. Permissions are not
//! checked here; the TLB enforces them when the access is retried.

use kcpu::csr::{Csr, MachineCsr};
use memaddr::va;
use page_table::{Granule, LeafMapping, PhysMemory, RvFlags, walk_for_fill};

use crate::context::TrapContext;

/// Which of the two TLBs missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbKind {
    Instruction = 0,
    Data = 1,
}

/// Hands out slots in insertion order, wrapping at the slot count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlbAllocator {
    next: usize,
    slots: usize,
}

impl TlbAllocator {
    pub const fn new(slots: usize) -> Self {
        assert!(slots > 0);
        Self { next: 0, slots }
    }

    pub fn next_slot(&mut self) -> usize {
        let slot = self.next;
        self.next = (self.next + 1) % self.slots;
        slot
    }
}

/// One hardware TLB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    pub slot: usize,
    pub kind: TlbKind,
    pub vpn: usize,
    pub ppn: usize,
    pub flags: RvFlags,
    pub granule: Granule,
}

impl TlbEntry {
    pub fn new(slot: usize, kind: TlbKind, leaf: LeafMapping) -> Self {
        Self {
            slot,
            kind,
            vpn: leaf.vpn,
            ppn: leaf.ppn,
            flags: leaf.flags,
            granule: leaf.granule,
        }
    }

    pub const fn select(&self) -> usize {
        (self.slot << 1) | self.kind as usize
    }

    pub const fn payload(&self) -> usize {
        (self.ppn << 10) | (self.flags.daguxwrv() << 2) | self.granule.tlb_code()
    }

    pub const fn tag(&self) -> usize {
        self.vpn
    }

    /// Writes the entry; the tag write commits it.
    pub fn install<C: MachineCsr>(&self, csr: &mut C) {
        csr.write(Csr::TlbSelect, self.select());
        csr.write(Csr::TlbPayload, self.payload());
        csr.write(Csr::TlbTag, self.tag());
    }
}

/// Handles a TLB miss at `mtval`.
///
/// Returns `None`, installing nothing, when translation is off.
pub fn refill<C: MachineCsr, M: PhysMemory>(
    ctx: &mut TrapContext<'_, C, M>,
    alloc: &mut TlbAllocator,
    kind: TlbKind,
) -> Option<TlbEntry> {
    let vaddr = ctx.csr.read(Csr::Mtval);
    let root = ctx.root();
    let leaf = walk_for_fill(&mut *ctx.mem, root, va!(vaddr))?;
    let entry = TlbEntry::new(alloc.next_slot(), kind, leaf);
    trace!(
        "tlb fill {vaddr:#x}: slot {} {:?} vpn {:#x} -> ppn {:#x} {:?} {:?}",
        entry.slot, kind, entry.vpn, entry.ppn, entry.granule, entry.flags
    );
    entry.install(&mut *ctx.csr);
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_wraps() {
        let mut alloc = TlbAllocator::new(4);
        let slots: [usize; 9] = core::array::from_fn(|_| alloc.next_slot());
        assert_eq!(slots, [0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_entry_encoding() {
        let entry = TlbEntry {
            slot: 3,
            kind: TlbKind::Data,
            vpn: 0x400,
            ppn: 0x1234,
            flags: RvFlags::V | RvFlags::R | RvFlags::A,
            granule: Granule::Mega,
        };
        assert_eq!(entry.select(), 0b111);
        assert_eq!(entry.payload(), (0x1234 << 10) | (0x43 << 2) | 2);
        assert_eq!(entry.tag(), 0x400);
    }
}
