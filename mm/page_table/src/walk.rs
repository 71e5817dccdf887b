// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Radix walks over the supervisor's page tables.
//!
//! Nothing here caches an entry: every call starts again from the root it is
//! given, because the supervisor may rewrite its tables between two traps.

use memaddr::{PAGE_OFFSET_MASK, PAGE_SHIFT, PhysAddr, VirtAddr};

use crate::{
    arch::{PagingMode, RvFlags, Sv32MetaData, Sv39MetaData},
    defs::{
        AddressSpaceRoot, Granule, PageTableEntry, PagingFlags, PagingMetaData, PhysMemory,
        PtError, PtResult,
    },
};

/// The entry at which a walk terminated.
#[derive(Debug, Clone, Copy)]
struct WalkStop<E> {
    entry: E,
    entry_paddr: PhysAddr,
    level: usize,
}

/// A translation found for the hardware TLB, aligned to its granule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafMapping {
    /// Virtual page number with the bits below the granule cleared.
    pub vpn: usize,
    /// Physical page number with the bits below the granule cleared.
    pub ppn: usize,
    pub flags: RvFlags,
    pub granule: Granule,
}

/// Descends from the root, most significant segment first, and stops at the
/// first leaf, the first invalid entry, or the last level.
fn walk_to_stop<P, M>(mem: &M, root_ppn: usize, vpn: usize) -> WalkStop<P::Entry>
where
    P: PagingMetaData,
    M: PhysMemory + ?Sized,
{
    let mut table = PhysAddr::from_page_number(root_ppn);
    let mut level = P::LEVELS - 1;
    loop {
        let entry_paddr = table + P::table_index(vpn, level) * <P::Entry as PageTableEntry>::SIZE;
        let entry = <P::Entry as PageTableEntry>::load(mem, entry_paddr);
        if level == 0 || entry.is_leaf() || !entry.is_valid() {
            return WalkStop {
                entry,
                entry_paddr,
                level,
            };
        }
        table = PhysAddr::from_page_number(entry.ppn());
        level -= 1;
    }
}

#[inline]
const fn low_mask(level: usize, vpn_bits: usize) -> usize {
    (1 << (level * vpn_bits)) - 1
}

fn translate_with<P, M>(
    mem: &mut M,
    root_ppn: usize,
    vaddr: VirtAddr,
    access: PagingFlags,
    mark_dirty: bool,
) -> PtResult<PhysAddr>
where
    P: PagingMetaData,
    M: PhysMemory + ?Sized,
{
    let va = vaddr.as_usize() & P::va_mask();
    let vpn = va >> PAGE_SHIFT;
    let stop = walk_to_stop::<P, M>(mem, root_ppn, vpn);
    let mut entry = stop.entry;

    if !entry.is_valid() || !entry.is_leaf() {
        trace!("translate {vaddr:?}: {entry:?} at level {} not valid", stop.level);
        return Err(PtError::NotValid { level: stop.level });
    }

    let flags = entry.flags();
    let missing = access.difference(PagingFlags::granted_by(flags));
    if !missing.is_empty() {
        trace!("translate {vaddr:?}: {entry:?} lacks {missing:?}");
        return Err(PtError::PermissionDenied { missing });
    }

    let mut updated = flags | RvFlags::A;
    if mark_dirty {
        updated |= RvFlags::D;
    }
    if updated != flags {
        entry.set_flags(updated);
        entry.store(mem, stop.entry_paddr);
    }

    // Superpages take the lower segments from the virtual address.
    let low = low_mask(stop.level, P::VPN_BITS);
    let ppn = (entry.ppn() & !low) | (vpn & low);
    Ok(PhysAddr::from_page_number(ppn) + (va & PAGE_OFFSET_MASK))
}

fn fill_walk_with<P, M>(mem: &mut M, root_ppn: usize, vaddr: VirtAddr) -> LeafMapping
where
    P: PagingMetaData,
    M: PhysMemory + ?Sized,
{
    let vpn = (vaddr.as_usize() & P::va_mask()) >> PAGE_SHIFT;
    let stop = walk_to_stop::<P, M>(mem, root_ppn, vpn);
    let mut entry = stop.entry;

    if entry.is_valid() {
        let flags = entry.flags();
        if !flags.contains(RvFlags::A) {
            entry.set_flags(flags | RvFlags::A);
            entry.store(mem, stop.entry_paddr);
        }
    }

    let low = low_mask(stop.level, P::VPN_BITS);
    LeafMapping {
        vpn: vpn & !low,
        ppn: entry.ppn() & !low,
        flags: entry.flags(),
        granule: Granule::from_level(stop.level),
    }
}

/// Translates `vaddr` for the given kind of access.
///
/// With translation off the address is returned unchanged. Otherwise the
/// leaf must be valid and grant every requested permission; on success its
/// Accessed bit (and Dirty bit for writes) is set and written back. A failed
/// translation never writes memory.
pub fn translate<M>(
    mem: &mut M,
    root: AddressSpaceRoot,
    vaddr: VirtAddr,
    access: PagingFlags,
) -> PtResult<PhysAddr>
where
    M: PhysMemory + ?Sized,
{
    translate_marking(mem, root, vaddr, access, access.contains(PagingFlags::WRITE))
}

/// Like [`translate`], but never sets the dirty bit, even for a write.
///
/// For accesses that may turn out not to store anything.
pub fn translate_clean<M>(
    mem: &mut M,
    root: AddressSpaceRoot,
    vaddr: VirtAddr,
    access: PagingFlags,
) -> PtResult<PhysAddr>
where
    M: PhysMemory + ?Sized,
{
    translate_marking(mem, root, vaddr, access, false)
}

fn translate_marking<M>(
    mem: &mut M,
    root: AddressSpaceRoot,
    vaddr: VirtAddr,
    access: PagingFlags,
    mark_dirty: bool,
) -> PtResult<PhysAddr>
where
    M: PhysMemory + ?Sized,
{
    match root.mode {
        PagingMode::Bare => Ok(PhysAddr::from_usize(vaddr.as_usize())),
        PagingMode::Sv32 => {
            translate_with::<Sv32MetaData, M>(mem, root.root_ppn, vaddr, access, mark_dirty)
        }
        PagingMode::Sv39 => {
            translate_with::<Sv39MetaData, M>(mem, root.root_ppn, vaddr, access, mark_dirty)
        }
    }
}

/// Locates the mapping the hardware TLB needs for `vaddr`.
///
/// Stops at the first leaf or invalid entry without checking permissions,
/// since the hardware TLB enforces them on the retried access. An invalid
/// entry is still reported so that the retry faults. Returns `None` when
/// translation is off.
pub fn walk_for_fill<M>(mem: &mut M, root: AddressSpaceRoot, vaddr: VirtAddr) -> Option<LeafMapping>
where
    M: PhysMemory + ?Sized,
{
    match root.mode {
        PagingMode::Bare => None,
        PagingMode::Sv32 => Some(fill_walk_with::<Sv32MetaData, M>(mem, root.root_ppn, vaddr)),
        PagingMode::Sv39 => Some(fill_walk_with::<Sv39MetaData, M>(mem, root.root_ppn, vaddr)),
    }
}

#[cfg(test)]
mod tests {
    use memaddr::{pa, va};

    use super::*;
    use crate::sim::RamImage;

    const V: u64 = RvFlags::V.bits() as u64;
    const R: u64 = RvFlags::R.bits() as u64;
    const W: u64 = RvFlags::W.bits() as u64;
    const X: u64 = RvFlags::X.bits() as u64;
    const A: u64 = RvFlags::A.bits() as u64;
    const D: u64 = RvFlags::D.bits() as u64;

    const fn pte(ppn: u64, flags: u64) -> u64 {
        (ppn << 10) | flags
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sv32() -> (RamImage, AddressSpaceRoot) {
        init_logger();
        // root at ppn 0x10, second level at ppn 0x11
        let mut mem = RamImage::new();
        mem.write_u32(pa!(0x10_000), pte(0x11, V) as u32);
        mem.write_u32(pa!(0x11_000), pte(0x1000, V | R | W) as u32);
        mem.write_u32(pa!(0x11_004), pte(0x1001, V | R) as u32);
        mem.write_u32(pa!(0x11_008), pte(0x1002, V | X) as u32);
        // entry 1 of the root: a 4 MiB leaf
        mem.write_u32(pa!(0x10_004), pte(0x400, V | R | W | X) as u32);
        (mem, AddressSpaceRoot::new(PagingMode::Sv32, 0x10))
    }

    fn sv39() -> (RamImage, AddressSpaceRoot) {
        init_logger();
        // root 0x20 -> 0x21 -> 0x22
        let mut mem = RamImage::new();
        mem.write_u64(pa!(0x20_000), pte(0x21, V));
        mem.write_u64(pa!(0x21_000), pte(0x22, V));
        mem.write_u64(pa!(0x22_000), pte(0x5000, V | R | W));
        // second 2 MiB slot is a leaf
        mem.write_u64(pa!(0x21_008), pte(0x200, V | R));
        // root entry 1 is a 1 GiB leaf
        mem.write_u64(pa!(0x20_008), pte(0x80000, V | R | X));
        (mem, AddressSpaceRoot::new(PagingMode::Sv39, 0x20))
    }

    #[test]
    fn test_bare_is_identity() {
        let mut mem = RamImage::new();
        let pa = translate(
            &mut mem,
            AddressSpaceRoot::bare(),
            va!(0xdead_beef),
            PagingFlags::WRITE,
        );
        assert_eq!(pa, Ok(pa!(0xdead_beef)));
    }

    #[test]
    fn test_sv32_two_level_sets_accessed() {
        let (mut mem, root) = sv32();
        let pa = translate(&mut mem, root, va!(0x000), PagingFlags::READ);
        assert_eq!(pa, Ok(pa!(0x100_0000)));
        let leaf = mem.read_u32(pa!(0x11_000)) as u64;
        assert_eq!(leaf & A, A);
        assert_eq!(leaf & D, 0);
        // interior entries are left alone
        assert_eq!(mem.read_u32(pa!(0x10_000)) as u64, pte(0x11, V));
    }

    #[test]
    fn test_sv32_page_offset_is_preserved() {
        let (mut mem, root) = sv32();
        for offset in [0usize, 1, 0x7ff, 0xffe, 0xfff] {
            let pa = translate(&mut mem, root, va!(0x1000 + offset), PagingFlags::READ).unwrap();
            assert_eq!(pa.page_number(), 0x1001);
            assert_eq!(pa.page_offset(), offset);
        }
    }

    #[test]
    fn test_sv32_megapage_takes_low_bits_from_va() {
        let (mut mem, root) = sv32();
        let pa = translate(&mut mem, root, va!(0x0045_6789), PagingFlags::EXECUTE).unwrap();
        assert_eq!(pa, pa!(0x0045_6789));
        assert_eq!(mem.read_u32(pa!(0x10_004)) as u64 & A, A);
    }

    #[test]
    fn test_permission_fault_does_not_touch_memory() {
        let (mut mem, root) = sv32();
        let before = mem.read_u32(pa!(0x11_004));
        let err = translate(&mut mem, root, va!(0x1010), PagingFlags::WRITE).unwrap_err();
        assert_eq!(
            err,
            PtError::PermissionDenied {
                missing: PagingFlags::WRITE
            }
        );
        assert_eq!(mem.read_u32(pa!(0x11_004)), before);

        let err = translate(&mut mem, root, va!(0x2000), PagingFlags::READ).unwrap_err();
        assert_eq!(
            err,
            PtError::PermissionDenied {
                missing: PagingFlags::READ
            }
        );
    }

    #[test]
    fn test_invalid_interior_entry_stops_walk() {
        let (mut mem, root) = sv32();
        // root entry 2 is zero
        let err = translate(&mut mem, root, va!(0x0080_0000), PagingFlags::READ).unwrap_err();
        assert_eq!(err, PtError::NotValid { level: 1 });
        // second level entry 3 is zero
        let err = translate(&mut mem, root, va!(0x3000), PagingFlags::empty()).unwrap_err();
        assert_eq!(err, PtError::NotValid { level: 0 });
    }

    #[test]
    fn test_write_sets_dirty() {
        let (mut mem, root) = sv32();
        translate(&mut mem, root, va!(0x10), PagingFlags::READ | PagingFlags::WRITE).unwrap();
        let leaf = mem.read_u32(pa!(0x11_000)) as u64;
        assert_eq!(leaf & (A | D), A | D);
    }

    #[test]
    fn test_clean_write_checks_but_leaves_dirty() {
        let (mut mem, root) = sv32();
        let pa = translate_clean(&mut mem, root, va!(0x10), PagingFlags::WRITE);
        assert_eq!(pa, Ok(pa!(0x100_0010)));
        let leaf = mem.read_u32(pa!(0x11_000)) as u64;
        assert_eq!(leaf & (A | D), A);

        let err = translate_clean(&mut mem, root, va!(0x1010), PagingFlags::WRITE).unwrap_err();
        assert_eq!(
            err,
            PtError::PermissionDenied {
                missing: PagingFlags::WRITE
            }
        );
    }

    #[test]
    fn test_sv39_three_levels() {
        let (mut mem, root) = sv39();
        let pa = translate(&mut mem, root, va!(0x123), PagingFlags::READ).unwrap();
        assert_eq!(pa, pa!(0x500_0123));

        // 2 MiB leaf at level 1
        let pa = translate(&mut mem, root, va!(0x0023_4567), PagingFlags::READ).unwrap();
        assert_eq!(pa, pa!(0x0023_4567));

        // 1 GiB leaf at level 2
        let pa = translate(&mut mem, root, va!(0x4765_4321), PagingFlags::EXECUTE).unwrap();
        assert_eq!(pa, pa!(0x8765_4321));
        assert_eq!(mem.read_u64(pa!(0x20_008)) & A, A);
    }

    #[test]
    fn test_fill_walk_granules() {
        let (mut mem, root) = sv39();
        let page = walk_for_fill(&mut mem, root, va!(0x123)).unwrap();
        assert_eq!(page.granule, Granule::Page);
        assert_eq!(page.vpn, 0);
        assert_eq!(page.ppn, 0x5000);

        let mega = walk_for_fill(&mut mem, root, va!(0x0023_4567)).unwrap();
        assert_eq!(mega.granule, Granule::Mega);
        assert_eq!(mega.vpn, 0x200);
        assert_eq!(mega.ppn, 0x200);

        let giga = walk_for_fill(&mut mem, root, va!(0x4765_4321)).unwrap();
        assert_eq!(giga.granule, Granule::Giga);
        assert_eq!(giga.vpn, 0x40000);
        assert_eq!(giga.ppn, 0x80000);
        assert!(giga.flags.contains(RvFlags::A));

        let (mut mem, root) = sv32();
        let mega = walk_for_fill(&mut mem, root, va!(0x0045_6789)).unwrap();
        assert_eq!(mega.granule, Granule::Mega);
        assert_eq!(mega.vpn, 0x400);
        assert_eq!(mega.ppn, 0x400);
        assert_eq!(Granule::Mega.size(PagingMode::Sv32), 4 << 20);
        assert_eq!(Granule::Mega.size(PagingMode::Sv39), 2 << 20);
    }

    #[test]
    fn test_fill_walk_reports_invalid_entry() {
        let (mut mem, root) = sv32();
        let miss = walk_for_fill(&mut mem, root, va!(0x0080_0000)).unwrap();
        assert_eq!(miss.granule, Granule::Mega);
        assert!(!miss.flags.contains(RvFlags::V));
        // nothing written for an invalid entry
        assert_eq!(mem.read_u32(pa!(0x10_008)), 0);

        assert_eq!(walk_for_fill(&mut mem, AddressSpaceRoot::bare(), va!(0)), None);
    }
}
