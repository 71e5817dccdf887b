//! Misaligned load and store replay

#![cfg(test)]


use kcpu::{Xlen, csr::Csr};
use memaddr::pa;
use page_table::PhysMemory;
use test_helpers::*;

const LOAD_MISALIGNED: usize = 4;
const STORE_MISALIGNED: usize = 6;

const LW_A0_0_A1: u32 = 0x0005_a503;
const LH_A0_1_A1: u32 = 0x0015_9503;
const LD_A0_0_A1: u32 = 0x0005_b503;
const SW_A0_M4_A1: u32 = 0xfea5_ae23;

/// Physical frames behind the two data pages at 0x1000 and 0x2000.
const LOW_PPN: usize = 0x3001;
const HIGH_PPN: usize = 0x3005;

/// Hart with a code page at 0 holding `insn` and the pc pointing at it.
fn hart_running(mut h: Hart, insn: u32) -> Hart {
    h.map_page(0x0, 0x3000, V | R | X);
    h.mem.write_u32(pa!(0x300_0000), insn);
    h.set_pc(0);
    h
}

const fn frame_byte(ppn: usize, offset: usize) -> usize {
    (ppn << 12) + offset
}

// ========== Load Tests ==========

#[test]
fn test_load_spanning_two_pages() {
    let mut h = hart_running(Hart::sv32(), LW_A0_0_A1);
    h.map_page(0x1000, LOW_PPN, V | R | W);
    h.map_page(0x2000, HIGH_PPN, V | R | W);
    h.mem.load(pa!(frame_byte(LOW_PPN, 0xffe)), &[0x11, 0x22]);
    h.mem.load(pa!(frame_byte(HIGH_PPN, 0)), &[0x33, 0x44]);
    h.set_reg(A1, 0x1ffe);

    h.trap(LOAD_MISALIGNED, 0x1ffe);

    assert_eq!(h.reg(A0), 0x4433_2211);
    assert_eq!(h.pc(), 4);
    assert!(!h.delegated());
    assert_eq!(h.fw.stats().misaligned, 1);
}

#[test]
fn test_load_last_byte_unmapped() {
    let mut h = hart_running(Hart::sv32(), LW_A0_0_A1);
    h.map_page(0x1000, LOW_PPN, V | R | W);
    h.set_reg(A1, 0x1ffe);
    h.set_reg(A0, 0xabcd);

    h.trap(LOAD_MISALIGNED, 0x1ffe);

    assert!(h.delegated());
    assert_eq!(h.reg(A0), 0xabcd);
    assert_eq!(h.csr(Csr::Scause), 13);
    assert_eq!(h.csr(Csr::Stval), 0x2001);
    assert_eq!(h.csr(Csr::Sepc), 0);
    assert_eq!(h.pc(), STVEC);
    assert_eq!(h.fw.stats().misaligned, 0);
}

#[test]
fn test_signed_halfword_load() {
    let mut h = Hart::bare(Xlen::X64);
    h.set_pc(0x8000_0000);
    h.mem.write_u32(pa!(0x8000_0000), LH_A0_1_A1);
    h.mem.load(pa!(0x9000_0001), &[0x34, 0x85]);
    h.set_reg(A1, 0x9000_0000);

    h.trap(LOAD_MISALIGNED, 0x9000_0001);

    assert_eq!(h.reg(A0), 0xffff_ffff_ffff_8534);
    assert_eq!(h.pc(), 0x8000_0004);
}

#[test]
fn test_doubleword_load_on_sv39() {
    let mut h = hart_running(Hart::sv39(), LD_A0_0_A1);
    h.map_page(0x1000, LOW_PPN, V | R);
    h.map_page(0x2000, HIGH_PPN, V | R);
    h.mem.load(pa!(frame_byte(LOW_PPN, 0xffc)), &[1, 2, 3, 4]);
    h.mem.load(pa!(frame_byte(HIGH_PPN, 0)), &[5, 6, 7, 8]);
    h.set_reg(A1, 0x1ffc);

    h.trap(LOAD_MISALIGNED, 0x1ffc);

    assert_eq!(h.reg(A0), 0x0807_0605_0403_0201);
    assert_eq!(h.pc(), 4);
}

#[test]
fn test_instruction_fetch_fault() {
    let mut h = Hart::sv32();
    h.set_pc(0x7000);
    h.set_reg(A1, 0x1ffe);

    h.trap(LOAD_MISALIGNED, 0x1ffe);

    assert_eq!(h.csr(Csr::Scause), 12);
    assert_eq!(h.csr(Csr::Stval), 0x7000);
    assert_eq!(h.csr(Csr::Sepc), 0x7000);
}

#[test]
fn test_not_a_load_or_store() {
    // flw a0, 0(a1)
    let mut h = hart_running(Hart::sv32(), 0x0005_a507);

    h.trap(LOAD_MISALIGNED, 0x1ffe);

    assert!(h.delegated());
    assert_eq!(h.csr(Csr::Scause), LOAD_MISALIGNED);
    assert_eq!(h.csr(Csr::Stval), 0x1ffe);
}

// ========== Store Tests ==========

#[test]
fn test_store_spanning_two_pages() {
    let mut h = hart_running(Hart::sv32(), SW_A0_M4_A1);
    let low = h.map_page(0x1000, LOW_PPN, V | R | W);
    let high = h.map_page(0x2000, HIGH_PPN, V | R | W);
    h.set_reg(A0, 0x1122_3344);
    h.set_reg(A1, 0x2003);

    h.trap(STORE_MISALIGNED, 0x1fff);

    assert_eq!(h.mem.read_u8(pa!(frame_byte(LOW_PPN, 0xfff))), 0x44);
    assert_eq!(h.mem.read_u8(pa!(frame_byte(HIGH_PPN, 0))), 0x33);
    assert_eq!(h.mem.read_u8(pa!(frame_byte(HIGH_PPN, 1))), 0x22);
    assert_eq!(h.mem.read_u8(pa!(frame_byte(HIGH_PPN, 2))), 0x11);
    assert_eq!(h.read_pte(low) & D, D);
    assert_eq!(h.read_pte(high) & D, D);
    assert_eq!(h.pc(), 4);
}

#[test]
fn test_store_to_read_only_page_writes_nothing() {
    let mut h = hart_running(Hart::sv32(), SW_A0_M4_A1);
    h.map_page(0x1000, LOW_PPN, V | R | W);
    h.map_page(0x2000, HIGH_PPN, V | R);
    h.set_reg(A0, 0x1122_3344);
    h.set_reg(A1, 0x2003);

    h.trap(STORE_MISALIGNED, 0x1fff);

    assert_eq!(h.csr(Csr::Scause), 15);
    assert_eq!(h.csr(Csr::Stval), 0x2002);
    assert_eq!(h.mem.read_u8(pa!(frame_byte(LOW_PPN, 0xfff))), 0);
    assert_eq!(h.mem.read_u8(pa!(frame_byte(HIGH_PPN, 0))), 0);
    assert_eq!(h.pc(), STVEC);
}
