//! Supervisor calls

#![cfg(test)]


use kcpu::{
    Xlen,
    csr::{Csr, Interrupts},
};
use kfirm::{
    FirmwareConfig,
    sbi::{EXT_BASE, EXT_TIME},
};
use page_table::PhysMemory;
use test_helpers::*;

const SUPERVISOR_ECALL: usize = 9;

fn call(h: &mut Hart, eid: usize, fid: usize, a0: usize, a1: usize) {
    h.set_reg(A7, eid);
    h.set_reg(A6, fid);
    h.set_reg(A0, a0);
    h.set_reg(A1, a1);
    h.trap(SUPERVISOR_ECALL, 0);
}

// ========== Base Extension Tests ==========

#[test]
fn test_get_impl_id() {
    let mut h = Hart::bare(Xlen::X32);
    h.set_pc(0x8000_0000);

    call(&mut h, EXT_BASE, 1, 0, 0);

    assert_eq!(h.reg(A0), 0);
    assert_eq!(h.reg(A1), 0xbeef_cafe);
    assert_eq!(h.pc(), 0x8000_0004);
    assert!(!h.delegated());
}

#[test]
fn test_base_functions() {
    let mut h = Hart::bare(Xlen::X32);
    let cases = [(0, 0, 2), (2, 0, 1), (3, EXT_TIME, 1), (3, 0x0073_5049, 0), (4, 0, 0)];
    for (fid, arg, expected) in cases {
        call(&mut h, EXT_BASE, fid, arg, 0x77);
        assert_eq!((h.reg(A0), h.reg(A1)), (0, expected), "fid {fid}");
    }
}

#[test]
fn test_unsupported_call() {
    let mut h = Hart::bare(Xlen::X32);

    call(&mut h, 0x0048_534d, 0, 0, 0x77);
    assert_eq!(h.reg(A0), 0xffff_fffe);
    assert_eq!(h.reg(A1), 0x77);

    call(&mut h, EXT_BASE, 7, 0, 0x77);
    assert_eq!(h.reg(A0), 0xffff_fffe);
    assert_eq!(h.pc(), 8);
}

#[test]
fn test_ids_use_low_32_bits() {
    let mut h = Hart::bare(Xlen::X64);

    call(&mut h, 0xffff_ffff_0000_0010, 0xffff_ffff_0000_0000, 0, 0);

    assert_eq!(h.reg(A0), 0);
    assert_eq!(h.reg(A1), FirmwareConfig::BOARD.spec_version);

    call(&mut h, EXT_BASE, 7, 0, 0);
    assert_eq!(h.reg(A0) as isize, -2);
}

#[test]
fn test_probe_uses_low_32_bits() {
    let mut h = Hart::bare(Xlen::X64);

    call(&mut h, EXT_BASE, 3, 0xffff_ffff_0000_0000 | EXT_TIME, 0);

    assert_eq!((h.reg(A0), h.reg(A1)), (0, 1));
}

// ========== Timer Extension Tests ==========

#[test]
fn test_set_timer() {
    let mut h = Hart::bare(Xlen::X32);

    call(&mut h, EXT_TIME, 0, 0x1234_5678, 1);

    assert_eq!(h.mem.read_u32(FirmwareConfig::BOARD.timer), 0x1234_5678);
    assert_ne!(h.csr(Csr::Mie) & Interrupts::MTI.bits(), 0);
    assert_eq!(h.reg(A0), 0);
    assert_eq!(h.reg(A1), 1);
    assert_eq!(h.pc(), 4);
}

#[test]
fn test_set_timer_rv64_deadline_in_a0() {
    let mut h = Hart::bare(Xlen::X64);

    call(&mut h, EXT_TIME, 0, 0x2_0000_0100, 0x55);

    assert_eq!(h.mem.read_u32(FirmwareConfig::BOARD.timer), 0x100);
    assert_eq!(h.reg(A1), 0x55);
}

#[test]
fn test_ecall_count() {
    let mut h = Hart::bare(Xlen::X32);
    for _ in 0..130 {
        call(&mut h, EXT_BASE, 0, 0, 0);
    }
    assert_eq!(h.fw.stats().ecalls, 130);
    assert_eq!(h.fw.stats().delegated, 0);
}
