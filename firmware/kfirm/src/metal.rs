// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Running on the hart: trap entry, the global firmware, the console.
//!
//! `mscratch` holds the address of the trap area while the supervisor runs.
//! The entry stub swaps it with `tp`, so during a trap `tp` points at the
//! frame and the supervisor's `tp` waits in `mscratch`. The frame is
//! followed by the machine-mode stack.

use core::{
    arch::global_asm,
    fmt::Write,
    ptr::{read_volatile, write_volatile},
};

use kcpu::{
    MetalCsr, TrapFrame,
    csr::{Csr, MachineCsr},
};
use kspin::SpinRaw;
use memaddr::PhysAddr;
use page_table::PhysMemory;

use crate::{config::FirmwareConfig, console::Ft245Uart, trap::Firmware};

const TRAP_STACK_SIZE: usize = 4096;

/// Only ever addressed from the entry stub.
#[allow(dead_code)]
#[repr(C, align(16))]
struct TrapArea {
    frame: TrapFrame,
    stack: [u8; TRAP_STACK_SIZE],
}

static mut TRAP_AREA: TrapArea = TrapArea {
    frame: TrapFrame::new(),
    stack: [0; TRAP_STACK_SIZE],
};

/// Traps are not nested, so the lock is never contended.
static FIRMWARE: SpinRaw<Firmware> = SpinRaw::new(Firmware::new(FirmwareConfig::BOARD));

/// Physical memory at its own address: machine mode runs untranslated.
#[derive(Debug, Clone, Copy)]
pub struct IdentityMemory;

impl PhysMemory for IdentityMemory {
    fn read_u8(&self, paddr: PhysAddr) -> u8 {
        unsafe { read_volatile(paddr.as_ptr_of::<u8>()) }
    }

    fn write_u8(&mut self, paddr: PhysAddr, value: u8) {
        unsafe { write_volatile(paddr.as_mut_ptr_of::<u8>(), value) }
    }

    fn read_u32(&self, paddr: PhysAddr) -> u32 {
        unsafe { read_volatile(paddr.as_ptr_of::<u32>()) }
    }

    fn write_u32(&mut self, paddr: PhysAddr, value: u32) {
        unsafe { write_volatile(paddr.as_mut_ptr_of::<u32>(), value) }
    }

    fn read_u64(&self, paddr: PhysAddr) -> u64 {
        unsafe { read_volatile(paddr.as_ptr_of::<u64>()) }
    }

    fn write_u64(&mut self, paddr: PhysAddr, value: u64) {
        unsafe { write_volatile(paddr.as_mut_ptr_of::<u64>(), value) }
    }
}

macro_rules! trap_entry {
    ($store:literal, $load:literal, $xlenb:literal) => {
        global_asm!(
            ".section .text.kfirm_trap, \"ax\"",
            ".p2align 2",
            ".global kfirm_trap_entry",
            "kfirm_trap_entry:",
            "csrrw tp, mscratch, tp",
            ".irp n, 1,2,3,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31",
            concat!($store, " x\\n, \\n*", $xlenb, "(tp)"),
            ".endr",
            "mv a0, tp",
            "li t0, {area_size}",
            "add sp, tp, t0",
            "call {handler}",
            // sp is restored last
            ".irp n, 1,3,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31",
            concat!($load, " x\\n, \\n*", $xlenb, "(tp)"),
            ".endr",
            concat!($load, " x2, 2*", $xlenb, "(tp)"),
            "csrrw tp, mscratch, tp",
            "mret",
            area_size = const core::mem::size_of::<TrapArea>(),
            handler = sym kfirm_trap_handler,
        );
    };
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "riscv64")] {
        trap_entry!("sd", "ld", "8");
    } else {
        trap_entry!("sw", "lw", "4");
    }
}

unsafe extern "C" {
    fn kfirm_trap_entry();
}

extern "C" fn kfirm_trap_handler(frame: &mut TrapFrame) {
    FIRMWARE
        .lock()
        .handle_trap(frame, &mut MetalCsr, &mut IdentityMemory);
}

struct UartLogger;

#[crate_interface::impl_interface]
impl klogger::LoggerAdapter for UartLogger {
    fn write_str(s: &str) {
        let _ = Ft245Uart::new(IdentityMemory, &FirmwareConfig::BOARD).write_str(s);
    }

    fn hart_id() -> Option<usize> {
        Some(kcpu::hart_id())
    }
}

/// Points `mtvec` and `mscratch` at the firmware and starts the console
/// logger.
///
/// Call once from the boot path, with machine interrupts disabled, before
/// entering supervisor mode.
pub fn init() {
    let mut csr = MetalCsr;
    let area = &raw mut TRAP_AREA as usize;
    csr.write(Csr::Mscratch, area);
    csr.write(Csr::Mtvec, kfirm_trap_entry as usize);

    if klogger::init_klogger().is_ok() {
        klogger::set_log_level(FirmwareConfig::BOARD.log_level);
    }
    info!(
        "kfirm: trap area {area:#x}, {} TLB slots, impl {:#x}",
        FirmwareConfig::BOARD.tlb_slots,
        FirmwareConfig::BOARD.impl_id
    );
}
