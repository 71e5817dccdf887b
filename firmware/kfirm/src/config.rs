// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Board parameters.

use kcpu::Xlen;
use memaddr::{PhysAddr, pa};

/// Everything the trap handlers need to know about the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareConfig {
    /// Width of the hart being serviced.
    pub xlen: Xlen,
    /// 32-bit timer: reads return the free-running counter, writes set the
    /// compare value.
    pub timer: PhysAddr,
    pub uart_data: PhysAddr,
    pub uart_status: PhysAddr,
    /// Number of hardware TLB slots.
    pub tlb_slots: usize,
    /// Reported by the base extension.
    pub impl_id: usize,
    pub impl_version: usize,
    /// Call-interface version, major in bits 24 and up.
    pub spec_version: usize,
    /// Filter installed at boot.
    pub log_level: &'static str,
}

const MMIO_BASE: usize = 0x0100_0000;

cfg_if::cfg_if! {
    if #[cfg(feature = "board-vmriscv")] {
        const UART_DATA: usize = MMIO_BASE + 0x580;
        const UART_STATUS: usize = MMIO_BASE + 0x584;
    } else {
        const UART_DATA: usize = MMIO_BASE + 0x588;
        const UART_STATUS: usize = MMIO_BASE + 0x58c;
    }
}

impl FirmwareConfig {
    /// The board this firmware was built for.
    pub const BOARD: Self = Self {
        xlen: Xlen::NATIVE,
        timer: pa!(MMIO_BASE + 0x600),
        uart_data: pa!(UART_DATA),
        uart_status: pa!(UART_STATUS),
        tlb_slots: 4,
        impl_id: 0xbeef_cafe,
        impl_version: 1,
        spec_version: 2,
        log_level: "warn",
    };

    /// Same board, serviced at another register width.
    pub const fn with_xlen(self, xlen: Xlen) -> Self {
        Self { xlen, ..self }
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self::BOARD
    }
}
