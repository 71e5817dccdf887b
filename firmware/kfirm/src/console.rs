// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! FT245 FIFO UART, transmit side only.

use core::fmt;

use memaddr::PhysAddr;
use page_table::PhysMemory;

use crate::config::FirmwareConfig;

/// Status bit set while the transmit FIFO is full.
const STATUS_NO_SPACE: u8 = 1 << 3;

pub struct Ft245Uart<M: PhysMemory> {
    mem: M,
    data: PhysAddr,
    status: PhysAddr,
}

impl<M: PhysMemory> Ft245Uart<M> {
    pub fn new(mem: M, config: &FirmwareConfig) -> Self {
        Self {
            mem,
            data: config.uart_data,
            status: config.uart_status,
        }
    }

    pub fn put_byte(&mut self, byte: u8) {
        while self.mem.read_u8(self.status) & STATUS_NO_SPACE != 0 {
            core::hint::spin_loop();
        }
        self.mem.write_u8(self.data, byte);
    }
}

impl<M: PhysMemory> fmt::Write for Ft245Uart<M> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.put_byte(b'\r');
            }
            self.put_byte(b);
        }
        Ok(())
    }
}
