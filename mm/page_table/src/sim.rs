// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! A sparse little-endian RAM image for running walks off the board.

use std::collections::BTreeMap;

use memaddr::{PAGE_SIZE_4K, PhysAddr};

use crate::PhysMemory;

/// Physical memory backed by 4 KiB frames allocated on first write.
///
/// Bytes that were never written read as zero.
#[derive(Debug, Default, Clone)]
pub struct RamImage {
    frames: BTreeMap<usize, Box<[u8; PAGE_SIZE_4K]>>,
}

impl RamImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `bytes` to consecutive addresses starting at `paddr`.
    pub fn load(&mut self, paddr: PhysAddr, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.write_u8(paddr.add_wrapping(i), *b);
        }
    }

    /// Number of frames touched so far.
    pub fn frames(&self) -> usize {
        self.frames.len()
    }

    fn read_le<const N: usize>(&self, paddr: PhysAddr) -> [u8; N] {
        let mut buf = [0u8; N];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.read_u8(paddr.add_wrapping(i));
        }
        buf
    }

    fn write_le(&mut self, paddr: PhysAddr, bytes: &[u8]) {
        self.load(paddr, bytes);
    }
}

impl PhysMemory for RamImage {
    fn read_u8(&self, paddr: PhysAddr) -> u8 {
        self.frames
            .get(&paddr.page_number())
            .map_or(0, |frame| frame[paddr.page_offset()])
    }

    fn write_u8(&mut self, paddr: PhysAddr, value: u8) {
        let frame = self
            .frames
            .entry(paddr.page_number())
            .or_insert_with(|| Box::new([0; PAGE_SIZE_4K]));
        frame[paddr.page_offset()] = value;
    }

    fn read_u32(&self, paddr: PhysAddr) -> u32 {
        u32::from_le_bytes(self.read_le(paddr))
    }

    fn write_u32(&mut self, paddr: PhysAddr, value: u32) {
        self.write_le(paddr, &value.to_le_bytes());
    }

    fn read_u64(&self, paddr: PhysAddr) -> u64 {
        u64::from_le_bytes(self.read_le(paddr))
    }

    fn write_u64(&mut self, paddr: PhysAddr, value: u64) {
        self.write_le(paddr, &value.to_le_bytes());
    }
}
