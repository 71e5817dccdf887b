// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Control and status registers touched by the firmware.

use page_table::{AddressSpaceRoot, PagingMode};

use crate::Xlen;

/// CSRs the firmware reads or writes, by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Csr {
    Stvec = 0x105,
    Sepc = 0x141,
    Scause = 0x142,
    Stval = 0x143,
    Satp = 0x180,
    Mstatus = 0x300,
    Mie = 0x304,
    Mtvec = 0x305,
    Mscratch = 0x340,
    Mepc = 0x341,
    Mcause = 0x342,
    Mtval = 0x343,
    Mip = 0x344,
    /// Hardware TLB slot and kind select.
    TlbSelect = 0x7c0,
    /// Hardware TLB physical page number, flags and granule.
    TlbPayload = 0x7c1,
    /// Hardware TLB virtual page number; writing it commits the entry.
    TlbTag = 0x7c2,
}

impl Csr {
    pub const COUNT: usize = 16;

    pub const ALL: [Csr; Self::COUNT] = [
        Csr::Stvec,
        Csr::Sepc,
        Csr::Scause,
        Csr::Stval,
        Csr::Satp,
        Csr::Mstatus,
        Csr::Mie,
        Csr::Mtvec,
        Csr::Mscratch,
        Csr::Mepc,
        Csr::Mcause,
        Csr::Mtval,
        Csr::Mip,
        Csr::TlbSelect,
        Csr::TlbPayload,
        Csr::TlbTag,
    ];

    pub const fn number(self) -> u16 {
        self as u16
    }

    const fn index(self) -> usize {
        let mut i = 0;
        while i < Self::COUNT {
            if Self::ALL[i] as u16 == self as u16 {
                return i;
            }
            i += 1;
        }
        unreachable!()
    }
}

bitflags::bitflags! {
    /// `mstatus` bits used when replaying a trap into supervisor mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MStatus: usize {
        const SIE  = 1 << 1;
        const MIE  = 1 << 3;
        const SPIE = 1 << 5;
        const MPIE = 1 << 7;
        const SPP  = 1 << 8;
        const MPP_S = 1 << 11;
        const MPP_H = 1 << 12;
        const MPP = Self::MPP_S.bits() | Self::MPP_H.bits();
    }
}

bitflags::bitflags! {
    /// Interrupt bits, laid out the same in `mie` and `mip`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: usize {
        const SSI = 1 << 1;
        const MSI = 1 << 3;
        const STI = 1 << 5;
        const MTI = 1 << 7;
        const SEI = 1 << 9;
        const MEI = 1 << 11;
    }
}

/// Read/write access to the machine-mode CSRs.
pub trait MachineCsr {
    fn read(&self, csr: Csr) -> usize;

    fn write(&mut self, csr: Csr, value: usize);

    fn set_bits(&mut self, csr: Csr, bits: usize) {
        let value = self.read(csr);
        self.write(csr, value | bits);
    }

    fn clear_bits(&mut self, csr: Csr, bits: usize) {
        let value = self.read(csr);
        self.write(csr, value & !bits);
    }
}

impl<T: MachineCsr + ?Sized> MachineCsr for &mut T {
    fn read(&self, csr: Csr) -> usize {
        (**self).read(csr)
    }

    fn write(&mut self, csr: Csr, value: usize) {
        (**self).write(csr, value)
    }
}

/// A CSR file held in memory, for running trap handlers off the hart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrFile {
    regs: [usize; Csr::COUNT],
}

impl CsrFile {
    pub const fn new() -> Self {
        Self {
            regs: [0; Csr::COUNT],
        }
    }

    /// Builder form of [`MachineCsr::write`].
    pub fn with(mut self, csr: Csr, value: usize) -> Self {
        self.regs[csr.index()] = value;
        self
    }
}

impl MachineCsr for CsrFile {
    fn read(&self, csr: Csr) -> usize {
        self.regs[csr.index()]
    }

    fn write(&mut self, csr: Csr, value: usize) {
        self.regs[csr.index()] = value;
    }
}

/// Decodes `satp` into the root the walker starts from.
///
/// Modes other than Sv32 and Sv39 are not implemented by the hardware and
/// are treated as bare.
pub fn decode_satp(xlen: Xlen, satp: usize) -> AddressSpaceRoot {
    match xlen {
        Xlen::X32 => {
            let ppn = satp & ((1 << 22) - 1);
            if (satp >> 31) & 1 == 1 {
                AddressSpaceRoot::new(PagingMode::Sv32, ppn)
            } else {
                AddressSpaceRoot::bare()
            }
        }
        Xlen::X64 => {
            let ppn = (satp as u64 & ((1 << 44) - 1)) as usize;
            match satp as u64 >> 60 {
                0 => AddressSpaceRoot::bare(),
                8 => AddressSpaceRoot::new(PagingMode::Sv39, ppn),
                mode => {
                    warn!("satp mode {mode} unsupported, translating as bare");
                    AddressSpaceRoot::bare()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_file_bits() {
        let mut csr = CsrFile::new().with(Csr::Mip, Interrupts::MTI.bits());
        csr.set_bits(Csr::Mip, Interrupts::STI.bits());
        assert_eq!(csr.read(Csr::Mip), (Interrupts::MTI | Interrupts::STI).bits());
        csr.clear_bits(Csr::Mip, Interrupts::MTI.bits());
        assert_eq!(csr.read(Csr::Mip), Interrupts::STI.bits());
        assert_eq!(csr.read(Csr::TlbTag), 0);
    }

    #[test]
    fn test_csr_numbers_distinct() {
        for (i, a) in Csr::ALL.iter().enumerate() {
            assert_eq!(a.index(), i);
            for b in &Csr::ALL[i + 1..] {
                assert_ne!(a.number(), b.number());
            }
        }
        assert_eq!(Csr::TlbSelect.number(), 0x7c0);
    }

    #[test]
    fn test_csr_numbers_match_privileged_map() {
        let numbers = [
            (Csr::Stvec, 0x105),
            (Csr::Sepc, 0x141),
            (Csr::Satp, 0x180),
            (Csr::Mstatus, 0x300),
            (Csr::Mepc, 0x341),
            (Csr::Mip, 0x344),
            (Csr::TlbPayload, 0x7c1),
            (Csr::TlbTag, 0x7c2),
        ];
        for (csr, number) in numbers {
            assert_eq!(csr.number(), number, "{csr:?}");
        }
    }

    #[test]
    fn test_decode_satp() {
        let root = decode_satp(Xlen::X32, 0x8000_0010);
        assert_eq!(root, AddressSpaceRoot::new(PagingMode::Sv32, 0x10));
        assert_eq!(decode_satp(Xlen::X32, 0x10), AddressSpaceRoot::bare());

        let root = decode_satp(Xlen::X64, (8 << 60) | 0x8_0020);
        assert_eq!(root, AddressSpaceRoot::new(PagingMode::Sv39, 0x8_0020));
        assert_eq!(decode_satp(Xlen::X64, 0x20), AddressSpaceRoot::bare());
        assert_eq!(decode_satp(Xlen::X64, 9 << 60), AddressSpaceRoot::bare());
    }
}
