// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use kcpu::Xlen;

const OPCODE_OP: u32 = 0b011_0011;
const OPCODE_OP_32: u32 = 0b011_1011;
const OPCODE_AMO: u32 = 0b010_1111;
const OPCODE_SYSTEM: u32 = 0b111_0011;

const FUNCT7_MULDIV: u32 = 0b000_0001;

const CSR_TIME: u32 = 0xc01;
const CSR_TIMEH: u32 = 0xc81;

/// Field accessors for a 32-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInsn(pub u32);

impl RawInsn {
    pub const fn opcode(self) -> u32 {
        self.0 & 0x7f
    }

    pub const fn rd(self) -> usize {
        ((self.0 >> 7) & 0x1f) as usize
    }

    pub const fn funct3(self) -> u32 {
        (self.0 >> 12) & 0x7
    }

    pub const fn rs1(self) -> usize {
        ((self.0 >> 15) & 0x1f) as usize
    }

    pub const fn rs2(self) -> usize {
        ((self.0 >> 20) & 0x1f) as usize
    }

    pub const fn funct7(self) -> u32 {
        self.0 >> 25
    }

    pub const fn funct5(self) -> u32 {
        self.0 >> 27
    }

    pub const fn csr(self) -> u32 {
        self.0 >> 20
    }

    /// Sign-extended I-type immediate.
    pub const fn imm_i(self) -> isize {
        (self.0 as i32 >> 20) as isize
    }

    /// Sign-extended S-type immediate.
    pub const fn imm_s(self) -> isize {
        (((self.0 as i32 >> 25) << 5) | ((self.0 >> 7) & 0x1f) as i32) as isize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivOp {
    Div,
    Divu,
    Rem,
    Remu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmoOp {
    Swap,
    Add,
    Xor,
    And,
    Or,
}

impl AmoOp {
    /// New memory value from the old one and the `rs2` operand.
    pub const fn apply(self, old: u64, src: u64) -> u64 {
        match self {
            Self::Swap => src,
            Self::Add => old.wrapping_add(src),
            Self::Xor => old ^ src,
            Self::And => old & src,
            Self::Or => old | src,
        }
    }
}

/// Operand size of an atomic access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmoWidth {
    Word,
    Double,
}

impl AmoWidth {
    pub const fn bytes(self) -> usize {
        match self {
            Self::Word => 4,
            Self::Double => 8,
        }
    }
}

/// An instruction the firmware emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insn {
    /// `div`/`divu`/`rem`/`remu`, or with `word` their `*w` forms.
    Divide {
        op: DivOp,
        word: bool,
        rd: usize,
        rs1: usize,
        rs2: usize,
    },
    Amo {
        op: AmoOp,
        width: AmoWidth,
        rd: usize,
        rs1: usize,
        rs2: usize,
    },
    LoadReserved {
        width: AmoWidth,
        rd: usize,
        rs1: usize,
    },
    StoreConditional {
        width: AmoWidth,
        rd: usize,
        rs1: usize,
        rs2: usize,
    },
    /// `csrrs rd, time, x0`, or `timeh` with `high`.
    ReadTime { rd: usize, high: bool },
}

fn decode_divide(raw: RawInsn, word: bool) -> Option<Insn> {
    if raw.funct7() != FUNCT7_MULDIV {
        return None;
    }
    let op = match raw.funct3() {
        0b100 => DivOp::Div,
        0b101 => DivOp::Divu,
        0b110 => DivOp::Rem,
        0b111 => DivOp::Remu,
        _ => return None,
    };
    Some(Insn::Divide {
        op,
        word,
        rd: raw.rd(),
        rs1: raw.rs1(),
        rs2: raw.rs2(),
    })
}

fn decode_amo(xlen: Xlen, raw: RawInsn) -> Option<Insn> {
    let width = match (raw.funct3(), xlen) {
        (0b010, _) => AmoWidth::Word,
        (0b011, Xlen::X64) => AmoWidth::Double,
        _ => return None,
    };
    let (rd, rs1, rs2) = (raw.rd(), raw.rs1(), raw.rs2());
    let op = match raw.funct5() {
        0b00010 if rs2 == 0 => return Some(Insn::LoadReserved { width, rd, rs1 }),
        0b00011 => {
            return Some(Insn::StoreConditional {
                width,
                rd,
                rs1,
                rs2,
            });
        }
        0b00001 => AmoOp::Swap,
        0b00000 => AmoOp::Add,
        0b00100 => AmoOp::Xor,
        0b01100 => AmoOp::And,
        0b01000 => AmoOp::Or,
        _ => return None,
    };
    Some(Insn::Amo {
        op,
        width,
        rd,
        rs1,
        rs2,
    })
}

fn decode_system(xlen: Xlen, raw: RawInsn) -> Option<Insn> {
    // csrrs with x0 as source: a pure read
    if raw.funct3() != 0b010 || raw.rs1() != 0 {
        return None;
    }
    match (raw.csr(), xlen) {
        (CSR_TIME, _) => Some(Insn::ReadTime {
            rd: raw.rd(),
            high: false,
        }),
        (CSR_TIMEH, Xlen::X32) => Some(Insn::ReadTime {
            rd: raw.rd(),
            high: true,
        }),
        _ => None,
    }
}

/// Decodes an illegal-instruction word into something emulable.
pub fn decode(xlen: Xlen, insn: u32) -> Option<Insn> {
    let raw = RawInsn(insn);
    match raw.opcode() {
        OPCODE_OP => decode_divide(raw, false),
        OPCODE_OP_32 if xlen == Xlen::X64 => decode_divide(raw, true),
        OPCODE_AMO => decode_amo(xlen, raw),
        OPCODE_SYSTEM => decode_system(xlen, raw),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_div() {
        assert_eq!(
            decode(Xlen::X32, 0x02b5_4533),
            Some(Insn::Divide {
                op: DivOp::Div,
                word: false,
                rd: 10,
                rs1: 10,
                rs2: 11
            })
        );
        // mul shares funct7 but is implemented in hardware
        assert_eq!(decode(Xlen::X32, 0x02b5_0533), None);
        // divw a0, a0, a1 only exists on rv64
        assert_eq!(decode(Xlen::X32, 0x02b5_453b), None);
        assert!(matches!(
            decode(Xlen::X64, 0x02b5_453b),
            Some(Insn::Divide { word: true, .. })
        ));
    }

    #[test]
    fn test_decode_atomics() {
        // amoadd.w a0, a1, (a2)
        assert_eq!(
            decode(Xlen::X32, 0x00b6_252f),
            Some(Insn::Amo {
                op: AmoOp::Add,
                width: AmoWidth::Word,
                rd: 10,
                rs1: 12,
                rs2: 11
            })
        );
        // lr.w a0, (a2)
        assert_eq!(
            decode(Xlen::X32, 0x1006_252f),
            Some(Insn::LoadReserved {
                width: AmoWidth::Word,
                rd: 10,
                rs1: 12
            })
        );
        // sc.d a0, a1, (a2)
        assert_eq!(decode(Xlen::X32, 0x18b6_352f), None);
        assert_eq!(
            decode(Xlen::X64, 0x18b6_352f),
            Some(Insn::StoreConditional {
                width: AmoWidth::Double,
                rd: 10,
                rs1: 12,
                rs2: 11
            })
        );
        // amomin.w is not emulated
        assert_eq!(decode(Xlen::X32, 0x80b6_252f), None);
    }

    #[test]
    fn test_decode_time() {
        // rdtime a0 / rdtimeh a0
        assert_eq!(
            decode(Xlen::X64, 0xc010_2573),
            Some(Insn::ReadTime { rd: 10, high: false })
        );
        assert_eq!(decode(Xlen::X64, 0xc810_2573), None);
        assert_eq!(
            decode(Xlen::X32, 0xc810_2573),
            Some(Insn::ReadTime { rd: 10, high: true })
        );
        // csrrs a0, time, a1 would also set bits
        assert_eq!(decode(Xlen::X32, 0xc015_a573), None);
    }

    #[test]
    fn test_immediates() {
        // lw a0, -4(a1)
        assert_eq!(RawInsn(0xffc5_a503).imm_i(), -4);
        // sw a0, -4(a1)
        assert_eq!(RawInsn(0xfea5_ae23).imm_s(), -4);
        // sw a0, 2047(a1)
        assert_eq!(RawInsn(0x7ea5_afa3).imm_s(), 2047);
    }
}
