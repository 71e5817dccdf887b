// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Trap cause decoding.

use strum::FromRepr;

use crate::Xlen;

/// Synchronous exception codes, including the two TLB-miss causes this core
/// adds in the custom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(usize)]
pub enum Exception {
    InstructionMisaligned = 0,
    InstructionFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadMisaligned = 4,
    LoadFault = 5,
    StoreMisaligned = 6,
    StoreFault = 7,
    UserEnvCall = 8,
    SupervisorEnvCall = 9,
    MachineEnvCall = 11,
    InstructionPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
    InstructionTlbMiss = 24,
    DataTlbMiss = 25,
}

impl Exception {
    pub const fn code(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(usize)]
pub enum Interrupt {
    SupervisorSoft = 1,
    MachineSoft = 3,
    SupervisorTimer = 5,
    MachineTimer = 7,
    SupervisorExternal = 9,
    MachineExternal = 11,
}

impl Interrupt {
    pub const fn code(self) -> usize {
        self as usize
    }
}

/// A decoded `mcause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    Interrupt(Interrupt),
    Exception(Exception),
    /// A code this core does not define.
    Unknown { interrupt: bool, code: usize },
}

impl TrapCause {
    pub fn decode(xlen: Xlen, mcause: usize) -> Self {
        let interrupt = mcause & xlen.interrupt_bit() != 0;
        let code = xlen.truncate(mcause) & !xlen.interrupt_bit();
        let decoded = if interrupt {
            Interrupt::from_repr(code).map(Self::Interrupt)
        } else {
            Exception::from_repr(code).map(Self::Exception)
        };
        decoded.unwrap_or(Self::Unknown { interrupt, code })
    }

    /// The `mcause` value for this cause.
    pub const fn bits(self, xlen: Xlen) -> usize {
        match self {
            Self::Interrupt(i) => i.code() | xlen.interrupt_bit(),
            Self::Exception(e) => e.code(),
            Self::Unknown { interrupt, code } => {
                if interrupt {
                    code | xlen.interrupt_bit()
                } else {
                    code
                }
            }
        }
    }
}
