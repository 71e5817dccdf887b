// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::fmt;

use kcpu::excp::Exception;

/// Why a trap could not be serviced here.
///
/// Every variant ends in delegation to the supervisor; none is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The instruction is not one this firmware emulates. The original trap
    /// is delegated unchanged.
    DecodeMiss { insn: u32 },
    /// A translation failed. `cause` is the page-fault code to report and
    /// `tval` the virtual address that failed.
    PageFault { cause: Exception, tval: usize },
    /// An atomic access was not naturally aligned.
    Misaligned { cause: Exception, tval: usize },
}

impl Fault {
    /// The `(mcause, mtval)` pair to raise, or `None` to keep the original trap.
    pub const fn raised(self) -> Option<(Exception, usize)> {
        match self {
            Self::DecodeMiss { .. } => None,
            Self::PageFault { cause, tval } | Self::Misaligned { cause, tval } => {
                Some((cause, tval))
            }
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecodeMiss { insn } => write!(f, "no emulation for {insn:#010x}"),
            Self::PageFault { cause, tval } => write!(f, "{cause:?} at {tval:#x}"),
            Self::Misaligned { cause, tval } => write!(f, "{cause:?} at {tval:#x}"),
        }
    }
}

pub type FirmResult<T = ()> = Result<T, Fault>;
