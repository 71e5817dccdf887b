// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Supervisor binary interface: the base and timer extensions.
//!
//! Extension id in `a7`, function id in `a6`, arguments from `a0`. The
//! status comes back in `a0` and, for calls that return one, the value in
//! `a1`.

use kcpu::{
    Xlen,
    csr::{Csr, Interrupts, MachineCsr},
};
use page_table::PhysMemory;

use crate::{config::FirmwareConfig, context::TrapContext};

pub const EXT_BASE: usize = 0x10;
/// "TIME"
pub const EXT_TIME: usize = 0x5449_4d45;

const A0: usize = 10;
const A1: usize = 11;
const A6: usize = 16;
const A7: usize = 17;

/// Base extension function ids.
mod base {
    pub const GET_SPEC_VERSION: usize = 0;
    pub const GET_IMPL_ID: usize = 1;
    pub const GET_IMPL_VERSION: usize = 2;
    pub const PROBE_EXTENSION: usize = 3;
    pub const GET_MVENDORID: usize = 4;
    pub const GET_MARCHID: usize = 5;
    pub const GET_MIMPID: usize = 6;
}

const TIME_SET_TIMER: usize = 0;

/// Failure statuses returned in `a0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(isize)]
pub enum SbiError {
    NotSupported = -2,
}

/// Outcome of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbiRet {
    pub error: Option<SbiError>,
    /// Written to `a1` when present; `a1` is left alone otherwise.
    pub value: Option<usize>,
}

impl SbiRet {
    pub const fn success(value: usize) -> Self {
        Self {
            error: None,
            value: Some(value),
        }
    }

    pub const fn done() -> Self {
        Self {
            error: None,
            value: None,
        }
    }

    pub const fn not_supported() -> Self {
        Self {
            error: Some(SbiError::NotSupported),
            value: None,
        }
    }

    /// The `a0` status word.
    pub const fn status(&self) -> isize {
        match self.error {
            Some(err) => err as isize,
            None => 0,
        }
    }
}

fn base_call(config: &FirmwareConfig, fid: usize, arg0: usize) -> SbiRet {
    match fid {
        base::GET_SPEC_VERSION => SbiRet::success(config.spec_version),
        base::GET_IMPL_ID => SbiRet::success(config.impl_id),
        base::GET_IMPL_VERSION => SbiRet::success(config.impl_version),
        base::PROBE_EXTENSION => SbiRet::success((arg0 & 0xffff_ffff == EXT_TIME) as usize),
        base::GET_MVENDORID | base::GET_MARCHID | base::GET_MIMPID => SbiRet::success(0),
        _ => SbiRet::not_supported(),
    }
}

/// Programs the board timer and unmasks its machine interrupt.
///
/// The compare register is 32 bits wide; the upper half of the deadline is
/// dropped.
fn set_timer<C: MachineCsr, M: PhysMemory>(
    ctx: &mut TrapContext<'_, C, M>,
    config: &FirmwareConfig,
) -> SbiRet {
    let deadline = match ctx.xlen {
        Xlen::X32 => ((ctx.reg(A1) as u64) << 32) | ctx.reg(A0) as u64,
        Xlen::X64 => ctx.reg(A0) as u64,
    };
    trace!("set_timer {deadline:#x}");
    ctx.mem.write_u32(config.timer, deadline as u32);
    ctx.csr.set_bits(Csr::Mie, Interrupts::MTI.bits());
    SbiRet::done()
}

/// Services an environment call from supervisor mode and steps over it.
pub fn handle_ecall<C: MachineCsr, M: PhysMemory>(
    ctx: &mut TrapContext<'_, C, M>,
    config: &FirmwareConfig,
) -> SbiRet {
    let eid = ctx.reg(A7) & 0xffff_ffff;
    let fid = ctx.reg(A6) & 0xffff_ffff;
    let ret = match (eid, fid) {
        (EXT_BASE, _) => base_call(config, fid, ctx.reg(A0)),
        (EXT_TIME, TIME_SET_TIMER) => set_timer(ctx, config),
        _ => SbiRet::not_supported(),
    };
    if ret.error.is_some() {
        debug!("sbi call {eid:#x}:{fid} not supported");
    }
    ctx.set_reg(A0, ret.status() as usize);
    if let Some(value) = ret.value {
        ctx.set_reg(A1, value);
    }
    ctx.advance_pc();
    ret
}
