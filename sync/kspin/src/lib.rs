// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Spinlocks for machine-mode code.
//!
//! - [`SpinRaw`] only serializes. Use it inside trap handlers, where
//!   interrupts are already masked.
//! - [`SpinNoIrq`] also clears `mstatus.MIE` for the critical section.
#![cfg_attr(not(test), no_std)]

mod base;
pub mod guard;

pub use base::{BaseSpinLock, BaseSpinLockGuard};

/// A spin lock that does nothing on entry.
pub type SpinRaw<T> = BaseSpinLock<guard::NoOp, T>;
pub type SpinRawGuard<'a, T> = BaseSpinLockGuard<'a, guard::NoOp, T>;

/// A spin lock that masks machine interrupts while held.
pub type SpinNoIrq<T> = BaseSpinLock<guard::IrqSave, T>;
pub type SpinNoIrqGuard<'a, T> = BaseSpinLockGuard<'a, guard::IrqSave, T>;
