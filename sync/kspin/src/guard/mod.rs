// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Critical-section guards entered before taking a lock.

mod arch;

/// Something entered on lock and left on unlock.
pub trait BaseGuard {
    /// What `acquire` saved for `release` to restore.
    type State: Clone + Copy;

    fn acquire() -> Self::State;

    fn release(state: Self::State);
}

/// Does nothing. The caller already runs with interrupts masked, as a trap
/// handler does.
pub struct NoOp;

impl BaseGuard for NoOp {
    type State = ();

    #[inline]
    fn acquire() -> Self::State {}

    #[inline]
    fn release(_state: Self::State) {}
}

/// Masks machine interrupts and restores the previous enable bit on release.
pub struct IrqSave;

impl BaseGuard for IrqSave {
    type State = usize;

    #[inline]
    fn acquire() -> Self::State {
        arch::save_disable()
    }

    #[inline]
    fn release(state: Self::State) {
        arch::restore(state)
    }
}
