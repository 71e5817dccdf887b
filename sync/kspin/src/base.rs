// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::{
    cell::UnsafeCell,
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};
#[cfg(feature = "smp")]
use core::sync::atomic::{AtomicBool, Ordering};

use crate::guard::BaseGuard;

/// A spin lock whose critical section is wrapped in the guard `G`.
///
/// Without the `smp` feature there is no lock word: exclusion comes only from
/// `G` and from running on a single hart.
pub struct BaseSpinLock<G: BaseGuard, T: ?Sized> {
    _phantom: PhantomData<G>,
    #[cfg(feature = "smp")]
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

/// Releases the lock and then the guard when dropped.
pub struct BaseSpinLockGuard<'a, G: BaseGuard, T: ?Sized + 'a> {
    _phantom: &'a PhantomData<G>,
    state: G::State,
    #[cfg(feature = "smp")]
    lock: &'a AtomicBool,
    data: *mut T,
}

unsafe impl<G: BaseGuard, T: ?Sized + Send> Sync for BaseSpinLock<G, T> {}
unsafe impl<G: BaseGuard, T: ?Sized + Send> Send for BaseSpinLock<G, T> {}

impl<G: BaseGuard, T> BaseSpinLock<G, T> {
    #[inline(always)]
    pub const fn new(data: T) -> Self {
        Self {
            _phantom: PhantomData,
            #[cfg(feature = "smp")]
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline(always)]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<G: BaseGuard, T: ?Sized> BaseSpinLock<G, T> {
    #[inline(always)]
    pub fn lock(&self) -> BaseSpinLockGuard<'_, G, T> {
        let state = G::acquire();
        #[cfg(feature = "smp")]
        {
            while self
                .lock
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                while self.is_locked() {
                    core::hint::spin_loop();
                }
            }
        }
        BaseSpinLockGuard {
            _phantom: &self._phantom,
            state,
            #[cfg(feature = "smp")]
            lock: &self.lock,
            data: self.data.get(),
        }
    }

    /// Returns `None` instead of spinning when the lock is held.
    #[inline(always)]
    pub fn try_lock(&self) -> Option<BaseSpinLockGuard<'_, G, T>> {
        let state = G::acquire();
        cfg_if::cfg_if! {
            if #[cfg(feature = "smp")] {
                let acquired = self
                    .lock
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok();
            } else {
                let acquired = true;
            }
        }
        if acquired {
            Some(BaseSpinLockGuard {
                _phantom: &self._phantom,
                state,
                #[cfg(feature = "smp")]
                lock: &self.lock,
                data: self.data.get(),
            })
        } else {
            G::release(state);
            None
        }
    }

    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        cfg_if::cfg_if! {
            if #[cfg(feature = "smp")] {
                self.lock.load(Ordering::Relaxed)
            } else {
                false
            }
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<G: BaseGuard, T: Default> Default for BaseSpinLock<G, T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<G: BaseGuard, T: ?Sized + fmt::Debug> fmt::Debug for BaseSpinLock<G, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => write!(f, "SpinLock {{ data: {:?} }}", &*guard),
            None => write!(f, "SpinLock {{ <locked> }}"),
        }
    }
}

impl<G: BaseGuard, T: ?Sized> Deref for BaseSpinLockGuard<'_, G, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive access
        unsafe { &*self.data }
    }
}

impl<G: BaseGuard, T: ?Sized> DerefMut for BaseSpinLockGuard<'_, G, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive access
        unsafe { &mut *self.data }
    }
}

impl<G: BaseGuard, T: ?Sized + fmt::Debug> fmt::Debug for BaseSpinLockGuard<'_, G, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<G: BaseGuard, T: ?Sized> Drop for BaseSpinLockGuard<'_, G, T> {
    #[inline(always)]
    fn drop(&mut self) {
        #[cfg(feature = "smp")]
        self.lock.store(false, Ordering::Release);
        G::release(self.state);
    }
}
