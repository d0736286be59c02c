use std::fmt;
use std::marker::PhantomData;

use tangle_types::LockObserver;

use crate::{DefaultObserver, Lock};

/// Holds a [`Lock`] for exactly as long as the guard lives.
///
/// Dropping the guard releases the hold, whether the scope ends normally,
/// through an early return or `?`, or by unwinding. There is no other way to
/// release it. The guard cannot cross threads, since the hold belongs to the
/// thread that took it.
#[must_use = "if unused the lock is released immediately"]
pub struct LockGuard<'a, O: LockObserver = DefaultObserver> {
    lock: &'a Lock<O>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, O: LockObserver> LockGuard<'a, O> {
    /// Blocks until `lock` is held.
    pub fn new(lock: &'a Lock<O>) -> Self {
        lock.acquire();
        Self::adopt(lock)
    }

    /// Wraps a hold the caller already took.
    pub(crate) fn adopt(lock: &'a Lock<O>) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl<O: LockObserver> Drop for LockGuard<'_, O> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl<O: LockObserver> fmt::Debug for LockGuard<'_, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &self.lock.lock_ref())
            .finish()
    }
}
