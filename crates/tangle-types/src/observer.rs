use std::sync::Arc;

use crate::LockRef;

/// Hooks a lock calls at fixed points of its acquire/release protocol.
///
/// The order relative to the native primitive is the whole contract:
///
/// - [`on_will_acquire`](Self::on_will_acquire) runs before a blocking
///   acquisition starts, so order is recorded even if the caller then blocks
///   forever. Non-blocking attempts do not call it.
/// - [`on_acquired`](Self::on_acquired) runs once the primitive is held.
/// - [`on_released`](Self::on_released) runs just after the primitive is
///   released.
///
/// Hooks must be bounded-time and must not block on a lock that is itself
/// observed by the same observer.
pub trait LockObserver: Send + Sync {
    fn on_will_acquire(&self, lock: LockRef);

    fn on_acquired(&self, lock: LockRef);

    fn on_released(&self, lock: LockRef);

    /// The lock is being destroyed. Its id will never be seen again.
    fn on_retired(&self, _lock: LockRef) {}
}

/// Observer that does nothing. Compiles away entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LockObserver for NoopObserver {
    #[inline(always)]
    fn on_will_acquire(&self, _lock: LockRef) {}

    #[inline(always)]
    fn on_acquired(&self, _lock: LockRef) {}

    #[inline(always)]
    fn on_released(&self, _lock: LockRef) {}
}

impl<O: LockObserver + ?Sized> LockObserver for &O {
    #[inline]
    fn on_will_acquire(&self, lock: LockRef) {
        (**self).on_will_acquire(lock)
    }

    #[inline]
    fn on_acquired(&self, lock: LockRef) {
        (**self).on_acquired(lock)
    }

    #[inline]
    fn on_released(&self, lock: LockRef) {
        (**self).on_released(lock)
    }

    #[inline]
    fn on_retired(&self, lock: LockRef) {
        (**self).on_retired(lock)
    }
}

impl<O: LockObserver + ?Sized> LockObserver for Arc<O> {
    #[inline]
    fn on_will_acquire(&self, lock: LockRef) {
        (**self).on_will_acquire(lock)
    }

    #[inline]
    fn on_acquired(&self, lock: LockRef) {
        (**self).on_acquired(lock)
    }

    #[inline]
    fn on_released(&self, lock: LockRef) {
        (**self).on_released(lock)
    }

    #[inline]
    fn on_retired(&self, lock: LockRef) {
        (**self).on_retired(lock)
    }
}
