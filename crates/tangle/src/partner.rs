//! Privileged access for a paired signaling primitive.
//!
//! A condition variable has to give up a lock atomically with going to
//! sleep and take it back on wakeup, including every nested level a
//! recursive holder had. That needs the lock's internals, which ordinary
//! callers must not reach. A type gets them by implementing the unsafe
//! [`SignalingPartner`] marker and presenting itself to
//! [`Lock::partner_access`].

use std::fmt;
use std::marker::PhantomData;

use tangle_types::{LockId, LockObserver};

use crate::{DefaultObserver, Lock, RawLock};

/// Marker for types allowed to manipulate a [`Lock`]'s hold directly.
///
/// # Safety
///
/// Implementors must pair every [`PartnerAccess::release_all`] with exactly
/// one [`PartnerAccess::reacquire`] on the same thread, and must only use
/// [`PartnerAccess::raw`] in ways that leave the primitive's lock state as
/// they found it. Breaking either rule breaks mutual exclusion for every
/// user of the lock.
pub unsafe trait SignalingPartner {}

impl<O: LockObserver> Lock<O> {
    pub fn partner_access<P: SignalingPartner + ?Sized>(
        &self,
        _partner: &P,
    ) -> PartnerAccess<'_, O> {
        PartnerAccess { lock: self }
    }
}

pub struct PartnerAccess<'a, O: LockObserver = DefaultObserver> {
    lock: &'a Lock<O>,
}

impl<O: LockObserver> PartnerAccess<'_, O> {
    /// The native primitive.
    pub fn raw(&self) -> &RawLock {
        self.lock.raw()
    }

    pub fn held_count(&self) -> usize {
        self.lock.held_count()
    }

    /// Releases every level the calling thread holds, telling the observer
    /// about each one.
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the lock.
    pub fn release_all(&self) -> SavedHold {
        assert!(
            self.lock.is_held_by_current_thread(),
            "lock {} handed to a signaling partner by a thread that does not hold it",
            self.lock.lock_ref()
        );
        let levels = self.lock.held_count();
        for _ in 0..levels {
            self.lock.release();
        }
        SavedHold {
            lock: self.lock.id(),
            levels,
            _not_send: PhantomData,
        }
    }

    /// Blocks until the hold given up by [`release_all`](Self::release_all)
    /// is restored, level for level.
    ///
    /// # Panics
    ///
    /// If `saved` came from a different lock.
    pub fn reacquire(&self, saved: SavedHold) {
        assert_eq!(
            saved.lock,
            self.lock.id(),
            "saved hold restored onto lock {}, which is not the lock it came from",
            self.lock.lock_ref()
        );
        for _ in 0..saved.levels {
            self.lock.acquire();
        }
    }
}

/// A hold given up by [`PartnerAccess::release_all`], to be restored on the
/// same thread.
#[must_use = "a released hold must be restored with `PartnerAccess::reacquire`"]
pub struct SavedHold {
    lock: LockId,
    levels: usize,
    _not_send: PhantomData<*const ()>,
}

impl SavedHold {
    pub fn levels(&self) -> usize {
        self.levels
    }
}

impl fmt::Debug for SavedHold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedHold")
            .field("lock", &self.lock)
            .field("levels", &self.levels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tangle_types::{LockMode, NoopObserver};

    /// Minimal wait/notify pair: enough to show a partner can drop and
    /// restore a recursive hold around a wait.
    #[derive(Default)]
    struct Flag {
        raised: AtomicBool,
    }

    unsafe impl SignalingPartner for Flag {}

    impl Flag {
        fn wait<O: LockObserver>(&self, lock: &Lock<O>) {
            let access = lock.partner_access(self);
            let saved = access.release_all();
            while !self.raised.load(Ordering::Acquire) {
                thread::yield_now();
            }
            access.reacquire(saved);
        }

        fn raise(&self) {
            self.raised.store(true, Ordering::Release);
        }
    }

    #[test]
    fn wait_gives_up_and_restores_a_nested_hold() {
        let lock = Arc::new(Lock::with_observer(
            "partner.state",
            LockMode::Recursive,
            NoopObserver,
        ));
        let flag = Arc::new(Flag::default());

        lock.acquire();
        lock.acquire();

        let notifier = {
            let lock = Arc::clone(&lock);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                let _guard = lock.lock();
                flag.raise();
            })
        };

        flag.wait(&lock);
        assert_eq!(lock.held_count(), 2);
        assert!(lock.is_held_by_current_thread());
        notifier.join().expect("notifier thread");

        lock.release();
        lock.release();
        assert!(!lock.is_held());
    }

    #[test]
    fn release_all_reports_levels_and_frees_the_lock() {
        let lock = Lock::with_observer("partner.levels", LockMode::Recursive, NoopObserver);
        let flag = Flag::default();
        lock.acquire();
        lock.acquire();
        lock.acquire();

        let access = lock.partner_access(&flag);
        assert_eq!(access.held_count(), 3);
        let saved = access.release_all();
        assert_eq!(saved.levels(), 3);
        assert!(!lock.is_held());
        assert!(!access.raw().is_locked());

        access.reacquire(saved);
        assert_eq!(lock.held_count(), 3);
        for _ in 0..3 {
            lock.release();
        }
    }

    #[test]
    #[should_panic(expected = "does not hold it")]
    fn release_all_requires_a_hold() {
        let lock = Lock::with_observer("partner.unheld", LockMode::ExclusiveOnce, NoopObserver);
        let flag = Flag::default();
        let _ = lock.partner_access(&flag).release_all();
    }

    #[test]
    #[should_panic(expected = "not the lock it came from")]
    fn saved_hold_is_bound_to_its_lock() {
        let first = Lock::with_observer("partner.first", LockMode::ExclusiveOnce, NoopObserver);
        let second = Lock::with_observer("partner.second", LockMode::ExclusiveOnce, NoopObserver);
        let flag = Flag::default();
        first.acquire();
        let saved = first.partner_access(&flag).release_all();
        second.partner_access(&flag).reacquire(saved);
    }
}
