use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::lock_api::RawReentrantMutex;
use tangle_types::{LockId, LockMode, LockObserver, LockRef};

use crate::{DefaultObserver, LockGuard, default_observer};

/// The native primitive under every [`Lock`].
///
/// It records its owning thread, which is what lets a lock tell "held by me"
/// apart from "held by someone else" in both modes.
pub type RawLock = RawReentrantMutex<parking_lot::RawMutex, parking_lot::RawThreadId>;

/// A named mutual-exclusion lock.
///
/// Not `Clone`: a lock is shared by reference (or `Arc`), never duplicated.
pub struct Lock<O: LockObserver = DefaultObserver> {
    raw: RawLock,
    // only mutated by the holding thread
    held: AtomicUsize,
    mode: LockMode,
    lock_ref: LockRef,
    observer: O,
}

impl Lock {
    /// Creates a lock reporting to the build's default observer.
    pub fn new(name: &'static str, mode: LockMode) -> Self {
        Self::with_observer(name, mode, default_observer())
    }

    pub fn recursive(name: &'static str) -> Self {
        Self::new(name, LockMode::Recursive)
    }

    pub fn exclusive(name: &'static str) -> Self {
        Self::new(name, LockMode::ExclusiveOnce)
    }
}

impl<O: LockObserver> Lock<O> {
    pub fn with_observer(name: &'static str, mode: LockMode, observer: O) -> Self {
        let id = LockId::next_process_local()
            .unwrap_or_else(|e| panic!("cannot create lock {name}: {e}"));
        Self {
            raw: RawLock::INIT,
            held: AtomicUsize::new(0),
            mode,
            lock_ref: LockRef::new(id, name),
            observer,
        }
    }

    pub fn name(&self) -> &'static str {
        self.lock_ref.name
    }

    pub fn id(&self) -> LockId {
        self.lock_ref.id
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn lock_ref(&self) -> LockRef {
        self.lock_ref
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Takes the lock if no other thread holds it. Never blocks.
    ///
    /// # Panics
    ///
    /// If the lock is exclusive-once and the calling thread already holds it.
    pub fn try_acquire(&self) -> bool {
        self.assert_not_reentered();
        if !self.raw.try_lock() {
            return false;
        }
        self.observer.on_acquired(self.lock_ref);
        self.count_acquisition();
        true
    }

    /// Blocks until the lock is held by the calling thread.
    ///
    /// The observer hears about the attempt before blocking starts.
    ///
    /// # Panics
    ///
    /// If the lock is exclusive-once and the calling thread already holds it.
    pub fn acquire(&self) {
        self.assert_not_reentered();
        self.observer.on_will_acquire(self.lock_ref);
        self.raw.lock();
        self.observer.on_acquired(self.lock_ref);
        self.count_acquisition();
    }

    /// Gives up one level of the calling thread's hold.
    ///
    /// # Panics
    ///
    /// If the lock is not held, or is held by another thread.
    pub fn release(&self) {
        assert!(
            self.held.load(Ordering::Relaxed) > 0,
            "lock {} released while not held",
            self.lock_ref
        );
        assert!(
            self.raw.is_owned_by_current_thread(),
            "lock {} released by a thread that does not hold it",
            self.lock_ref
        );
        self.held.fetch_sub(1, Ordering::Relaxed);
        // SAFETY: the calling thread owns the primitive, checked above.
        unsafe { self.raw.unlock() };
        self.observer.on_released(self.lock_ref);
    }

    /// Diagnostic only. By the time the caller looks at the answer another
    /// thread may have changed it.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed) > 0
    }

    /// Number of levels currently held. Diagnostic only.
    pub fn held_count(&self) -> usize {
        self.held.load(Ordering::Relaxed)
    }

    /// Whether the calling thread is the holder. Unlike [`is_held`](Self::is_held)
    /// the answer cannot change under the caller's feet, which makes it the
    /// right check for "this lock must be held here" assertions.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.raw.is_owned_by_current_thread()
    }

    /// Acquires and returns a guard that releases on drop.
    pub fn lock(&self) -> LockGuard<'_, O> {
        LockGuard::new(self)
    }

    pub fn try_lock(&self) -> Option<LockGuard<'_, O>> {
        if self.try_acquire() {
            Some(LockGuard::adopt(self))
        } else {
            None
        }
    }

    pub(crate) fn raw(&self) -> &RawLock {
        &self.raw
    }

    fn assert_not_reentered(&self) {
        if !self.mode.is_recursive() && self.raw.is_owned_by_current_thread() {
            panic!(
                "lock {} is exclusive-once and already held by this thread",
                self.lock_ref
            );
        }
    }

    fn count_acquisition(&self) {
        let previous = self.held.fetch_add(1, Ordering::Relaxed);
        assert!(
            previous == 0 || self.mode.is_recursive(),
            "lock {} held {} times in exclusive-once mode",
            self.lock_ref,
            previous + 1
        );
    }
}

impl<O: LockObserver> Drop for Lock<O> {
    fn drop(&mut self) {
        let held = *self.held.get_mut();
        if held != 0 {
            if std::thread::panicking() {
                tracing::error!(lock = %self.lock_ref, held, "lock destroyed while held during unwind");
            } else {
                panic!("lock {} destroyed while held ({held} levels)", self.lock_ref);
            }
        }
        self.observer.on_retired(self.lock_ref);
    }
}

impl<O: LockObserver> fmt::Debug for Lock<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.lock_ref.name)
            .field("id", &self.lock_ref.id)
            .field("mode", &self.mode)
            .field("held", &self.held_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tangle_types::NoopObserver;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Hook {
        WillAcquire,
        Acquired,
        Released,
        Retired,
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(Hook, &'static str)>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<(Hook, &'static str)> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl LockObserver for Recorder {
        fn on_will_acquire(&self, lock: LockRef) {
            self.events.lock().push((Hook::WillAcquire, lock.name));
        }

        fn on_acquired(&self, lock: LockRef) {
            self.events.lock().push((Hook::Acquired, lock.name));
        }

        fn on_released(&self, lock: LockRef) {
            self.events.lock().push((Hook::Released, lock.name));
        }

        fn on_retired(&self, lock: LockRef) {
            self.events.lock().push((Hook::Retired, lock.name));
        }
    }

    fn exclusive(name: &'static str) -> Lock<NoopObserver> {
        Lock::with_observer(name, LockMode::ExclusiveOnce, NoopObserver)
    }

    fn recursive(name: &'static str) -> Lock<NoopObserver> {
        Lock::with_observer(name, LockMode::Recursive, NoopObserver)
    }

    #[test]
    fn new_lock_is_free() {
        let lock = exclusive("test.free");
        assert!(!lock.is_held());
        assert_eq!(lock.held_count(), 0);
        assert!(!lock.is_held_by_current_thread());
        assert_eq!(lock.name(), "test.free");
        assert_eq!(lock.mode(), LockMode::ExclusiveOnce);
    }

    #[test]
    fn repeated_acquire_release_returns_to_free() {
        let lock = exclusive("test.cycle");
        for _ in 0..16 {
            lock.acquire();
            assert!(lock.is_held());
            assert_eq!(lock.held_count(), 1);
            assert!(lock.is_held_by_current_thread());
            lock.release();
        }
        assert!(!lock.is_held());
        assert_eq!(lock.held_count(), 0);
    }

    #[test]
    fn recursive_lock_needs_matching_releases() {
        let lock = Arc::new(recursive("test.recursive"));
        const DEPTH: usize = 5;

        for level in 1..=DEPTH {
            lock.acquire();
            assert_eq!(lock.held_count(), level);
        }

        for remaining in (1..=DEPTH).rev() {
            let other = Arc::clone(&lock);
            let stolen = thread::spawn(move || {
                let got = other.try_acquire();
                if got {
                    other.release();
                }
                got
            })
            .join()
            .expect("probe thread");
            assert!(!stolen, "lock must stay held with {remaining} levels left");
            lock.release();
        }

        let other = Arc::clone(&lock);
        let stolen = thread::spawn(move || {
            let got = other.try_acquire();
            if got {
                other.release();
            }
            got
        })
        .join()
        .expect("probe thread");
        assert!(stolen);
        assert!(!lock.is_held());
    }

    #[test]
    fn recursive_try_acquire_nests_for_the_holder() {
        let lock = recursive("test.recursive.try");
        lock.acquire();
        assert!(lock.try_acquire());
        assert_eq!(lock.held_count(), 2);
        lock.release();
        lock.release();
        assert!(!lock.is_held());
    }

    #[test]
    fn try_acquire_fails_while_another_thread_holds() {
        let lock = Arc::new(exclusive("test.contended"));
        let held = Arc::new(Barrier::new(2));
        let probed = Arc::new(Barrier::new(2));

        let holder = {
            let lock = Arc::clone(&lock);
            let held = Arc::clone(&held);
            let probed = Arc::clone(&probed);
            thread::spawn(move || {
                lock.acquire();
                held.wait();
                probed.wait();
                lock.release();
            })
        };

        held.wait();
        assert!(!lock.try_acquire());
        assert_eq!(lock.held_count(), 1);
        probed.wait();
        holder.join().expect("holder thread");

        assert!(lock.try_acquire());
        assert_eq!(lock.held_count(), 1);
        lock.release();
    }

    #[test]
    fn concurrent_holds_never_overlap() {
        let lock = Arc::new(exclusive("test.overlap"));
        let inside = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));
        let start = Arc::new(Barrier::new(4));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                let total = Arc::clone(&total);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    for _ in 0..200 {
                        lock.acquire();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        total.fetch_add(1, Ordering::Relaxed);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.release();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker thread");
        }
        assert_eq!(total.load(Ordering::Relaxed), 800);
        assert!(!lock.is_held());
    }

    #[test]
    fn blocked_acquire_proceeds_after_release() {
        let lock = Arc::new(exclusive("test.blocking"));
        let acquired = Arc::new(AtomicUsize::new(0));
        lock.acquire();

        let waiter = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                lock.acquire();
                acquired.store(1, Ordering::SeqCst);
                lock.release();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(acquired.load(Ordering::SeqCst), 0, "waiter must block");
        lock.release();
        waiter.join().expect("waiter thread");
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_hears_transitions_in_protocol_order() {
        let recorder = Recorder::default();
        {
            let lock = Lock::with_observer("test.hooks", LockMode::Recursive, &recorder);
            lock.acquire();
            assert!(lock.try_acquire());
            lock.release();
            lock.release();
        }
        assert_eq!(
            recorder.take(),
            [
                (Hook::WillAcquire, "test.hooks"),
                (Hook::Acquired, "test.hooks"),
                (Hook::Acquired, "test.hooks"),
                (Hook::Released, "test.hooks"),
                (Hook::Released, "test.hooks"),
                (Hook::Retired, "test.hooks"),
            ]
        );
    }

    #[test]
    fn failed_try_acquire_is_silent() {
        let recorder = Arc::new(Recorder::default());
        let lock = Arc::new(Lock::with_observer(
            "test.hooks.contended",
            LockMode::ExclusiveOnce,
            Arc::clone(&recorder),
        ));
        lock.acquire();
        recorder.take();

        let other = Arc::clone(&lock);
        let got = thread::spawn(move || other.try_acquire())
            .join()
            .expect("probe thread");
        assert!(!got);
        assert!(recorder.take().is_empty());
        lock.release();
    }

    #[test]
    #[should_panic(expected = "released while not held")]
    fn release_without_hold_is_fatal() {
        exclusive("test.unheld").release();
    }

    #[test]
    #[should_panic(expected = "released while not held")]
    fn double_release_is_fatal() {
        let lock = exclusive("test.double");
        lock.acquire();
        lock.release();
        lock.release();
    }

    #[test]
    fn release_from_another_thread_is_fatal() {
        let lock = Arc::new(exclusive("test.foreign"));
        lock.acquire();
        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.release()).join();
        assert!(result.is_err(), "foreign release must panic");
        assert_eq!(lock.held_count(), 1);
        lock.release();
    }

    #[test]
    #[should_panic(expected = "exclusive-once and already held by this thread")]
    fn exclusive_reacquire_is_fatal() {
        let lock = exclusive("test.reentry");
        lock.acquire();
        lock.acquire();
    }

    #[test]
    #[should_panic(expected = "exclusive-once and already held by this thread")]
    fn exclusive_try_reacquire_is_fatal() {
        let lock = exclusive("test.reentry.try");
        lock.acquire();
        lock.try_acquire();
    }

    #[test]
    fn refused_reentry_leaves_a_single_hold() {
        let lock = exclusive("test.reentry.caught");
        lock.acquire();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| lock.acquire()));
        assert!(result.is_err());
        assert_eq!(lock.held_count(), 1);
        assert!(lock.is_held_by_current_thread());
        lock.release();
        assert!(!lock.is_held());
    }

    #[test]
    #[should_panic(expected = "destroyed while held")]
    fn dropping_a_held_lock_is_fatal() {
        let lock = recursive("test.drop");
        lock.acquire();
        drop(lock);
    }

    #[test]
    fn debug_output_names_the_lock() {
        let lock = exclusive("test.debug");
        let text = format!("{lock:?}");
        assert!(text.contains("test.debug"));
        assert!(text.contains("held: 0"));
    }
}
