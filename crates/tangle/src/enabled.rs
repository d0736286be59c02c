use tangle_lockdep::Lockdep;

/// Observer used by [`Lock::new`](crate::Lock::new) in this build.
pub type DefaultObserver = &'static Lockdep;

#[inline]
pub(crate) fn default_observer() -> DefaultObserver {
    Lockdep::global()
}
