//! Named mutual-exclusion locks for the lowest layer of a concurrent system.
//!
//! A [`Lock`] wraps one native mutex and adds what the layers above rely on:
//!
//! - a **name**, used only in diagnostics,
//! - a **mode**: [`LockMode::Recursive`] (the default) lets the holding thread
//!   acquire again and counts the levels; [`LockMode::ExclusiveOnce`] treats
//!   re-acquisition by the holder as a bug,
//! - a **held count** checked on every transition,
//! - **observer hooks** ([`LockObserver`]) called before blocking, after
//!   acquiring and after releasing, which is where the lock-order tracker
//!   plugs in.
//!
//! A [`LockGuard`] ties a hold to a scope and releases it on every exit path,
//! panics included.
//!
//! ```rust
//! use tangle::{Lock, LockMode};
//!
//! let journal = Lock::new("osd.journal", LockMode::ExclusiveOnce);
//! {
//!     let _guard = journal.lock();
//!     assert!(journal.is_held());
//! }
//! assert!(!journal.is_held());
//! ```
//!
//! # Usage errors are fatal
//!
//! Releasing a lock that is not held, releasing from a thread that does not
//! hold it, re-acquiring an exclusive-once lock from its holder, and dropping
//! a held lock all panic. None of these is reported as a `Result`: once mutual
//! exclusion is broken nothing downstream can be trusted.
//!
//! # Cargo features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | *(default, none)* | Locks use [`NoopObserver`]; the hooks compile away. |
//! | `diagnostics` | Locks report to the process-wide `tangle_lockdep::Lockdep`, which records acquisition order and reports potential deadlocks. |
//!
//! Without `diagnostics`, setting `TANGLE_LOCKDEP` logs a warning once and
//! changes nothing.
//!
//! Any observer can also be injected per lock with [`Lock::with_observer`],
//! independent of the feature.

mod guard;
mod lock;
mod partner;

pub use guard::LockGuard;
pub use lock::{Lock, RawLock};
pub use partner::{PartnerAccess, SavedHold, SignalingPartner};

pub use tangle_types::{LockId, LockMode, LockObserver, LockRef, NoopObserver};

#[cfg(feature = "diagnostics")]
pub use tangle_lockdep;

#[cfg(not(feature = "diagnostics"))]
mod disabled;
#[cfg(feature = "diagnostics")]
mod enabled;

#[cfg(not(feature = "diagnostics"))]
pub use disabled::DefaultObserver;
#[cfg(feature = "diagnostics")]
pub use enabled::DefaultObserver;

#[cfg(not(feature = "diagnostics"))]
pub(crate) use disabled::default_observer;
#[cfg(feature = "diagnostics")]
pub(crate) use enabled::default_observer;
