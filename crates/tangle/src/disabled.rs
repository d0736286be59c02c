use std::ffi::OsStr;
use std::sync::Once;

use tangle_types::NoopObserver;

/// Observer used by [`Lock::new`](crate::Lock::new) in this build.
pub type DefaultObserver = NoopObserver;

static LOCKDEP_DISABLED_WARNING_ONCE: Once = Once::new();

#[inline]
pub(crate) fn default_observer() -> DefaultObserver {
    LOCKDEP_DISABLED_WARNING_ONCE.call_once(warn_if_lockdep_requested);
    NoopObserver
}

fn warn_if_lockdep_requested() {
    let value = std::env::var_os("TANGLE_LOCKDEP");
    let value = value.as_deref().map(OsStr::to_string_lossy);
    if !lockdep_requested(value.as_deref()) {
        return;
    }

    tracing::warn!(
        "TANGLE_LOCKDEP is set, but tangle was built without the `diagnostics` feature; \
         lock-order tracking is compiled out of this process"
    );
}

fn lockdep_requested(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    let value = value.trim().to_ascii_lowercase();
    !matches!(value.as_str(), "" | "0" | "off" | "false" | "no")
}
