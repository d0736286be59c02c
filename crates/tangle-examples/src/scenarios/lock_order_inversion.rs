use std::sync::Arc;
use std::thread;

use tangle::{Lock, LockMode};

fn run_lock_order_worker(
    thread_name: &'static str,
    first: Arc<Lock>,
    second: Arc<Lock>,
) -> Result<(), String> {
    thread::Builder::new()
        .name(thread_name.to_owned())
        .spawn(move || {
            let _first_guard = first.lock();
            println!("{thread_name} locked {}", first.name());

            println!("{thread_name} attempting {}", second.name());
            let _second_guard = second.lock();
            println!("{thread_name} holds {} then {}", first.name(), second.name());
        })
        .map_err(|e| format!("failed to spawn {thread_name}: {e}"))?
        .join()
        .map_err(|_| format!("{thread_name} panicked"))
}

/// Takes two locks in opposite orders on two threads. The threads run one
/// after the other, so nothing actually deadlocks, but the tracker still sees
/// the inversion.
pub fn run() -> Result<(), String> {
    let left = Arc::new(Lock::new("demo.shared.left", LockMode::ExclusiveOnce));
    let right = Arc::new(Lock::new("demo.shared.right", LockMode::ExclusiveOnce));

    run_lock_order_worker("worker.alpha", Arc::clone(&left), Arc::clone(&right))?;
    run_lock_order_worker("worker.beta", Arc::clone(&right), Arc::clone(&left))?;

    super::print_report_count();
    Ok(())
}
