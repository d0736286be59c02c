use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use tangle::{Lock, LockMode};

struct Shared {
    lock: Lock,
    inside: AtomicU64,
    total: AtomicU64,
}

/// Hammers one exclusive lock from several threads and checks that no two of
/// them were ever inside at once.
pub fn run(threads: u32, iterations: u32) -> Result<(), String> {
    let shared = Arc::new(Shared {
        lock: Lock::new("demo.contended", LockMode::ExclusiveOnce),
        inside: AtomicU64::new(0),
        total: AtomicU64::new(0),
    });
    let start = Arc::new(Barrier::new(threads as usize));
    let began = Instant::now();

    let workers = (0..threads)
        .map(|index| {
            let shared = Arc::clone(&shared);
            let start = Arc::clone(&start);
            thread::Builder::new()
                .name(format!("contention.worker.{index}"))
                .spawn(move || {
                    start.wait();
                    let mut overlaps = 0u64;
                    for _ in 0..iterations {
                        let _guard = shared.lock.lock();
                        if shared.inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps += 1;
                        }
                        shared.total.fetch_add(1, Ordering::Relaxed);
                        shared.inside.fetch_sub(1, Ordering::SeqCst);
                    }
                    overlaps
                })
                .map_err(|e| format!("failed to spawn worker {index}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut overlaps = 0;
    for worker in workers {
        overlaps += worker.join().map_err(|_| "worker panicked".to_owned())?;
    }

    let total = shared.total.load(Ordering::Relaxed);
    println!(
        "{threads} thread(s) completed {total} critical sections in {:?}",
        began.elapsed()
    );
    if overlaps != 0 {
        return Err(format!("{overlaps} overlapping critical section(s) observed"));
    }
    super::print_report_count();
    Ok(())
}
