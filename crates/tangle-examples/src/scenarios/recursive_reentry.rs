use std::panic::{self, AssertUnwindSafe};

use tangle::{Lock, LockMode};

fn nested(lock: &Lock, depth: usize) {
    let _guard = lock.lock();
    println!("{} held {} level(s) deep", lock.name(), lock.held_count());
    if depth > 1 {
        nested(lock, depth - 1);
    }
}

pub fn run() -> Result<(), String> {
    let recursive = Lock::new("demo.recursive", LockMode::Recursive);
    nested(&recursive, 3);
    if recursive.is_held() {
        return Err(format!("{} still held after nesting", recursive.name()));
    }

    let exclusive = Lock::new("demo.exclusive", LockMode::ExclusiveOnce);
    let outer = exclusive.lock();
    println!("attempting to re-enter {}", exclusive.name());
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(|info| println!("caught: {info}")));
    let reentry = panic::catch_unwind(AssertUnwindSafe(|| exclusive.acquire()));
    panic::set_hook(previous_hook);
    match reentry {
        Err(_) => println!("re-entry of {} was refused", exclusive.name()),
        Ok(()) => return Err(format!("{} allowed same-thread re-entry", exclusive.name())),
    }
    drop(outer);

    super::print_report_count();
    Ok(())
}
