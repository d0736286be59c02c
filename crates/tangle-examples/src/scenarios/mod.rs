pub mod contention;
pub mod lock_order_inversion;
pub mod recursive_reentry;

use tangle::tangle_lockdep::Lockdep;

pub(crate) fn print_report_count() {
    let emitted = Lockdep::global().reports_emitted();
    println!("lockdep emitted {emitted} report(s)");
}
