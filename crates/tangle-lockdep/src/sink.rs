use std::sync::Arc;

use parking_lot::Mutex;
use tangle_types::CycleReport;

/// Out-of-band channel for lock-order findings.
///
/// Called after the tracker has dropped its own state lock, so a sink may
/// take tracked locks itself.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: &CycleReport);
}

/// Logs every report with `tracing::warn!`, attaching the JSON form.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, report: &CycleReport) {
        match report.to_json() {
            Ok(json) => tracing::warn!(
                thread = %report.thread,
                held = %report.held,
                acquiring = %report.acquiring,
                report = %json,
                "potential deadlock: {report}"
            ),
            Err(e) => tracing::warn!(
                thread = %report.thread,
                %e,
                "potential deadlock: {report}"
            ),
        }
        if let Some(backtrace) = &report.backtrace {
            tracing::warn!("closing acquisition backtrace:\n{backtrace}");
        }
    }
}

/// Keeps reports in memory until taken.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<CycleReport>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    pub fn take(&self) -> Vec<CycleReport> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl ReportSink for CollectingSink {
    fn report(&self, report: &CycleReport) {
        self.reports.lock().push(report.clone());
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Arc<S> {
    fn report(&self, report: &CycleReport) {
        (**self).report(report)
    }
}
