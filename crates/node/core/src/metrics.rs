//! Control plane metrics

use metrics::Counter;

use crate::ErrorKind;

/// Per-operation request and error counters.
#[derive(Clone, Debug)]
pub(crate) struct ControlMetrics;

impl ControlMetrics {
    pub(crate) fn request(&self, op: &'static str) {
        metrics::counter!("control.requests_total", "op" => op).increment(1);
    }

    pub(crate) fn error(&self, op: &'static str, kind: ErrorKind) {
        let kind: &'static str = kind.into();
        metrics::counter!("control.errors_total", "op" => op, "kind" => kind).increment(1);
    }
}

/// Write-back outcome counters.
#[derive(Clone, Debug)]
pub(crate) struct WriteBackMetrics {
    /// Specs written to the store
    pub(crate) completed_total: Counter,
    /// Specs that failed to persist
    pub(crate) failed_total: Counter,
    /// Snapshots skipped because the node stopped first
    pub(crate) skipped_total: Counter,
}

impl Default for WriteBackMetrics {
    fn default() -> Self {
        Self {
            completed_total: metrics::counter!("writeback.completed_total"),
            failed_total: metrics::counter!("writeback.failed_total"),
            skipped_total: metrics::counter!("writeback.skipped_total"),
        }
    }
}
