//! Sink for failures that must not fail the operation that hit them.
//!
//! Call sites that "log and continue" report here instead of returning the
//! error: registry `touch` write-through after a committed file update, and
//! per-entry extraction failures during install.

use std::error::Error;
use std::sync::{Mutex, PoisonError};

pub trait ErrorSink: Send + Sync {
    fn report(&self, context: &str, error: &(dyn Error + 'static));
}

/// Default sink: one structured `warn` event per report.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, context: &str, error: &(dyn Error + 'static)) {
        tracing::warn!(context, error = %error, "non-fatal failure");
    }
}

/// Keeps every report in memory as `"<context>: <error>"`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, context: &str, error: &(dyn Error + 'static)) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{context}: {error}"));
    }
}
