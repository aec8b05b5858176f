//! Stdout fallback parser
//!
//! Best-effort scan of the engine's raw stdout, used only when the live
//! events file produced nothing. Some engine builds don't flush the
//! events file but still print one JSON object per test on stdout.

use super::wire::decode_stdout_test;
use super::{DispatchSummary, EventBus, TestResult, TestStatus, UNKNOWN_SUITE};

/// Scans buffered stdout for `type: "test"` JSON lines
pub struct StdoutFallbackParser {
    /// Suite label used when a record names none
    pub fallback_suite: Option<String>,
    /// When set, records for other step names are skipped
    pub step_filter: Option<String>,
}

impl StdoutFallbackParser {
    /// Publish a [`TestResult`] per parseable test line, in stdout order
    ///
    /// Non-JSON lines are ignored.
    pub fn dispatch(&self, stdout: &str, bus: &EventBus) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for line in stdout.lines() {
            let Some(record) = decode_stdout_test(line) else {
                continue;
            };

            let step = record.name.unwrap_or_else(|| "Unknown".to_string());

            if let Some(filter) = &self.step_filter {
                if &step != filter {
                    continue;
                }
            }

            let suite = record
                .suite
                .or_else(|| self.fallback_suite.clone())
                .or(record.suite_name)
                .unwrap_or_else(|| UNKNOWN_SUITE.to_string());

            let passed = record.status.as_deref() == Some("pass");

            summary.dispatched = true;
            summary.saw_failure |= !passed;

            bus.publish_step(TestResult {
                suite,
                step,
                status: if passed {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                },
                error: None,
                duration_ms: None,
            });
        }

        summary
    }
}
