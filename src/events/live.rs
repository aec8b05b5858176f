//! Live event reader
//!
//! The engine appends line-delimited JSON events to a run-scoped file
//! while it executes. After the process exits the file is read once,
//! `step_completed` events are published in file order, and the file is
//! deleted. The file never outlives a single run.

use std::path::PathBuf;

use super::wire::{decode_step_completed, EventSource};
use super::{DispatchSummary, EventBus, TestResult, TestStatus, UNKNOWN_SUITE};

/// Event source backed by the run's events file
///
/// Draining reads the whole file and deletes it, whether or not any
/// line was usable.
pub struct FileEventSource {
    path: PathBuf,
}

impl FileEventSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl EventSource for FileEventSource {
    fn drain(&mut self) -> Vec<String> {
        let content = std::fs::read_to_string(&self.path).unwrap_or_default();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %self.path.display(), error = %e, "could not delete events file");
            }
        }
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Reads one run's live events and publishes step results
pub struct LiveEventReader {
    /// Suite label used when an event names none
    pub fallback_suite: Option<String>,
    /// When set, events for other step names are skipped
    pub step_filter: Option<String>,
}

impl LiveEventReader {
    /// Drain the source and publish a [`TestResult`] per consumable event
    ///
    /// Events are dispatched in line order. Malformed lines and event
    /// types other than `step_completed` are skipped silently.
    pub fn dispatch(&self, source: &mut dyn EventSource, bus: &EventBus) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for line in source.drain() {
            let Some(payload) = decode_step_completed(&line) else {
                tracing::debug!("skipping unusable live event line");
                continue;
            };

            let Some(step_name) = payload.step_name else {
                continue;
            };

            if let Some(filter) = &self.step_filter {
                if &step_name != filter {
                    continue;
                }
            }

            let suite = payload
                .suite_name
                .or_else(|| self.fallback_suite.clone())
                .or(payload.node_id)
                .unwrap_or_else(|| UNKNOWN_SUITE.to_string());

            let passed = payload.status.as_deref() == Some("success");
            let error = if passed {
                None
            } else {
                payload.failed_assertion.or(payload.error)
            };

            summary.dispatched = true;
            summary.saw_failure |= !passed;

            bus.publish_step(TestResult {
                suite,
                step: step_name,
                status: if passed {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                },
                error,
                duration_ms: payload.duration_ms,
            });
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RunnerEvent;

    fn collect_steps(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<RunnerEvent>,
    ) -> Vec<TestResult> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RunnerEvent::Step(r) = event {
                out.push(r);
            }
        }
        out
    }

    fn write_events(dir: &tempfile::TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    #[test]
    fn dispatches_in_file_order_and_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_events(
            &dir,
            &[
                r#"{"type":"step_completed","payload":{"step_name":"One","suite_name":"s","status":"success","duration_ms":5}}"#,
                r#"{"type":"step_completed","payload":{"step_name":"Two","suite_name":"s","status":"assertion_failed","failed_assertion":"expected 200"}}"#,
            ],
        );

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let reader = LiveEventReader {
            fallback_suite: None,
            step_filter: None,
        };
        let summary = reader.dispatch(&mut FileEventSource::new(path.clone()), &bus);

        assert!(summary.dispatched);
        assert!(summary.saw_failure);
        assert!(!path.exists());

        let steps = collect_steps(&mut rx);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step, "One");
        assert_eq!(steps[0].status, TestStatus::Passed);
        assert_eq!(steps[0].duration_ms, Some(5));
        assert_eq!(steps[1].step, "Two");
        assert_eq!(steps[1].status, TestStatus::Failed);
        assert_eq!(steps[1].error.as_deref(), Some("expected 200"));
    }

    #[test]
    fn missing_file_dispatches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new();
        let reader = LiveEventReader {
            fallback_suite: None,
            step_filter: None,
        };
        let summary = reader.dispatch(
            &mut FileEventSource::new(dir.path().join("absent.jsonl")),
            &bus,
        );
        assert!(!summary.dispatched);
        assert!(!summary.saw_failure);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_events(
            &dir,
            &[
                "{broken",
                r#"{"type":"heartbeat"}"#,
                r#"{"type":"step_completed","payload":{"step_name":"Ok","status":"success"}}"#,
            ],
        );

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let reader = LiveEventReader {
            fallback_suite: Some("fallback".into()),
            step_filter: None,
        };
        let summary = reader.dispatch(&mut FileEventSource::new(path), &bus);

        assert!(summary.dispatched);
        assert!(!summary.saw_failure);
        let steps = collect_steps(&mut rx);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].suite, "fallback");
    }

    #[test]
    fn suite_label_fallback_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_events(
            &dir,
            &[
                r#"{"type":"step_completed","payload":{"step_name":"a","suite_name":"named","status":"success"}}"#,
                r#"{"type":"step_completed","payload":{"step_name":"b","node_id":"node-7","status":"success"}}"#,
                r#"{"type":"step_completed","payload":{"step_name":"c","status":"success"}}"#,
            ],
        );

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let reader = LiveEventReader {
            fallback_suite: None,
            step_filter: None,
        };
        reader.dispatch(&mut FileEventSource::new(path), &bus);

        let steps = collect_steps(&mut rx);
        assert_eq!(steps[0].suite, "named");
        assert_eq!(steps[1].suite, "node-7");
        assert_eq!(steps[2].suite, UNKNOWN_SUITE);
    }

    #[test]
    fn step_filter_skips_other_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_events(
            &dir,
            &[
                r#"{"type":"step_completed","payload":{"step_name":"Login","suite_name":"s","status":"success"}}"#,
                r#"{"type":"step_completed","payload":{"step_name":"Logout","suite_name":"s","status":"error","error":"nope"}}"#,
            ],
        );

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let reader = LiveEventReader {
            fallback_suite: None,
            step_filter: Some("Login".into()),
        };
        let summary = reader.dispatch(&mut FileEventSource::new(path), &bus);

        assert!(summary.dispatched);
        assert!(!summary.saw_failure);
        let steps = collect_steps(&mut rx);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step, "Login");
    }
}
