//! Aggregated report handling
//!
//! After a run the engine writes a consolidated JSON summary into a
//! report directory. When present it is the authoritative source for
//! suite-level outcomes, independent of the process exit code.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::events::{EventBus, SuiteResult, TestStatus, UNKNOWN_SUITE};

/// Fixed name of the engine's aggregated report artifact
pub const REPORT_FILENAME: &str = "aggregated-report.json";

/// Raw on-disk shape, decoded tolerantly
#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default)]
    suites: Vec<RawSuiteEntry>,
    #[serde(default)]
    failed_tests: u64,
}

#[derive(Debug, Deserialize)]
struct RawSuiteEntry {
    suite_name: Option<String>,
    suite_id: Option<String>,
    file_path: Option<PathBuf>,
    status: Option<String>,
    #[serde(default)]
    steps_failed: u64,
}

/// One suite's outcome as reported by the engine
#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub suite: String,
    pub file_path: Option<PathBuf>,
    pub failed: bool,
}

/// Parsed aggregated report
#[derive(Debug, Clone)]
pub struct AggregatedReport {
    pub suites: Vec<SuiteOutcome>,
    pub failed_tests: u64,
}

impl AggregatedReport {
    /// Whether the report signals any failure at all
    pub fn has_failures(&self) -> bool {
        self.failed_tests > 0 || self.suites.iter().any(|s| s.failed)
    }
}

fn status_indicates_failure(status: Option<&str>) -> bool {
    matches!(
        status.map(str::to_lowercase).as_deref(),
        Some("failed") | Some("failure") | Some("error")
    )
}

/// Loads and publishes the engine's post-run report
pub struct ReportAggregator {
    /// Suite label for the synthesized result when the report lists no suites
    pub fallback_suite: Option<String>,
}

impl ReportAggregator {
    /// Locate and parse the aggregated report
    ///
    /// Candidate directories, in order: the explicit report directory,
    /// `<working dir>/results`, `<cwd>/results`. The first candidate
    /// whose report file parses wins. Finding nothing is not an error.
    pub fn load(
        &self,
        report_dir: Option<&Path>,
        working_dir: &Path,
    ) -> Option<AggregatedReport> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dir) = report_dir {
            candidates.push(dir.to_path_buf());
        }
        candidates.push(working_dir.join("results"));
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("results"));
        }

        for dir in candidates {
            let path = dir.join(REPORT_FILENAME);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<RawReport>(&content) {
                Ok(raw) => {
                    tracing::debug!(path = %path.display(), "loaded aggregated report");
                    return Some(self.convert(raw));
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "unparseable report, trying next candidate");
                }
            }
        }
        None
    }

    fn convert(&self, raw: RawReport) -> AggregatedReport {
        let suites = raw
            .suites
            .into_iter()
            .map(|entry| SuiteOutcome {
                suite: entry
                    .suite_name
                    .or(entry.suite_id)
                    .unwrap_or_else(|| UNKNOWN_SUITE.to_string()),
                file_path: entry.file_path,
                failed: status_indicates_failure(entry.status.as_deref())
                    || entry.steps_failed > 0,
            })
            .collect();
        AggregatedReport {
            suites,
            failed_tests: raw.failed_tests,
        }
    }

    /// Publish a [`SuiteResult`] per reported suite
    ///
    /// A report with no suite entries but a known fallback label still
    /// yields one synthesized result from the failed-test counter.
    pub fn dispatch(&self, report: &AggregatedReport, bus: &EventBus) {
        if report.suites.is_empty() {
            if let Some(label) = &self.fallback_suite {
                bus.publish_suite(SuiteResult {
                    suite: label.clone(),
                    file_path: None,
                    status: if report.failed_tests > 0 {
                        TestStatus::Failed
                    } else {
                        TestStatus::Passed
                    },
                });
            }
            return;
        }

        for outcome in &report.suites {
            bus.publish_suite(SuiteResult {
                suite: outcome.suite.clone(),
                file_path: outcome.file_path.clone(),
                status: if outcome.failed {
                    TestStatus::Failed
                } else {
                    TestStatus::Passed
                },
            });
        }
    }
}
