//! Execution state cache
//!
//! A single-slot memory of the most recent execution, read by retest.
//! Overwritten on every run attempt that gets as far as spawning;
//! preparation failures leave the previous snapshot intact.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::common::EngineConfig;
use crate::suite::SuiteDefinition;

/// Everything needed to repeat the last run identically
#[derive(Debug, Clone)]
pub struct ExecutionSnapshot {
    pub suite: SuiteDefinition,
    /// Step filter as requested (stable id or name), if any
    pub step_filter: Option<String>,
    pub config: EngineConfig,
    /// Resolved input values by variable name
    pub user_inputs: BTreeMap<String, String>,
    pub at: SystemTime,
}

/// Holder of the single most recent [`ExecutionSnapshot`]
#[derive(Default)]
pub struct ExecutionStateCache {
    slot: Mutex<Option<ExecutionSnapshot>>,
}

impl ExecutionStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with this run's snapshot
    pub fn record(&self, snapshot: ExecutionSnapshot) {
        *self.slot.lock().unwrap() = Some(snapshot);
    }

    /// The most recent snapshot, if any run got far enough to record one
    pub fn last(&self) -> Option<ExecutionSnapshot> {
        self.slot.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn snapshot(suite_name: &str) -> ExecutionSnapshot {
        ExecutionSnapshot {
            suite: SuiteDefinition {
                name: suite_name.to_string(),
                path: PathBuf::from(format!("{suite_name}.yaml")),
                steps: Vec::new(),
            },
            step_filter: None,
            config: EngineConfig::default(),
            user_inputs: BTreeMap::new(),
            at: SystemTime::now(),
        }
    }

    #[test]
    fn starts_empty() {
        assert!(ExecutionStateCache::new().last().is_none());
    }

    #[test]
    fn keeps_only_the_most_recent_snapshot() {
        let cache = ExecutionStateCache::new();
        cache.record(snapshot("first"));
        cache.record(snapshot("second"));
        assert_eq!(cache.last().unwrap().suite.name, "second");
    }
}
