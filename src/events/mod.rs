//! Result events and the publish/subscribe channel they travel on
//!
//! The orchestrator never renders anything itself; it publishes
//! [`RunnerEvent`]s and lets subscribers (the CLI, a UI, a test) decide
//! what to do with them. Publication never blocks.

mod live;
mod stdout;
mod wire;

pub use live::{FileEventSource, LiveEventReader};
pub use stdout::StdoutFallbackParser;
pub use wire::EventSource;

use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Status of a step or suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Failed,
    Running,
    Pending,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Running => write!(f, "running"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Suite label, never blank (see the fallback chain in the readers)
    pub suite: String,
    /// Step name
    pub step: String,
    pub status: TestStatus,
    /// Human-readable failure detail
    pub error: Option<String>,
    /// Step duration in milliseconds when the engine reported one
    pub duration_ms: Option<u64>,
}

/// Outcome of a whole suite
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub suite: String,
    pub file_path: Option<PathBuf>,
    pub status: TestStatus,
}

/// Request for one interactive input, emitted while resolving
#[derive(Debug, Clone)]
pub struct UserInputRequest {
    pub step_name: String,
    pub input_name: String,
    pub prompt: String,
    pub required: bool,
    pub masked: bool,
    pub input_type: String,
    pub options: Vec<String>,
    pub default_value: Option<String>,
}

/// Everything the orchestrator publishes
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Step(TestResult),
    Suite(SuiteResult),
    Input(UserInputRequest),
}

/// In-order, non-blocking fan-out channel for [`RunnerEvent`]s
///
/// Subscribers get an unbounded receiver; sends never block the
/// publisher. Closed receivers are pruned lazily on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RunnerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunnerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live listener, in publication order
    pub fn publish(&self, event: RunnerEvent) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn publish_step(&self, result: TestResult) {
        tracing::debug!(suite = %result.suite, step = %result.step, status = %result.status, "step result");
        self.publish(RunnerEvent::Step(result));
    }

    pub fn publish_suite(&self, result: SuiteResult) {
        tracing::debug!(suite = %result.suite, status = %result.status, "suite result");
        self.publish(RunnerEvent::Suite(result));
    }

    pub fn publish_input(&self, request: UserInputRequest) {
        self.publish(RunnerEvent::Input(request));
    }
}

/// What a reader pass dispatched
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchSummary {
    /// At least one result was published
    pub dispatched: bool,
    /// At least one published result was a failure
    pub saw_failure: bool,
}

/// Label used when no suite name can be resolved at all
pub const UNKNOWN_SUITE: &str = "unknown-suite";
