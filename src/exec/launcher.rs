//! Engine process lifecycle and status reconciliation
//!
//! One execution = one engine process. Inputs are fully resolved before
//! the process exists, all stdin submissions are written up front, and
//! after exit the live events file, the stdout fallback and the
//! aggregated report are reconciled, in that fixed order, into the
//! final verdict. Exit codes are advisory: a non-zero exit with no
//! corroborating failure signal is a success.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::common::{ConfigProvider, EngineConfig, Error, Result};
use crate::events::{
    DispatchSummary, EventBus, FileEventSource, LiveEventReader, StdoutFallbackParser,
    SuiteResult, TestResult, TestStatus,
};
use crate::inputs::{normalize_suite_inputs, InputCache, InputPrompter, InputResolver};
use crate::report::ReportAggregator;
use crate::suite::SuiteDefinition;

use super::state::{ExecutionSnapshot, ExecutionStateCache};

/// Outcome of a run request
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// An execution for this key was already in flight; nothing was
    /// started and nothing failed
    AlreadyRunning,
    /// The engine ran to completion (or was killed) and was reconciled
    Finished(RunVerdict),
}

impl RunOutcome {
    /// Whether the request counts as successful
    pub fn success(&self) -> bool {
        match self {
            Self::AlreadyRunning => true,
            Self::Finished(verdict) => verdict.success,
        }
    }
}

/// Reconciled verdict of one engine run
#[derive(Debug, Clone)]
pub struct RunVerdict {
    /// No failure was observed from live events, the stdout fallback,
    /// the aggregated report, or the synthesized step result
    pub success: bool,
    /// Raw engine exit code; None when the process was killed
    pub exit_code: Option<i32>,
}

/// The step a run is narrowed to
#[derive(Debug, Clone)]
struct StepTarget {
    name: String,
    id: Option<String>,
}

/// Key under which an in-flight execution is registered
fn execution_key(suite_path: &Path, target: Option<&StepTarget>) -> String {
    let step = target
        .map(|t| t.id.as_deref().unwrap_or(&t.name))
        .unwrap_or("all");
    format!("{}:{}", suite_path.display(), step)
}

/// Resolve a step filter against the suite
fn resolve_target(suite: &SuiteDefinition, filter: Option<&str>) -> Result<Option<StepTarget>> {
    let Some(filter) = filter else {
        return Ok(None);
    };
    suite
        .steps
        .iter()
        .find(|step| step.matches(filter))
        .map(|step| {
            Some(StepTarget {
                name: step.name.clone(),
                id: step.id.clone(),
            })
        })
        .ok_or_else(|| Error::StepNotFound(filter.to_string()))
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    Stopped,
    TimedOut,
}

/// Removes the key from the in-flight map when the run ends, on every path
struct Reservation<'a> {
    running: &'a Mutex<HashMap<String, Option<oneshot::Sender<()>>>>,
    key: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.key);
    }
}

/// The execution orchestrator
///
/// Constructed with its collaborators; holds no ambient global state.
pub struct Orchestrator {
    config: Arc<dyn ConfigProvider>,
    input_cache: Arc<dyn InputCache>,
    bus: Arc<EventBus>,
    running: Mutex<HashMap<String, Option<oneshot::Sender<()>>>>,
    state: ExecutionStateCache,
}

impl Orchestrator {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        input_cache: Arc<dyn InputCache>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            input_cache,
            bus,
            running: Mutex::new(HashMap::new()),
            state: ExecutionStateCache::new(),
        }
    }

    /// The bus run results and input requests are published on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Snapshot of the most recent execution, if any
    pub fn last_execution(&self) -> Option<ExecutionSnapshot> {
        self.state.last()
    }

    /// Execute a suite (or one step of it)
    pub async fn run(
        &self,
        suite: &SuiteDefinition,
        step_filter: Option<&str>,
        prompter: &dyn InputPrompter,
    ) -> Result<RunOutcome> {
        let config = self.config.config();
        self.run_with_config(suite.clone(), step_filter.map(str::to_string), config, prompter)
            .await
    }

    /// Repeat the most recent execution with its recorded configuration
    ///
    /// Submissions are reproduced through the input cache, not by
    /// replaying stdin bytes.
    pub async fn retest(&self, prompter: &dyn InputPrompter) -> Result<RunOutcome> {
        let snapshot = self.state.last().ok_or(Error::NothingToRetest)?;
        tracing::info!(suite = %snapshot.suite.name, "retesting last execution");
        self.run_with_config(snapshot.suite, snapshot.step_filter, snapshot.config, prompter)
            .await
    }

    /// Kill the process associated with this suite/step, if one is running
    ///
    /// No graceful shutdown handshake is attempted.
    pub fn stop(&self, suite: &SuiteDefinition, step_filter: Option<&str>) -> bool {
        let Ok(target) = resolve_target(suite, step_filter) else {
            return false;
        };
        let key = execution_key(&suite.path, target.as_ref());
        let sender = self
            .running
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(Option::take);
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    async fn run_with_config(
        &self,
        suite: SuiteDefinition,
        step_filter: Option<String>,
        config: EngineConfig,
        prompter: &dyn InputPrompter,
    ) -> Result<RunOutcome> {
        let target = resolve_target(&suite, step_filter.as_deref())?;
        let key = execution_key(&suite.path, target.as_ref());

        {
            let mut running = self.running.lock().unwrap();
            if running.contains_key(&key) {
                tracing::warn!(%key, "execution already in flight; ignoring request");
                return Ok(RunOutcome::AlreadyRunning);
            }
            running.insert(key.clone(), None);
        }
        let _reservation = Reservation {
            running: &self.running,
            key: key.clone(),
        };

        // The whole input batch resolves before any subprocess I/O begins
        let inputs = normalize_suite_inputs(&suite, step_filter.as_deref());
        let resolver = InputResolver {
            cache: self.input_cache.as_ref(),
            bus: self.bus.as_ref(),
        };
        let resolved = resolver.resolve(&inputs, prompter).await?;

        self.state.record(ExecutionSnapshot {
            suite: suite.clone(),
            step_filter: step_filter.clone(),
            config: config.clone(),
            user_inputs: resolved.user_inputs.clone(),
            at: SystemTime::now(),
        });

        let label = config
            .fallback_suite
            .clone()
            .unwrap_or_else(|| suite.name.clone());
        let working_dir = config.effective_working_dir();

        let (program, leading_args) = match config.resolve_command() {
            Ok(resolved) => resolved,
            Err(e) => {
                self.publish_spawn_failure(&suite, target.as_ref(), &label, &e.to_string());
                return Err(e);
            }
        };

        // Fresh, empty events file, exclusively owned by this run
        let events_path = create_events_file()?;

        let suite_arg = suite
            .path
            .strip_prefix(&working_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| suite.path.clone());

        let mut command = Command::new(&program);
        command
            .args(&leading_args)
            .arg(&suite_arg)
            .arg("--live-events")
            .arg(&events_path)
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(t) = &target {
            command.arg("--step").arg(t.id.as_deref().unwrap_or(&t.name));
        }
        if config.output.wants_html() {
            command.arg("--html-output");
        }

        tracing::info!(
            engine = %program.display(),
            suite = %suite_arg.display(),
            step = target.as_ref().map(|t| t.name.as_str()).unwrap_or("all"),
            "starting engine"
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = std::fs::remove_file(&events_path);
                let message = format!("'{}': {e}", program.display());
                self.publish_spawn_failure(&suite, target.as_ref(), &label, &message);
                return Err(Error::engine_spawn(message));
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        self.running.lock().unwrap().insert(key.clone(), Some(kill_tx));

        let stdin = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        // All prompts answered up front; the engine reads them as it asks
        if let Some(mut stdin) = stdin {
            for submission in &resolved.submissions {
                if let Err(e) = stdin.write_all(submission.as_bytes()).await {
                    tracing::debug!(error = %e, "engine stopped reading stdin early");
                    break;
                }
                if let Err(e) = stdin.write_all(b"\n").await {
                    tracing::debug!(error = %e, "engine stopped reading stdin early");
                    break;
                }
            }
            let _ = stdin.shutdown().await;
        }

        let stopped = async {
            match kill_rx.await {
                Ok(()) => (),
                // Sender vanished without firing; keep waiting
                Err(_) => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            if config.timeout_secs == 0 {
                std::future::pending::<()>().await
            } else {
                tokio::time::sleep(Duration::from_secs(config.timeout_secs)).await
            }
        };

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = stopped => Waited::Stopped,
            _ = deadline => Waited::TimedOut,
        };

        let exit_code = match waited {
            Waited::Exited(status) => status?.code(),
            Waited::Stopped => {
                tracing::info!(%key, "execution stopped on request");
                let _ = child.start_kill();
                let _ = child.wait().await;
                None
            }
            Waited::TimedOut => {
                tracing::warn!(%key, timeout_secs = config.timeout_secs, "engine timed out; killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
                None
            }
        };

        let stdout_buf = collect_capture(stdout_task).await;
        let stderr_buf = collect_capture(stderr_task).await;

        let verdict = self.reconcile(
            &config,
            target.as_ref(),
            &label,
            &working_dir,
            events_path,
            &stdout_buf,
            &stderr_buf,
            exit_code,
        );

        Ok(RunOutcome::Finished(verdict))
    }

    /// Merge live events, stdout fallback and the aggregated report
    /// into the final verdict, dispatching results along the way
    #[allow(clippy::too_many_arguments)]
    fn reconcile(
        &self,
        config: &EngineConfig,
        target: Option<&StepTarget>,
        label: &str,
        working_dir: &Path,
        events_path: PathBuf,
        stdout_buf: &str,
        stderr_buf: &str,
        exit_code: Option<i32>,
    ) -> RunVerdict {
        let step_filter = target.map(|t| t.name.clone());

        let live = LiveEventReader {
            fallback_suite: Some(label.to_string()),
            step_filter: step_filter.clone(),
        }
        .dispatch(&mut FileEventSource::new(events_path), &self.bus);

        let fallback = if live.dispatched {
            DispatchSummary::default()
        } else {
            StdoutFallbackParser {
                fallback_suite: Some(label.to_string()),
                step_filter,
            }
            .dispatch(stdout_buf, &self.bus)
        };

        let aggregator = ReportAggregator {
            fallback_suite: Some(label.to_string()),
        };
        let report = aggregator.load(config.report_dir.as_deref(), working_dir);
        if let Some(report) = &report {
            aggregator.dispatch(report, &self.bus);
        }
        let report_failed = report.map(|r| r.has_failures()).unwrap_or(false);

        // A targeted step no source covered still gets one result,
        // synthesized from the exit code and captured stderr
        let mut synthesized_failure = false;
        if let Some(target) = target {
            if !live.dispatched && !fallback.dispatched {
                let passed = exit_code == Some(0);
                synthesized_failure = !passed;
                let error = (!passed).then(|| {
                    let stderr = stderr_buf.trim();
                    if stderr.is_empty() {
                        match exit_code {
                            Some(code) => format!("engine exited with code {code}"),
                            None => "engine was terminated".to_string(),
                        }
                    } else {
                        stderr.to_string()
                    }
                });
                self.bus.publish_step(TestResult {
                    suite: label.to_string(),
                    step: target.name.clone(),
                    status: if passed {
                        TestStatus::Passed
                    } else {
                        TestStatus::Failed
                    },
                    error,
                    duration_ms: None,
                });
            }
        }

        let success = !(live.saw_failure
            || fallback.saw_failure
            || report_failed
            || synthesized_failure);

        if !success {
            tracing::info!(?exit_code, "run failed");
        } else if exit_code.map(|c| c != 0).unwrap_or(true) {
            tracing::warn!(
                ?exit_code,
                "engine exited non-zero with no failing steps; treating as success"
            );
        }

        RunVerdict { success, exit_code }
    }

    fn publish_spawn_failure(
        &self,
        suite: &SuiteDefinition,
        target: Option<&StepTarget>,
        label: &str,
        message: &str,
    ) {
        if let Some(target) = target {
            self.bus.publish_step(TestResult {
                suite: label.to_string(),
                step: target.name.clone(),
                status: TestStatus::Failed,
                error: Some(message.to_string()),
                duration_ms: None,
            });
        }
        self.bus.publish_suite(SuiteResult {
            suite: label.to_string(),
            file_path: Some(suite.path.clone()),
            status: TestStatus::Failed,
        });
    }
}

/// Collect a capture task's buffer, bounded in case grandchild
/// processes of a killed engine still hold the pipe open
async fn collect_capture(task: tokio::task::JoinHandle<String>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(Duration::from_secs(2), task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            abort.abort();
            tracing::debug!("output capture still open after exit; dropping it");
            String::new()
        }
    }
}

/// Create the run-scoped events file: fresh, empty, uniquely named
fn create_events_file() -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("suite-run-")
        .suffix(".events.jsonl")
        .tempfile()?;
    let (_, path) = file
        .keep()
        .map_err(|e| Error::Internal(format!("could not keep events file: {e}")))?;
    Ok(path)
}
