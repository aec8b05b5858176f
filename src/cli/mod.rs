//! CLI command handling
//!
//! Dispatches CLI commands to the orchestrator and renders the events
//! it publishes. The terminal is also the interactive-input
//! collaborator: prompts are answered from `--input` pairs first, then
//! by asking the user.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::commands::Commands;
use crate::common::{paths, EngineConfig, Error, Result, StaticConfigProvider};
use crate::events::{EventBus, RunnerEvent, TestStatus, UserInputRequest};
use crate::exec::{Orchestrator, RunOutcome};
use crate::inputs::{normalize_suite_inputs, InputCache, InputPrompter, MemoryInputCache};
use crate::suite::{load_suite, SuiteDefinition};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { suite, step, inputs } => {
            let answers = parse_input_pairs(&inputs)?;
            let suite = load_suite(&suite)?;
            let cache = Arc::new(MemoryInputCache::new());
            execute(suite, step, cache, answers).await
        }

        Commands::Retest => {
            let last = load_last_run()?;
            let suite = load_suite(&last.suite_path)?;

            // Seed the cache so the resolver reproduces the previous
            // submissions without prompting
            let cache = Arc::new(MemoryInputCache::new());
            for input in normalize_suite_inputs(&suite, last.step_filter.as_deref()) {
                if let Some(value) = last.user_inputs.get(&input.variable) {
                    cache.put(&input.step_key, &input.variable, value.clone()).await;
                }
            }

            execute(suite, last.step_filter, cache, BTreeMap::new()).await
        }

        Commands::Inputs { suite, step } => {
            let suite = load_suite(&suite)?;
            print_input_listing(&suite, step.as_deref());
            Ok(())
        }
    }
}

/// Run one suite through the orchestrator and render its events
async fn execute(
    suite: SuiteDefinition,
    step: Option<String>,
    cache: Arc<MemoryInputCache>,
    answers: BTreeMap<String, String>,
) -> Result<()> {
    let config = EngineConfig::load()?;

    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let orchestrator = Orchestrator::new(
        Arc::new(StaticConfigProvider(config)),
        cache,
        Arc::clone(&bus),
    );
    drop(bus);

    println!(
        "\n{} {}",
        "Running suite:".blue().bold(),
        suite.name.white().bold()
    );
    if let Some(step) = &step {
        println!("  {} {}", "step:".cyan(), step);
    }

    let outcome = orchestrator
        .run(&suite, step.as_deref(), &CliPrompter { answers })
        .await;

    if let Some(snapshot) = orchestrator.last_execution() {
        save_last_run(&LastRun {
            suite_path: snapshot.suite.path,
            step_filter: snapshot.step_filter,
            user_inputs: snapshot.user_inputs,
        });
    }

    // Close the bus so the printer drains and exits
    drop(orchestrator);
    let _ = printer.await;

    match outcome? {
        RunOutcome::AlreadyRunning => {
            println!("{}", "A run for this suite is already in flight".yellow());
            Ok(())
        }
        RunOutcome::Finished(verdict) => {
            if verdict.success {
                println!("\n{} {}\n", "✓".green().bold(), "Suite passed".green().bold());
                Ok(())
            } else {
                println!("\n{} {}\n", "✗".red().bold(), "Suite failed".red().bold());
                std::process::exit(1);
            }
        }
    }
}

/// Prompter answering from `--input` pairs, then the terminal
struct CliPrompter {
    answers: BTreeMap<String, String>,
}

#[async_trait]
impl InputPrompter for CliPrompter {
    async fn prompt(&self, request: &UserInputRequest) -> Option<String> {
        if let Some(value) = self.answers.get(&request.input_name) {
            return Some(value.clone());
        }
        if !std::io::stdin().is_terminal() {
            return None;
        }

        for (i, option) in request.options.iter().enumerate() {
            println!("    {}. {}", i + 1, option);
        }
        let hint = match &request.default_value {
            Some(default) => format!(" [{default}]"),
            None => String::new(),
        };
        print!("  {} {}{}: ", "?".cyan(), request.prompt, hint);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return None;
        }
        let answer = line.trim_end_matches(['\n', '\r']).to_string();
        if answer.is_empty() {
            None
        } else {
            Some(answer)
        }
    }
}

fn print_event(event: &RunnerEvent) {
    match event {
        RunnerEvent::Step(result) => {
            let duration = result
                .duration_ms
                .map(|ms| format!(" ({ms} ms)"))
                .unwrap_or_default();
            match result.status {
                TestStatus::Passed => {
                    println!(
                        "  {} {}{}",
                        "✓".green(),
                        result.step,
                        duration.dimmed()
                    );
                }
                TestStatus::Failed => {
                    let detail = result
                        .error
                        .as_deref()
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default();
                    println!("  {} {}{}", "✗".red(), result.step, detail.red());
                }
                TestStatus::Running | TestStatus::Pending => {
                    println!("  {} {}", "…".dimmed(), result.step.dimmed());
                }
            }
        }
        RunnerEvent::Suite(result) => {
            let glyph = match result.status {
                TestStatus::Failed => "✗".red().bold(),
                _ => "✓".green().bold(),
            };
            println!("{} suite {} {}", glyph, result.suite.bold(), result.status);
        }
        RunnerEvent::Input(request) => {
            println!(
                "  {} {}",
                "›".cyan(),
                format!("input {}", request.input_name).dimmed()
            );
        }
    }
}

fn print_input_listing(suite: &SuiteDefinition, step: Option<&str>) {
    let inputs = normalize_suite_inputs(suite, step);
    if inputs.is_empty() {
        println!("Suite '{}' declares no inputs", suite.name);
        return;
    }

    println!("Inputs for suite '{}':", suite.name);
    for input in inputs {
        let mut attrs = vec![input.input_type.as_str().to_string()];
        if input.required {
            attrs.push("required".to_string());
        }
        if input.masked {
            attrs.push("masked".to_string());
        }
        if let Some(default) = &input.default {
            attrs.push(format!("default: {default}"));
        }
        println!(
            "  {} ({}) {}",
            input.variable.bold(),
            attrs.join(", "),
            format!("(step {})", input.step_name).dimmed()
        );
        for option in &input.options {
            println!("    {}. {}", option.index + 1, option.label);
        }
    }
}

/// Parse repeated NAME=VALUE pairs
fn parse_input_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut answers = BTreeMap::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(Error::Config(format!(
                "invalid --input '{pair}', expected NAME=VALUE"
            )));
        };
        answers.insert(name.to_string(), value.to_string());
    }
    Ok(answers)
}

/// On-disk memory of the most recent run, read by `retest`
#[derive(Debug, Serialize, Deserialize)]
struct LastRun {
    suite_path: PathBuf,
    step_filter: Option<String>,
    user_inputs: BTreeMap<String, String>,
}

fn last_run_path() -> Option<PathBuf> {
    paths::data_dir().map(|dir| dir.join("last-run.json"))
}

fn save_last_run(last: &LastRun) {
    let Some(path) = last_run_path() else {
        return;
    };
    let write = || -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(last)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)
    };
    if let Err(e) = write() {
        tracing::debug!(path = %path.display(), error = %e, "could not persist last run");
    }
}

fn load_last_run() -> Result<LastRun> {
    let path = last_run_path().ok_or(Error::NothingToRetest)?;
    let content = std::fs::read_to_string(&path).map_err(|_| Error::NothingToRetest)?;
    serde_json::from_str(&content).map_err(|_| Error::NothingToRetest)
}
