//! Configuration file handling

use std::path::PathBuf;

use serde::Deserialize;

use super::paths::config_path;
use super::Result;

/// Output format requested from the engine
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Plain text output only
    #[default]
    Text,
    /// HTML report output
    Html,
    /// Both text and HTML
    Both,
}

impl OutputFormat {
    /// Whether the engine should be asked to write an HTML report
    pub fn wants_html(&self) -> bool {
        matches!(self, Self::Html | Self::Both)
    }
}

/// Resolved engine configuration
///
/// Loaded from the config file, with every field falling back to a
/// usable default when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Engine command line. The first token is the executable (resolved
    /// through PATH when not an explicit path), the rest are leading
    /// arguments.
    #[serde(default = "default_command")]
    pub command: String,

    /// Wall-clock timeout for a single engine run, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Output format requested from the engine
    #[serde(default)]
    pub output: OutputFormat,

    /// Working directory for the engine process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Directory the engine writes its aggregated report into
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Suite label used when the engine does not name one
    #[serde(default)]
    pub fallback_suite: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            timeout_secs: default_timeout(),
            output: OutputFormat::default(),
            working_dir: None,
            report_dir: None,
            fallback_suite: None,
        }
    }
}

fn default_command() -> String {
    "suite-engine".to_string()
}

fn default_timeout() -> u64 {
    300
}

impl EngineConfig {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if the file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return toml::from_str(&content)
                    .map_err(|e| super::Error::ConfigParse(e.to_string()));
            }
        }
        Ok(Self::default())
    }

    /// Split the configured command into executable and leading arguments
    ///
    /// A bare command name is resolved through PATH
    pub fn resolve_command(&self) -> Result<(PathBuf, Vec<String>)> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            super::Error::Config("engine command is empty".to_string())
        })?;
        let args: Vec<String> = parts.map(str::to_string).collect();

        let program_path = PathBuf::from(program);
        if program_path.components().count() > 1 || program_path.is_absolute() {
            return Ok((program_path, args));
        }

        let resolved = which::which(program).map_err(|_| super::Error::EngineNotFound {
            command: program.to_string(),
        })?;
        Ok((resolved, args))
    }

    /// Working directory to run the engine in
    pub fn effective_working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Source of the resolved engine configuration
///
/// Injected into the orchestrator instead of reaching for ambient state.
pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> EngineConfig;
}

/// Provider backed by a fixed configuration value
pub struct StaticConfigProvider(pub EngineConfig);

impl ConfigProvider for StaticConfigProvider {
    fn config(&self) -> EngineConfig {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.output, OutputFormat::Text);
        assert!(config.report_dir.is_none());
    }

    #[test]
    fn parses_partial_config() {
        let config: EngineConfig =
            toml::from_str("command = \"engine run\"\noutput = \"html\"").unwrap();
        assert_eq!(config.command, "engine run");
        assert!(config.output.wants_html());
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn resolve_command_splits_leading_args() {
        let config = EngineConfig {
            command: "/usr/bin/env engine".to_string(),
            ..Default::default()
        };
        let (program, args) = config.resolve_command().unwrap();
        assert_eq!(program, PathBuf::from("/usr/bin/env"));
        assert_eq!(args, vec!["engine".to_string()]);
    }
}
