//! Error types for the suite runner CLI
//!
//! Error messages are designed to be clear and actionable, with hints
//! on how to resolve common issues.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the suite runner CLI
#[derive(Error, Debug)]
pub enum Error {
    // === Suite Errors ===
    #[error("Failed to read suite '{path}': {error}")]
    SuiteRead { path: String, error: String },

    #[error("Failed to parse suite: {0}")]
    SuiteParse(String),

    #[error("Step '{0}' not found in suite")]
    StepNotFound(String),

    // === Input Errors ===
    #[error("Input '{variable}' is required but no value was provided")]
    InputRequired { variable: String },

    // === Engine Errors ===
    #[error("Engine command '{command}' not found. Install it or set 'command' in the config file")]
    EngineNotFound { command: String },

    #[error("Failed to start engine: {0}")]
    EngineSpawn(String),

    // === Retest Errors ===
    #[error("No previous execution to retest. Run a suite first")]
    NothingToRetest,

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a suite read error
    pub fn suite_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::SuiteRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create an input required error
    pub fn input_required(variable: &str) -> Self {
        Self::InputRequired {
            variable: variable.to_string(),
        }
    }

    /// Create an engine spawn error
    pub fn engine_spawn(message: impl std::fmt::Display) -> Self {
        Self::EngineSpawn(message.to_string())
    }
}
