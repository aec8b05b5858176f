//! Configuration and state file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/suite-runner/`, `~/.local/share/suite-runner/`
//! - macOS: `~/Library/Application Support/suite-runner/`
//! - Windows: `%APPDATA%\suite-runner\`

use std::path::PathBuf;

const APP_NAME: &str = "suite-runner";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the data directory used for run-scoped scratch files
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
}
