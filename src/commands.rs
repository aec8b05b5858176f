//! CLI command definitions
//!
//! Defines the clap commands for the suite runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a suite, or a single step of it
    Run {
        /// Path to the suite YAML file
        suite: PathBuf,

        /// Run only the step with this stable id (or name)
        #[arg(long)]
        step: Option<String>,

        /// Answer an input up front as NAME=VALUE (repeatable).
        /// Inputs without an answer are prompted for on the terminal.
        #[arg(long = "input", short = 'i', value_name = "NAME=VALUE")]
        inputs: Vec<String>,
    },

    /// Repeat the most recent run with the same inputs
    Retest,

    /// List the inputs a suite would ask for, without running it
    Inputs {
        /// Path to the suite YAML file
        suite: PathBuf,

        /// Only consider the step with this stable id (or name)
        #[arg(long)]
        step: Option<String>,
    },
}
