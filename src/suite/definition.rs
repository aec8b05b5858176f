//! Suite file data structures

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::common::{Error, Result};

/// A complete suite loaded from a YAML file
///
/// Immutable snapshot; the orchestrator only reads it.
#[derive(Debug, Clone)]
pub struct SuiteDefinition {
    /// Suite identifier (explicit `name` or the file stem)
    pub name: String,
    /// Path the suite was loaded from
    pub path: PathBuf,
    /// Ordered steps
    pub steps: Vec<StepDefinition>,
}

/// Raw YAML shape of a suite file
#[derive(Debug, Deserialize)]
struct RawSuite {
    name: Option<String>,
    #[serde(default)]
    steps: Vec<StepDefinition>,
}

/// A single step within a suite
#[derive(Debug, Clone, Deserialize)]
pub struct StepDefinition {
    /// Display name of the step
    pub name: String,
    /// Stable identifier used for step targeting (`--step`)
    #[serde(default)]
    pub id: Option<String>,
    /// HTTP request descriptor, executed by the engine
    #[serde(default)]
    pub request: Option<RequestSpec>,
    /// Reference to another suite/step
    #[serde(default)]
    pub call: Option<CallRef>,
    /// Raw input declarations, normalized before a run
    #[serde(default)]
    pub inputs: Vec<RawInputDecl>,
}

impl StepDefinition {
    /// Whether this step matches a step filter (stable id or name)
    pub fn matches(&self, filter: &str) -> bool {
        self.id.as_deref() == Some(filter) || self.name == filter
    }
}

/// Passive HTTP request descriptor
///
/// Carried for the engine; request execution is the engine's business.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Reference to a step in another suite
#[derive(Debug, Clone, Deserialize)]
pub struct CallRef {
    /// Suite file the referenced step lives in
    pub suite: PathBuf,
    /// Step within the referenced suite (whole suite when absent)
    #[serde(default)]
    pub step: Option<String>,
}

/// An input declaration as written in the suite file
///
/// Everything is optional; the normalizer degrades each field to a
/// usable default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInputDecl {
    /// Variable name the value is stored under
    #[serde(default)]
    pub name: Option<String>,
    /// Display label
    #[serde(default)]
    pub label: Option<String>,
    /// Prompt text shown when asking interactively
    #[serde(default)]
    pub prompt: Option<String>,
    /// Input type: text, number, select, confirm or password
    #[serde(rename = "type", default)]
    pub input_type: Option<String>,
    /// Whether a value must be supplied (default: true)
    #[serde(default)]
    pub required: Option<bool>,
    /// Whether the value is hidden while typing
    #[serde(default)]
    pub masked: Option<bool>,
    /// Default value used when no answer is given
    #[serde(default)]
    pub default: Option<Value>,
    /// Options for select-type inputs
    #[serde(default)]
    pub options: Vec<RawOption>,
}

/// A select option: either a bare string or a label/value pair
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOption {
    Bare(String),
    Labeled {
        label: String,
        #[serde(default)]
        value: Option<String>,
    },
}

/// Load one suite file
pub fn load_suite(path: &Path) -> Result<SuiteDefinition> {
    let content =
        std::fs::read_to_string(path).map_err(|e| Error::suite_read(path, e))?;

    let raw: RawSuite =
        serde_yaml::from_str(&content).map_err(|e| Error::SuiteParse(e.to_string()))?;

    let name = raw.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "suite".to_string())
    });

    Ok(SuiteDefinition {
        name,
        path: path.to_path_buf(),
        steps: raw.steps,
    })
}
