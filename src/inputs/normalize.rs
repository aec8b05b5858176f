//! Input normalization
//!
//! Turns raw suite input declarations into typed, orderable input
//! configs. Pure and infallible: every missing or bogus field degrades
//! to a usable default.

use std::path::Path;

use crate::suite::{RawInputDecl, RawOption, StepDefinition, SuiteDefinition};

/// Input type as declared (or defaulted) in the suite file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Text,
    Number,
    Select,
    Confirm,
    Password,
}

impl InputType {
    fn parse(raw: Option<&str>, masked: bool) -> Self {
        match raw.map(str::trim).map(str::to_lowercase).as_deref() {
            Some("number") => Self::Number,
            Some("select") => Self::Select,
            Some("confirm") => Self::Confirm,
            Some("password") => Self::Password,
            Some("text") => Self::Text,
            // Unknown or absent: masked inputs become passwords
            _ if masked => Self::Password,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::Confirm => "confirm",
            Self::Password => "password",
        }
    }
}

/// One select option with its zero-based declaration index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOption {
    pub label: String,
    pub value: String,
    pub index: usize,
}

/// A fully-defaulted input declaration, created once per execution
#[derive(Debug, Clone)]
pub struct NormalizedInputConfig {
    /// Stable key identifying the declaring step
    pub step_key: String,
    /// Name of the declaring step, for display
    pub step_name: String,
    pub label: String,
    pub variable: String,
    pub prompt: String,
    pub input_type: InputType,
    pub required: bool,
    pub masked: bool,
    pub default: Option<String>,
    pub options: Vec<InputOption>,
}

fn yaml_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize_one(
    step_key: &str,
    step_name: &str,
    index: usize,
    decl: &RawInputDecl,
) -> NormalizedInputConfig {
    let variable = decl
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("input_{index}"));

    let masked_flag = decl.masked.unwrap_or(false);
    let input_type = InputType::parse(decl.input_type.as_deref(), masked_flag);
    let masked = masked_flag || input_type == InputType::Password;

    let label = decl
        .label
        .clone()
        .unwrap_or_else(|| variable.clone());
    let prompt = decl.prompt.clone().unwrap_or_else(|| label.clone());

    let options = decl
        .options
        .iter()
        .enumerate()
        .map(|(i, opt)| match opt {
            RawOption::Bare(s) => InputOption {
                label: s.clone(),
                value: s.clone(),
                index: i,
            },
            RawOption::Labeled { label, value } => InputOption {
                label: label.clone(),
                value: value.clone().unwrap_or_else(|| label.clone()),
                index: i,
            },
        })
        .collect();

    NormalizedInputConfig {
        step_key: step_key.to_string(),
        step_name: step_name.to_string(),
        label,
        variable,
        prompt,
        input_type,
        required: decl.required.unwrap_or(true),
        masked,
        default: decl.default.as_ref().and_then(yaml_to_string),
        options,
    }
}

/// Normalize one step's input declarations, in declaration order
pub fn normalize_step_inputs(
    suite_path: &Path,
    step: &StepDefinition,
) -> Vec<NormalizedInputConfig> {
    let step_key = format!(
        "{}:{}",
        suite_path.display(),
        step.id.as_deref().unwrap_or(&step.name)
    );
    step.inputs
        .iter()
        .enumerate()
        .map(|(i, decl)| normalize_one(&step_key, &step.name, i, decl))
        .collect()
}

/// Normalize every relevant input of a suite
///
/// With a step filter, only steps whose id or name matches contribute.
pub fn normalize_suite_inputs(
    suite: &SuiteDefinition,
    step_filter: Option<&str>,
) -> Vec<NormalizedInputConfig> {
    suite
        .steps
        .iter()
        .filter(|step| step_filter.map(|f| step.matches(f)).unwrap_or(true))
        .flat_map(|step| normalize_step_inputs(&suite.path, step))
        .collect()
}
