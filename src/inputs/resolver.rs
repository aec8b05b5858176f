//! Input resolution
//!
//! Walks the normalized inputs in order and produces the literal stdin
//! submissions for the engine plus the values to remember. Each input
//! is announced on the event bus before it is resolved, cached values
//! included, so observers can display what is being asked for.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::common::{Error, Result};
use crate::events::{EventBus, UserInputRequest};

use super::cache::InputCache;
use super::normalize::{InputType, NormalizedInputConfig};

/// Interactive-input collaborator
///
/// Returns the user's answer, or None when the prompt was declined or
/// cancelled.
#[async_trait]
pub trait InputPrompter: Send + Sync {
    async fn prompt(&self, request: &UserInputRequest) -> Option<String>;
}

/// Prompter that declines everything, for headless runs
pub struct NoPrompter;

#[async_trait]
impl InputPrompter for NoPrompter {
    async fn prompt(&self, _request: &UserInputRequest) -> Option<String> {
        None
    }
}

/// Output of a resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedInputs {
    /// Literal strings fed to the engine's stdin, in order
    pub submissions: Vec<String>,
    /// Values remembered per variable, for state caching
    pub user_inputs: BTreeMap<String, String>,
}

/// Resolves normalized inputs against a prompter and the input cache
pub struct InputResolver<'a> {
    pub cache: &'a dyn InputCache,
    pub bus: &'a EventBus,
}

impl<'a> InputResolver<'a> {
    /// Resolve every input, in order, aborting on the first hard failure
    ///
    /// Resolution order per input: cached or interactive answer, then
    /// the declared default, then the type fallback. A required input
    /// that reaches the end of the chain fails the whole preparation.
    pub async fn resolve(
        &self,
        inputs: &[NormalizedInputConfig],
        prompter: &dyn InputPrompter,
    ) -> Result<ResolvedInputs> {
        let mut resolved = ResolvedInputs::default();

        for input in inputs {
            let request = UserInputRequest {
                step_name: input.step_name.clone(),
                input_name: input.variable.clone(),
                prompt: input.prompt.clone(),
                required: input.required,
                masked: input.masked,
                input_type: input.input_type.as_str().to_string(),
                options: input.options.iter().map(|o| o.label.clone()).collect(),
                default_value: input.default.clone(),
            };
            self.bus.publish_input(request.clone());

            let answer = match self.cache.get(&input.step_key, &input.variable).await {
                Some(cached) => Some(cached),
                None => prompter.prompt(&request).await,
            };

            let value = match answer.or_else(|| input.default.clone()) {
                Some(v) => v,
                None if input.input_type == InputType::Confirm => "n".to_string(),
                None if !input.required => String::new(),
                None => return Err(Error::input_required(&input.variable)),
            };

            let (submission, stored) = encode(input, value);

            self.cache
                .put(&input.step_key, &input.variable, stored.clone())
                .await;
            resolved
                .user_inputs
                .insert(input.variable.clone(), stored);
            resolved.submissions.push(submission);
        }

        Ok(resolved)
    }
}

/// Compute the (submission, stored) encoding of a resolved value
fn encode(input: &NormalizedInputConfig, value: String) -> (String, String) {
    match input.input_type {
        InputType::Confirm => {
            let yes = matches!(
                value.trim().to_lowercase().chars().next(),
                Some('y') | Some('t') | Some('1')
            );
            (
                if yes { "y" } else { "n" }.to_string(),
                if yes { "true" } else { "false" }.to_string(),
            )
        }
        InputType::Select => (select_submission(input, &value), value),
        _ => (value.clone(), value),
    }
}

/// 1-based option index submitted for a select input
///
/// Matches the chosen value against the option values, then tries the
/// raw value as an in-range index, then falls back to the first option.
fn select_submission(input: &NormalizedInputConfig, value: &str) -> String {
    if let Some(option) = input.options.iter().find(|o| o.value == value) {
        return (option.index + 1).to_string();
    }
    if let Ok(index) = value.trim().parse::<usize>() {
        if index >= 1 && index <= input.options.len() {
            return index.to_string();
        }
    }
    "1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RunnerEvent;
    use crate::inputs::{normalize_step_inputs, MemoryInputCache};
    use crate::suite::StepDefinition;
    use std::path::Path;
    use std::sync::Mutex;

    /// Prompter answering from a scripted queue
    struct ScriptedPrompter {
        answers: Mutex<Vec<Option<String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedPrompter {
        fn new(answers: Vec<Option<&str>>) -> Self {
            Self {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .rev()
                        .map(|a| a.map(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl InputPrompter for ScriptedPrompter {
        async fn prompt(&self, _request: &UserInputRequest) -> Option<String> {
            *self.calls.lock().unwrap() += 1;
            self.answers.lock().unwrap().pop().flatten()
        }
    }

    fn inputs_from_yaml(yaml: &str) -> Vec<NormalizedInputConfig> {
        let step: StepDefinition = serde_yaml::from_str(yaml).unwrap();
        normalize_step_inputs(Path::new("login.yaml"), &step)
    }

    #[tokio::test]
    async fn no_declarations_means_no_submissions_and_no_prompts() {
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let prompter = ScriptedPrompter::new(vec![]);
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let resolved = resolver.resolve(&[], &prompter).await.unwrap();
        assert!(resolved.submissions.is_empty());
        assert!(resolved.user_inputs.is_empty());
        assert_eq!(prompter.call_count(), 0);
    }

    #[tokio::test]
    async fn interactive_answer_is_submitted_verbatim() {
        let inputs = inputs_from_yaml("name: Login\ninputs:\n  - name: username");
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let prompter = ScriptedPrompter::new(vec![Some("alice")]);
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let resolved = resolver.resolve(&inputs, &prompter).await.unwrap();
        assert_eq!(resolved.submissions, vec!["alice".to_string()]);
        assert_eq!(
            resolved.user_inputs.get("username").map(String::as_str),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn declined_prompt_falls_back_to_default() {
        let inputs = inputs_from_yaml(
            "name: Login\ninputs:\n  - name: username\n    default: guest",
        );
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let prompter = ScriptedPrompter::new(vec![None]);
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let resolved = resolver.resolve(&inputs, &prompter).await.unwrap();
        assert_eq!(resolved.submissions, vec!["guest".to_string()]);
    }

    #[tokio::test]
    async fn required_input_without_default_fails_hard() {
        let inputs = inputs_from_yaml("name: Login\ninputs:\n  - name: username");
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let prompter = ScriptedPrompter::new(vec![None]);
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let err = resolver.resolve(&inputs, &prompter).await.unwrap_err();
        assert!(matches!(err, Error::InputRequired { variable } if variable == "username"));
    }

    #[tokio::test]
    async fn optional_input_without_default_submits_empty() {
        let inputs = inputs_from_yaml(
            "name: S\ninputs:\n  - name: note\n    required: false",
        );
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let resolved = resolver.resolve(&inputs, &NoPrompter).await.unwrap();
        assert_eq!(resolved.submissions, vec![String::new()]);
    }

    #[tokio::test]
    async fn confirm_values_are_normalized() {
        let inputs = inputs_from_yaml("name: S\ninputs:\n  - name: sure\n    type: confirm");
        let bus = EventBus::new();

        for (raw, submission, stored) in [
            ("YES", "y", "true"),
            ("True", "y", "true"),
            ("1", "y", "true"),
            ("nope", "n", "false"),
            ("0", "n", "false"),
            ("whatever", "n", "false"),
        ] {
            let prompter = ScriptedPrompter::new(vec![Some(raw)]);
            let cache = MemoryInputCache::new();
            let resolver = InputResolver { cache: &cache, bus: &bus };
            let resolved = resolver.resolve(&inputs, &prompter).await.unwrap();
            assert_eq!(resolved.submissions, vec![submission.to_string()], "raw {raw:?}");
            assert_eq!(
                resolved.user_inputs.get("sure").map(String::as_str),
                Some(stored),
                "raw {raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn confirm_declined_without_default_submits_no() {
        let inputs = inputs_from_yaml("name: S\ninputs:\n  - name: sure\n    type: confirm");
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let resolved = resolver.resolve(&inputs, &NoPrompter).await.unwrap();
        assert_eq!(resolved.submissions, vec!["n".to_string()]);
        assert_eq!(
            resolved.user_inputs.get("sure").map(String::as_str),
            Some("false")
        );
    }

    #[tokio::test]
    async fn select_submits_one_based_index_within_range() {
        let yaml = r#"
name: S
inputs:
  - name: env
    type: select
    options: [staging, prod, local]
"#;
        let inputs = inputs_from_yaml(yaml);
        let bus = EventBus::new();

        // (answer, expected 1-based submission)
        for (raw, expected) in [
            (Some("prod"), "2"),
            (Some("3"), "3"),
            (Some("77"), "1"),
            (Some("bogus"), "1"),
        ] {
            let cache = MemoryInputCache::new();
            let prompter = ScriptedPrompter::new(vec![raw]);
            let resolver = InputResolver { cache: &cache, bus: &bus };
            let resolved = resolver.resolve(&inputs, &prompter).await.unwrap();
            assert_eq!(resolved.submissions, vec![expected.to_string()], "raw {raw:?}");
            let n: usize = resolved.submissions[0].parse().unwrap();
            assert!((1..=3).contains(&n));
        }
    }

    #[tokio::test]
    async fn cached_value_skips_prompting_but_still_announces() {
        let inputs = inputs_from_yaml("name: Login\ninputs:\n  - name: username");
        let cache = MemoryInputCache::new();
        cache
            .put(&inputs[0].step_key, "username", "alice".into())
            .await;

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let prompter = ScriptedPrompter::new(vec![]);
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let resolved = resolver.resolve(&inputs, &prompter).await.unwrap();
        assert_eq!(resolved.submissions, vec!["alice".to_string()]);
        assert_eq!(prompter.call_count(), 0);

        match rx.try_recv().unwrap() {
            RunnerEvent::Input(req) => assert_eq!(req.input_name, "username"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolution_reruns_identically_from_cache() {
        let yaml = r#"
name: S
inputs:
  - name: env
    type: select
    options: [staging, prod]
  - name: sure
    type: confirm
  - name: username
"#;
        let inputs = inputs_from_yaml(yaml);
        let cache = MemoryInputCache::new();
        let bus = EventBus::new();
        let prompter = ScriptedPrompter::new(vec![Some("prod"), Some("yes"), Some("alice")]);
        let resolver = InputResolver { cache: &cache, bus: &bus };

        let first = resolver.resolve(&inputs, &prompter).await.unwrap();
        // Second pass: everything comes from the cache
        let second = resolver.resolve(&inputs, &NoPrompter).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.submissions, vec!["2", "y", "alice"]);
    }
}
