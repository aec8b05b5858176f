//! Tolerant decoding of engine JSON lines
//!
//! The engine's wire formats are decoded into Option-heavy structs that
//! ignore unknown fields. Any decode mismatch means "skip this line",
//! never a hard error.

use serde::Deserialize;

/// Source of raw event lines for one run
///
/// The engine writes line-delimited JSON to a file today; a pipe or
/// socket transport could implement this instead without touching the
/// reconciliation logic.
pub trait EventSource {
    /// Drain every pending line, consuming the underlying transport
    fn drain(&mut self) -> Vec<String>;
}

/// Envelope of a live event line
#[derive(Debug, Deserialize)]
pub(crate) struct LiveEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Payload of a `step_completed` live event
#[derive(Debug, Deserialize)]
pub(crate) struct StepCompletedPayload {
    pub step_name: Option<String>,
    pub suite_name: Option<String>,
    pub node_id: Option<String>,
    pub status: Option<String>,
    pub duration_ms: Option<u64>,
    pub failed_assertion: Option<String>,
    pub error: Option<String>,
}

/// Parse one live event line into a `step_completed` payload
///
/// Returns None for malformed lines, other event types, or payloads
/// that don't decode.
pub(crate) fn decode_step_completed(line: &str) -> Option<StepCompletedPayload> {
    let envelope: LiveEnvelope = serde_json::from_str(line).ok()?;
    if envelope.kind != "step_completed" {
        return None;
    }
    serde_json::from_value(envelope.payload).ok()
}

/// A `type: "test"` record scraped from raw stdout
#[derive(Debug, Deserialize)]
pub(crate) struct StdoutTestRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub suite: Option<String>,
    pub suite_name: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// Parse one stdout line into a test record
pub(crate) fn decode_stdout_test(line: &str) -> Option<StdoutTestRecord> {
    let record: StdoutTestRecord = serde_json::from_str(line).ok()?;
    if record.kind != "test" {
        return None;
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_step_completed() {
        let line = r#"{"type":"step_completed","payload":{"step_name":"Login","suite_name":"auth","status":"success","duration_ms":42}}"#;
        let payload = decode_step_completed(line).unwrap();
        assert_eq!(payload.step_name.as_deref(), Some("Login"));
        assert_eq!(payload.status.as_deref(), Some("success"));
        assert_eq!(payload.duration_ms, Some(42));
    }

    #[test]
    fn ignores_other_event_types() {
        let line = r#"{"type":"run_started","payload":{"suite_name":"auth"}}"#;
        assert!(decode_step_completed(line).is_none());
    }

    #[test]
    fn tolerates_unknown_and_missing_fields() {
        let line = r#"{"type":"step_completed","payload":{"step_name":"x","extra":[1,2]}}"#;
        let payload = decode_step_completed(line).unwrap();
        assert!(payload.status.is_none());
        assert!(payload.node_id.is_none());
    }

    #[test]
    fn malformed_line_is_skipped() {
        assert!(decode_step_completed("{not json").is_none());
        assert!(decode_step_completed("").is_none());
    }

    #[test]
    fn decodes_stdout_test_record() {
        let line = r#"{"type":"test","suite":"auth","name":"Login","status":"pass"}"#;
        let record = decode_stdout_test(line).unwrap();
        assert_eq!(record.suite.as_deref(), Some("auth"));
        assert_eq!(record.status.as_deref(), Some("pass"));
    }

    #[test]
    fn stdout_non_test_lines_are_skipped() {
        assert!(decode_stdout_test(r#"{"type":"log","message":"hi"}"#).is_none());
        assert!(decode_stdout_test("plain text output").is_none());
    }
}
