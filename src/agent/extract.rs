//! Response classification and text extraction.
//!
//! The stack's response object varies in shape between versions and code
//! paths. Classification and extraction run independently: classification
//! probes for error signals in a fixed order and short-circuits on the
//! first match; extraction tries content locations in a fixed priority
//! order and takes the first non-blank text.

use crate::llm::ProviderResponse;
use serde_json::Value;

/// Outcome of probing one provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// Extracted reply text; empty when no strategy yielded text.
    pub text: String,
    /// Error classification; `None` when no error signal was found.
    pub classification: Option<String>,
}

/// Probe a response for both an error classification and extractable text.
#[must_use]
pub fn extract(response: &ProviderResponse) -> ResponseOutcome {
    ResponseOutcome {
        text: extract_text(response).unwrap_or_default(),
        classification: classify(response),
    }
}

/// True when a JSON error payload should be treated as present. Mirrors
/// upstream truthiness: null, `false` and the empty string are no-error.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn status_signals_error(status: &str) -> bool {
    let status = status.to_lowercase();
    status.contains("error") || status.contains("fail") || status.contains("timeout")
}

/// Check a response for error conditions, in order, returning the first
/// matching classification.
#[must_use]
pub fn classify(response: &ProviderResponse) -> Option<String> {
    if let Some(error) = response.error.as_ref().filter(|e| is_present(e)) {
        return Some(format!("Response error field: {error}"));
    }

    if let Some(status) = response.status.as_deref().filter(|s| status_signals_error(s)) {
        return Some(format!("Error status: {status}"));
    }

    for call in response.tool_calls.as_deref().unwrap_or_default() {
        if let Some(error) = call.error.as_ref().filter(|e| is_present(e)) {
            return Some(format!("Tool call error: {error}"));
        }
        if let Some(status) = call.status.as_deref() {
            let lowered = status.to_lowercase();
            if lowered.contains("error") || lowered.contains("fail") {
                return Some(format!("Tool call status error: {status}"));
            }
        }
    }

    if let Some(error) = response
        .completion_message
        .as_ref()
        .and_then(|c| c.error.as_ref())
        .filter(|e| is_present(e))
    {
        return Some(format!("Completion error: {error}"));
    }

    if let Some(output) = response.output.as_deref() {
        if output.is_empty() {
            return Some("Empty output array".to_string());
        }
        // A present-but-empty content list is an error signal; an absent
        // content key is the valid-but-empty case and stays unclassified.
        if let Some(content) = output.first().and_then(|item| item.content.as_deref()) {
            if content.is_empty() {
                return Some("Empty content array in output message".to_string());
            }
        }
    }

    // An identifier that is present but blank is a proxy for throttling or
    // quota problems; a wholly absent identifier is not a signal.
    if response.id.as_deref() == Some("") {
        return Some("Missing response ID (possible rate limit or quota issue)".to_string());
    }

    None
}

fn non_blank(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Extract reply text from a response, trying strategies in priority order.
#[must_use]
pub fn extract_text(response: &ProviderResponse) -> Option<String> {
    if let Some(text) = response.output_text.as_deref().and_then(non_blank) {
        return Some(text);
    }

    for item in response.output.as_deref().unwrap_or_default() {
        if item.kind.as_deref() != Some("message") {
            continue;
        }
        for part in item.content.as_deref().unwrap_or_default() {
            if let Some(text) = part.text.as_deref().and_then(non_blank) {
                return Some(text);
            }
        }
        // The first message entry decides this strategy, even when it
        // yielded nothing; later entries are never consulted.
        break;
    }

    if let Some(Value::String(text)) = response
        .completion_message
        .as_ref()
        .and_then(|c| c.content.as_ref())
    {
        if let Some(text) = non_blank(text) {
            return Some(text);
        }
    }

    if let Some(Value::String(text)) = response.content.as_ref() {
        if let Some(text) = non_blank(text) {
            return Some(text);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> ProviderResponse {
        serde_json::from_value(value).expect("valid response fixture")
    }

    #[test]
    fn output_text_alone_extracts_cleanly() {
        let outcome = extract(&response(json!({"output_text": "Hello there"})));
        assert_eq!(outcome.text, "Hello there");
        assert_eq!(outcome.classification, None);
    }

    #[test]
    fn error_field_beats_status() {
        let classification = classify(&response(json!({
            "error": {"code": "boom"},
            "status": "failed"
        })));
        assert_eq!(
            classification.as_deref(),
            Some("Response error field: {\"code\":\"boom\"}")
        );
    }

    #[test]
    fn null_and_falsy_error_fields_are_ignored() {
        assert_eq!(classify(&response(json!({"id": "r", "error": null}))), None);
        assert_eq!(classify(&response(json!({"id": "r", "error": false}))), None);
        assert_eq!(classify(&response(json!({"id": "r", "error": ""}))), None);
    }

    #[test]
    fn status_matching_is_substring_and_case_insensitive() {
        for status in ["Timeout", "FAILED", "internal_error"] {
            let classification = classify(&response(json!({"id": "r", "status": status})));
            assert_eq!(classification, Some(format!("Error status: {status}")));
        }
        assert_eq!(
            classify(&response(json!({"id": "r", "status": "completed"}))),
            None
        );
    }

    #[test]
    fn tool_call_errors_classify() {
        let classification = classify(&response(json!({
            "id": "r",
            "tool_calls": [{"status": "ok"}, {"error": "denied"}]
        })));
        assert_eq!(classification.as_deref(), Some("Tool call error: \"denied\""));

        let classification = classify(&response(json!({
            "id": "r",
            "tool_calls": [{"status": "failed"}]
        })));
        assert_eq!(
            classification.as_deref(),
            Some("Tool call status error: failed")
        );
    }

    #[test]
    fn completion_message_error_classifies() {
        let classification = classify(&response(json!({
            "id": "r",
            "completion_message": {"error": "upstream exploded"}
        })));
        assert_eq!(
            classification.as_deref(),
            Some("Completion error: \"upstream exploded\"")
        );
    }

    #[test]
    fn empty_output_array_classifies() {
        let classification = classify(&response(json!({"id": "r", "output": []})));
        assert_eq!(classification.as_deref(), Some("Empty output array"));
    }

    #[test]
    fn present_but_empty_content_classifies() {
        let classification = classify(&response(json!({
            "id": "r",
            "output": [{"type": "message", "content": []}]
        })));
        assert_eq!(
            classification.as_deref(),
            Some("Empty content array in output message")
        );
    }

    #[test]
    fn absent_content_is_valid_but_empty() {
        let outcome = extract(&response(json!({
            "id": "r",
            "output": [{"type": "message"}]
        })));
        assert_eq!(outcome.text, "");
        assert_eq!(outcome.classification, None);
    }

    #[test]
    fn blank_id_classifies_as_throttling_but_absent_id_does_not() {
        let classification = classify(&response(json!({"id": "", "output_text": "hi"})));
        assert_eq!(
            classification.as_deref(),
            Some("Missing response ID (possible rate limit or quota issue)")
        );
        assert_eq!(classify(&response(json!({"output_text": "hi"}))), None);
    }

    #[test]
    fn message_scan_takes_first_textual_part() {
        let text = extract_text(&response(json!({
            "id": "r",
            "output": [
                {"type": "reasoning", "content": [{"type": "text", "text": "chain"}]},
                {"type": "message", "content": [
                    {"type": "annotation"},
                    {"type": "output_text", "text": "  the reply  "}
                ]}
            ]
        })));
        assert_eq!(text.as_deref(), Some("  the reply  "));
    }

    #[test]
    fn message_scan_stops_at_first_message_entry() {
        // The first message entry has no text; a later message entry does.
        // The scan still stops at the first one and falls through to the
        // remaining strategies.
        let raw = json!({
            "id": "r",
            "output": [
                {"type": "message", "content": [{"type": "annotation"}]},
                {"type": "message", "content": [{"type": "output_text", "text": "later"}]}
            ]
        });
        assert_eq!(extract_text(&response(raw.clone())), None);

        let mut with_fallback = raw;
        with_fallback["content"] = json!("legacy text");
        assert_eq!(
            extract_text(&response(with_fallback)).as_deref(),
            Some("legacy text")
        );
    }

    #[test]
    fn completion_message_fallback_requires_string() {
        let text = extract_text(&response(json!({
            "id": "r",
            "completion_message": {"content": "legacy completion"}
        })));
        assert_eq!(text.as_deref(), Some("legacy completion"));

        let text = extract_text(&response(json!({
            "id": "r",
            "completion_message": {"content": ["not", "a", "string"]}
        })));
        assert_eq!(text, None);
    }

    #[test]
    fn blank_candidates_never_satisfy_a_strategy() {
        let text = extract_text(&response(json!({
            "id": "r",
            "output_text": "   ",
            "content": "actual text"
        })));
        assert_eq!(text.as_deref(), Some("actual text"));
    }
}
