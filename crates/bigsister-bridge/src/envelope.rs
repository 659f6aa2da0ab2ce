//! The response envelope every invocation produces.
//!
//! Whatever an action returns is folded into a JSON object that always
//! carries a boolean `ok`. Structured values land under `json`, markup under
//! `html`, anything else under `result`. Values that already look like an
//! envelope pass through.

use bigsister_plugin::{Diagnostics, PluginError};
use serde_json::{Map, Value};

/// A normalized invocation result.
pub type Envelope = Map<String, Value>;

/// Keys that mark a mapping as an envelope already.
pub const ENVELOPE_KEYS: [&str; 3] = ["ok", "html", "json"];

/// Normalize an action's return value.
#[must_use]
pub fn normalize(value: Value) -> Envelope {
    let mut envelope = match value {
        Value::Object(_) | Value::Array(_) => structured(value),
        Value::String(text) => from_text(text),
        scalar => wrap("result", scalar),
    };
    ensure_ok(&mut envelope);
    envelope
}

/// Failure envelope carrying `message`.
#[must_use]
pub fn failure(message: impl Into<String>) -> Envelope {
    let mut envelope = Envelope::new();
    envelope.insert("ok".to_string(), Value::Bool(false));
    envelope.insert("error".to_string(), Value::String(message.into()));
    envelope
}

/// Failure envelope for a dispatch error.
///
/// Action errors render as `"<kind>: <message>"`; lookup errors carry only
/// their message.
#[must_use]
pub fn from_error(err: &PluginError) -> Envelope {
    failure(err.to_string())
}

/// Attach non-empty diagnostic output under `_prints`.
///
/// Keys already present in an action's own `_prints` object are kept; a
/// captured stream replaces the key of the same name.
pub fn attach_prints(envelope: &mut Envelope, diagnostics: &Diagnostics) {
    let captured = [("stdout", diagnostics.stdout()), ("stderr", diagnostics.stderr())];
    if captured.iter().all(|(_, text)| text.is_empty()) {
        return;
    }

    let slot = envelope
        .entry("_prints")
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }

    if let Value::Object(prints) = slot {
        for (stream, text) in captured {
            if !text.is_empty() {
                prints.insert(stream.to_string(), Value::String(text.to_string()));
            }
        }
    }
}

/// The envelope's `ok` flag.
#[must_use]
pub fn is_ok(envelope: &Envelope) -> bool {
    envelope.get("ok").is_some_and(truthy)
}

fn structured(value: Value) -> Envelope {
    match value {
        Value::Object(map) if ENVELOPE_KEYS.iter().any(|key| map.contains_key(*key)) => map,
        other => wrap("json", other),
    }
}

fn from_text(text: String) -> Envelope {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(parsed) => structured(parsed),
            Err(_) => wrap("result", Value::String(text)),
        }
    } else if trimmed.starts_with('<') {
        wrap("html", Value::String(text))
    } else {
        wrap("result", Value::String(text))
    }
}

fn wrap(key: &str, value: Value) -> Envelope {
    let mut envelope = Envelope::new();
    envelope.insert("ok".to_string(), Value::Bool(true));
    envelope.insert(key.to_string(), value);
    envelope
}

fn ensure_ok(envelope: &mut Envelope) {
    let ok = envelope.get("ok").map_or(true, truthy);
    envelope.insert("ok".to_string(), Value::Bool(ok));
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigsister_plugin::ActionError;
    use serde_json::json;

    fn as_value(envelope: Envelope) -> Value {
        Value::Object(envelope)
    }

    #[test]
    fn test_html_string() {
        let envelope = normalize(json!("<h2>ok</h2>"));
        assert_eq!(as_value(envelope), json!({"ok": true, "html": "<h2>ok</h2>"}));
    }

    #[test]
    fn test_plain_mapping_is_wrapped() {
        let envelope = normalize(json!({"x": 1}));
        assert_eq!(as_value(envelope), json!({"ok": true, "json": {"x": 1}}));
    }

    #[test]
    fn test_sequence_is_wrapped() {
        let envelope = normalize(json!([1, 2]));
        assert_eq!(as_value(envelope), json!({"ok": true, "json": [1, 2]}));
    }

    #[test]
    fn test_existing_envelope_passes_through() {
        let envelope = normalize(json!({"ok": false, "errors": "boom"}));
        assert_eq!(as_value(envelope), json!({"ok": false, "errors": "boom"}));

        // `html` alone marks an envelope; `ok` is filled in
        let envelope = normalize(json!({"html": "<p/>"}));
        assert_eq!(as_value(envelope), json!({"ok": true, "html": "<p/>"}));
    }

    #[test]
    fn test_json_text_is_parsed() {
        let envelope = normalize(json!("  {\"tool\": \"zsteg\"}"));
        assert_eq!(
            as_value(envelope),
            json!({"ok": true, "json": {"tool": "zsteg"}})
        );

        let envelope = normalize(json!("{\"ok\": false, \"error\": \"x\"}"));
        assert_eq!(as_value(envelope), json!({"ok": false, "error": "x"}));
    }

    #[test]
    fn test_broken_json_text_is_a_result() {
        let envelope = normalize(json!("{not json"));
        assert_eq!(as_value(envelope), json!({"ok": true, "result": "{not json"}));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(
            as_value(normalize(json!("done"))),
            json!({"ok": true, "result": "done"})
        );
        assert_eq!(as_value(normalize(json!(42))), json!({"ok": true, "result": 42}));
        assert_eq!(
            as_value(normalize(Value::Null)),
            json!({"ok": true, "result": null})
        );
    }

    #[test]
    fn test_non_boolean_ok_is_coerced() {
        assert_eq!(normalize(json!({"ok": 0}))["ok"], json!(false));
        assert_eq!(normalize(json!({"ok": "yes"}))["ok"], json!(true));
        assert_eq!(normalize(json!({"ok": null}))["ok"], json!(false));
    }

    #[test]
    fn test_errors() {
        let err = PluginError::NotFound {
            feature: "ghost".to_string(),
        };
        assert_eq!(
            as_value(from_error(&err)),
            json!({"ok": false, "error": "Unknown feature 'ghost'"})
        );

        let err = PluginError::Action(ActionError::new("ValueError", "bad input"));
        assert_eq!(
            as_value(from_error(&err)),
            json!({"ok": false, "error": "ValueError: bad input"})
        );
    }

    #[test]
    fn test_prints_only_when_present() {
        let mut envelope = normalize(json!("x"));
        attach_prints(&mut envelope, &Diagnostics::new());
        assert!(!envelope.contains_key("_prints"));

        let mut diagnostics = Diagnostics::new();
        diagnostics.err("warning: slow disk");
        attach_prints(&mut envelope, &diagnostics);
        assert_eq!(
            envelope["_prints"],
            json!({"stderr": diagnostics.stderr()})
        );
        assert!(is_ok(&envelope));
    }

    #[test]
    fn test_prints_merge_into_existing() {
        let mut envelope = normalize(json!({"ok": true, "_prints": {"stdout": "from action\n"}}));
        let mut diagnostics = Diagnostics::new();
        diagnostics.err("captured");
        attach_prints(&mut envelope, &diagnostics);
        assert_eq!(
            envelope["_prints"],
            json!({"stdout": "from action\n", "stderr": "captured\n"})
        );

        let mut envelope = normalize(json!({"ok": true, "_prints": "stray"}));
        attach_prints(&mut envelope, &diagnostics);
        assert_eq!(envelope["_prints"], json!({"stderr": "captured\n"}));
    }
}
