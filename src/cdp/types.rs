//! CDP message types
//!
//! Only the slice of the `Debugger` and `Runtime` domains that autobreak
//! touches is modelled here. Unknown fields are ignored on deserialization.
//! See: https://chromedevtools.github.io/devtools-protocol/

use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Base Protocol Messages ===

/// Outgoing CDP command
#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

/// Error object carried by a failed response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

// === Identifiers ===

/// Breakpoint identifier issued by the backend, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointId(pub String);

impl BreakpointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// === Command Results ===

/// `Debugger.searchInContent` match
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub line_number: u32,
    pub line_content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchInContentResult {
    #[serde(default)]
    pub result: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: BreakpointId,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Mirror object referencing a value in the debuggee
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RemoteObject {
    /// Best printable form of the object
    ///
    /// Primitive values come back in `value`; objects only carry a description.
    pub fn display_value(&self) -> Value {
        if let Some(value) = &self.value {
            return value.clone();
        }
        if let Some(raw) = &self.unserializable_value {
            return Value::String(raw.clone());
        }
        if let Some(description) = &self.description {
            return Value::String(description.clone());
        }
        Value::String(self.object_type.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    pub fn message(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    pub result: RemoteObject,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

// === Event Bodies ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    pub line_number: u32,
    #[serde(default)]
    pub column_number: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    pub script_id: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub call_frame_id: String,
    #[serde(default)]
    pub function_name: String,
    pub location: Location,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub hit_breakpoints: Vec<BreakpointId>,
}

/// Events the engine cares about
#[derive(Debug, Clone)]
pub enum Event {
    ScriptParsed(ScriptParsedEvent),
    Paused(PausedEvent),
    Resumed,
    /// Any other notification, by method name
    Other(String),
}

impl Event {
    /// Build an event from a notification's method and params
    pub fn from_message(method: &str, params: Value) -> Self {
        match method {
            "Debugger.scriptParsed" => match serde_json::from_value(params) {
                Ok(body) => Event::ScriptParsed(body),
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed Debugger.scriptParsed");
                    Event::Other(method.to_string())
                }
            },
            "Debugger.paused" => match serde_json::from_value(params) {
                Ok(body) => Event::Paused(body),
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed Debugger.paused");
                    Event::Other(method.to_string())
                }
            },
            "Debugger.resumed" => Event::Resumed,
            _ => Event::Other(method.to_string()),
        }
    }
}

// === Target Discovery ===

/// Entry of the DevTools `/json/list` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paused_event_parsing() {
        let event = Event::from_message(
            "Debugger.paused",
            json!({
                "reason": "other",
                "hitBreakpoints": ["1:3:8:https://example.com/app.js"],
                "callFrames": [{
                    "callFrameId": "frame-0",
                    "functionName": "",
                    "url": "https://example.com/app.js",
                    "location": { "scriptId": "42", "lineNumber": 3, "columnNumber": 8 },
                    "scopeChain": [],
                    "this": { "type": "undefined" }
                }]
            }),
        );

        match event {
            Event::Paused(paused) => {
                assert_eq!(paused.reason, "other");
                assert_eq!(paused.hit_breakpoints.len(), 1);
                assert_eq!(paused.call_frames[0].location.column_number, Some(8));
                assert!(paused.call_frames[0].function_name.is_empty());
            }
            other => panic!("Expected Paused, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_and_malformed_events() {
        assert!(matches!(
            Event::from_message("Runtime.consoleAPICalled", json!({})),
            Event::Other(m) if m == "Runtime.consoleAPICalled"
        ));
        assert!(matches!(
            Event::from_message("Debugger.scriptParsed", json!({ "url": 3 })),
            Event::Other(_)
        ));
    }

    #[test]
    fn test_remote_object_display_value() {
        let primitive = RemoteObject {
            object_type: "string".to_string(),
            value: Some(json!("?q=1")),
            ..Default::default()
        };
        assert_eq!(primitive.display_value(), json!("?q=1"));

        let object = RemoteObject {
            object_type: "object".to_string(),
            description: Some("Location".to_string()),
            ..Default::default()
        };
        assert_eq!(object.display_value(), json!("Location"));

        let undefined = RemoteObject {
            object_type: "undefined".to_string(),
            ..Default::default()
        };
        assert_eq!(undefined.display_value(), json!("undefined"));
    }
}
