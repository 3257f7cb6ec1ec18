//! Kernel messages and the outputs captured from them.
//!
//! A [`Message`] is what a kernel channel emits: a type tag, an optional
//! parent id tying it to the submission that caused it, and a JSON content
//! payload. Output-bearing messages are converted into typed [`Output`]s,
//! which is what gets stored on cells and returned to clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message received from a kernel channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier of this message, if the kernel assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Message type (`status`, `stream`, `execute_result`, ...).
    pub msg_type: String,
    /// Id of the submission this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Type-specific payload.
    #[serde(default)]
    pub content: Value,
}

/// Classification of a message by its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Status,
    ExecuteResult,
    DisplayData,
    Stream,
    Error,
    /// Anything else (`execute_input`, comm traffic, ...).
    Other,
}

impl MessageKind {
    /// Whether messages of this kind are captured as cell outputs.
    pub fn is_output(self) -> bool {
        matches!(
            self,
            Self::ExecuteResult | Self::DisplayData | Self::Stream | Self::Error
        )
    }
}

/// Execution state reported by `status` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Starting,
    Busy,
    Idle,
}

impl Message {
    /// Build a message with the given type, parent and content.
    pub fn new(msg_type: impl Into<String>, parent_id: Option<&str>, content: Value) -> Self {
        Self {
            msg_id: None,
            msg_type: msg_type.into(),
            parent_id: parent_id.map(str::to_string),
            content,
        }
    }

    /// A `status` message.
    pub fn status(state: ExecutionState, parent_id: Option<&str>) -> Self {
        Self::new(
            "status",
            parent_id,
            serde_json::json!({ "execution_state": state }),
        )
    }

    /// A `stream` message.
    pub fn stream(name: &str, text: &str, parent_id: Option<&str>) -> Self {
        Self::new(
            "stream",
            parent_id,
            serde_json::json!({ "name": name, "text": text }),
        )
    }

    /// Classify this message.
    pub fn kind(&self) -> MessageKind {
        match self.msg_type.as_str() {
            "status" => MessageKind::Status,
            "execute_result" => MessageKind::ExecuteResult,
            "display_data" => MessageKind::DisplayData,
            "stream" => MessageKind::Stream,
            "error" => MessageKind::Error,
            _ => MessageKind::Other,
        }
    }

    /// The execution state carried by a `status` message.
    pub fn execution_state(&self) -> Option<ExecutionState> {
        if self.kind() != MessageKind::Status {
            return None;
        }
        self.content
            .get("execution_state")
            .cloned()
            .and_then(|state| serde_json::from_value(state).ok())
    }

    /// Whether this is a `status` message reporting `idle`.
    pub fn is_idle(&self) -> bool {
        self.execution_state() == Some(ExecutionState::Idle)
    }

    /// Whether this message belongs to a different submission than `msg_id`.
    ///
    /// Unparented messages are never considered foreign.
    pub fn is_foreign_to(&self, msg_id: &str) -> bool {
        self.parent_id.as_deref().is_some_and(|parent| parent != msg_id)
    }

    /// Convert an output-bearing message into its typed payload.
    pub fn into_output(self) -> Option<Output> {
        let kind = self.kind();
        if !kind.is_output() {
            return None;
        }

        let parsed = match kind {
            MessageKind::Stream => serde_json::from_value(self.content).map(Output::Stream),
            MessageKind::ExecuteResult => {
                serde_json::from_value(self.content).map(Output::ExecuteResult)
            }
            MessageKind::DisplayData => {
                serde_json::from_value(self.content).map(Output::DisplayData)
            }
            MessageKind::Error => serde_json::from_value(self.content).map(Output::Error),
            MessageKind::Status | MessageKind::Other => return None,
        };

        match parsed {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!("Dropping malformed {} message: {}", self.msg_type, e);
                None
            }
        }
    }
}

/// A captured cell output.
///
/// Serialized in the nbformat style, tagged by `output_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream(StreamOutput),
    ExecuteResult(ExecuteResult),
    DisplayData(DisplayData),
    Error(ErrorOutput),
}

impl Output {
    /// Text of a stream output.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Stream(stream) => Some(&stream.text),
            _ => None,
        }
    }
}

/// Text written to stdout or stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOutput {
    /// Stream name (`stdout` or `stderr`).
    pub name: String,
    /// Text written.
    pub text: String,
}

/// Value of a trailing expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    #[serde(default)]
    pub execution_count: Option<u64>,
    /// MIME bundle.
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Rich display output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayData {
    /// MIME bundle.
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// An uncaught exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOutput {
    /// Exception name.
    pub ename: String,
    /// Exception value.
    #[serde(default)]
    pub evalue: String,
    /// Formatted traceback lines.
    #[serde(default)]
    pub traceback: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_kind() {
        assert_eq!(Message::new("stream", None, json!({})).kind(), MessageKind::Stream);
        assert_eq!(
            Message::new("execute_input", None, json!({})).kind(),
            MessageKind::Other
        );
        assert!(!MessageKind::Status.is_output());
        assert!(MessageKind::Error.is_output());
    }

    #[test]
    fn test_idle_detection() {
        assert!(Message::status(ExecutionState::Idle, None).is_idle());
        assert!(!Message::status(ExecutionState::Busy, None).is_idle());
        // A stream whose content happens to look like a status is not idle
        let odd = Message::new("stream", None, json!({ "execution_state": "idle" }));
        assert!(!odd.is_idle());
    }

    #[test]
    fn test_foreign_parent() {
        let msg = Message::stream("stdout", "hi\n", Some("a"));
        assert!(msg.is_foreign_to("b"));
        assert!(!msg.is_foreign_to("a"));
        assert!(!Message::stream("stdout", "hi\n", None).is_foreign_to("a"));
    }

    #[test]
    fn test_stream_output_json_shape() {
        let output = Message::stream("stdout", "10\n", None).into_output().unwrap();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["output_type"], "stream");
        assert_eq!(value["name"], "stdout");
        assert_eq!(value["text"], "10\n");
    }

    #[test]
    fn test_error_output_defaults() {
        let msg = Message::new("error", None, json!({ "ename": "NameError" }));
        match msg.into_output() {
            Some(Output::Error(err)) => {
                assert_eq!(err.ename, "NameError");
                assert!(err.traceback.is_empty());
            }
            other => panic!("Wrong output: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_output_dropped() {
        let msg = Message::new("stream", None, json!({ "text": 5 }));
        assert!(msg.into_output().is_none());
    }

    #[test]
    fn test_message_deserialize_minimal() {
        let msg: Message = serde_json::from_str(r#"{"msg_type":"status"}"#).unwrap();
        assert_eq!(msg.kind(), MessageKind::Status);
        assert!(msg.parent_id.is_none());
        assert!(msg.execution_state().is_none());
    }
}
