//! JSON frames exchanged on the event hub socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::HubError;

/// Server event carrying an [`EventNotice`].
pub const RECEIVE_UPDATE: &str = "ReceiveUpdate";
/// Server event sent to a group when a connection joins it.
pub const USER_JOINED: &str = "UserJoined";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    Text,
    AttachmentUploaded,
    EventMutated,
}

/// Tagged payload of a `ReceiveUpdate` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotice {
    pub kind: NoticeKind,
    pub event_id: String,
    pub data: Value,
}

impl EventNotice {
    pub fn text(event_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Text,
            event_id: event_id.into(),
            data: Value::String(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Result of a client invocation. `error` is `null` on success.
    Completion {
        #[serde(rename = "invocationId")]
        invocation_id: Option<String>,
        error: Option<String>,
    },
    Event {
        target: String,
        arguments: Vec<Value>,
    },
}

impl ServerFrame {
    pub fn completion(invocation_id: Option<String>, error: Option<String>) -> Self {
        ServerFrame::Completion {
            invocation_id,
            error,
        }
    }

    pub fn event(target: &str, argument: Value) -> Self {
        ServerFrame::Event {
            target: target.to_string(),
            arguments: vec![argument],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    #[serde(default)]
    pub invocation_id: Option<String>,
    pub target: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubMethod {
    JoinEventGroup { event_id: String },
    LeaveEventGroup { event_id: String },
    SendTextMessage { event_id: String, text: String },
}

impl Invocation {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Resolves the target and its arguments. Only the first letter of the
    /// target is case-insensitive.
    pub fn method(&self) -> Result<HubMethod, HubError> {
        let mut chars = self.target.chars();
        let target = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };

        match target.as_str() {
            "JoinEventGroup" => Ok(HubMethod::JoinEventGroup {
                event_id: self.event_id_argument(),
            }),
            "LeaveEventGroup" => Ok(HubMethod::LeaveEventGroup {
                event_id: self.event_id_argument(),
            }),
            "SendTextMessage" => match self.arguments.get(1) {
                Some(Value::String(text)) => Ok(HubMethod::SendTextMessage {
                    event_id: self.event_id_argument(),
                    text: text.clone(),
                }),
                _ => Err(HubError::InvalidArguments("SendTextMessage")),
            },
            _ => Err(HubError::UnknownMethod(self.target.clone())),
        }
    }

    // Event ids arrive as strings or bare numbers; anything else counts as empty.
    fn event_id_argument(&self) -> String {
        match self.arguments.first() {
            Some(Value::String(id)) => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        }
    }
}
