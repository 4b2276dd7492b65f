use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Sender token used for messages composed on this device
pub const LOCAL_SENDER: &str = "me";

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a conversation, derived from the creation time
    pub id: String,
    pub text: String,
    /// Identity token, e.g. "me" or a user id
    pub sender: String,
    /// RFC 3339 / ISO-8601 creation time
    pub timestamp: String,
}

impl Message {
    /// Create a message with an explicit id and the current time
    pub fn new(id: impl Into<String>, text: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: sender.into(),
            timestamp: now_timestamp(),
        }
    }
}

/// Current UTC time formatted as ISO-8601 with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch, used to derive message ids
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which source a published message list was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Remote,
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Remote => "remote",
            Source::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published view of a conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub chat_id: String,
    pub source: Source,
    pub messages: Vec<Message>,
}

impl Snapshot {
    pub fn new(chat_id: impl Into<String>, source: Source, messages: Vec<Message>) -> Self {
        Self {
            chat_id: chat_id.into(),
            source,
            messages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message texts in order, handy for assertions and logging
    pub fn texts(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.text.as_str()).collect()
    }
}

/// Request body accepted by the remote when posting a message
#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageRequest {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub timestamp: String,
}

impl PostMessageRequest {
    /// Validate request
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.is_empty() {
            return Err(crate::Error::Validation("Message id cannot be empty".into()));
        }
        if self.text.trim().is_empty() {
            return Err(crate::Error::Validation("Message text cannot be empty".into()));
        }
        if self.text.len() > 100_000 {
            return Err(crate::Error::Validation("Message text too long (max 100k chars)".into()));
        }
        Ok(())
    }
}

impl From<PostMessageRequest> for Message {
    fn from(req: PostMessageRequest) -> Self {
        Message {
            id: req.id,
            text: req.text,
            sender: req.sender,
            timestamp: req.timestamp,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub conversations: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Health status enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}
