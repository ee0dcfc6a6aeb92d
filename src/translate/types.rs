//! Wire types for the upstream's OpenAI-style chat completions API and for the
//! proxy's own request and reply shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Caller input
// ---------------------------------------------------------------------------

/// Roles of the messages the proxy writes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// A message synthesized from a prompt. Caller-supplied messages are never
/// parsed into this; they travel as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<ChatMessage> for Value {
    fn from(msg: ChatMessage) -> Self {
        json!({ "role": msg.role.as_str(), "content": msg.content })
    }
}

/// JSON body accepted by the body-mode entry points.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub model: Option<String>,
    /// Forwarded verbatim; any role or content shape the upstream accepts.
    #[serde(default)]
    pub messages: Option<Vec<Value>>,
}

/// Query string accepted by the prompt-mode entry points.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptQuery {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

// ---------------------------------------------------------------------------
// Upstream request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamPayload {
    pub model: String,
    pub messages: Vec<Value>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

// ---------------------------------------------------------------------------
// Proxy replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMeta {
    pub provider: String,
    pub user_agent_used: String,
}

/// Reply of the assembled (stream-to-JSON) mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledReply {
    pub status: String,
    pub model: String,
    pub content: String,
    pub meta: ReplyMeta,
}

impl AssembledReply {
    pub fn success(model: impl Into<String>, content: String, provider: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            model: model.into(),
            content,
            meta: ReplyMeta {
                provider: provider.into(),
                user_agent_used: "Hidden".to_string(),
            },
        }
    }
}

/// Reply of the alias single-shot mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleShotReply {
    pub status: String,
    pub model: String,
    pub reply: String,
    pub raw: Value,
}

impl SingleShotReply {
    /// Pull `choices[0].message.content` out of a raw completion.
    pub fn from_raw(model: impl Into<String>, raw: Value) -> Self {
        let reply = raw
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            status: "success".to_string(),
            model: model.into(),
            reply,
            raw,
        }
    }
}
