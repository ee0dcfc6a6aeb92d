//! Normalise caller input into the upstream chat-completions payload.

use super::types::{ChatBody, ChatMessage, PromptQuery, Role, StreamOptions, UpstreamPayload};
use crate::config::DefaultsConfig;
use crate::error::{ProxyError, Result};
use crate::models::ModelAliases;

pub const PROMPT_USAGE: &str = "?model=<alias-or-model-id>&prompt=<text>";

/// How the upstream reply is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Upstream SSE piped straight through.
    Passthrough,
    /// Upstream SSE assembled into one JSON reply.
    Assembled,
    /// Non-streamed upstream completion, unwrapped into one JSON reply.
    SingleShot,
}

impl RelayMode {
    /// Whether the upstream is asked to stream. Fixed by the mode, never by the caller.
    pub fn upstream_streams(self) -> bool {
        !matches!(self, Self::SingleShot)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Assembled => "assembled",
            Self::SingleShot => "single-shot",
        }
    }
}

/// The two shapes callers can send.
#[derive(Debug, Clone)]
pub enum ChatInput {
    Body(ChatBody),
    Prompt(PromptQuery),
}

/// Build the upstream payload for `input` under `mode`.
pub fn translate(
    input: ChatInput,
    mode: RelayMode,
    aliases: &ModelAliases,
    defaults: &DefaultsConfig,
) -> Result<UpstreamPayload> {
    let (model, messages) = match input {
        ChatInput::Body(body) => {
            let messages = body
                .messages
                .filter(|m| !m.is_empty())
                .ok_or_else(|| ProxyError::validation("messages array required"))?;
            let model = non_empty(body.model).unwrap_or_else(|| defaults.model.clone());
            (model, messages)
        }
        ChatInput::Prompt(query) => {
            let (Some(model), Some(prompt)) = (non_empty(query.model), non_empty(query.prompt))
            else {
                return Err(ProxyError::validation_with_usage(
                    "missing parameters",
                    PROMPT_USAGE,
                ));
            };
            let messages = vec![
                ChatMessage::new(Role::System, defaults.system_prompt.clone()).into(),
                ChatMessage::new(Role::User, prompt).into(),
            ];
            (aliases.resolve(&model).to_string(), messages)
        }
    };

    let stream = mode.upstream_streams();
    let stream_options = (mode == RelayMode::SingleShot).then_some(StreamOptions {
        include_usage: true,
    });

    Ok(UpstreamPayload {
        model,
        messages,
        stream,
        stream_options,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
