use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::models::ModelAliases;
use crate::relay;
use crate::translate::request::translate;
use crate::translate::types::{ChatBody, PromptQuery};
use crate::translate::{ChatInput, RelayMode};
use crate::upstream::{self, UpstreamInvoker};
use crate::user_agent::UserAgentSource;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub aliases: ModelAliases,
    pub user_agents: Arc<dyn UserAgentSource>,
    pub upstream: UpstreamInvoker,
}

impl AppState {
    /// Everything a handler needs, derived once from the config.
    pub fn from_config(config: ProxyConfig) -> Result<Self> {
        let client = upstream::build_client(&config.upstream)?;
        let user_agents = Arc::new(config.user_agent_pool()?);
        Ok(Self {
            aliases: config.aliases(),
            upstream: UpstreamInvoker::new(client, config.upstream.url.clone()),
            user_agents,
            config,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", entry(post(handle_stream)))
        .route("/v1/chat/completions", entry(post(handle_stream)))
        .route(
            "/api/chat",
            entry(get(handle_chat_query).post(handle_chat_body)),
        )
        .route("/chat", entry(get(handle_alias).post(handle_alias)))
        .route(
            "/chat/*model",
            entry(get(handle_alias_path).post(handle_alias_path)),
        )
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Every proxy entry point answers `OPTIONS` and rejects unknown methods with JSON.
fn entry(methods: MethodRouter<Arc<AppState>>) -> MethodRouter<Arc<AppState>> {
    methods
        .options(handle_preflight)
        .fallback(handle_method_not_allowed)
}

async fn handle_preflight() -> StatusCode {
    StatusCode::OK
}

async fn handle_method_not_allowed() -> ProxyError {
    ProxyError::MethodNotAllowed
}

/// `POST /api`: body in, upstream SSE out.
async fn handle_stream(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let request_id = Uuid::new_v4();
    let body = parse_body(&body)?;
    let payload = translate(
        ChatInput::Body(body),
        RelayMode::Passthrough,
        &state.aliases,
        &state.config.defaults,
    )?;

    info!(
        %request_id,
        mode = RelayMode::Passthrough.as_str(),
        model = %payload.model,
        messages = payload.messages.len(),
        "Proxying"
    );

    let response = state
        .upstream
        .invoke(&payload, state.user_agents.as_ref())
        .await?;
    relay::passthrough(response, request_id)
}

/// `GET /api/chat?model=..&prompt=..`
async fn handle_chat_query(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PromptQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| ProxyError::validation(e.body_text()))?;
    assembled(&state, ChatInput::Prompt(query)).await
}

/// `POST /api/chat` with `{model?, messages}`.
async fn handle_chat_body(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let body = parse_body(&body)?;
    assembled(&state, ChatInput::Body(body)).await
}

async fn assembled(state: &AppState, input: ChatInput) -> Result<Response> {
    let request_id = Uuid::new_v4();
    let payload = translate(
        input,
        RelayMode::Assembled,
        &state.aliases,
        &state.config.defaults,
    )?;

    info!(
        %request_id,
        mode = RelayMode::Assembled.as_str(),
        model = %payload.model,
        "Proxying"
    );

    let reply = relay::with_deadline(state.config.upstream.request_timeout(), async {
        let response = state
            .upstream
            .invoke(&payload, state.user_agents.as_ref())
            .await?;
        relay::assembled(response, &payload.model, &state.config.upstream.provider_label).await
    })
    .await?;

    info!(%request_id, chars = reply.content.chars().count(), "Assembled reply");
    Ok(Json(reply).into_response())
}

/// `GET|POST /chat?model=<alias>&prompt=..`
async fn handle_alias(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PromptQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| ProxyError::validation(e.body_text()))?;
    single_shot(&state, query).await
}

/// `GET|POST /chat/<alias>?prompt=..`; a `model` query parameter wins over the path.
/// The path may hold a full upstream id such as `deepseek-ai/DeepSeek-V3.1`.
async fn handle_alias_path(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    query: std::result::Result<Query<PromptQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(mut query) = query.map_err(|e| ProxyError::validation(e.body_text()))?;
    if query.model.as_deref().map_or(true, str::is_empty) {
        query.model = Some(model.trim_start_matches('/').to_string());
    }
    single_shot(&state, query).await
}

async fn single_shot(state: &AppState, mut query: PromptQuery) -> Result<Response> {
    let request_id = Uuid::new_v4();
    if query.model.as_deref().map_or(true, str::is_empty) {
        query.model = Some(state.config.defaults.alias.clone());
    }

    let payload = translate(
        ChatInput::Prompt(query),
        RelayMode::SingleShot,
        &state.aliases,
        &state.config.defaults,
    )?;

    info!(
        %request_id,
        mode = RelayMode::SingleShot.as_str(),
        model = %payload.model,
        "Proxying"
    );

    let reply = relay::with_deadline(state.config.upstream.request_timeout(), async {
        let response = state
            .upstream
            .invoke(&payload, state.user_agents.as_ref())
            .await?;
        relay::single_shot(response, &payload.model).await
    })
    .await?;

    Ok(Json(reply).into_response())
}

fn parse_body(body: &[u8]) -> Result<ChatBody> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ChatBody::default());
    }
    serde_json::from_slice(body).map_err(|e| ProxyError::InvalidBody(e.to_string()))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models: Vec<serde_json::Value> = state
        .aliases
        .iter()
        .map(|(alias, target)| {
            serde_json::json!({
                "id": alias,
                "object": "model",
                "target": target,
                "owned_by": "deepinfra",
            })
        })
        .collect();

    Json(serde_json::json!({ "data": models, "object": "list" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_body_has_no_messages() {
        let body = parse_body(b"  \n").unwrap();
        assert!(body.messages.is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_body(b"{not json").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().error, "Invalid JSON body");
    }

    #[test]
    fn test_parse_body_with_messages() {
        let body = parse_body(br#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert_eq!(body.messages.map(|m| m.len()), Some(1));
        assert!(body.model.is_none());
    }
}
