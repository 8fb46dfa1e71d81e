use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{Value, json};

use repkit_core::providers::resolve_identity;
use repkit_mcp_runtime::{MCP_SERVER_NAME, SESSION_HEADER};

use crate::state::AppState;

const MCP_PATH: &str = "/mcp";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route(MCP_PATH, post(mcp_post).get(mcp_get).delete(mcp_delete))
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "ok": true,
        "name": MCP_SERVER_NAME,
        "transport": "streamable-http",
        "hint": "Use /mcp. Pass Authorization: Bearer demo_user (or user_123)."
    }))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // Identity resolution never fails; unknown credentials become the demo
    // identity.
    let identity = resolve_identity(
        bearer_token(&headers).as_deref(),
        state.providers.profiles.as_ref(),
    );

    let token = header_value(&headers, SESSION_HEADER);
    let (handlers, created) =
        state
            .registry
            .lookup_or_create(token.as_deref(), &identity, &state.providers, &state.ids);
    let session = handlers.session().clone();

    if created {
        tracing::info!(
            event = "mcp_session_created",
            session_id = %session.id(),
            user = %identity,
            "MCP session created"
        );
    } else if session.rebind(&identity) {
        // Clients may switch credentials between calls on the same session.
        tracing::info!(
            event = "mcp_session_rebound",
            session_id = %session.id(),
            user = %identity,
            "MCP session identity updated"
        );
    }

    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            let response = (
                StatusCode::OK,
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": "Parse error"
                    }
                })),
            )
                .into_response();
            return with_session_header(response, session.id());
        }
    };

    let responses = handlers.handle_incoming_message(incoming).await;

    let response = if responses.is_empty() {
        StatusCode::ACCEPTED.into_response()
    } else if responses.len() == 1 {
        (
            StatusCode::OK,
            Json(responses.into_iter().next().unwrap_or(Value::Null)),
        )
            .into_response()
    } else {
        (StatusCode::OK, Json(Value::Array(responses))).into_response()
    };
    with_session_header(response, session.id())
}

async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = header_value(&headers, SESSION_HEADER).filter(|t| !t.trim().is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "missing_session_id",
                "message": format!("The '{SESSION_HEADER}' header is required to delete a session.")
            })),
        )
            .into_response();
    };

    if state.registry.delete(&token) {
        tracing::info!(
            event = "mcp_session_deleted",
            session_id = %token,
            "MCP session deleted"
        );
    } else {
        // Unknown token: successful no-op, not an error.
        tracing::debug!(
            event = "mcp_session_delete_noop",
            session_id = %token,
            "Delete for unknown session id"
        );
    }
    StatusCode::NO_CONTENT.into_response()
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = raw.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn header_value(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}
