//! Axum router and request handlers.
//!
//! Both rephrase entry points follow the same gate: validate the body (422,
//! before any quota is consumed), resolve the caller identity, check
//! admission (429), then invoke the style client. Every [`RewriteError`] kind
//! collapses to the same 500 body so upstream detail never reaches the
//! caller.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use http::{header, HeaderMap, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::client_ip;
use crate::models::RephraseRequest;
use crate::util::{cors_layer_from_env, error_response, AppState};

const RATE_LIMIT_DETAIL: &str = "Rate limit exceeded. Please try again later.";
const REWRITE_FAILED_DETAIL: &str = "LLM call failed";

/// Build the router: rephrase endpoints plus health/status scaffolding,
/// mounted at the root and under `/api/v1`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/rephrase", post(rephrase).options(preflight))
        .route("/rephrase-stream", post(rephrase_stream).options(preflight))
        .with_state(state);

    Router::new()
        .merge(api.clone())
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer_from_env())
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "environment": state.settings.environment,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Operational summary, feature-flag style.
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "restyle",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.settings.environment,
        "model": state.settings.openai_model,
        "max_text_length": state.settings.max_text_length,
        "rate_limit": {
            "per_minute": state.settings.rate_limit_per_minute,
            "per_hour": state.settings.rate_limit_per_hour,
        },
        "routes": ["/health", "/status", "/rephrase", "/rephrase-stream"],
    }))
}

/// CORS preflight passthrough; the actual header negotiation is done by the
/// CORS layer.
async fn preflight() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "OK" }))
}

/// Unary rephrase: buffered JSON with all four styles.
async fn rephrase(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<RephraseRequest>,
) -> Response {
    let text = match body.validate(state.settings.max_text_length, &state.filter) {
        Ok(text) => text,
        Err(err) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string()),
    };

    let client = client_ip::resolve(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    if !state.limiter.admit(&client) {
        return error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_DETAIL);
    }

    match state.llm.rewrite(&text).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            tracing::error!(client = %client, error = %err, "rewrite failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, REWRITE_FAILED_DETAIL)
        }
    }
}

/// Streaming rephrase: each upstream fragment is flushed as one
/// `data: <fragment>` SSE line.
///
/// A failure before the first fragment still yields a clean 500. A mid-stream
/// failure is logged and the chunked body simply ends; by then the 200 status
/// line is already on the wire, and a trailing error frame would corrupt the
/// JSON the client is reassembling from the fragments.
async fn rephrase_stream(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<RephraseRequest>,
) -> Response {
    let text = match body.validate(state.settings.max_text_length, &state.filter) {
        Ok(text) => text,
        Err(err) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string()),
    };

    let client = client_ip::resolve(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    if !state.limiter.admit(&client) {
        return error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_DETAIL);
    }

    let fragments = match state.llm.rewrite_stream(&text).await {
        Ok(fragments) => fragments,
        Err(err) => {
            tracing::error!(client = %client, error = %err, "rewrite stream failed to start");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, REWRITE_FAILED_DETAIL);
        }
    };

    let events = fragments.scan((), move |_, item| {
        futures_util::future::ready(match item {
            Ok(fragment) => Some(Ok::<_, Infallible>(Bytes::from(format!(
                "data: {fragment}\n\n"
            )))),
            Err(err) => {
                tracing::warn!(client = %client, error = %err, "stream interrupted mid-response");
                None
            }
        })
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(events))
        .unwrap()
}
