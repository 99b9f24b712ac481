//! Shared helpers: tracing/env init, bind address, CORS, error responses,
//! and the application state handed to every handler.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Settings;
use crate::llm::StyleClient;
use crate::models::ContentFilter;
use crate::rate_limit::RateLimiter;

/// Initialize dotenv and structured tracing based on RUST_LOG.
///
/// Supports an explicit env file path via ENV_FILE, falling back to default
/// `.env` discovery in the working directory. Logs the source used.
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    if let Ok(path) = std::env::var("ENV_FILE") {
        let path = path.trim();
        if !path.is_empty()
            && std::path::Path::new(path).is_file()
            && dotenvy::from_filename(path).is_ok()
        {
            env_source = format!("{path} (ENV_FILE)");
        }
    }
    if env_source == "none" && dotenvy::dotenv().is_ok() {
        env_source = ".env".into();
    }

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Get the bind address for the HTTP server from env or default to 0.0.0.0:8000.
pub fn env_bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into())
}

/// Shared application state used by the HTTP server and handlers.
///
/// Everything here is constructed once at startup, after configuration has
/// been validated, and shared through an `Arc`; there are no lazily
/// initialized globals.
pub struct AppState {
    pub settings: Settings,
    pub llm: StyleClient,
    pub limiter: RateLimiter,
    pub filter: ContentFilter,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Self {
        let http = build_http_client(&settings);
        Self {
            llm: StyleClient::new(http, &settings),
            limiter: RateLimiter::new(
                settings.rate_limit_per_minute,
                settings.rate_limit_per_hour,
            ),
            filter: ContentFilter::default(),
            settings,
        }
    }
}

/// Build the upstream HTTP client with the configured request timeout.
pub fn build_http_client(settings: &Settings) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(settings.openai_timeout)
        .user_agent(format!("restyle/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Build a JSON error response with the given HTTP status and detail message.
pub fn error_response(status: StatusCode, detail: &str) -> Response {
    let body = serde_json::json!({ "detail": detail });
    (status, axum::Json(body)).into_response()
}

/// Build a CORS layer from environment variables.
///
/// `CORS_ORIGINS` is "*" or a comma-separated origin list. The wildcard form
/// cannot carry credentials (the browser rejects that combination), so
/// credentials are only enabled for an explicit origin list.
pub fn cors_layer_from_env() -> tower_http::cors::CorsLayer {
    use http::Method;
    use tower_http::cors::{AllowOrigin, Any, CorsLayer};

    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let origins = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into());
    let origins = origins.trim();
    if origins == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let values: Vec<http::HeaderValue> = origins
        .split(',')
        .filter_map(|part| http::HeaderValue::from_str(part.trim()).ok())
        .collect();
    if values.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    // Credentialed CORS cannot use wildcards anywhere, so name the headers.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods(methods)
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(true)
}
