#![forbid(unsafe_code)]
#![doc = r#"
Restyle

A small HTTP facade over a chat-completion upstream: it takes free text and
rewrites it in four fixed styles (professional, casual, polite, social_media),
either as one JSON document or as an incrementally streamed sequence of
fragments.

Crate highlights
- `llm::StyleClient`: unary and streaming rewrite calls against the upstream,
  with a stable `RewriteError` taxonomy that never leaks provider detail.
- `rate_limit::RateLimiter`: per-client sliding-window admission over a
  minute and an hour horizon, process-local and in-memory.
- HTTP server (in `server`): `/rephrase` and `/rephrase-stream`, also mounted
  under `/api/v1`.

Modules
- `config`: environment-derived settings; a missing upstream credential is
  fatal at startup.
- `models`: request/response payloads, input validation, content filter.
- `rate_limit`: sliding-window admission control.
- `client_ip`: caller-identity resolution from proxy headers or peer address.
- `llm`: the style-rewrite client.
- `server`: axum router and handlers.
- `util`: tracing/env init, CORS, error responses, shared `AppState`.
"#]

pub mod client_ip;
pub mod config;
pub mod llm;
pub mod models;
pub mod rate_limit;
pub mod server;
pub mod util;

// Re-export the types most downstream users need.
pub use crate::config::{ConfigError, Settings};
pub use crate::llm::{RewriteError, StyleClient};
pub use crate::models::{ContentFilter, RephraseRequest, StyleResult, ValidationError};
pub use crate::rate_limit::RateLimiter;
pub use crate::server::build_router;
pub use crate::util::AppState;
