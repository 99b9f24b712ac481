//! Style-rewrite client.
//!
//! Wraps the upstream chat-completion API: one call turns free text into the
//! four-key style mapping, either buffered ([`StyleClient::rewrite`]) or as a
//! live fragment stream ([`StyleClient::rewrite_stream`]). Upstream failures
//! are classified into [`RewriteError`] kinds here; the HTTP layer collapses
//! all of them into one generic response so no provider detail leaks out.

use crate::config::Settings;
use crate::models::StyleResult;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that rephrases text in different styles.";

fn user_prompt(text: &str) -> String {
    format!(
        "You rewrite the user's message in 4 styles.\n\
         Return ONLY a JSON object with keys: professional, casual, polite, social_media.\n\
         - Keep meaning faithful.\n\
         - One sentence per style unless needed.\n\
         - No emojis unless social_media.\n\
         User:\n\"\"\"{text}\"\"\""
    )
}

/// Failure modes of a rewrite call. Status codes and category names are kept
/// for logging only and are never surfaced to the HTTP caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("input text is empty")]
    EmptyInput,
    #[error("input text exceeds {0} characters")]
    TooLong(usize),
    #[error("upstream request timed out")]
    Timeout,
    #[error("could not reach the upstream provider")]
    Unreachable,
    #[error("upstream authentication failed")]
    AuthFailed,
    #[error("upstream provider throttled the request")]
    UpstreamThrottled,
    #[error("upstream rejected the request")]
    BadUpstreamRequest,
    #[error("upstream request failed with status {0}")]
    UpstreamError(u16),
    #[error("upstream returned an empty response")]
    EmptyUpstreamResponse,
    #[error("upstream returned an unparseable payload")]
    InvalidUpstreamPayload,
    #[error("unexpected upstream failure ({0})")]
    UnknownRewriteError(&'static str),
}

impl RewriteError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unreachable
        } else {
            Self::UnknownRewriteError(transport_category(&err))
        }
    }

    fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::AuthFailed,
            429 => Self::UpstreamThrottled,
            400 => Self::BadUpstreamRequest,
            code => Self::UpstreamError(code),
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unreachable)
    }
}

fn transport_category(err: &reqwest::Error) -> &'static str {
    if err.is_body() {
        "body"
    } else if err.is_decode() {
        "decode"
    } else if err.is_redirect() {
        "redirect"
    } else if err.is_builder() {
        "builder"
    } else {
        "request"
    }
}

// Parsed subset of the upstream completion envelope.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the upstream text-generation capability.
///
/// Constructed once at startup after configuration has been validated and
/// shared by reference through `AppState`; the inner `reqwest::Client` is
/// cheap to clone and already connection-pooled.
#[derive(Debug, Clone)]
pub struct StyleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
    max_text_length: usize,
}

impl StyleClient {
    pub fn new(http: reqwest::Client, settings: &Settings) -> Self {
        Self {
            http,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai_api_key.clone(),
            model: settings.openai_model.clone(),
            max_tokens: settings.max_tokens,
            max_retries: settings.openai_max_retries,
            max_text_length: settings.max_text_length,
        }
    }

    /// Rewrite `text` into the four styles, buffered.
    pub async fn rewrite(&self, text: &str) -> Result<StyleResult, RewriteError> {
        let cleaned = self.check_input(text)?;
        let response = self.send(&self.payload(&cleaned, false), false).await?;

        let body = response
            .bytes()
            .await
            .map_err(RewriteError::from_transport)?;
        let completion: ChatCompletion =
            serde_json::from_slice(&body).map_err(|_| RewriteError::InvalidUpstreamPayload)?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(RewriteError::EmptyUpstreamResponse);
        }

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|_| RewriteError::InvalidUpstreamPayload)?;
        Ok(StyleResult::from_value(&value))
    }

    /// Rewrite `text` as a live fragment stream.
    ///
    /// Fragments are the upstream's incremental content deltas, forwarded in
    /// arrival order without buffering or parsing; their concatenation is
    /// expected (not enforced) to be the serialized [`StyleResult`] JSON. The
    /// stream is finite and single-pass. A failure before the first fragment
    /// surfaces from this call; a mid-stream failure surfaces as an `Err`
    /// item. Dropping the stream abandons the upstream response.
    pub async fn rewrite_stream(
        &self,
        text: &str,
    ) -> Result<impl Stream<Item = Result<String, RewriteError>> + Send + 'static, RewriteError>
    {
        let cleaned = self.check_input(text)?;
        let response = self.send(&self.payload(&cleaned, true), true).await?;
        Ok(delta_stream(Box::pin(response.bytes_stream())))
    }

    /// Preconditions checked before any upstream call, in order.
    fn check_input(&self, text: &str) -> Result<String, RewriteError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RewriteError::EmptyInput);
        }
        if trimmed.chars().count() > self.max_text_length {
            return Err(RewriteError::TooLong(self.max_text_length));
        }
        Ok(trimmed.to_string())
    }

    fn payload(&self, text: &str, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(text)},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.7,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }

    /// Send the request, retrying transient transport failures with a short
    /// backoff up to the configured retry count. Non-success statuses are
    /// classified and never retried here.
    async fn send(
        &self,
        payload: &serde_json::Value,
        sse: bool,
    ) -> Result<reqwest::Response, RewriteError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut last_err = RewriteError::Unreachable;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
            }

            let mut request = self
                .http
                .post(&url)
                .header(http::header::CONTENT_TYPE, "application/json")
                .bearer_auth(&self.api_key)
                .json(payload);
            if sse {
                request = request.header(http::header::ACCEPT, "text/event-stream");
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(RewriteError::from_status(status));
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let mapped = RewriteError::from_transport(err);
                    if mapped.is_transient() && attempt < self.max_retries {
                        tracing::warn!(error = %mapped, attempt, "upstream send failed, retrying");
                        last_err = mapped;
                        continue;
                    }
                    return Err(mapped);
                }
            }
        }
        Err(last_err)
    }
}

/// Turn an upstream SSE byte stream into a stream of content deltas.
///
/// Each SSE event's `data` payload is parsed as a completion chunk and its
/// `choices[0].delta.content` forwarded when non-empty. The stream ends at
/// `[DONE]`, at upstream EOF, or after the first transport error.
fn delta_stream<S>(body: S) -> impl Stream<Item = Result<String, RewriteError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures_util::stream::unfold(
        (body, SseDecoder::default(), false),
        |(mut body, mut decoder, done)| async move {
            if done {
                return None;
            }
            loop {
                while let Some(data) = decoder.next_event() {
                    if data == "[DONE]" {
                        return None;
                    }
                    if let Some(delta) = delta_content(&data) {
                        return Some((Ok(delta), (body, decoder, false)));
                    }
                }
                match body.next().await {
                    Some(Ok(chunk)) => decoder.extend(&chunk),
                    Some(Err(err)) => {
                        return Some((
                            Err(RewriteError::from_transport(err)),
                            (body, decoder, true),
                        ))
                    }
                    None => return None,
                }
            }
        },
    )
}

fn delta_content(data: &str) -> Option<String> {
    serde_json::from_str::<StreamChunk>(data)
        .ok()?
        .choices
        .into_iter()
        .next()?
        .delta
        .content
        .filter(|content| !content.is_empty())
}

/// Incremental SSE event splitter. Accumulates raw bytes and yields one
/// joined `data` payload per blank-line-terminated event block.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    fn extend(&mut self, chunk: &[u8]) {
        // Normalize CRLF so event boundaries are always "\n\n"; payload JSON
        // escapes any carriage returns it carries.
        self.buf
            .push_str(&String::from_utf8_lossy(chunk).replace('\r', ""));
    }

    fn next_event(&mut self) -> Option<String> {
        loop {
            let end = self.buf.find("\n\n")?;
            let block: String = self.buf[..end].to_string();
            self.buf.drain(..end + 2);

            let data_lines: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
                .collect();
            if !data_lines.is_empty() {
                return Some(data_lines.join("\n"));
            }
            // Comment or keepalive block; keep scanning.
        }
    }
}
