//! The HTTP fetch pipeline (spec §4.4): GET with retry/backoff on transient
//! failures, streaming body capped at a byte budget, content-type gated,
//! producing a `(final_url, text, reason)` outcome per URL.

use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use sitecrawl_core::{Config, FailureReason};
use tracing::{debug, warn};

/// A successfully fetched, decoded page (spec §3 `FetchOutcome`).
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub text: String,
}

/// Either `{page}` or `{reason}` (spec §3) — never both.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub page: Option<FetchedPage>,
    pub reason: Option<FailureReason>,
}

impl FetchOutcome {
    fn ok(page: FetchedPage) -> Self {
        Self { page: Some(page), reason: None }
    }

    fn failed(reason: FailureReason) -> Self {
        Self { page: None, reason: Some(reason) }
    }

    pub fn is_ok(&self) -> bool {
        self.page.is_some()
    }
}

const TRANSIENT_STATUSES: &[u16] = &[429, 500, 502, 503, 504];
const ALLOWED_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "text/plain"];
const STREAM_CHUNK_HINT: usize = 16 * 1024;

fn is_transient(status: StatusCode) -> bool {
    TRANSIENT_STATUSES.contains(&status.as_u16())
}

fn is_allowed_content_type(content_type: &str) -> bool {
    let value = content_type.to_ascii_lowercase();
    if value.is_empty() {
        return true;
    }
    ALLOWED_CONTENT_TYPES.iter().any(|allowed| value.contains(allowed))
}

fn charset_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let part = part.trim();
        part.strip_prefix("charset=").map(|c| c.trim_matches('"').to_string())
    })
}

fn decode_body(bytes: &[u8], content_type: &str) -> String {
    let label = charset_of(content_type).unwrap_or_else(|| "utf-8".to_string());
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (text, _, _had_errors) = encoding.decode(bytes);
    text.into_owned()
}

/// Performs GETs for the crawl engine. Owns its own HTTP client state; safe
/// for concurrent invocation from the worker pool (spec §3 ownership note).
pub struct Fetcher {
    client: reqwest::Client,
    user_agent: String,
    max_body_bytes: usize,
    retry_total: u32,
    retry_backoff_factor: f64,
    include_query: bool,
}

impl Fetcher {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.request_timeout.max(0.0)))
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
            retry_total: config.retry_total,
            retry_backoff_factor: config.retry_backoff_factor,
            include_query: config.include_query,
        })
    }

    /// `fetch(url) -> FetchOutcome` (spec §4.4). Follows redirects; reports
    /// the final post-redirect URL, canonicalized, on success.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut attempt: u32 = 0;
        let response = loop {
            debug!(url, attempt, "HTTP GET");
            let sent = self
                .client
                .get(url)
                .header("User-Agent", &self.user_agent)
                .header("Accept", "text/html,application/xhtml+xml")
                .send()
                .await;

            match sent {
                Ok(response) => {
                    if is_transient(response.status()) && attempt < self.retry_total {
                        let delay = self.retry_backoff_factor * 2f64.powi(attempt as i32);
                        attempt += 1;
                        warn!(url, status = %response.status(), attempt, delay, "retrying transient status");
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                        continue;
                    }
                    break response;
                }
                Err(e) => {
                    warn!(url, error = %e, "request error");
                    return FetchOutcome::failed(FailureReason::RequestError);
                }
            }
        };

        if response.status().as_u16() >= 400 {
            debug!(url, status = %response.status(), "status gate rejected");
            return FetchOutcome::failed(FailureReason::HttpStatus);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_allowed_content_type(&content_type) {
            debug!(url, content_type, "content-type gate rejected");
            return FetchOutcome::failed(FailureReason::ContentType);
        }

        let final_url = match sitecrawl_core::canon::normalize(response.url().as_str(), self.include_query) {
            Ok(u) => u,
            Err(_) => return FetchOutcome::failed(FailureReason::UrlNormalize),
        };

        let body = match self.read_capped_body(response).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url, error = %e, "body read error");
                return FetchOutcome::failed(FailureReason::RequestError);
            }
        };

        let text = decode_body(&body, &content_type);
        FetchOutcome::ok(FetchedPage { final_url, text })
    }

    async fn read_capped_body(&self, response: reqwest::Response) -> reqwest::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(STREAM_CHUNK_HINT.min(self.max_body_bytes));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(&chunk);
            if buf.len() > self.max_body_bytes {
                break;
            }
        }
        buf.truncate(self.max_body_bytes);
        Ok(buf)
    }
}
