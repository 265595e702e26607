use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Immutable crawl configuration (spec §3, §6). Constructed before a crawl
/// and never mutated; freely shared across the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub max_pages: usize,
    pub max_depth: u32,
    pub max_seconds: f64,
    pub max_concurrency: usize,
    pub request_timeout: f64,
    pub user_agent: String,
    pub include_query: bool,
    pub phone_regions: Option<Vec<String>>,
    pub email_domain_allowlist: Option<Vec<String>>,
    pub focused_crawling: bool,
    pub max_body_bytes: usize,
    pub max_links_per_page: usize,
    pub retry_total: u32,
    pub retry_backoff_factor: f64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_pages: 200,
            max_depth: 5,
            max_seconds: 30.0,
            max_concurrency: 4,
            request_timeout: 10.0,
            user_agent: "site-parser/0.1.0".to_string(),
            include_query: false,
            phone_regions: None,
            email_domain_allowlist: None,
            focused_crawling: true,
            max_body_bytes: 2_000_000,
            max_links_per_page: 200,
            retry_total: 2,
            retry_backoff_factor: 0.5,
            log_level: "INFO".to_string(),
        }
    }
}

/// Why a crawl stopped (spec §4.5, §6). Precedence on ties, when multiple
/// conditions could apply: `MaxSeconds`, `MaxPages`, `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    MaxPages,
    MaxSeconds,
}

/// The failure-reason vocabulary from spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    HttpStatus,
    ContentType,
    UrlNormalize,
    RequestError,
    FutureException,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::HttpStatus => "http_status",
            FailureReason::ContentType => "content_type",
            FailureReason::UrlNormalize => "url_normalize",
            FailureReason::RequestError => "request_error",
            FailureReason::FutureException => "future_exception",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Limits {
    pub max_pages: usize,
    pub max_depth: u32,
    pub max_seconds: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counters {
    pub scheduled_pages: usize,
    pub fetched_pages: usize,
    pub failed_pages: usize,
    pub processed_pages: usize,
    pub skipped_soup_parse: usize,
    pub discovered_urls: usize,
    pub links_examined: usize,
    pub links_enqueued: usize,
    pub frontier_remaining: usize,
    pub max_depth_reached: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContactsFound {
    pub emails: usize,
    pub phones: usize,
}

/// Per-run diagnostics (spec §3, §6). Always accumulated by the engine;
/// attached to `ParseResult` only when `include_diagnostics` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub stop_reason: StopReason,
    pub duration_seconds: f64,
    pub limits: Limits,
    pub counters: Counters,
    pub failure_reasons: BTreeMap<String, usize>,
    pub contacts_found: ContactsFound,
}

/// The result of one crawl (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub url: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.max_pages, 200);
        assert_eq!(c.max_depth, 5);
        assert_eq!(c.max_seconds, 30.0);
        assert_eq!(c.max_concurrency, 4);
        assert_eq!(c.request_timeout, 10.0);
        assert!(!c.include_query);
        assert!(c.phone_regions.is_none());
        assert!(c.email_domain_allowlist.is_none());
        assert!(c.focused_crawling);
        assert_eq!(c.max_body_bytes, 2_000_000);
        assert_eq!(c.max_links_per_page, 200);
        assert_eq!(c.retry_total, 2);
        assert_eq!(c.retry_backoff_factor, 0.5);
    }

    #[test]
    fn result_serializes_without_diagnostics_when_absent() {
        let result = ParseResult {
            url: "http://example.com".to_string(),
            emails: vec!["a@example.com".to_string()],
            phones: vec![],
            diagnostics: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("diagnostics").is_none());
    }
}
