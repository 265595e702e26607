//! The crawl engine (spec §4.5): drives the frontier, the fetcher and the
//! extractor to completion, owning all mutable crawl state itself. No part
//! of this module is shared across tasks — only the spawned fetches run
//! concurrently, and they return their result rather than touch shared state.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sitecrawl_core::{
    canon, focus, Config, ContactsFound, Counters, Diagnostics, FailureReason, Limits,
    ParseResult, StopReason, UrlError,
};
use sitecrawl_fetcher::{FetchOutcome, Fetcher};
use sitecrawl_frontier::{DiscoveredSet, Frontier};
use sitecrawl_parser::ExtractOptions;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// Errors that abort a crawl before or during setup (spec §7: "the initial
/// `start_url` failing to canonicalize is fatal").
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid start URL: {0}")]
    InvalidStartUrl(UrlError),

    #[error("failed to initialize HTTP client: {0}")]
    ClientInit(#[from] reqwest::Error),

    #[error("internal URL error: {0}")]
    Internal(UrlError),
}

struct TaskOutcome {
    url: String,
    depth: u32,
    outcome: FetchOutcome,
}

fn priority_for(url: &str, config: &Config) -> i64 {
    if config.focused_crawling {
        focus::url_priority_score(url)
    } else {
        0
    }
}

/// Parses `html` into contacts and links, isolating any parser panic
/// (spec §7: "HTML that the parser cannot handle is counted, not fatal").
fn try_extract(html: &str, opts: &ExtractOptions) -> Option<sitecrawl_parser::Extracted> {
    std::panic::catch_unwind(AssertUnwindSafe(|| {
        let document = scraper::Html::parse_document(html);
        let text = sitecrawl_parser::visible_text(&document);
        sitecrawl_parser::extract(html, &text, opts)
    }))
    .ok()
}

/// Crawls a single origin starting from `start_url`, returning validated
/// contacts and, when requested, the run's diagnostics (spec §3, §4.5, §6).
pub async fn parse(
    start_url: &str,
    config: &Config,
    include_diagnostics: bool,
) -> Result<ParseResult, EngineError> {
    let started_at = Instant::now();

    let normalized_start =
        canon::normalize(start_url, config.include_query).map_err(EngineError::InvalidStartUrl)?;
    let mut base_hostname =
        canon::hostname_key(&normalized_start).map_err(EngineError::InvalidStartUrl)?;

    info!(start_url = %normalized_start, "starting crawl");

    let inferred_regions = config.phone_regions.is_none();
    let mut phone_regions: Vec<String> = match &config.phone_regions {
        Some(regions) => regions
            .iter()
            .filter(|r| !r.eq_ignore_ascii_case(canon::ZZ))
            .cloned()
            .collect(),
        None => {
            let inferred = canon::infer_phone_region(&normalized_start);
            if inferred == canon::ZZ {
                Vec::new()
            } else {
                vec![inferred]
            }
        }
    };

    let deadline = started_at + Duration::from_secs_f64(config.max_seconds.max(0.0));
    let max_concurrency = config.max_concurrency.max(1);
    let fetcher = Arc::new(Fetcher::new(config)?);

    let mut frontier = Frontier::new();
    let mut discovered = DiscoveredSet::new();
    discovered.insert(normalized_start.clone());
    frontier.push(priority_for(&normalized_start, config), 0, normalized_start.clone());

    let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
    let mut effective_start = normalized_start.clone();
    let mut effective_start_adopted = false;

    let mut scheduled = 0usize;
    let mut fetched_ok = 0usize;
    let mut fetched_failed = 0usize;
    let mut processed_pages = 0usize;
    let mut skipped_soup_parse = 0usize;
    let mut links_examined = 0usize;
    let mut links_enqueued = 0usize;
    let mut max_depth_reached: u32 = 0;
    let mut failure_reasons: BTreeMap<String, usize> = BTreeMap::new();
    let mut emails: BTreeSet<String> = BTreeSet::new();
    let mut phones: BTreeSet<String> = BTreeSet::new();
    let mut stop_reason = StopReason::Completed;

    'outer: loop {
        if Instant::now() > deadline {
            stop_reason = StopReason::MaxSeconds;
            break;
        }

        while !frontier.is_empty() && join_set.len() < max_concurrency && scheduled < config.max_pages {
            let item = frontier.pop().expect("frontier checked non-empty");
            let fetcher = Arc::clone(&fetcher);
            let url = item.url;
            let depth = item.depth;
            join_set.spawn(async move {
                let outcome = fetcher.fetch(&url).await;
                TaskOutcome { url, depth, outcome }
            });
            scheduled += 1;
        }

        if join_set.is_empty() {
            if !frontier.is_empty() && scheduled >= config.max_pages {
                stop_reason = StopReason::MaxPages;
            }
            break;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let mut completed = Vec::new();

        match tokio::time::timeout(remaining, join_set.join_next()).await {
            Ok(Some(Ok(task))) => completed.push(task),
            Ok(Some(Err(_join_error))) => {
                fetched_failed += 1;
                *failure_reasons.entry(FailureReason::FutureException.as_str().to_string()).or_insert(0) += 1;
            }
            Ok(None) => break 'outer,
            Err(_elapsed) => {
                stop_reason = StopReason::MaxSeconds;
                break 'outer;
            }
        }

        while let Some(result) = join_set.try_join_next() {
            match result {
                Ok(task) => completed.push(task),
                Err(_join_error) => {
                    fetched_failed += 1;
                    *failure_reasons.entry(FailureReason::FutureException.as_str().to_string()).or_insert(0) += 1;
                }
            }
        }

        for task in completed {
            max_depth_reached = max_depth_reached.max(task.depth);

            let page = match task.outcome.page {
                Some(page) => page,
                None => {
                    fetched_failed += 1;
                    if let Some(reason) = task.outcome.reason {
                        *failure_reasons.entry(reason.as_str().to_string()).or_insert(0) += 1;
                    }
                    continue;
                }
            };
            fetched_ok += 1;

            if !effective_start_adopted && task.url == normalized_start {
                effective_start = page.final_url.clone();
                if let Ok(key) = canon::hostname_key(&effective_start) {
                    base_hostname = key;
                }
                if inferred_regions {
                    let inferred = canon::infer_phone_region(&effective_start);
                    phone_regions = if inferred == canon::ZZ { Vec::new() } else { vec![inferred] };
                }
                effective_start_adopted = true;
                debug!(effective_start = %effective_start, "adopted redirect target as crawl origin");
            }

            let opts = ExtractOptions {
                phone_regions: phone_regions.clone(),
                email_allowlist: config.email_domain_allowlist.clone(),
                max_links_per_page: config.max_links_per_page,
            };
            let Some(extracted) = try_extract(&page.text, &opts) else {
                skipped_soup_parse += 1;
                warn!(url = %task.url, "HTML parse failed, skipping page");
                continue;
            };
            processed_pages += 1;
            emails.extend(extracted.emails);
            phones.extend(extracted.phones);

            if task.depth >= config.max_depth {
                continue;
            }

            let mut candidates = Vec::new();
            for href in &extracted.links {
                links_examined += 1;
                let Ok(base) = Url::parse(&page.final_url) else { continue };
                let Ok(absolute) = base.join(href) else { continue };
                let Ok(normalized) = canon::normalize(absolute.as_str(), config.include_query) else { continue };
                if !canon::is_same_domain(&normalized, &base_hostname) {
                    continue;
                }
                if discovered.contains(&normalized) {
                    continue;
                }
                candidates.push(normalized);
            }

            if config.focused_crawling {
                candidates.sort_by_key(|u| focus::url_priority_score(u));
            }

            for candidate in candidates {
                if discovered.len() >= config.max_pages {
                    break;
                }
                if discovered.insert(candidate.clone()) {
                    links_enqueued += 1;
                    frontier.push(priority_for(&candidate, config), task.depth + 1, candidate);
                }
            }
        }
    }

    if stop_reason == StopReason::Completed
        && !frontier.is_empty()
        && join_set.is_empty()
        && scheduled >= config.max_pages
    {
        stop_reason = StopReason::MaxPages;
    }

    let url = canon::origin(&effective_start).map_err(EngineError::Internal)?;
    let duration_seconds = started_at.elapsed().as_secs_f64();

    info!(
        emails = emails.len(),
        phones = phones.len(),
        pages = fetched_ok,
        duration_seconds,
        ?stop_reason,
        "crawl finished"
    );

    let diagnostics = include_diagnostics.then(|| Diagnostics {
        stop_reason,
        duration_seconds,
        limits: Limits {
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            max_seconds: config.max_seconds,
        },
        counters: Counters {
            scheduled_pages: scheduled,
            fetched_pages: fetched_ok,
            failed_pages: fetched_failed,
            processed_pages,
            skipped_soup_parse,
            discovered_urls: discovered.len(),
            links_examined,
            links_enqueued,
            frontier_remaining: frontier.len(),
            max_depth_reached,
        },
        failure_reasons,
        contacts_found: ContactsFound { emails: emails.len(), phones: phones.len() },
    });

    Ok(ParseResult {
        url,
        emails: emails.into_iter().collect(),
        phones: phones.into_iter().collect(),
        diagnostics,
    })
}

/// Blocking convenience wrapper for non-async callers (the CLI binary owns
/// its own runtime and calls [`parse`] directly instead).
pub fn parse_blocking(
    start_url: &str,
    config: &Config,
    include_diagnostics: bool,
) -> anyhow::Result<ParseResult> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    Ok(runtime.block_on(parse(start_url, config, include_diagnostics))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Config {
        Config {
            max_pages: 50,
            max_depth: 5,
            max_seconds: 5.0,
            max_concurrency: 4,
            request_timeout: 2.0,
            retry_total: 0,
            focused_crawling: false,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn crawls_two_linked_pages_and_collects_contacts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>Home root@example.com <a href="/contact">contact</a></body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>Call +1 415 555 2671</body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;

        let result = parse(&server.uri(), &config(), true).await.unwrap();
        assert!(result.emails.contains(&"root@example.com".to_string()));
        assert!(result.phones.iter().any(|p| p == "+14155552671"));
        let diagnostics = result.diagnostics.unwrap();
        assert_eq!(diagnostics.stop_reason, StopReason::Completed);
        assert_eq!(diagnostics.counters.processed_pages, 2);
    }

    #[tokio::test]
    async fn does_not_follow_links_to_other_hosts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><a href="http://other.example/page">away</a></body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;

        let result = parse(&server.uri(), &config(), true).await.unwrap();
        let diagnostics = result.diagnostics.unwrap();
        assert_eq!(diagnostics.counters.links_enqueued, 0);
    }

    #[tokio::test]
    async fn rejects_an_unparseable_start_url() {
        let err = parse("not a url", &config(), false).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidStartUrl(_)));
    }

    #[tokio::test]
    async fn stops_at_max_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><a href="/a">a</a><a href="/b">b</a><a href="/c">c</a></body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;
        for p in ["/a", "/b", "/c"] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>leaf</body></html>").insert_header("Content-Type", "text/html"))
                .mount(&server)
                .await;
        }

        let mut cfg = config();
        cfg.max_pages = 2;
        let result = parse(&server.uri(), &cfg, true).await.unwrap();
        let diagnostics = result.diagnostics.unwrap();
        assert_eq!(diagnostics.stop_reason, StopReason::MaxPages);
    }

    #[tokio::test]
    async fn focused_crawling_reaches_contact_before_docs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><a href="/docs">docs</a><a href="/contact">contact</a></body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>root@example.com</body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>nope@example.com</body></html>"#,
            ).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;

        let mut focused = config();
        focused.max_pages = 2;
        focused.max_depth = 1;
        focused.focused_crawling = true;
        let result = parse(&server.uri(), &focused, false).await.unwrap();
        assert!(result.emails.contains(&"root@example.com".to_string()));
        assert!(!result.emails.contains(&"nope@example.com".to_string()));

        let mut unfocused = config();
        unfocused.max_pages = 2;
        unfocused.max_depth = 1;
        unfocused.focused_crawling = false;
        let result = parse(&server.uri(), &unfocused, false).await.unwrap();
        assert!(!result.emails.contains(&"root@example.com".to_string()));
        assert!(result.emails.contains(&"nope@example.com".to_string()));
    }
}
