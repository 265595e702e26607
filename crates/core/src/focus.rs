//! Focus scorer (spec §4.2): `url -> int`, lower score dequeues first.
//!
//! Used only when focused crawling is enabled; pure function over the URL
//! string, no state, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").unwrap());

const KEYWORD_WEIGHTS: &[(&str, i64)] = &[
    ("contact", -50),
    ("contacts", -50),
    ("support", -40),
    ("help", -25),
    ("about", -20),
    ("impressum", -50),
    ("legal", -20),
    ("privacy", -20),
    ("policy", -15),
    ("terms", -15),
    ("faq", -10),
    ("feedback", -10),
    ("company", -5),
    ("team", -5),
    ("docs", 40),
    ("doc", 20),
    ("spec", 30),
    ("rfc", 40),
    ("archive", 30),
    ("blog", 20),
    ("news", 20),
    ("press", 20),
    ("media", 20),
    ("release", 10),
    ("releases", 10),
    ("changelog", 10),
    ("events", 10),
    ("jobs", 10),
    ("careers", 10),
];

const EXTENSION_WEIGHTS: &[(&str, i64)] = &[
    ("pdf", 250),
    ("zip", 300),
    ("7z", 300),
    ("rar", 300),
    ("tar", 300),
    ("gz", 300),
    ("bz2", 300),
    ("xz", 300),
    ("exe", 300),
    ("msi", 300),
    ("dmg", 300),
    ("iso", 300),
    ("png", 200),
    ("jpg", 200),
    ("jpeg", 200),
    ("gif", 200),
    ("webp", 200),
    ("svg", 100),
    ("ico", 100),
    ("css", 100),
    ("js", 100),
    ("json", 80),
    ("xml", 80),
    ("txt", 50),
    ("md", 50),
    ("rss", 80),
];

fn keyword_weight(token: &str) -> i64 {
    KEYWORD_WEIGHTS
        .iter()
        .find(|(k, _)| *k == token)
        .map(|(_, w)| *w)
        .unwrap_or(0)
}

fn extension_weight(ext: &str) -> i64 {
    EXTENSION_WEIGHTS
        .iter()
        .find(|(k, _)| *k == ext)
        .map(|(_, w)| *w)
        .unwrap_or(0)
}

/// Returns the priority of `url` for focused crawling (smaller is better).
///
/// The input is expected to already be canonical; malformed URLs score 0.
pub fn url_priority_score(url: &str) -> i64 {
    let Ok(parsed) = Url::parse(url) else {
        return 0;
    };
    let path = parsed.path().to_ascii_lowercase();
    let path = if path.is_empty() { "/".to_string() } else { path };
    let query = parsed.query().unwrap_or("").to_ascii_lowercase();

    let haystack = if query.is_empty() {
        path.clone()
    } else {
        format!("{path}?{query}")
    };
    let mut tokens: Vec<&str> = TOKEN_RE.find_iter(&haystack).map(|m| m.as_str()).collect();
    tokens.sort_unstable();
    tokens.dedup();

    let mut score: i64 = tokens.iter().map(|t| keyword_weight(t)).sum();

    if !query.is_empty() {
        score += 10;
    }

    let segments = path.split('/').filter(|s| !s.is_empty()).count() as i64;
    score += segments.min(10);

    if let Some(ext) = extension_of(&path) {
        score += extension_weight(&ext);
    }

    if path == "/" || path == "/index.html" || path == "/index.htm" {
        score -= 5;
    }

    score
}

fn extension_of(path: &str) -> Option<String> {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let dot = last_segment.rfind('.')?;
    let ext = &last_segment[dot + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
