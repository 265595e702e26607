//! E-mail candidate discovery and validation (spec §4.3).

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

static TEXT_EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

static EMAIL_FULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<local>[A-Za-z0-9._%+-]+)@(?P<domain>[A-Za-z0-9.-]+\.[A-Za-z]{2,})$").unwrap()
});

/// Candidate e-mails found by the free-text regex, with surrounding
/// punctuation trimmed (spec §4.3.1).
pub fn candidates_from_text(text: &str) -> Vec<String> {
    TEXT_EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_matches(|c| ".,;:()[]<>\"'".contains(c)).to_string())
        .collect()
}

/// Parses a `mailto:` href into its first address (spec §4.3.2).
pub fn parse_mailto(href: &str) -> Option<String> {
    let raw = href.splitn(2, ':').nth(1)?;
    let raw = raw.split('?').next().unwrap_or("");
    let decoded = percent_decode_str(raw).decode_utf8_lossy().to_string();
    let first = decoded.split(',').next().unwrap_or("").trim().to_string();
    if first.is_empty() {
        None
    } else {
        Some(first)
    }
}

/// Validates an e-mail candidate (RFC-5321-ish local/domain syntax) and
/// returns its lowercased canonical form, or `None` if invalid.
pub fn validate(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let caps = EMAIL_FULL_RE.captures(trimmed)?;
    let local = &caps["local"];
    let domain = &caps["domain"];

    if local.is_empty() || local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return None;
    }
    if domain.contains("..") || domain.starts_with('.') || domain.starts_with('-') || domain.ends_with('-') {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

/// True if `domain` matches one of the allowlist suffixes exactly, or ends
/// with `.` + suffix (spec §4.3).
pub fn domain_allowed(email: &str, allowlist: &[String]) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    allowlist
        .iter()
        .any(|suffix| domain == suffix.as_str() || domain.ends_with(&format!(".{suffix}")))
}
