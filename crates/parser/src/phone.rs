//! Phone-number candidate discovery and E.164 validation (spec §4.3).

use std::collections::BTreeSet;
use std::str::FromStr;

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use phonenumber::country;
use regex::Regex;

/// Phone-number-shaped substrings in free text: an optional leading `+`,
/// then digits/spaces/parens/dashes/dots, anchored so it isn't a fragment
/// of a longer digit run.
static CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d+])(\+?\d[\d\s().-]{5,18}\d)").unwrap());

static IDD_CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d+])((?:00|011)[\s().-]*[1-9](?:[\s().-]*\d){6,})").unwrap());

static LEADING_IDD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:00|011)").unwrap());

fn is_valid(number: &phonenumber::PhoneNumber) -> bool {
    phonenumber::is_valid(number)
}

fn format_e164(number: &phonenumber::PhoneNumber) -> String {
    number.format().mode(phonenumber::Mode::E164).to_string()
}

fn parse_in_region(raw: &str, region: Option<&str>) -> Option<phonenumber::PhoneNumber> {
    let id = match region {
        Some(r) => Some(country::Id::from_str(r).ok()?),
        None => None,
    };
    phonenumber::parse(id, raw).ok()
}

fn normalize_idd_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    LEADING_IDD_RE.replace(trimmed, "+").into_owned()
}

/// Candidate number-like substrings found anywhere in `text`.
fn text_candidates(text: &str) -> Vec<String> {
    CANDIDATE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// IDD-prefixed candidates (`00`/`011`), normalized to a leading `+`.
fn idd_candidates(text: &str) -> Vec<String> {
    IDD_CANDIDATE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| normalize_idd_prefix(m.as_str()))
        .filter(|s| s.starts_with('+'))
        .collect()
}

/// Extracts and validates phone numbers from visible text for the given
/// (non-sentinel) regions plus international (`ZZ`) and IDD candidates.
pub fn extract_from_text(text: &str, regions: &[String]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let candidates = text_candidates(text);

    for region in regions {
        for candidate in &candidates {
            if let Some(number) = parse_in_region(candidate, Some(region)) {
                if is_valid(&number) {
                    out.insert(format_e164(&number));
                }
            }
        }
    }

    for candidate in &candidates {
        if let Some(number) = parse_in_region(candidate, None) {
            if is_valid(&number) {
                out.insert(format_e164(&number));
            }
        }
    }

    for candidate in idd_candidates(text) {
        if let Some(number) = parse_in_region(&candidate, None) {
            if is_valid(&number) {
                out.insert(format_e164(&number));
            }
        }
    }

    out
}

/// Parses a `tel:` href (spec §4.3.4): substring after `:`, up to `?`/`;`,
/// URL-decoded and trimmed.
pub fn parse_tel(href: &str) -> Option<String> {
    let raw = href.splitn(2, ':').nth(1)?;
    let raw = raw.split(['?', ';']).next().unwrap_or("");
    let decoded = percent_decode_str(raw).decode_utf8_lossy().trim().to_string();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Validates a `tel:` href value against the effective regions, trying
/// international parsing first if an IDD/`+` prefix is present.
pub fn validate_tel_candidate(raw: &str, regions: &[String]) -> Option<String> {
    let normalized = normalize_idd_prefix(raw);
    if normalized.starts_with('+') {
        let number = parse_in_region(&normalized, None)?;
        if is_valid(&number) {
            return Some(format_e164(&number));
        }
        return None;
    }

    for region in regions {
        if let Some(number) = parse_in_region(&normalized, Some(region)) {
            if is_valid(&number) {
                return Some(format_e164(&number));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ru_local_number() {
        let regions = vec!["RU".to_string()];
        let found = extract_from_text("8 (800) 555-35-35", &regions);
        assert!(found.contains("+78005553535"));
    }

    #[test]
    fn extracts_international_with_plus() {
        let found = extract_from_text("call +1 (415) 555-2671 now", &[]);
        assert!(found.contains("+14155552671"));
    }

    #[test]
    fn extracts_idd_candidate() {
        let found = extract_from_text("IDD: 00 7 953 640-53-68", &[]);
        assert!(found.contains("+79536405368"));
    }

    #[test]
    fn tel_href_local_without_region_is_dropped() {
        assert_eq!(validate_tel_candidate("02081234567", &[]), None);
    }

    #[test]
    fn tel_href_idd_resolves_via_zz() {
        assert_eq!(
            validate_tel_candidate("00 1 415 555 2671", &[]),
            Some("+14155552671".to_string())
        );
    }

    #[test]
    fn tel_href_plus_parses_directly() {
        assert_eq!(
            validate_tel_candidate("+1 (415) 555-2671", &[]),
            Some("+14155552671".to_string())
        );
    }
}
