//! The extractor (spec §4.3): turns an HTML document into validated e-mails,
//! E.164 phone numbers, and outbound link hrefs. All functions here are pure
//! over their inputs — no shared mutable state.

pub mod cloak;
pub mod email;
pub mod links;
pub mod phone;

use std::collections::BTreeSet;

use scraper::{Html, Selector};

/// Per-call knobs the engine supplies; everything else is a module-level
/// constant (regexes, weight tables).
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Effective, non-sentinel phone regions for this crawl (may be empty).
    pub phone_regions: Vec<String>,
    /// Optional e-mail domain allowlist (suffix match).
    pub email_allowlist: Option<Vec<String>>,
    /// Hrefs beyond this count are not returned.
    pub max_links_per_page: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
    /// Raw hrefs in document order, truncated to `max_links_per_page`.
    pub links: Vec<String>,
}

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("static selector is valid CSS")
}

/// Flattens the document's visible text the way `BeautifulSoup.get_text(" ",
/// strip=True)` does: all text nodes joined by a single space, collapsed.
pub fn visible_text(document: &Html) -> String {
    let root = selector("body");
    let text: String = document
        .select(&root)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| document.root_element().text().collect::<Vec<_>>().join(" "));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn anchor_hrefs(document: &Html) -> Vec<String> {
    let sel = selector("a[href], area[href]");
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect()
}

fn mailto_hrefs(document: &Html) -> Vec<String> {
    anchor_hrefs(document).into_iter().filter(|h| links::is_mailto(h)).collect()
}

fn tel_hrefs(document: &Html) -> Vec<String> {
    anchor_hrefs(document).into_iter().filter(|h| links::is_tel(h)).collect()
}

fn script_texts(document: &Html) -> Vec<String> {
    let sel = selector("script");
    document
        .select(&sel)
        .map(|el| el.text().collect::<Vec<_>>().join(""))
        .collect()
}

/// Parses `html`, returning validated contacts and the truncated link list.
/// `text` should be the page's already-flattened visible text (callers that
/// already have it, e.g. the engine, avoid re-flattening); pass the output
/// of [`visible_text`] if not otherwise available.
pub fn extract(html: &str, text: &str, opts: &ExtractOptions) -> Extracted {
    let document = Html::parse_document(html);

    let mut emails = BTreeSet::new();
    for candidate in email::candidates_from_text(text) {
        if let Some(valid) = email::validate(&candidate) {
            emails.insert(valid);
        }
    }
    for href in mailto_hrefs(&document) {
        if let Some(address) = email::parse_mailto(&href) {
            if let Some(valid) = email::validate(&address) {
                emails.insert(valid);
            }
        }
    }
    for candidate in cloak::cloaked_email_candidates(script_texts(&document)) {
        if let Some(valid) = email::validate(&candidate) {
            emails.insert(valid);
        }
    }
    if let Some(allowlist) = &opts.email_allowlist {
        emails.retain(|addr| email::domain_allowed(addr, allowlist));
    }

    let mut phones = phone::extract_from_text(text, &opts.phone_regions);
    for href in tel_hrefs(&document) {
        if let Some(raw) = phone::parse_tel(&href) {
            if let Some(valid) = phone::validate_tel_candidate(&raw, &opts.phone_regions) {
                phones.insert(valid);
            }
        }
    }

    let mut links = anchor_hrefs(&document);
    links.truncate(opts.max_links_per_page);
    links.retain(|h| links::is_probably_parseable_href(h));

    Extracted { emails, phones, links }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ExtractOptions {
        ExtractOptions {
            phone_regions: vec!["RU".to_string()],
            email_allowlist: None,
            max_links_per_page: 200,
        }
    }

    #[test]
    fn extracts_across_sources() {
        let html = r#"
            <html><body>
            Root@Example.com
            8 (800) 555-35-35
            <a href="/contact">contact</a>
            <a href="/loop?x=1">loop</a>
            </body></html>
        "#;
        let text = visible_text(&Html::parse_document(html));
        let result = extract(html, &text, &opts());
        assert!(result.emails.contains("root@example.com"));
        assert!(result.phones.contains("+78005553535"));
        assert_eq!(result.links, vec!["/contact", "/loop?x=1"]);
    }

    #[test]
    fn mailto_and_tel_hrefs_are_excluded_from_links_but_used_for_contacts() {
        let html = r#"
            <html><body>
            <a href="mailto:sales@example.com?subject=Hello">mail</a>
            <a href="tel:+1 (415) 555-2671">call</a>
            </body></html>
        "#;
        let text = visible_text(&Html::parse_document(html));
        let result = extract(html, &text, &ExtractOptions { phone_regions: vec![], ..opts() });
        assert!(result.links.is_empty());
        assert!(result.emails.contains("sales@example.com"));
        assert!(result.phones.contains("+14155552671"));
    }

    #[test]
    fn allowlist_filters_result_emails() {
        let html = r#"
            <html><body>
            good@gmail.com
            good@mail.ru
            nope@yahoo.com
            <a href="mailto:admin@sub.mail.ru">sub</a>
            </body></html>
        "#;
        let text = visible_text(&Html::parse_document(html));
        let options = ExtractOptions {
            email_allowlist: Some(vec!["gmail.com".to_string(), "mail.ru".to_string()]),
            ..opts()
        };
        let result = extract(html, &text, &options);
        assert_eq!(
            result.emails,
            BTreeSet::from([
                "good@gmail.com".to_string(),
                "good@mail.ru".to_string(),
                "admin@sub.mail.ru".to_string(),
            ])
        );
    }

    #[test]
    fn truncates_links_to_configured_max() {
        let html = r#"<html><body><a href="/a">a</a><a href="/b">b</a><a href="/c">c</a></body></html>"#;
        let text = visible_text(&Html::parse_document(html));
        let options = ExtractOptions { max_links_per_page: 2, ..opts() };
        let result = extract(html, &text, &options);
        assert_eq!(result.links, vec!["/a", "/b"]);
    }
}
