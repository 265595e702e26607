//! Cloaked-mail de-obfuscator (spec §4.3, §9).
//!
//! A small JS-like evaluator: supports only string literals and identifier
//! lookups in a local bindings table, joined by `+`. Anything else
//! (function calls, arithmetic, properties) collapses to the empty string
//! for that token — this extracts cloaked mails, it does not execute
//! arbitrary scripts.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:var\s+)?(addy_text\w+|addy\w+)\s*=\s*(.+)$").unwrap());

static NUMERIC_ENTITY_DEC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(\d+);").unwrap());
static NUMERIC_ENTITY_HEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#[xX]([0-9A-Fa-f]+);").unwrap());

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&nbsp;", " "),
];

/// Finds cloaked e-mail candidates across every inline `<script>` body.
/// Each script is only evaluated if it contains the trigger substring
/// `cloak` or `addy` (case-insensitive).
pub fn cloaked_email_candidates<I>(scripts: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut candidates = Vec::new();
    for script in scripts {
        let script = script.as_ref();
        let lower = script.to_ascii_lowercase();
        if !lower.contains("cloak") && !lower.contains("addy") {
            continue;
        }
        candidates.extend(evaluate_script(script));
    }
    candidates
}

fn evaluate_script(script: &str) -> Vec<String> {
    let mut bindings: HashMap<String, String> = HashMap::new();
    let mut results = Vec::new();

    for statement in split_outside_quotes(script, ';') {
        let statement = statement.trim();
        let Some(caps) = ASSIGN_RE.captures(statement) else {
            continue;
        };
        let name = caps[1].to_string();
        let expr = &caps[2];

        let value: String = split_outside_quotes(expr, '+')
            .iter()
            .map(|term| eval_term(term.trim(), &bindings))
            .collect();

        bindings.insert(name, value.clone());
        if value.contains('@') {
            results.push(value);
        }
    }

    results
}

fn eval_term(term: &str, bindings: &HashMap<String, String>) -> String {
    if term.len() >= 2 {
        let bytes = term.as_bytes();
        let quote = bytes[0];
        if (quote == b'\'' || quote == b'"') && bytes[term.len() - 1] == quote {
            let inner = &term[1..term.len() - 1];
            return decode_entities(&unescape_backslashes(inner));
        }
    }
    if is_identifier(term) {
        return bindings.get(term).cloned().unwrap_or_default();
    }
    String::new()
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unescape_backslashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn decode_entities(s: &str) -> String {
    let mut out = NUMERIC_ENTITY_HEX_RE
        .replace_all(s, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_default()
        })
        .into_owned();
    out = NUMERIC_ENTITY_DEC_RE
        .replace_all(&out, |caps: &regex::Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_default()
        })
        .into_owned();
    for (entity, replacement) in NAMED_ENTITIES {
        out = out.replace(entity, replacement);
    }
    out
}

/// Splits `s` on `sep` only when not inside a single- or double-quoted
/// string literal, honoring basic backslash escaping inside the literal.
fn split_outside_quotes(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    current.push(c);
                } else if c == sep {
                    parts.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_joomla_cloaked_email() {
        let script = r#"
            document.getElementById('cloak123').innerHTML = '';
            var addy123 = '&#105;nf&#111;' + '&#64;';
            addy123 = addy123 + 'k&#97;gr&#105;f&#111;n' + '&#46;' + 'r&#117;';
            var addy_text123 = '&#105;nf&#111;' + '&#64;' + 'k&#97;gr&#105;f&#111;n' + '&#46;' + 'r&#117;';
        "#;
        let found = cloaked_email_candidates([script]);
        assert!(found.contains(&"info@kagrifon.ru".to_string()));
    }

    #[test]
    fn ignores_scripts_without_trigger() {
        let script = "var x = 'a' + 'b';";
        assert!(cloaked_email_candidates([script]).is_empty());
    }

    #[test]
    fn splits_statements_outside_string_literals() {
        let parts = split_outside_quotes("a = 'x;y'; b = 1", ';');
        assert_eq!(parts, vec![" a = 'x;y'", " b = 1"]);
    }
}
