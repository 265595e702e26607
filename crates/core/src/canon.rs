//! URL canonicalization and same-origin scoping (spec §4.1).
//!
//! Pure functions only; no state, no I/O. Two URLs are "the same page" iff
//! `normalize` produces equal strings for both.

use url::Url;

use crate::error::UrlError;

/// TLD → ISO-ish region code, used to infer a default phone region when
/// none is configured. Unknown TLDs map to the `ZZ` sentinel.
const TLD_REGIONS: &[(&str, &str)] = &[
    ("ru", "RU"),
    ("by", "BY"),
    ("kz", "KZ"),
    ("ua", "UA"),
    ("kg", "KG"),
    ("uz", "UZ"),
    ("am", "AM"),
    ("az", "AZ"),
    ("ge", "GE"),
    ("md", "MD"),
    ("ee", "EE"),
    ("lv", "LV"),
    ("lt", "LT"),
    ("pl", "PL"),
    ("de", "DE"),
    ("fr", "FR"),
    ("it", "IT"),
    ("es", "ES"),
    ("pt", "PT"),
    ("nl", "NL"),
    ("be", "BE"),
    ("ch", "CH"),
    ("at", "AT"),
    ("se", "SE"),
    ("no", "NO"),
    ("fi", "FI"),
    ("dk", "DK"),
    ("ie", "IE"),
    ("uk", "GB"),
    ("gb", "GB"),
    ("us", "US"),
    ("ca", "CA"),
    ("au", "AU"),
    ("nz", "NZ"),
    ("jp", "JP"),
    ("cn", "CN"),
    ("in", "IN"),
];

/// The sentinel region meaning "no region / international only".
pub const ZZ: &str = "ZZ";

/// Lowercase host with a leading `www.` stripped — the same-origin identity.
pub fn strip_www(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// `hostname_key(url) -> key`: lowercase host with `www.` stripped.
pub fn hostname_key(url: &str) -> Result<String, UrlError> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Malformed(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(url.to_string()))?;
    Ok(strip_www(host))
}

/// `origin(url) -> "scheme://authority"`.
pub fn origin(url: &str) -> Result<String, UrlError> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Malformed(e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(UrlError::NotAbsolute(url.to_string()));
    }
    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap();
    match parsed.port() {
        Some(port) => Ok(format!("{scheme}://{host}:{port}")),
        None => Ok(format!("{scheme}://{host}")),
    }
}

/// Lowercase scheme/host, elide default ports, default empty path to `/`,
/// drop the fragment always and the query iff `include_query` is false.
/// Rejects any scheme other than `http`/`https`; requires a non-empty host.
pub fn normalize(url: &str, include_query: bool) -> Result<String, UrlError> {
    let mut parsed = Url::parse(url).map_err(|e| UrlError::Malformed(e.to_string()))?;

    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(UrlError::UnsupportedScheme(scheme));
    }

    if parsed.host_str().is_none() || parsed.host_str() == Some("") {
        return Err(UrlError::MissingHost(url.to_string()));
    }

    parsed.set_fragment(None);
    if !include_query {
        parsed.set_query(None);
    }

    let host = parsed.host_str().unwrap().to_ascii_lowercase();
    let _ = parsed.set_host(Some(&host));
    let _ = parsed.set_scheme(&scheme);

    let has_default_port = (scheme == "http" && parsed.port() == Some(80))
        || (scheme == "https" && parsed.port() == Some(443));
    if has_default_port {
        let _ = parsed.set_port(None);
    }

    if parsed.path().is_empty() {
        parsed.set_path("/");
    }

    Ok(parsed.to_string())
}

/// `is_same_domain(url, base_key)`: `hostname_key(url) == base_key`.
pub fn is_same_domain(url: &str, base_key: &str) -> bool {
    hostname_key(url).map(|k| k == base_key).unwrap_or(false)
}

/// Infer a phone region from the last dot-separated host label of `url`.
/// Returns `ZZ` for unknown TLDs or URLs without a host.
pub fn infer_phone_region(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return ZZ.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return ZZ.to_string();
    };
    let tld = host
        .trim_matches('.')
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    TLD_REGIONS
        .iter()
        .find(|(k, _)| *k == tld)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| ZZ.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_scheme_and_host() {
        assert_eq!(
            normalize("HTTP://Example.COM/Path", false).unwrap(),
            "http://example.com/Path"
        );
    }

    #[test]
    fn elides_default_ports() {
        assert_eq!(normalize("http://example.com:80/", false).unwrap(), "http://example.com/");
        assert_eq!(normalize("https://example.com:443/", false).unwrap(), "https://example.com/");
        assert_eq!(
            normalize("http://example.com:8080/", false).unwrap(),
            "http://example.com:8080/"
        );
    }

    #[test]
    fn defaults_empty_path() {
        assert_eq!(normalize("http://example.com", false).unwrap(), "http://example.com/");
    }

    #[test]
    fn drops_fragment_always() {
        assert_eq!(
            normalize("http://example.com/a#frag", true).unwrap(),
            "http://example.com/a"
        );
    }

    #[test]
    fn strips_query_unless_requested() {
        assert_eq!(normalize("http://example.com/a?x=1", false).unwrap(), "http://example.com/a");
        assert_eq!(
            normalize("http://example.com/a?x=1", true).unwrap(),
            "http://example.com/a?x=1"
        );
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(matches!(
            normalize("ftp://example.com/", false),
            Err(UrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("HTTP://Example.com:80/a/b?x=1#f", true).unwrap();
        let twice = normalize(&once, true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn hostname_key_strips_www() {
        assert_eq!(hostname_key("http://www.Example.com/a").unwrap(), "example.com");
        assert_eq!(hostname_key("http://example.com/a").unwrap(), "example.com");
    }

    #[test]
    fn same_domain_folds_www() {
        assert!(is_same_domain("http://www.example.com/x", "example.com"));
        assert!(!is_same_domain("http://other.com/x", "example.com"));
    }

    #[test]
    fn origin_yields_scheme_and_authority_only() {
        assert_eq!(origin("http://example.com:8080/a/b?x=1").unwrap(), "http://example.com:8080");
        assert_eq!(origin("https://example.com/a").unwrap(), "https://example.com");
    }

    #[test]
    fn infers_known_and_unknown_regions() {
        assert_eq!(infer_phone_region("http://example.ru/"), "RU");
        assert_eq!(infer_phone_region("http://example.co.uk/"), "GB");
        assert_eq!(infer_phone_region("http://example.onion/"), "ZZ");
    }
}
