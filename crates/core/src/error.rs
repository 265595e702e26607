use thiserror::Error;

/// Errors raised by the URL canonicalizer (§4.1).
///
/// A `UrlError` on the seed URL is fatal to a run; a `UrlError` raised while
/// resolving a discovered link is caught by the engine and silently skipped
/// (§7: "Unsupported scheme on discovered link").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL hostname is missing: {0}")]
    MissingHost(String),

    #[error("URL is not absolute: {0}")]
    NotAbsolute(String),
}
