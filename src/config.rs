//! Configuration loading: a TOML file (defaulting to the bundled
//! `config/default.toml`) overlaid with `PARSER_*` environment variables,
//! mirroring the original `ParserSettings.from_env_and_file` resolution
//! order — file values first, then environment overrides on top.

use anyhow::{Context, Result};
use sitecrawl_core::Config;
use tracing::warn;

const BUNDLED_DEFAULT: &str = include_str!("../config/default.toml");

/// Loads a [`Config`], reading `path` if given (falling back to the bundled
/// default file when it can't be read), then applying any `PARSER_*`
/// environment overrides on top.
pub fn load(path: Option<&str>) -> Result<Config> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?,
        None => {
            warn!("no --config given, using bundled defaults");
            BUNDLED_DEFAULT.to_string()
        }
    };

    let mut config: Config = toml::from_str(&raw).context("parsing config TOML")?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
        _ => Ok(None),
    }
}

fn coerce_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("invalid boolean value: {other}")),
    }
}

fn csv_env(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Applies `PARSER_*` overrides on top of file-loaded values (spec §6
/// ambient config layer). Unset or empty variables leave the field alone.
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(v) = parse_env::<usize>("PARSER_MAX_PAGES")? {
        config.max_pages = v;
    }
    if let Some(v) = parse_env::<u32>("PARSER_MAX_DEPTH")? {
        config.max_depth = v;
    }
    if let Some(v) = parse_env::<f64>("PARSER_MAX_SECONDS")? {
        config.max_seconds = v;
    }
    if let Some(v) = parse_env::<usize>("PARSER_MAX_CONCURRENCY")? {
        config.max_concurrency = v;
    }
    if let Some(v) = parse_env::<f64>("PARSER_REQUEST_TIMEOUT")? {
        config.request_timeout = v;
    }
    if let Ok(v) = std::env::var("PARSER_USER_AGENT") {
        if !v.is_empty() {
            config.user_agent = v;
        }
    }
    if let Ok(v) = std::env::var("PARSER_INCLUDE_QUERY") {
        if !v.is_empty() {
            config.include_query = coerce_bool(&v)?;
        }
    }
    if let Ok(v) = std::env::var("PARSER_FOCUSED_CRAWLING") {
        if !v.is_empty() {
            config.focused_crawling = coerce_bool(&v)?;
        }
    }
    if let Some(v) = parse_env::<usize>("PARSER_MAX_BODY_BYTES")? {
        config.max_body_bytes = v;
    }
    if let Some(v) = parse_env::<usize>("PARSER_MAX_LINKS_PER_PAGE")? {
        config.max_links_per_page = v;
    }
    if let Some(v) = parse_env::<u32>("PARSER_RETRY_TOTAL")? {
        config.retry_total = v;
    }
    if let Some(v) = parse_env::<f64>("PARSER_RETRY_BACKOFF_FACTOR")? {
        config.retry_backoff_factor = v;
    }
    if let Ok(v) = std::env::var("PARSER_LOG_LEVEL") {
        if !v.is_empty() {
            config.log_level = v;
        }
    }
    if let Some(regions) = csv_env("PARSER_PHONE_REGIONS") {
        config.phone_regions = Some(regions);
    }
    if let Some(allowlist) = csv_env("PARSER_EMAIL_DOMAIN_ALLOWLIST") {
        config.email_domain_allowlist = Some(allowlist);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_parses_into_config() {
        let config: Config = toml::from_str(BUNDLED_DEFAULT).unwrap();
        assert_eq!(config.max_pages, 200);
        assert_eq!(config.user_agent, "site-parser/0.1.0");
    }

    #[test]
    fn coerce_bool_accepts_pythonic_spellings() {
        assert!(coerce_bool("yes").unwrap());
        assert!(!coerce_bool("off").unwrap());
        assert!(coerce_bool("bogus").is_err());
    }
}
