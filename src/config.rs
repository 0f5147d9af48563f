use anyhow::Context as _;
use url::Url;

pub const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vS22WsDk6VTRkaDHD8PoQiPBVCVrTljc0TpsiKpIY9jNuUAa-Ax3leV4Qeh3jlcwXqjfLpWpsQom6P4/pub?output=csv";

/// Bump on every release whose shell must replace the cached one.
pub const DEFAULT_CACHE_GENERATION: &str = "shortshelf-v4";

pub const SHEET_URL_ENV: &str = "SHORTSHELF_SHEET_URL";
pub const CACHE_GENERATION_ENV: &str = "SHORTSHELF_CACHE_GENERATION";

pub fn sheet_url_from_env() -> anyhow::Result<Url> {
    let raw = std::env::var(SHEET_URL_ENV).unwrap_or_else(|_| DEFAULT_SHEET_URL.to_string());
    parse_sheet_url(&raw).with_context(|| format!("invalid {SHEET_URL_ENV}={raw:?}"))
}

pub fn parse_sheet_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).context("parse sheet url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("sheet url must be http/https: {url}");
    }
    Ok(url)
}

pub fn cache_generation_from_env() -> anyhow::Result<String> {
    let raw = std::env::var(CACHE_GENERATION_ENV)
        .unwrap_or_else(|_| DEFAULT_CACHE_GENERATION.to_string());
    parse_cache_generation(&raw)
        .with_context(|| format!("invalid {CACHE_GENERATION_ENV}={raw:?}"))
}

/// Generation tags name on-disk stores, so they are restricted to `[A-Za-z0-9._-]`.
pub fn parse_cache_generation(raw: &str) -> anyhow::Result<String> {
    let tag = raw.trim();
    if tag.is_empty() {
        anyhow::bail!("cache generation is empty");
    }
    if tag.starts_with('.') {
        anyhow::bail!("cache generation must not start with '.': {tag}");
    }
    if let Some(bad) = tag
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        anyhow::bail!("unsupported character {bad:?} in cache generation: {tag}");
    }
    Ok(tag.to_owned())
}
