//! URL resolution against the application origin.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse the application origin.
///
/// Only the scheme, host and port are kept; any path is dropped.
pub fn parse_origin(input: &str) -> Result<Url, UrlError> {
    let mut url = resolve_absolute(input)?;
    url.set_path("/");
    url.set_query(None);
    Ok(url)
}

/// Resolve a manifest entry or request target against `origin`.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Join relative paths (`/index.html`) onto the origin
/// 3. Require `http` or `https`
/// 4. Remove the fragment; the query string is kept as-is
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    check_scheme(&parsed)?;
    parsed.set_fragment(None);
    Ok(parsed)
}

/// Whether `url` shares scheme, host and port with `origin`.
pub fn is_same_origin(origin: &Url, url: &Url) -> bool {
    origin.origin() == url.origin()
}

fn resolve_absolute(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    check_scheme(&parsed)?;
    parsed.set_fragment(None);
    Ok(parsed)
}

fn check_scheme(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
