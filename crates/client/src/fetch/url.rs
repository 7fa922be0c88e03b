//! Resolution of request targets against the controlled origin.

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

/// Resolve a request target the way a page would.
///
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative and root-relative paths against `origin`;
///    absolute URLs are kept as given (they may be cross-origin)
/// 3. Reject anything but http(s)
/// 4. Remove fragment (#...); the query string is preserved
pub fn resolve(origin: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}
