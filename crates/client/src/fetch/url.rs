//! URL resolution for consistent cache keys.

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

/// Resolve a URL string the way the foreground would, so equal resources
/// map to equal cache keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/assets/a.svg`, `a.svg`) against `base`
/// 3. Lowercase the host (the URL parser does this for http and https)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(input: &str, base: &url::Url) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> url::Url {
        url::Url::parse("http://localhost:5173/").unwrap()
    }

    #[test]
    fn test_resolve_absolute_path() {
        let url = resolve("/assets/pictures/chat.svg", &base()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5173/assets/pictures/chat.svg");
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve("a.svg", &base()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5173/a.svg");
    }

    #[test]
    fn test_resolve_absolute_url_keeps_origin() {
        let url = resolve("https://cdn.example.com/font.woff2", &base()).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve("https://EXAMPLE.COM/a", &base()).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve("/index.html#grid", &base()).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/index.html");
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve("/a.svg?b=2&a=1", &base()).unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve("  /manifest.json  ", &base()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5173/manifest.json");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve("file:///etc/passwd", &base());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_data_url_rejected() {
        let result = resolve("data:image/png;base64,AAAA", &base());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve("", &base()), Err(UrlError::Empty)));
        assert!(matches!(resolve("   ", &base()), Err(UrlError::Empty)));
    }
}
