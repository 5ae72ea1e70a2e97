//! URL normalization for consistent cache keys.

use url::Url;

/// Error type for URL normalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a possibly relative URL against the app origin and normalize it.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/static/js/core.js`) against `base`
/// 3. Require http or https
/// 4. Lowercase the host
/// 5. Remove fragment (#...)
/// 6. Keep query string intact (do not reorder)
pub fn resolve(input: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Normalize an absolute URL so that equivalent requests share one cache key.
pub fn normalize(mut url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = url.host_str()
        && host.chars().any(|c| c.is_ascii_uppercase())
    {
        let lowered = host.to_lowercase();
        url.set_host(Some(&lowered)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    url.set_fragment(None);

    Ok(url)
}

/// Whether two URLs share scheme, host, and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://127.0.0.1:5000").unwrap()
    }

    #[test]
    fn test_resolve_relative() {
        let url = resolve("/static/js/core.js", &origin()).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/static/js/core.js");
    }

    #[test]
    fn test_resolve_absolute_cross_origin() {
        let url = resolve("https://cdn.jsdelivr.net/npm/chart.js", &origin()).unwrap();
        assert_eq!(url.host_str(), Some("cdn.jsdelivr.net"));
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve("https://CDN.Example.COM/lib.js", &origin()).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve("/dashboard#calendar", &origin()).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/dashboard");
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve("/static/css/style.css?v=2&b=1", &origin()).unwrap();
        assert_eq!(url.query(), Some("v=2&b=1"));
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve("  /  ", &origin()).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve("file:///etc/passwd", &origin());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve("", &origin()), Err(UrlError::Empty)));
        assert!(matches!(resolve("   ", &origin()), Err(UrlError::Empty)));
    }

    #[test]
    fn test_normalize_equivalent_urls_match() {
        let a = normalize(Url::parse("http://127.0.0.1:5000/static/js/core.js#x").unwrap()).unwrap();
        let b = normalize(Url::parse("http://127.0.0.1:5000/static/js/core.js").unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_origin() {
        let app = origin();
        assert!(same_origin(&app, &Url::parse("http://127.0.0.1:5000/api/x").unwrap()));
        assert!(!same_origin(&app, &Url::parse("http://127.0.0.1:5001/").unwrap()));
        assert!(!same_origin(&app, &Url::parse("https://cdn.jsdelivr.net/npm/chart.js").unwrap()));
    }
}
