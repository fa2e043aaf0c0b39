//! Joining configured base URLs with endpoint paths.
//!
//! Base URLs and paths both come from user configuration, so either side may
//! carry stray slashes. A path that is already an absolute `http(s)` URL is
//! used as-is, which lets a config point one endpoint at a different host.

/// Strips trailing slashes from a base URL.
///
/// # Examples
///
/// ```
/// use toolrelay::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// assert_eq!(normalize_base_url("http://localhost:11434/v1//"), "http://localhost:11434/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

pub fn is_absolute_url(path: &str) -> bool {
    let lower = path.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Appends `endpoint` to `base_url` with exactly one slash between them.
///
/// # Examples
///
/// ```
/// use toolrelay::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/", "/mcp"),
///     "http://localhost:8000/mcp"
/// );
/// assert_eq!(
///     construct_api_url("http://localhost:8000", "https://tools.internal/mcp"),
///     "https://tools.internal/mcp"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    if is_absolute_url(endpoint) {
        return endpoint.trim().to_string();
    }
    let endpoint = endpoint.trim().trim_start_matches('/');
    format!("{}/{}", normalize_base_url(base_url), endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_backend_paths_join_cleanly() {
        for (base, path) in [
            ("http://localhost:8000", "/health"),
            ("http://localhost:8000/", "health"),
            ("http://localhost:8000///", "//health"),
            (" http://localhost:8000 ", " /health"),
        ] {
            assert_eq!(
                construct_api_url(base, path),
                "http://localhost:8000/health",
                "base={base:?} path={path:?}"
            );
        }
    }

    #[test]
    fn llm_base_with_version_prefix_keeps_it() {
        assert_eq!(
            construct_api_url("http://localhost:11434/v1", "chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn absolute_endpoints_bypass_the_base() {
        assert!(is_absolute_url("HTTPS://example.com/mcp"));
        assert!(!is_absolute_url("/mcp"));
        assert!(!is_absolute_url("httpbin/path"));
        assert_eq!(
            construct_api_url("http://localhost:8000", "http://127.0.0.1:9000/mcp"),
            "http://127.0.0.1:9000/mcp"
        );
    }
}
