//! URL utilities for building API endpoint addresses
//!
//! Endpoint paths keep their trailing slash (the server routes on it); only
//! the join between base URL and path is normalized.

use reqwest::Url;

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use parlor::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// assert_eq!(normalize_base_url("https://chat.example.com/api///"), "https://chat.example.com/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash between them
///
/// # Examples
///
/// ```
/// use parlor::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/", "/auth/login/"),
///     "http://localhost:8000/auth/login/"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// Build an endpoint URL and append query parameters, percent-encoding them.
pub fn construct_api_url_with_params(
    base_url: &str,
    endpoint: &str,
    params: &[(&str, String)],
) -> Result<Url, Box<dyn std::error::Error + Send + Sync>> {
    let mut url = Url::parse(&construct_api_url(base_url, endpoint))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// True when the string parses as an absolute http(s) URL.
pub fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
