use crate::UrlError;
use url::Url;

/// Query parameters that never change what page a URL points at
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "msclkid",
    "mc_eid",
    "mc_cid",
    "_ga",
    "ref",
    "cm_mmc",
    "cm_sp",
];

/// Normalizes a URL into the form every identity key is built from
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host and remove a leading `www.`
/// 3. Remove dot segments, duplicate and trailing slashes (root stays `/`)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, sort the rest by key then value
/// 6. Remove an empty query string
///
/// The scheme is kept as-is.
///
/// # Examples
///
/// ```
/// use catalog_ripple::url::normalize_url;
///
/// let url = normalize_url("https://WWW.SHOP.EXAMPLE/p/1/?b=2&a=1#reviews").unwrap();
/// assert_eq!(url.as_str(), "https://shop.example/p/1?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url, &[]);
        set_query_pairs(&mut url, &params);
    }

    Ok(url)
}

/// Removes dot segments, empty segments and a trailing slash
pub(crate) fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Drops tracking parameters (and `extra` site parameters), sorted for stability
pub(crate) fn filter_and_sort_query_params(url: &Url, extra: &[String]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key) && !extra.iter().any(|p| p == key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

/// Replaces the query, removing it entirely when `params` is empty
pub(crate) fn set_query_pairs(url: &mut Url, params: &[(String, String)]) {
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_kept() {
        let result = normalize_url("http://shop.example/p/1").unwrap();
        assert_eq!(result.as_str(), "http://shop.example/p/1");
    }

    #[test]
    fn test_scheme_casing_ignored() {
        let a = normalize_url("HTTPS://shop.example/p/1").unwrap();
        let b = normalize_url("https://shop.example/p/1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_remove_www() {
        let result = normalize_url("https://www.example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_remove_tracking_params() {
        let result =
            normalize_url("https://example.com/page?utm_source=a&fbclid=b&gclid=c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_query_values_are_reencoded() {
        let result = normalize_url("https://example.com/s?q=red%20coat&a=x%26y").unwrap();
        assert_eq!(result.as_str(), "https://example.com/s?a=x%26y&q=red+coat");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = normalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_lowercase_host_keeps_path_case() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_multiple_slashes() {
        let result = normalize_url("https://example.com///path//to///page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/path/to/page");
    }

    #[test]
    fn test_parent_directory_at_root() {
        let result = normalize_url("https://example.com/../page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_url("http://WWW.Example.com/a//b/?z=1&utm_medium=x&a=2#f").unwrap();
        let twice = normalize_url(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }
}
