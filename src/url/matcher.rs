/// Checks if a host matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "shop.example" matches only "shop.example"
/// 2. Wildcard match: "*.shop.example" matches the bare host and any subdomain
///
/// # Examples
///
/// ```
/// use catalog_ripple::url::matches_wildcard;
///
/// assert!(matches_wildcard("shop.example", "shop.example"));
/// assert!(matches_wildcard("*.shop.example", "api.shop.example"));
/// assert!(!matches_wildcard("*.shop.example", "shop.example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Host comparison used by routing
///
/// Case-insensitive, and a leading `www.` is ignored on both sides, so a route
/// written for `shop.example` also claims `www.shop.example`.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let host = host.to_lowercase();
    let pattern = pattern.strip_prefix("www.").unwrap_or(&pattern);
    let host = host.strip_prefix("www.").unwrap_or(&host);
    matches_wildcard(pattern, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "blog.example.com"));
        assert!(!matches_wildcard("blog.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_nested() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
    }

    #[test]
    fn test_wildcard_no_match_partial() {
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
    }

    #[test]
    fn test_empty_strings() {
        assert!(!matches_wildcard("*.example.com", ""));
        assert!(!matches_wildcard("", "example.com"));
    }

    #[test]
    fn test_host_matches_ignores_www_and_case() {
        assert!(host_matches("shop.example", "www.shop.example"));
        assert!(host_matches("www.shop.example", "shop.example"));
        assert!(host_matches("shop.example", "SHOP.Example"));
        assert!(host_matches("*.shop.example", "www.shop.example"));
        assert!(!host_matches("shop.example", "api.shop.example"));
    }
}
