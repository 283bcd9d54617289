//! Service key resolution
//!
//! Circuit breakers group failures per logical backend service. The key
//! for a request is the first two path segments after the API prefix, so
//! `/api/v1/metrics/cpu/history` and `/api/v1/metrics/memory` both map to
//! `metrics/cpu` and `metrics/memory` style keys while sibling calls share
//! a breaker. Resolution is total: malformed input falls back to the raw
//! path with the query stripped.

use url::Url;

/// Derive the circuit breaker key for a request URL.
///
/// `api_prefix` is the configured base path (e.g. `/api/v1`); its segments
/// are skipped before the key is taken.
pub fn resolve(url: &str, api_prefix: &str) -> String {
    let path = path_of(url);
    let prefix_path = path_of(api_prefix);
    let prefix_segments = segments_of(&prefix_path);
    let segments = segments_of(&path);

    let remaining: &[&str] = if segments.len() >= prefix_segments.len()
        && segments[..prefix_segments.len()] == prefix_segments[..]
    {
        &segments[prefix_segments.len()..]
    } else {
        &segments[..]
    };

    if remaining.is_empty() {
        return path;
    }

    remaining.iter().take(2).copied().collect::<Vec<_>>().join("/")
}

/// Path portion of a URL-ish string, query stripped
fn path_of(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        return parsed.path().to_string();
    }
    // Relative path: drop query and fragment by hand
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment)
        .to_string()
}

fn segments_of(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sibling_endpoints_share_a_key() {
        assert_eq!(resolve("/api/v1/metrics/cpu", "/api/v1"), "metrics/cpu");
        assert_eq!(
            resolve("/api/v1/metrics/cpu/history", "/api/v1"),
            "metrics/cpu"
        );
        assert_eq!(
            resolve("/api/v1/notifications/channels", "/api/v1"),
            "notifications/channels"
        );
    }

    #[test]
    fn test_single_segment_service() {
        assert_eq!(resolve("/api/v1/rules", "/api/v1"), "rules");
    }

    #[test]
    fn test_absolute_urls() {
        assert_eq!(
            resolve("https://dash.example.com/api/v1/metrics/cpu", "/api/v1"),
            "metrics/cpu"
        );
    }

    #[test]
    fn test_query_is_ignored() {
        assert_eq!(
            resolve("/api/v1/metrics?range=5m&step=15s", "/api/v1"),
            "metrics"
        );
    }

    #[test]
    fn test_unprefixed_path_uses_leading_segments() {
        assert_eq!(resolve("/health/live", "/api/v1"), "health/live");
    }

    #[test]
    fn test_prefix_only_falls_back_to_raw_path() {
        assert_eq!(resolve("/api/v1", "/api/v1"), "/api/v1");
        assert_eq!(resolve("", "/api/v1"), "");
    }

    proptest! {
        #[test]
        fn resolve_is_total(url in ".*", prefix in ".*") {
            // Must never panic, whatever the input looks like
            let _ = resolve(&url, &prefix);
        }

        #[test]
        fn resolve_strips_queries(path in "[a-z]{1,8}/[a-z]{1,8}", query in "[a-z=&]{0,16}") {
            let with_query = format!("/api/v1/{}?{}", path, query);
            let without = format!("/api/v1/{}", path);
            prop_assert_eq!(resolve(&with_query, "/api/v1"), resolve(&without, "/api/v1"));
        }
    }
}
