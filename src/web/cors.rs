use axum::http::{HeaderValue, request::Parts};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// CORS for browser front-ends.
///
/// Origins are exact strings or patterns with a single `*` wildcard, such as
/// `https://*.vercel.app`; a bare `*` matches every origin. Credentials are
/// allowed, so methods and headers are mirrored from the request rather
/// than answered with `*`.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns = origins.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|origin| patterns.iter().any(|p| origin_matches(p, origin)))
                    .unwrap_or(false)
            },
        ))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() >= prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_origin() {
        assert!(origin_matches("http://localhost:5173", "http://localhost:5173"));
        assert!(!origin_matches("http://localhost:5173", "http://localhost:3000"));
    }

    #[test]
    fn test_wildcard_origin() {
        let pattern = "https://*.vercel.app";
        assert!(origin_matches(pattern, "https://preview-123.vercel.app"));
        assert!(!origin_matches(pattern, "https://vercel.app"));
        assert!(!origin_matches(pattern, "http://preview.vercel.app"));
        assert!(!origin_matches(pattern, "https://evil.app"));
    }

    #[test]
    fn test_bare_star_matches_everything() {
        assert!(origin_matches("*", "https://example.com"));
    }
}
