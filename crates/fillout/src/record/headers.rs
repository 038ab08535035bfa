use axum::http::header::{self, HeaderName};
use url::Url;

/// Headers that only concern a single connection
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Caching directives, stripped from every proxied response
const CACHING: [&str; 5] = [
    "cache-control",
    "expires",
    "pragma",
    "etag",
    "last-modified",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Whether a browser request header is passed on to the remote server
pub fn forward_request_header(name: &HeaderName) -> bool {
    !is_hop_by_hop(name) && *name != header::HOST && *name != header::CONTENT_LENGTH
}

/// Whether a remote response header is passed back to the browser
pub fn copy_response_header(name: &HeaderName) -> bool {
    !is_hop_by_hop(name) && !CACHING.contains(&name.as_str()) && *name != header::CONTENT_LENGTH
}

/// Local path (with query) the browser should use for a remote URL
pub fn local_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Turn an absolute `Location` on the remote origin into a local one.
/// Relative locations and other hosts are left alone.
pub fn rewrite_location(location: &str, origin: &Url) -> String {
    match Url::parse(location) {
        Ok(target) if target.origin() == origin.origin() => {
            let mut local = local_target(&target);
            if let Some(fragment) = target.fragment() {
                local.push('#');
                local.push_str(fragment);
            }
            local
        }
        _ => location.to_string(),
    }
}

/// Drop the `Domain` attribute so the cookie sticks to the local host
pub fn strip_cookie_domain(cookie: &str) -> String {
    cookie
        .split(';')
        .map(str::trim)
        .filter(|attribute| !attribute.to_ascii_lowercase().starts_with("domain="))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://survey.example.com/Interviews/abc/Home/Index").unwrap()
    }

    #[test]
    fn test_request_headers() {
        assert!(forward_request_header(&header::COOKIE));
        assert!(forward_request_header(&header::CONTENT_TYPE));
        assert!(forward_request_header(&header::USER_AGENT));
        assert!(!forward_request_header(&header::HOST));
        assert!(!forward_request_header(&header::CONTENT_LENGTH));
        assert!(!forward_request_header(&header::CONNECTION));
    }

    #[test]
    fn test_caching_headers_are_stripped() {
        for name in [
            header::CACHE_CONTROL,
            header::EXPIRES,
            header::PRAGMA,
            header::ETAG,
            header::LAST_MODIFIED,
        ] {
            assert!(!copy_response_header(&name), "{} was copied", name);
        }
        assert!(!copy_response_header(&header::TRANSFER_ENCODING));
        assert!(copy_response_header(&header::SET_COOKIE));
        assert!(copy_response_header(&header::CONTENT_TYPE));
        assert!(copy_response_header(&header::LOCATION));
    }

    #[test]
    fn test_rewrite_same_origin_location() {
        assert_eq!(
            rewrite_location(
                "https://survey.example.com/Interviews/abc/Home/Completed?x=1",
                &origin()
            ),
            "/Interviews/abc/Home/Completed?x=1"
        );
        assert_eq!(
            rewrite_location("https://survey.example.com/a#top", &origin()),
            "/a#top"
        );
    }

    #[test]
    fn test_other_locations_are_kept() {
        assert_eq!(
            rewrite_location("/Interviews/abc/Home/Index", &origin()),
            "/Interviews/abc/Home/Index"
        );
        assert_eq!(
            rewrite_location("https://login.example.com/", &origin()),
            "https://login.example.com/"
        );
        assert_eq!(
            rewrite_location("http://survey.example.com/a", &origin()),
            "http://survey.example.com/a"
        );
    }

    #[test]
    fn test_local_target() {
        let url = Url::parse("https://host/Interviews/abc?lang=en").unwrap();
        assert_eq!(local_target(&url), "/Interviews/abc?lang=en");
        assert_eq!(local_target(&Url::parse("https://host").unwrap()), "/");
    }

    #[test]
    fn test_strip_cookie_domain() {
        assert_eq!(
            strip_cookie_domain("session=abc; Domain=.example.com; Path=/; HttpOnly"),
            "session=abc; Path=/; HttpOnly"
        );
        assert_eq!(strip_cookie_domain("a=b"), "a=b");
    }
}
