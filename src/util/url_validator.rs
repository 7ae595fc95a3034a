use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a feed URL is refused before any request is made.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Parse and vet a feed URL supplied by a user.
///
/// Only `http` and `https` with a host are accepted. Unless
/// `allow_private_hosts` is set, `localhost`, loopback, RFC 1918,
/// link-local and unique-local addresses are rejected as well (SSRF guard).
/// Hostnames are not resolved, so a public name pointing at a private
/// address still passes.
pub fn validate_feed_url(url_str: &str, allow_private_hosts: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if allow_private_hosts {
        return Ok(url);
    }

    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            if v6.is_unspecified() {
                return true;
            }
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls_accepted() {
        let url = validate_feed_url("https://example.com/feed.xml", false).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert!(validate_feed_url("http://news.example.org:8080/rss", false).is_ok());
        assert!(validate_feed_url("  https://example.com/rss  ", false).is_ok());
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        for url in ["file:///etc/passwd", "ftp://example.com", "javascript:alert(1)"] {
            assert!(validate_feed_url(url, true).is_err(), "{url} accepted");
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validate_feed_url("not a url", false),
            Err(UrlValidationError::InvalidUrl(_))
        ));
        assert!(validate_feed_url("", false).is_err());
    }

    #[test]
    fn test_loopback_rejected() {
        for url in ["http://localhost/feed", "http://LOCALHOST/feed", "http://127.0.0.1/feed", "http://[::1]/feed"] {
            assert!(matches!(
                validate_feed_url(url, false),
                Err(UrlValidationError::Localhost)
            ));
        }
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(validate_feed_url(url, false).is_err(), "{url} accepted");
        }
    }

    #[test]
    fn test_private_hosts_allowed_when_configured() {
        assert!(validate_feed_url("http://127.0.0.1:4000/rss", true).is_ok());
        assert!(validate_feed_url("http://localhost/rss", true).is_ok());
    }
}
