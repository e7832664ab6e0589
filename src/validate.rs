#![forbid(unsafe_code)]

//! Hostname allow-list for links accepted by the resolver.

use url::Url;

/// Hosts TikTok serves share links from. Matching is exact; subdomains that
/// are not listed here are rejected.
pub const ALLOWED_HOSTS: [&str; 5] = [
    "www.tiktok.com",
    "tiktok.com",
    "vm.tiktok.com",
    "vt.tiktok.com",
    "m.tiktok.com",
];

/// Returns `true` when `candidate` parses as a URL whose host is one of
/// [`ALLOWED_HOSTS`]. The scheme and path are not inspected.
pub fn is_valid_tiktok_url(candidate: &str) -> bool {
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };
    parsed
        .host_str()
        .is_some_and(|host| ALLOWED_HOSTS.contains(&host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_allowed_host_with_any_path() {
        for host in ALLOWED_HOSTS {
            for path in ["", "/", "/@user/video/7312345678901234567", "/ZSabc123/?q=1#x"] {
                let url = format!("https://{host}{path}");
                assert!(is_valid_tiktok_url(&url), "{url} should be accepted");
            }
        }
    }

    #[test]
    fn host_matching_is_case_insensitive_like_browsers() {
        assert!(is_valid_tiktok_url("HTTPS://WWW.TikTok.COM/@user"));
    }

    #[test]
    fn scheme_is_not_enforced() {
        assert!(is_valid_tiktok_url("http://vm.tiktok.com/abc"));
        assert!(is_valid_tiktok_url("ftp://tiktok.com/abc"));
    }

    #[test]
    fn rejects_lookalike_and_unlisted_hosts() {
        for url in [
            "https://fake.tiktok.com.evil.com/video/1",
            "https://evil.com/www.tiktok.com",
            "https://api.tiktok.com/video/1",
            "https://tiktok.com.evil.com",
            "https://nottiktok.com/@user",
            "https://www.tiktok.co/@user",
            "https://www.youtube.com/watch?v=x",
        ] {
            assert!(!is_valid_tiktok_url(url), "{url} should be rejected");
        }
    }

    #[test]
    fn rejects_malformed_input_without_panicking() {
        for input in ["", "not a url", "www.tiktok.com/@user", "https://", "://tiktok.com"] {
            assert!(!is_valid_tiktok_url(input), "{input:?} should be rejected");
        }
    }
}
