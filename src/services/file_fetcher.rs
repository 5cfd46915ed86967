//! Authenticated file transfer, capability layer.
//!
//! The browser owns the session; moving file bytes through a DevTools
//! channel is slow and lossy, so transfers run over a plain HTTP client
//! whose jar is seeded with the browser's cookies. To the portal both
//! look like the same logged-in client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::DownloadError;
use crate::session::CookieRecord;

/// HTTP client carrying a browser-derived cookie session.
pub struct FileFetcher {
    client: Client,
}

impl FileFetcher {
    /// Build a client whose jar holds `cookies`. Unparseable cookie
    /// domains are skipped; the rest of the session still works.
    pub fn from_cookies(
        cookies: &[CookieRecord],
        per_request_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let jar = Arc::new(Jar::default());
        let mut loaded = 0usize;
        for cookie in cookies {
            if cookie.name.is_empty() || cookie.domain.is_empty() {
                continue;
            }
            let Ok(origin) = origin_url(cookie).parse::<Url>() else {
                debug!("skipping cookie {} with unusable domain", cookie.name);
                continue;
            };
            jar.add_cookie_str(&set_cookie_line(cookie), &origin);
            loaded += 1;
        }
        debug!("seeded download jar with {loaded} cookie(s)");
        let client = Client::builder()
            .cookie_provider(jar)
            .timeout(per_request_timeout)
            .build()
            .map_err(|e| DownloadError::ClientBuildFailed {
                source: Box::new(e),
            })?;
        Ok(Self { client })
    }

    /// GET one file. Non-2xx statuses and empty bodies count as failures
    /// so the caller never writes a zero-byte or error-page artifact.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| item_error(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(item_error(url, format!("HTTP {}", status.as_u16())));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| item_error(url, e.to_string()))?;
        if body.is_empty() {
            return Err(item_error(url, "empty body"));
        }
        Ok(body.to_vec())
    }
}

fn item_error(url: &str, reason: impl Into<String>) -> DownloadError {
    DownloadError::Item {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// `Set-Cookie` line for `Jar::add_cookie_str`. Expiry is left off: the
/// jar lives for a single run and the browser already dropped anything
/// stale.
fn set_cookie_line(cookie: &CookieRecord) -> String {
    let mut parts = vec![
        format!("{}={}", cookie.name, cookie.value),
        format!("Domain={}", cookie.domain),
        format!("Path={}", cookie.path),
    ];
    if cookie.secure {
        parts.push("Secure".to_string());
    }
    parts.join("; ")
}

/// Origin URL the jar matches the cookie against; leading dots mark
/// host-suffix cookies and are not part of a hostname.
fn origin_url(cookie: &CookieRecord) -> String {
    let scheme = if cookie.secure { "https" } else { "http" };
    let domain = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
    let path = if cookie.path.is_empty() { "/" } else { &cookie.path };
    format!("{scheme}://{domain}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, domain: &str, secure: bool) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: "v".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: false,
            secure,
            session: true,
            same_site: None,
        }
    }

    #[test]
    fn set_cookie_line_carries_domain_path_and_secure() {
        let line = set_cookie_line(&record("BbRouter", "learn.example.edu", true));
        assert_eq!(line, "BbRouter=v; Domain=learn.example.edu; Path=/; Secure");
    }

    #[test]
    fn insecure_cookies_omit_the_secure_flag() {
        let line = set_cookie_line(&record("t", "learn.example.edu", false));
        assert!(!line.contains("Secure"));
    }

    #[test]
    fn origin_strips_the_leading_dot_and_matches_scheme() {
        assert_eq!(
            origin_url(&record("t", ".example.edu", true)),
            "https://example.edu/"
        );
        assert_eq!(
            origin_url(&record("t", "example.edu", false)),
            "http://example.edu/"
        );
    }

    #[test]
    fn client_builds_from_a_mixed_cookie_set() {
        let cookies = vec![
            record("good", "learn.example.edu", true),
            record("", "learn.example.edu", true),
            record("nodomain", "", true),
        ];
        assert!(FileFetcher::from_cookies(&cookies, Duration::from_secs(5)).is_ok());
    }
}
