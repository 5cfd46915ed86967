//! Cookie snapshot model and rehydration planning.
//!
//! Institutions routinely mark the critical auth cookies session-only, so the
//! browser never persists them into the profile between launches. We snapshot
//! every cookie after a confirmed login and re-add the missing ones on later
//! runs, which usually skips a fresh SSO round trip.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieSameSite, SetCookieParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppResult;

/// One cookie as persisted in the snapshot file. `expires` follows the
/// devtools convention: seconds since the epoch, with `-1` (or `0`) meaning a
/// session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<CookieSameSite>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl From<&Cookie> for CookieRecord {
    fn from(c: &Cookie) -> Self {
        CookieRecord {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            expires: c.expires,
            http_only: c.http_only,
            secure: c.secure,
            session: c.session,
            same_site: c.same_site.clone(),
        }
    }
}

impl CookieRecord {
    /// Devtools `Network.setCookie` parameters restoring this cookie.
    pub fn to_set_cookie_params(&self) -> Result<SetCookieParams, String> {
        let mut builder = SetCookieParams::builder()
            .name(self.name.clone())
            .value(self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);
        if self.expires > 0.0 {
            builder = builder.expires(TimeSinceEpoch::new(self.expires));
        }
        if let Some(same_site) = &self.same_site {
            builder = builder.same_site(same_site.clone());
        }
        builder.build()
    }
}

// ========== Browser round trips ==========

/// Every cookie the browser currently holds, across all domains.
pub async fn capture_all(page: &Page) -> AppResult<Vec<CookieRecord>> {
    let response = page.execute(GetCookiesParams::default()).await?;
    Ok(response
        .result
        .cookies
        .iter()
        .map(CookieRecord::from)
        .collect())
}

/// Re-add `needed` cookies one by one. A cookie the browser refuses is
/// logged and skipped. Returns how many were added.
pub async fn apply(page: &Page, needed: &[&CookieRecord]) -> usize {
    let mut added = 0;
    for cookie in needed {
        let params = match cookie.to_set_cookie_params() {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping cookie {}/{}: {}", cookie.domain, cookie.name, e);
                continue;
            }
        };
        match page.execute(params).await {
            Ok(_) => added += 1,
            Err(e) => warn!("could not add cookie {}/{}: {}", cookie.domain, cookie.name, e),
        }
    }
    added
}

// ========== Rehydration planning ==========

/// Saved cookies worth re-adding: scoped to `host`, carrying both a domain
/// and a name, and not already present among `live` by (domain, name).
pub fn missing_for_host<'a>(
    saved: &'a [CookieRecord],
    live: &[CookieRecord],
    host: &str,
) -> Vec<&'a CookieRecord> {
    let present: HashSet<(&str, &str)> = live
        .iter()
        .map(|c| (c.domain.as_str(), c.name.as_str()))
        .collect();
    saved
        .iter()
        .filter(|c| !c.domain.is_empty() && !c.name.is_empty())
        .filter(|c| c.domain.contains(host))
        .filter(|c| !present.contains(&(c.domain.as_str(), c.name.as_str())))
        .collect()
}

// ========== Diagnostics ==========

/// One `domain | name | ttl | flags` line per cookie whose domain mentions
/// `target_host` (all cookies when no host is given). Flags are `S` for
/// secure and `H` for http-only, `-` otherwise.
pub fn cookie_brief(cookies: &[CookieRecord], target_host: Option<&str>) -> Vec<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let mut lines = Vec::new();
    for c in cookies {
        if let Some(host) = target_host {
            if !c.domain.contains(host) {
                continue;
            }
        }
        let ttl = if c.expires > 0.0 {
            let remaining = (c.expires - now) as i64;
            if remaining < 0 {
                "expired".to_string()
            } else {
                format!("ttl={}h", remaining / 3600)
            }
        } else {
            "session".to_string()
        };
        let secure = if c.secure { 'S' } else { '-' };
        let http_only = if c.http_only { 'H' } else { '-' };
        lines.push(format!("{} | {} | {} | {}{}", c.domain, c.name, ttl, secure, http_only));
    }
    lines
}

/// Sorted unique non-empty cookie domains.
pub fn cookie_domains(cookies: &[CookieRecord]) -> Vec<String> {
    let mut domains: Vec<String> = cookies
        .iter()
        .map(|c| c.domain.clone())
        .filter(|d| !d.is_empty())
        .collect();
    domains.sort();
    domains.dedup();
    domains
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(domain: &str, name: &str) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: "v".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: false,
            secure: false,
            session: true,
            same_site: None,
        }
    }

    #[test]
    fn missing_for_host_skips_foreign_present_and_nameless() {
        let saved = vec![
            cookie("learn.example.edu", "BbRouter"),
            cookie("learn.example.edu", "JSESSIONID"),
            cookie("idp.other.org", "shib_session"),
            cookie("", "orphan"),
            cookie("learn.example.edu", ""),
        ];
        let live = vec![cookie("learn.example.edu", "JSESSIONID")];

        let planned = missing_for_host(&saved, &live, "learn.example.edu");
        let names: Vec<&str> = planned.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["BbRouter"]);
    }

    #[test]
    fn missing_for_host_matches_parent_domains() {
        let saved = vec![cookie(".example.edu", "sso_token")];
        let planned = missing_for_host(&saved, &[], "example.edu");
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn brief_formats_ttl_and_flags() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs_f64();
        let mut persistent = cookie("learn.example.edu", "token");
        persistent.expires = now + 7300.0;
        persistent.secure = true;
        persistent.http_only = true;
        let mut stale = cookie("learn.example.edu", "old");
        stale.expires = now - 10.0;
        let ephemeral = cookie("learn.example.edu", "flash");

        let lines = cookie_brief(&[persistent, stale, ephemeral], None);
        assert!(lines[0].contains("token | ttl=2h | SH"), "got {}", lines[0]);
        assert!(lines[1].contains("old | expired | --"), "got {}", lines[1]);
        assert!(lines[2].contains("flash | session | --"), "got {}", lines[2]);
    }

    #[test]
    fn brief_filters_by_target_host() {
        let cookies = vec![
            cookie("learn.example.edu", "a"),
            cookie("cdn.unrelated.com", "b"),
        ];
        let lines = cookie_brief(&cookies, Some("example.edu"));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("learn.example.edu"));
    }

    #[test]
    fn domains_are_sorted_and_unique() {
        let cookies = vec![
            cookie("b.example.edu", "x"),
            cookie("a.example.edu", "y"),
            cookie("b.example.edu", "z"),
            cookie("", "w"),
        ];
        assert_eq!(cookie_domains(&cookies), vec!["a.example.edu", "b.example.edu"]);
    }

    #[test]
    fn set_cookie_params_carry_expiry_only_when_persistent() {
        let mut c = cookie("learn.example.edu", "token");
        c.expires = 2_000_000_000.0;
        let params = c.to_set_cookie_params().unwrap();
        assert!(params.expires.is_some());

        let params = cookie("learn.example.edu", "flash").to_set_cookie_params().unwrap();
        assert!(params.expires.is_none());
    }

    #[test]
    fn snapshot_json_round_trips() {
        let mut c = cookie("learn.example.edu", "token");
        c.http_only = true;
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"httpOnly\":true"));
        let back: CookieRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
