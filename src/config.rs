use std::path::Path;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::utils::urls::normalize_base_url;

/// Operation configuration. One instance is built at startup and passed into
/// every core operation; there are no process-wide mutable settings.
///
/// The numeric fields are empirically tuned defaults for one institution's
/// deployment, surfaced here so other deployments can adjust them without
/// touching the state machine.
#[derive(Clone, Debug)]
pub struct Config {
    /// Portal landing URL, normalized to a single trailing `/`.
    pub base_url: String,
    /// Persistent browser profile + snapshot directory.
    pub profile_dir: String,
    /// Batch download output directory.
    pub download_dir: String,
    /// Run the browser headless (only sensible once a session exists).
    pub headless: bool,
    /// Login-wait ceiling in seconds.
    pub max_wait_secs: u64,
    /// Login poll cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Poll count after which the watcher proactively navigates to the
    /// courses hub (once per wait).
    pub fallback_after_attempts: u32,
    /// Bound for a single navigation or script evaluation, in milliseconds.
    pub nav_timeout_ms: u64,
    /// Post-navigation settle wait in milliseconds.
    pub settle_timeout_ms: u64,
    /// Document size above which an app-route URL counts as rendered content.
    pub large_dom_bytes: usize,
    /// Document size floor for the weakest (cookie-based) login signal.
    pub modest_dom_bytes: usize,
    /// Minimum `document.cookie` length for the weakest login signal.
    pub min_cookie_header_len: usize,
    /// Section-expansion round cap per document.
    pub expansion_rounds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            profile_dir: "bb_profile".to_string(),
            download_dir: "downloads".to_string(),
            headless: false,
            max_wait_secs: 180,
            poll_interval_ms: 1_000,
            fallback_after_attempts: 15,
            nav_timeout_ms: 30_000,
            settle_timeout_ms: 2_000,
            large_dom_bytes: 20_000,
            modest_dom_bytes: 18_000,
            min_cookie_header_len: 20,
            expansion_rounds: 50,
        }
    }
}

/// Optional TOML overlay; every field is optional so a file can override
/// just the knobs it cares about.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverlay {
    pub base_url: Option<String>,
    pub profile_dir: Option<String>,
    pub download_dir: Option<String>,
    pub headless: Option<bool>,
    pub max_wait_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub fallback_after_attempts: Option<u32>,
    pub nav_timeout_ms: Option<u64>,
    pub settle_timeout_ms: Option<u64>,
    pub large_dom_bytes: Option<usize>,
    pub modest_dom_bytes: Option<usize>,
    pub min_cookie_header_len: Option<usize>,
    pub expansion_rounds: Option<u32>,
}

impl Config {
    /// Defaults overridden by `BB_*` environment variables where set.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var("BB_BASE_URL").map(|v| normalize_base_url(&v)).unwrap_or(default.base_url),
            profile_dir: std::env::var("BB_PROFILE_DIR").unwrap_or(default.profile_dir),
            download_dir: std::env::var("BB_DOWNLOAD_DIR").unwrap_or(default.download_dir),
            headless: std::env::var("BB_HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            max_wait_secs: std::env::var("BB_MAX_WAIT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_wait_secs),
            poll_interval_ms: std::env::var("BB_POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            fallback_after_attempts: std::env::var("BB_FALLBACK_AFTER").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fallback_after_attempts),
            nav_timeout_ms: std::env::var("BB_NAV_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.nav_timeout_ms),
            settle_timeout_ms: std::env::var("BB_SETTLE_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.settle_timeout_ms),
            large_dom_bytes: std::env::var("BB_LARGE_DOM_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.large_dom_bytes),
            modest_dom_bytes: std::env::var("BB_MODEST_DOM_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.modest_dom_bytes),
            min_cookie_header_len: std::env::var("BB_MIN_COOKIE_LEN").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_cookie_header_len),
            expansion_rounds: std::env::var("BB_EXPANSION_ROUNDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.expansion_rounds),
        }
    }

    /// Load a TOML overlay file and apply it on top of `self`.
    pub async fn apply_file(mut self, path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            }
        })?;
        let overlay: ConfigOverlay = toml::from_str(&content).map_err(|e| {
            ConfigError::FileParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            }
        })?;
        self.apply_overlay(overlay);
        Ok(self)
    }

    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.base_url {
            self.base_url = normalize_base_url(&v);
        }
        if let Some(v) = overlay.profile_dir {
            self.profile_dir = v;
        }
        if let Some(v) = overlay.download_dir {
            self.download_dir = v;
        }
        if let Some(v) = overlay.headless {
            self.headless = v;
        }
        if let Some(v) = overlay.max_wait_secs {
            self.max_wait_secs = v;
        }
        if let Some(v) = overlay.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = overlay.fallback_after_attempts {
            self.fallback_after_attempts = v;
        }
        if let Some(v) = overlay.nav_timeout_ms {
            self.nav_timeout_ms = v;
        }
        if let Some(v) = overlay.settle_timeout_ms {
            self.settle_timeout_ms = v;
        }
        if let Some(v) = overlay.large_dom_bytes {
            self.large_dom_bytes = v;
        }
        if let Some(v) = overlay.modest_dom_bytes {
            self.modest_dom_bytes = v;
        }
        if let Some(v) = overlay.min_cookie_header_len {
            self.min_cookie_header_len = v;
        }
        if let Some(v) = overlay.expansion_rounds {
            self.expansion_rounds = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_values() {
        let cfg = Config::default();
        assert_eq!(cfg.max_wait_secs, 180);
        assert_eq!(cfg.fallback_after_attempts, 15);
        assert_eq!(cfg.large_dom_bytes, 20_000);
        assert_eq!(cfg.modest_dom_bytes, 18_000);
        assert_eq!(cfg.min_cookie_header_len, 20);
        assert_eq!(cfg.expansion_rounds, 50);
        assert!(!cfg.headless);
    }

    #[test]
    fn overlay_touches_only_named_fields() {
        let mut cfg = Config::default();
        cfg.apply_overlay(ConfigOverlay {
            base_url: Some("https://learn.uq.edu.au".to_string()),
            max_wait_secs: Some(60),
            ..ConfigOverlay::default()
        });
        assert_eq!(cfg.base_url, "https://learn.uq.edu.au/");
        assert_eq!(cfg.max_wait_secs, 60);
        assert_eq!(cfg.poll_interval_ms, 1_000);
        assert_eq!(cfg.profile_dir, "bb_profile");
    }

    #[test]
    fn overlay_parses_from_toml() {
        let overlay: ConfigOverlay =
            toml::from_str("headless = true\nexpansion_rounds = 10\n").unwrap();
        assert_eq!(overlay.headless, Some(true));
        assert_eq!(overlay.expansion_rounds, Some(10));
        assert!(overlay.base_url.is_none());
    }
}
