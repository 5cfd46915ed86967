//! Interactive login wait.
//!
//! We never type credentials. The user completes SSO (and any MFA) in the
//! visible browser window while a poll loop watches for evidence that the
//! authenticated portal shell has rendered. Detection is a precedence list
//! of heuristic signals evaluated once per poll.

pub mod rules;

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::PageDriver;
use crate::login::rules::{
    confirmation, foreign_hint, host_position, ForeignHint, HostPosition, LoginProbe, LoginRules,
    LoginSignal,
};
use crate::utils::logging::truncate_label;
use crate::utils::urls::{absolutize, hostname};

/// Course hub path under the base URL; the proactive fallback navigates
/// here.
pub const COURSES_HUB_PATH: &str = "ultra/course";

/// `document.cookie.length` for the weakest confirmation signal.
const COOKIE_LENGTH_JS: &str = "document.cookie.length";

/// Where the poll loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No readable page or host yet.
    Settling,
    /// Parked on a foreign host, usually the identity provider.
    IdentityProvider,
    /// On the portal host, no signal yet.
    Unconfirmed,
}

/// A successful wait: which signal fired, after how many polls, and where
/// the page ended up.
#[derive(Debug)]
pub struct LoginOutcome {
    pub signal: LoginSignal,
    pub attempts: u32,
    pub final_url: String,
}

pub struct LoginWatcher<'a> {
    driver: &'a PageDriver,
    config: &'a Config,
    base_host: Option<String>,
}

impl<'a> LoginWatcher<'a> {
    pub fn new(driver: &'a PageDriver, config: &'a Config) -> Self {
        let base_host = hostname(&config.base_url);
        Self {
            driver,
            config,
            base_host,
        }
    }

    /// Poll until a confirmation signal fires, or fail with MFA guidance
    /// once the ceiling passes.
    pub async fn wait_until_logged_in(&self) -> AppResult<LoginOutcome> {
        let deadline = Instant::now() + Duration::from_secs(self.config.max_wait_secs);
        let rules = LoginRules {
            large_dom_bytes: self.config.large_dom_bytes,
            modest_dom_bytes: self.config.modest_dom_bytes,
            min_cookie_header_len: self.config.min_cookie_header_len as u64,
        };
        let mut attempt: u32 = 0;
        let mut hub_fallback_done = false;
        let mut last_context: Option<(Phase, String)> = None;

        while Instant::now() < deadline {
            attempt += 1;
            let url = self
                .driver
                .current_url()
                .await
                .unwrap_or_else(|_| "about:blank".to_string());
            // SAML hops carry kilobyte-long request blobs in the URL.
            debug!("attempt {attempt}: current url {}", truncate_label(&url, 120));

            let html = match self.driver.content().await {
                Ok(html) => html,
                Err(e) => {
                    debug!("page still navigating ({e}), retrying");
                    self.pause().await;
                    continue;
                }
            };

            let current_host = hostname(&url);
            match host_position(self.base_host.as_deref(), current_host.as_deref()) {
                HostPosition::Foreign => {
                    let host = current_host.unwrap_or_default();
                    let context = (Phase::IdentityProvider, host.clone());
                    if last_context.as_ref() != Some(&context) {
                        match foreign_hint(&host, &html) {
                            Some(ForeignHint::MultiFactor) => {
                                info!("on MFA host '{host}', complete the challenge in the browser window");
                            }
                            Some(ForeignHint::IdentityProvider) => {
                                info!("on identity provider '{host}', waiting for you to sign in");
                            }
                            None => info!("on foreign host '{host}', waiting"),
                        }
                        last_context = Some(context);
                    }
                    if attempt == 5 && !self.config.headless {
                        info!("still on the identity provider; finish authenticating in the browser window, we'll keep waiting");
                    }
                }
                HostPosition::Unknown => {
                    let context = (Phase::Settling, String::new());
                    if last_context.as_ref() != Some(&context) {
                        debug!("no usable host yet");
                        last_context = Some(context);
                    }
                }
                HostPosition::Target => {
                    let cookie_header_len =
                        self.driver.eval_as::<u64>(COOKIE_LENGTH_JS).await.ok();
                    let probe = LoginProbe {
                        url: &url,
                        html: &html,
                        cookie_header_len,
                    };
                    let base_host = self.base_host.as_deref().unwrap_or_default();
                    if let Some(signal) = confirmation(base_host, &probe, &rules) {
                        info!("login confirmed after {attempt} poll(s): {signal}");
                        return Ok(LoginOutcome {
                            signal,
                            attempts: attempt,
                            final_url: url,
                        });
                    }
                    let context = (Phase::Unconfirmed, base_host.to_string());
                    if last_context.as_ref() != Some(&context) {
                        debug!("on portal host, no confirmation signal yet");
                        last_context = Some(context);
                    }
                    if attempt >= self.config.fallback_after_attempts && !hub_fallback_done {
                        hub_fallback_done = true;
                        self.try_hub_navigation(&url).await;
                    }
                }
            }
            self.pause().await;
        }

        Err(AppError::login_timeout(self.config.max_wait_secs))
    }

    /// One-shot proactive jump to the course hub. Landing pages sometimes
    /// idle on a portal route that never shows any marker; the hub always
    /// does once authenticated.
    async fn try_hub_navigation(&self, current_url: &str) {
        let Some(target) = absolutize(&self.config.base_url, COURSES_HUB_PATH) else {
            return;
        };
        if current_url.trim_end_matches('/').ends_with("/ultra/course") {
            return;
        }
        info!("no signal yet, navigating to the courses hub: {target}");
        match self.driver.goto(&target).await {
            Ok(()) => self.driver.settle(self.config.settle_timeout_ms).await,
            Err(e) => warn!("hub navigation failed: {e}"),
        }
    }

    async fn pause(&self) {
        sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
    }
}
