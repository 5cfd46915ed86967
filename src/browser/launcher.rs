//! Browser lifecycle around the persistent profile.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// A running browser bound to the persistent profile directory.
///
/// The profile is the backbone of session persistence: whatever the portal
/// lets the browser keep lands in it, and our own snapshot files sit beside
/// it in the same directory.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch against `config.profile_dir`, creating it on first use.
    pub async fn launch(config: &Config) -> AppResult<Self> {
        let profile_dir = Path::new(&config.profile_dir);
        tokio::fs::create_dir_all(profile_dir)
            .await
            .map_err(|e| AppError::launch_failed(&config.profile_dir, e))?;
        info!("launching browser (profile: {})", config.profile_dir);

        // The stock automation args (--enable-automation and friends) are
        // exactly what SSO pages latch onto; swap them for a minimal
        // interactive-friendly set.
        let mut builder = BrowserConfig::builder()
            .disable_default_args()
            .user_data_dir(profile_dir)
            .viewport(None)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain");
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| AppError::launch_failed(&config.profile_dir, e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::launch_failed(&config.profile_dir, e))?;
        debug!("browser process up");

        // Drain browser events in the background.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        // Brief pause so browser state syncs before first use.
        sleep(Duration::from_millis(300)).await;

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a blank page; callers navigate it themselves.
    pub async fn new_page(&self) -> AppResult<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(AppError::page_creation_failed)
    }

    /// Close the browser and stop the event task. Waiting on the process is
    /// what lets the profile flush to disk.
    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
