//! Page driver, infrastructure layer.
//!
//! Holds the single scarce `Page` resource and exposes capabilities only:
//! navigate, read, evaluate, settle. It knows nothing about logins, courses,
//! or downloads.

use std::time::Duration;

use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout};

use crate::error::{AppError, AppResult};

pub struct PageDriver {
    page: Page,
    op_timeout: Duration,
}

impl PageDriver {
    pub fn new(page: Page, op_timeout_ms: u64) -> Self {
        Self {
            page,
            op_timeout: Duration::from_millis(op_timeout_ms),
        }
    }

    /// The underlying page, for protocol commands beyond plain evaluation.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate and wait for the load event, bounded by the operation
    /// timeout.
    pub async fn goto(&self, url: &str) -> AppResult<()> {
        match timeout(self.op_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::navigation_failed(url, e)),
            Err(_) => Err(AppError::navigation_timeout(url, self.op_timeout.as_millis() as u64)),
        }
    }

    /// Serialized DOM of the current page.
    pub async fn content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }

    /// Current URL; blank pages read as `about:blank`.
    pub async fn current_url(&self) -> AppResult<String> {
        let url = self.page.url().await?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    /// Evaluate JS and return the JSON result.
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        match timeout(self.op_timeout, self.page.evaluate(js_code.into())).await {
            Ok(Ok(result)) => Ok(result.into_value()?),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(AppError::script_timeout(self.op_timeout.as_millis() as u64)),
        }
    }

    /// Evaluate JS and deserialize the result.
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let value = self.eval(js_code).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Evaluate promise-returning JS and deserialize the settled value.
    /// Plain evaluation would hand back the pending promise object instead.
    pub async fn eval_awaiting<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let params = EvaluateParams::builder()
            .expression(js_code.into())
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(AppError::Other)?;
        match timeout(self.op_timeout, self.page.evaluate(params)).await {
            Ok(Ok(result)) => Ok(result.into_value()?),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(AppError::script_timeout(self.op_timeout.as_millis() as u64)),
        }
    }

    /// Give client-side rendering a moment to catch up. Single-page shells
    /// keep painting well after the load event fires.
    pub async fn settle(&self, ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }
}
