//! Blocking entry points for hosts without their own runtime.
//!
//! Every operation is async, but the binary's entry point and embedding
//! hosts (a sync tool server, a test harness) are not. The runner owns a
//! dedicated multi-thread runtime so one blocked operation never starves
//! the browser's event stream, which always needs a live worker.
//!
//! Each `run_*` wrapper owns the full browser lifecycle: launch, run the
//! one operation, close. The browser closes even when the operation
//! fails, so a dead session never leaks a Chromium process, and callers
//! hold no browser state between calls.

use std::future::Future;
use std::path::Path;

use tokio::runtime::{Builder, Runtime};

use crate::app::{App, DownloadReport};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::extract::{CourseItem, DownloadCandidate};

pub struct OffloadRunner {
    runtime: Runtime,
}

impl OffloadRunner {
    pub fn new() -> AppResult<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| AppError::Other(format!("could not start the operation runtime: {e}")))?;
        Ok(Self { runtime })
    }

    /// Drive an arbitrary future to completion, blocking the caller.
    pub fn run<F: Future>(&self, operation: F) -> F::Output {
        self.runtime.block_on(operation)
    }

    pub fn run_login(&self, config: &Config, stay_open: bool) -> AppResult<()> {
        self.run(async {
            let app = App::initialize(config.clone()).await?;
            let result = app.login(stay_open).await;
            app.close().await;
            result
        })
    }

    pub fn run_list_courses(&self, config: &Config) -> AppResult<Vec<CourseItem>> {
        self.run(async {
            let app = App::initialize(config.clone()).await?;
            let result = app.list_courses().await;
            app.close().await;
            result
        })
    }

    pub fn run_list_content(
        &self,
        config: &Config,
        course_url: &str,
    ) -> AppResult<Vec<DownloadCandidate>> {
        self.run(async {
            let app = App::initialize(config.clone()).await?;
            let result = app.list_content(course_url).await;
            app.close().await;
            result
        })
    }

    pub fn run_download(
        &self,
        config: &Config,
        course_url: &str,
        out_dir: &Path,
        pattern: Option<&str>,
        regex: Option<&str>,
    ) -> AppResult<DownloadReport> {
        self.run(async {
            let app = App::initialize(config.clone()).await?;
            let result = app.download(course_url, out_dir, pattern, regex).await;
            app.close().await;
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn runs_a_plain_future_to_completion() {
        let runner = OffloadRunner::new().unwrap();
        assert_eq!(runner.run(async { 2 + 2 }), 4);
    }

    #[test]
    fn runtime_supports_timers_and_spawned_tasks() {
        let runner = OffloadRunner::new().unwrap();
        let joined = runner.run(async {
            let handle = tokio::spawn(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                "done"
            });
            handle.await.unwrap()
        });
        assert_eq!(joined, "done");
    }

    #[test]
    fn runner_is_reusable_across_operations() {
        let runner = OffloadRunner::new().unwrap();
        for i in 0..3 {
            assert_eq!(runner.run(async move { i * 2 }), i * 2);
        }
    }
}
