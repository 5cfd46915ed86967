//! Operation orchestration.
//!
//! One `App` per invocation: launch the profile-backed browser, run a
//! single operation end to end, close. Flows compose the session, login,
//! extraction, and service layers. Data destined for stdout is returned
//! to the caller; progress and hints go through tracing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::download::{guess_filename_from_url, unique_filename, NameFilter};
use crate::error::{AppResult, DownloadError};
use crate::extract::ally::{extract_ally_preview_urls, ALLY_PREVIEW_ATTR};
use crate::extract::courses::extract_courses;
use crate::extract::downloadables::extract_downloadables;
use crate::extract::{CourseItem, DownloadCandidate};
use crate::infrastructure::PageDriver;
use crate::login::{LoginWatcher, COURSES_HUB_PATH};
use crate::services::{CourseDiscovery, FileFetcher, SectionExpander};
use crate::session::{cookies, store, web_storage, CookieRecord, SessionStore};
use crate::utils::urls::{absolutize, hostname};

/// Cookie brief lines shown before the overflow marker.
const BRIEF_MAX_LINES: usize = 12;

/// Page HTML dumped next to the profile after course discovery, for
/// offline triage of detector misses.
const PAGE_SNAPSHOT_FILE: &str = "last_courses_page.html";

/// Chromium files whose presence indicates a usable persisted session.
const PROFILE_ARTIFACTS: [&str; 2] = ["Default/Network/Cookies", "Default/Preferences"];

pub struct App {
    config: Config,
    store: SessionStore,
    session: BrowserSession,
    driver: PageDriver,
}

impl App {
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let store = SessionStore::new(&config.profile_dir);
        let session = BrowserSession::launch(&config).await?;
        let page = session.new_page().await?;
        let driver = PageDriver::new(page, config.nav_timeout_ms);
        Ok(Self {
            config,
            store,
            session,
            driver,
        })
    }

    pub async fn close(self) {
        self.session.close().await;
    }

    // ========== Operations ==========

    /// Open the portal and wait for the user to authenticate in the
    /// visible window, then snapshot cookies, web storage, and the final
    /// host into the profile directory.
    pub async fn login(&self, stay_open: bool) -> AppResult<()> {
        info!("opening browser to {} ...", self.config.base_url);
        match self.store.load_cookies().await {
            Ok(saved) => info!(
                "pre-existing cookie domains: {}",
                joined_or_none(&cookies::cookie_domains(&saved))
            ),
            Err(e) => warn!("could not read prior cookie snapshot: {e}"),
        }

        self.driver.goto(&self.config.base_url).await?;
        let outcome = LoginWatcher::new(&self.driver, &self.config)
            .wait_until_logged_in()
            .await?;

        if let Err(e) = self.store.save_base_host(&outcome.final_url).await {
            warn!("could not record the portal host: {e}");
        }

        self.snapshot_web_storage().await;
        let captured = self.snapshot_cookies().await;

        let host_hint = self.host_hint().await;
        log_cookie_brief(&captured, host_hint.as_deref());

        info!("profile dir: {}", resolved_display(self.store.profile_dir()));
        info!("looks good, the session should persist across runs");

        if stay_open && !self.config.headless {
            eprintln!(
                "Press Enter here after you confirm you can see your courses (this keeps the browser open)."
            );
            let mut line = String::new();
            let _ = BufReader::new(tokio::io::stdin()).read_line(&mut line).await;
        }
        info!("done");
        Ok(())
    }

    /// Discover enrolled courses: static anchors on the landing page
    /// first, the in-page REST probe when nothing renders.
    pub async fn list_courses(&self) -> AppResult<Vec<CourseItem>> {
        self.log_snapshot_state().await;
        self.rehydrate_cookies().await;
        self.inject_web_storage().await;

        let hub = absolutize(&self.config.base_url, COURSES_HUB_PATH);
        let mut landed_on_hub = false;
        if let Some(hub_url) = &hub {
            match self.driver.goto(hub_url).await {
                Ok(()) => {
                    info!("navigated directly to /ultra/course first");
                    landed_on_hub = true;
                }
                Err(e) => debug!("hub-first navigation failed: {e}"),
            }
        }
        if !landed_on_hub {
            self.driver.goto(&self.config.base_url).await?;
        }
        // Always finish on the landing page: it is where every course
        // detector was tuned, and stale-session redirects land there too.
        self.driver.goto(&self.config.base_url).await?;

        LoginWatcher::new(&self.driver, &self.config)
            .wait_until_logged_in()
            .await?;

        let html = self.driver.content().await?;
        self.dump_page_snapshot(&html).await;
        let mut found = extract_courses(&html, &self.config.base_url);
        if found.is_empty() {
            info!("no static course anchors found, trying dynamic api discovery");
            let url = self.driver.current_url().await?;
            if !url.trim_end_matches('/').ends_with("/ultra/course") {
                if let Some(hub_url) = &hub {
                    match self.driver.goto(hub_url).await {
                        Ok(()) => self.driver.settle(self.config.settle_timeout_ms).await,
                        Err(e) => debug!("hub navigation failed: {e}"),
                    }
                }
            }
            found = CourseDiscovery::new(&self.config.base_url)
                .discover_via_api(&self.driver)
                .await;
        }
        Ok(found)
    }

    /// Open one course page, expand every collapsed section, and list the
    /// download-looking links.
    pub async fn list_content(&self, course_url: &str) -> AppResult<Vec<DownloadCandidate>> {
        self.rehydrate_cookies().await;
        self.inject_web_storage().await;
        self.driver.goto(course_url).await?;
        self.driver.settle(self.config.settle_timeout_ms).await;

        let clicked = SectionExpander::new(self.config.expansion_rounds)
            .expand_all(&self.driver)
            .await;
        if clicked > 0 {
            info!("expanded {clicked} collapsed section(s)");
        }

        let html = self.driver.content().await?;
        let page_url = self.driver.current_url().await?;
        Ok(extract_downloadables(&html, &page_url))
    }

    /// Fetch every accessibility-preview PDF on a course page whose
    /// guessed filename passes the filter. Transfers run one at a time;
    /// item failures are logged and counted, never fatal.
    pub async fn download(
        &self,
        course_url: &str,
        out_dir: &Path,
        pattern: Option<&str>,
        regex: Option<&str>,
    ) -> AppResult<DownloadReport> {
        let filter = NameFilter::new(pattern, regex)?;
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| DownloadError::OutputDirFailed {
                path: out_dir.display().to_string(),
                source: Box::new(e),
            })?;

        self.rehydrate_cookies().await;
        self.inject_web_storage().await;
        self.driver.goto(course_url).await?;
        self.driver.settle(self.config.settle_timeout_ms).await;

        let html = self.driver.content().await?;
        let page_url = self.driver.current_url().await?;
        let discovered = extract_ally_preview_urls(&html, &page_url);
        if discovered.is_empty() {
            info!("no {ALLY_PREVIEW_ATTR} PDF urls discovered");
            return Ok(DownloadReport::new(out_dir));
        }
        let selected: Vec<String> = discovered
            .into_iter()
            .filter(|u| filter.matches(&guess_filename_from_url(u)))
            .collect();
        if selected.is_empty() {
            info!("no PDFs matched the provided pattern/regex");
            return Ok(DownloadReport::new(out_dir));
        }

        let live = match cookies::capture_all(self.driver.page()).await {
            Ok(live) => live,
            Err(e) => {
                warn!("could not read live cookies for the download client: {e}");
                Vec::new()
            }
        };
        let per_request = Duration::from_millis(self.config.nav_timeout_ms.saturating_mul(3));
        let fetcher = FileFetcher::from_cookies(&live, per_request)?;

        let mut taken: HashSet<String> = HashSet::new();
        let mut report = DownloadReport::new(out_dir);
        let total = selected.len();
        for (idx, url) in selected.iter().enumerate() {
            let file_name = unique_filename(out_dir, &guess_filename_from_url(url), &taken);
            info!("({}/{total}) GET {url} -> {file_name}", idx + 1);
            match fetcher.fetch(url).await {
                Ok(bytes) => {
                    let dest = out_dir.join(&file_name);
                    match tokio::fs::write(&dest, &bytes).await {
                        Ok(()) => {
                            taken.insert(file_name.to_lowercase());
                            report.saved.push(SavedFile {
                                url: url.clone(),
                                file_name,
                            });
                        }
                        Err(e) => {
                            warn!("could not write {}: {e}", dest.display());
                            report.failures.push(ItemFailure {
                                url: url.clone(),
                                reason: format!("write failed: {e}"),
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("{e}");
                    report.failures.push(ItemFailure::from_error(url, e));
                }
            }
        }
        info!(
            "done, saved {}/{} PDF(s) to {}",
            report.saved.len(),
            report.attempted(),
            resolved_display(out_dir)
        );
        Ok(report)
    }

    // ========== Session plumbing ==========

    /// Log which snapshot cookies exist before a run, for triage when a
    /// session has gone stale.
    async fn log_snapshot_state(&self) {
        match self.store.load_cookies().await {
            Ok(saved) => {
                info!(
                    "pre-existing cookie domains: {}",
                    joined_or_none(&cookies::cookie_domains(&saved))
                );
                let host = self.host_hint().await;
                log_cookie_brief(&saved, host.as_deref());
            }
            Err(e) => warn!("could not read prior cookie snapshot: {e}"),
        }
    }

    /// Push snapshot cookies the live profile is missing. The profile
    /// stays authoritative: only (domain, name) pairs absent from the
    /// live set are added.
    async fn rehydrate_cookies(&self) {
        let saved = match self.store.load_cookies().await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("cookie snapshot unreadable, continuing without it: {e}");
                return;
            }
        };
        if saved.is_empty() {
            return;
        }
        let live = match cookies::capture_all(self.driver.page()).await {
            Ok(live) => live,
            Err(e) => {
                warn!("could not inspect live cookies: {e}");
                return;
            }
        };
        let Some(host) = self.host_hint().await else {
            return;
        };
        let missing = cookies::missing_for_host(&saved, &live, &host);
        if missing.is_empty() {
            debug!("live profile already holds every snapshot cookie for {host}");
            return;
        }
        let added = cookies::apply(self.driver.page(), &missing).await;
        info!("re-added {added} missing cookie(s) for {host}");
    }

    /// Register the storage replay script before first navigation.
    async fn inject_web_storage(&self) {
        let Some(host) = self.host_hint().await else {
            return;
        };
        let local = match self.store.load_local_storage().await {
            Ok(map) => map,
            Err(e) => {
                warn!("localStorage snapshot unreadable: {e}");
                Default::default()
            }
        };
        let session = match self.store.load_session_storage().await {
            Ok(map) => map,
            Err(e) => {
                warn!("sessionStorage snapshot unreadable: {e}");
                Default::default()
            }
        };
        let Some(script) = web_storage::build_injection_script(&host, &local, &session) else {
            return;
        };
        match web_storage::register_init_script(self.driver.page(), &script).await {
            Ok(()) => debug!(
                "storage replay registered ({} local / {} session key(s))",
                local.len(),
                session.len()
            ),
            Err(e) => warn!("storage replay unavailable: {e}"),
        }
    }

    /// Dump both storage areas into snapshot files. Empty dumps are not
    /// written; some shells keep everything in cookies.
    async fn snapshot_web_storage(&self) {
        match self.driver.eval(web_storage::LOCAL_STORAGE_DUMP_JS).await {
            Ok(value) => {
                let map = web_storage::string_map(&value);
                if map.is_empty() {
                    info!("no localStorage keys captured (may not be needed)");
                } else if let Err(e) = self.store.save_local_storage(&map).await {
                    warn!("could not write the localStorage snapshot: {e}");
                } else {
                    info!("saved {} localStorage key(s)", map.len());
                }
            }
            Err(e) => warn!("could not capture localStorage: {e}"),
        }
        match self.driver.eval(web_storage::SESSION_STORAGE_DUMP_JS).await {
            Ok(value) => {
                let map = web_storage::string_map(&value);
                if map.is_empty() {
                    info!("no sessionStorage keys captured (may not be needed)");
                } else if let Err(e) = self.store.save_session_storage(&map).await {
                    warn!("could not write the sessionStorage snapshot: {e}");
                } else {
                    info!("saved {} sessionStorage key(s)", map.len());
                }
            }
            Err(e) => warn!("could not capture sessionStorage: {e}"),
        }
    }

    /// Capture and snapshot the live cookies; returns them for the brief.
    async fn snapshot_cookies(&self) -> Vec<CookieRecord> {
        let captured = match cookies::capture_all(self.driver.page()).await {
            Ok(captured) => captured,
            Err(e) => {
                warn!("could not capture cookies: {e}");
                return Vec::new();
            }
        };
        match self.store.save_cookies(&captured).await {
            Ok(()) => info!(
                "wrote cookie snapshot to {}",
                self.store.cookies_path().display()
            ),
            Err(e) => warn!("could not write the cookie snapshot: {e}"),
        }
        info!("captured {} cookie(s)", captured.len());
        captured
    }

    /// Host the session belongs to: the recorded post-login host when one
    /// exists, otherwise the configured base URL's host.
    async fn host_hint(&self) -> Option<String> {
        match self.store.load_base_host().await {
            Some(host) => Some(host),
            None => hostname(&self.config.base_url),
        }
    }

    async fn dump_page_snapshot(&self, html: &str) {
        let path = self.store.profile_dir().join(PAGE_SNAPSHOT_FILE);
        if let Err(e) = tokio::fs::write(&path, html).await {
            debug!("could not write the page snapshot: {e}");
        }
    }
}

/// Outcome of one download run, structured so embedding hosts can render
/// or post-process it; the CLI only logs the counts.
#[derive(Debug, Serialize)]
pub struct DownloadReport {
    pub saved: Vec<SavedFile>,
    pub failures: Vec<ItemFailure>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct SavedFile {
    pub url: String,
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct ItemFailure {
    pub url: String,
    pub reason: String,
}

impl ItemFailure {
    fn from_error(url: &str, error: DownloadError) -> Self {
        match error {
            DownloadError::Item { url, reason } => Self { url, reason },
            other => Self {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl DownloadReport {
    fn new(out_dir: &Path) -> Self {
        Self {
            saved: Vec::new(),
            failures: Vec::new(),
            out_dir: out_dir.to_path_buf(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failures.len()
    }
}

// ========== Session diagnostics ==========

/// What `session-info` reports; assembled without launching a browser.
#[derive(Debug)]
pub struct SessionReport {
    pub profile_dir: PathBuf,
    pub exists: bool,
    pub file_count: usize,
    pub total_bytes: u64,
    pub artifacts: Vec<ArtifactInfo>,
    /// Domains found in the cookie snapshot; `None` when the snapshot is
    /// missing or unreadable.
    pub cookie_domains: Option<Vec<String>>,
    /// Host recorded after the last confirmed login.
    pub base_host: Option<String>,
    pub snapshot_modified: Option<DateTime<Local>>,
}

/// One session artifact found on disk.
#[derive(Debug)]
pub struct ArtifactInfo {
    pub rel_path: String,
    pub bytes: u64,
}

/// Inspect the profile directory on disk. Stat errors skip the file
/// rather than failing the report.
pub fn session_report(config: &Config) -> SessionReport {
    let session_store = SessionStore::new(&config.profile_dir);
    let profile_dir = resolved(session_store.profile_dir());
    if !session_store.profile_dir().is_dir() {
        return SessionReport {
            profile_dir,
            exists: false,
            file_count: 0,
            total_bytes: 0,
            artifacts: Vec::new(),
            cookie_domains: None,
            base_host: None,
            snapshot_modified: None,
        };
    }

    let (file_count, total_bytes) = walk_totals(session_store.profile_dir());
    let mut artifacts = Vec::new();
    for rel in PROFILE_ARTIFACTS {
        probe_artifact(session_store.profile_dir(), rel, &mut artifacts);
    }
    probe_artifact(session_store.profile_dir(), store::COOKIES_FILE, &mut artifacts);

    let snapshot_path = session_store.cookies_path();
    let snapshot_modified = std::fs::metadata(&snapshot_path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from);
    let base_host =
        std::fs::read_to_string(session_store.profile_dir().join(store::BASE_HOST_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

    SessionReport {
        profile_dir,
        exists: true,
        file_count,
        total_bytes,
        artifacts,
        cookie_domains: read_snapshot_domains(&snapshot_path),
        base_host,
        snapshot_modified,
    }
}

fn walk_totals(dir: &Path) -> (usize, u64) {
    let mut files = 0usize;
    let mut bytes = 0u64;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(meta) = entry.metadata() {
                files += 1;
                bytes += meta.len();
            }
        }
    }
    (files, bytes)
}

fn probe_artifact(root: &Path, rel: &str, found: &mut Vec<ArtifactInfo>) {
    let path = root.join(rel);
    if let Ok(meta) = std::fs::metadata(&path) {
        if meta.is_file() {
            found.push(ArtifactInfo {
                rel_path: rel.to_string(),
                bytes: meta.len(),
            });
        }
    }
}

fn read_snapshot_domains(path: &Path) -> Option<Vec<String>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("cookie snapshot did not parse: {e}");
            return None;
        }
    };
    let records: Vec<CookieRecord> = value
        .get("cookies")
        .and_then(|c| serde_json::from_value(c.clone()).ok())
        .unwrap_or_default();
    Some(cookies::cookie_domains(&records))
}

// ========== Shared helpers ==========

fn joined_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn log_cookie_brief(records: &[CookieRecord], target_host: Option<&str>) {
    let lines = cookies::cookie_brief(records, target_host);
    if lines.is_empty() {
        return;
    }
    info!("cookies for this portal:");
    for line in lines.iter().take(BRIEF_MAX_LINES) {
        info!("  {line}");
    }
    if lines.len() > BRIEF_MAX_LINES {
        info!("  ... ({} more)", lines.len() - BRIEF_MAX_LINES);
    }
}

fn resolved(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn resolved_display(path: &Path) -> String {
    resolved(path).display().to_string()
}
