//! Login confirmation signals.
//!
//! Confirmation is heuristic: no endpoint tells us "logged in", so we look
//! for shell markup, course links, and session side effects that only appear
//! once the portal shell has rendered for an authenticated user. Signals are
//! ordered; the first match wins and is reported as the reason.

use std::fmt;

use scraper::{Html, Selector};

use crate::extract::courses::COURSE_ID_QUERY_MARKER;

/// SPA router outlet rendered only inside the authenticated shell.
pub const SHELL_OUTLET_MARKER: &str = "BbRouterOutlet";
/// Attribute the shell stamps on interactive regions.
pub const AUTOMATION_ATTR_MARKER: &str = "data-automation-id";
/// Bundle bootstrap assignments emitted by the shell loader.
pub const PUBLIC_PATH_MARKERS: [&str; 2] = ["window.publicPath", "publicPath ="];
/// Containers present once the main shell region has rendered.
pub const MAIN_CONTENT_MARKERS: [&str; 2] = [r#"id="main-content-inner""#, "base-courses-container"];
/// Path fragment of the course hub and course outlines.
pub const ULTRA_COURSE_PATH: &str = "/ultra/course";
/// URL fragment marking the modern shell.
pub const ULTRA_URL_HINT: &str = "ultra";
/// Href fragments that identify course links during the anchor scan.
pub const COURSE_ANCHOR_MARKERS: [&str; 2] = ["course_id=", "/ultra/course/"];

/// Identity providers mentioning these in their host are MFA steps.
pub const MFA_HOST_HINTS: [&str; 2] = ["duo", "duosecurity"];

/// Dom-size and cookie thresholds for the weaker signals.
#[derive(Debug, Clone, Copy)]
pub struct LoginRules {
    /// A course-hub page below this size is still a loading skeleton.
    pub large_dom_bytes: usize,
    /// Minimum size for the cookie-plus-content signal.
    pub modest_dom_bytes: usize,
    /// `document.cookie` must be longer than this to count as a session.
    pub min_cookie_header_len: u64,
}

/// One poll's observations.
#[derive(Debug, Clone, Copy)]
pub struct LoginProbe<'a> {
    pub url: &'a str,
    pub html: &'a str,
    /// `document.cookie.length`, when the evaluation succeeded.
    pub cookie_header_len: Option<u64>,
}

/// Why a poll counted as logged in, strongest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginSignal {
    ShellOutlet,
    AutomationAttr,
    CourseIdPattern,
    PublicPathUltra,
    MainContentContainer,
    CourseUrlLargeDom,
    CourseAnchor(String),
    CookiePlusDom,
}

impl fmt::Display for LoginSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginSignal::ShellOutlet => write!(f, "{SHELL_OUTLET_MARKER}"),
            LoginSignal::AutomationAttr => write!(f, "{AUTOMATION_ATTR_MARKER} attr present"),
            LoginSignal::CourseIdPattern => write!(f, "course_id pattern"),
            LoginSignal::PublicPathUltra => write!(f, "publicPath + ultra context"),
            LoginSignal::MainContentContainer => write!(f, "main content container"),
            LoginSignal::CourseUrlLargeDom => write!(f, "ultra/course + large DOM"),
            LoginSignal::CourseAnchor(href) => write!(f, "direct course anchor: {href}"),
            LoginSignal::CookiePlusDom => write!(f, "cookie + substantial DOM"),
        }
    }
}

/// Where the browser currently is, relative to the portal host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPosition {
    /// On the portal host; confirmation signals may be evaluated.
    Target,
    /// On some other host, typically the identity provider.
    Foreign,
    /// No usable host yet (blank page, mid-navigation).
    Unknown,
}

pub fn host_position(base_host: Option<&str>, current_host: Option<&str>) -> HostPosition {
    match (base_host, current_host) {
        (Some(base), Some(cur)) if base == cur => HostPosition::Target,
        (Some(_), Some(_)) => HostPosition::Foreign,
        _ => HostPosition::Unknown,
    }
}

/// Guidance while parked on a foreign host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignHint {
    /// Host looks like an MFA broker; the user must act in the window.
    MultiFactor,
    /// Page looks like an identity-provider login form.
    IdentityProvider,
}

pub fn foreign_hint(current_host: &str, html: &str) -> Option<ForeignHint> {
    if MFA_HOST_HINTS.iter().any(|h| current_host.contains(h)) {
        return Some(ForeignHint::MultiFactor);
    }
    let low = html.to_lowercase();
    if low.contains("password") || low.contains("login") {
        return Some(ForeignHint::IdentityProvider);
    }
    None
}

/// Evaluate the confirmation signals for a poll already known to be on the
/// target host. Returns the first (strongest) signal that matches.
pub fn confirmation(base_host: &str, probe: &LoginProbe<'_>, rules: &LoginRules) -> Option<LoginSignal> {
    let html = probe.html;
    let url = probe.url;

    if html.contains(SHELL_OUTLET_MARKER) {
        return Some(LoginSignal::ShellOutlet);
    }
    if html.contains(AUTOMATION_ATTR_MARKER) {
        return Some(LoginSignal::AutomationAttr);
    }
    if html.contains(COURSE_ID_QUERY_MARKER) {
        return Some(LoginSignal::CourseIdPattern);
    }
    if PUBLIC_PATH_MARKERS.iter().any(|m| html.contains(m))
        && (html.contains(SHELL_OUTLET_MARKER) || url.contains(ULTRA_URL_HINT))
    {
        return Some(LoginSignal::PublicPathUltra);
    }
    if MAIN_CONTENT_MARKERS.iter().any(|m| html.contains(m)) {
        return Some(LoginSignal::MainContentContainer);
    }
    if url.contains(ULTRA_COURSE_PATH) && html.len() > rules.large_dom_bytes {
        return Some(LoginSignal::CourseUrlLargeDom);
    }
    if url.contains(ULTRA_URL_HINT)
        || institution_key(base_host).is_some_and(|key| url.contains(key))
    {
        if let Some(href) = first_course_anchor(html) {
            return Some(LoginSignal::CourseAnchor(href));
        }
    }
    if probe
        .cookie_header_len
        .is_some_and(|len| len > rules.min_cookie_header_len)
        && html.len() > rules.modest_dom_bytes
    {
        return Some(LoginSignal::CookiePlusDom);
    }
    None
}

/// Second-to-last host label, e.g. `example` for `learn.example.edu`. Course
/// hub URLs usually mention it even when the path avoids `ultra`.
fn institution_key(base_host: &str) -> Option<&str> {
    let labels: Vec<&str> = base_host.split('.').collect();
    if labels.len() >= 2 {
        Some(labels[labels.len() - 2])
    } else {
        None
    }
}

/// First anchor whose href looks like a course link.
fn first_course_anchor(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse("a[href]").ok()?;
    for a in document.select(&sel) {
        if let Some(href) = a.value().attr("href") {
            if COURSE_ANCHOR_MARKERS.iter().any(|m| href.contains(m)) {
                return Some(href.to_string());
            }
        }
    }
    None
}
