use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Browser launch / navigation / script failures.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    /// Session snapshot read/write failures (treated as soft at call sites).
    #[error("session store error: {0}")]
    Session(#[from] SessionStoreError),
    /// Login-wait failures.
    #[error("login error: {0}")]
    Login(#[from] LoginError),
    /// Batch download failures.
    #[error("download error: {0}")]
    Download(#[from] DownloadError),
    /// Configuration failures.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Wrapper for errors with no richer home.
    #[error("{0}")]
    Other(String),
}

/// Browser-level errors.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser with profile '{profile_dir}': {source}")]
    LaunchFailed {
        profile_dir: String,
        source: BoxedSource,
    },
    #[error("failed to create page: {source}")]
    PageCreationFailed { source: BoxedSource },
    #[error("navigation to {url} failed: {source}")]
    NavigationFailed { url: String, source: BoxedSource },
    #[error("navigation to {url} timed out after {waited_ms}ms")]
    NavigationTimeout { url: String, waited_ms: u64 },
    #[error("script execution failed: {source}")]
    Script { source: BoxedSource },
    #[error("script evaluation timed out after {waited_ms}ms")]
    ScriptTimeout { waited_ms: u64 },
}

/// Session snapshot file errors. The store logs these and carries on with
/// whatever partial state is available; they never abort an operation.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("could not read {path}: {source}")]
    ReadFailed { path: String, source: BoxedSource },
    #[error("could not write {path}: {source}")]
    WriteFailed { path: String, source: BoxedSource },
    #[error("malformed snapshot {path}: {source}")]
    Malformed { path: String, source: BoxedSource },
}

/// Login-wait errors.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Login not detected within {waited_secs}s. If your SSO uses MFA, keep the window focused and retry.")]
    Timeout { waited_secs: u64 },
}

/// Download errors. `Item` is recorded per URL in the batch report; the
/// other variants abort the batch before it starts.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not create output directory {path}: {source}")]
    OutputDirFailed { path: String, source: BoxedSource },
    #[error("could not build download client: {source}")]
    ClientBuildFailed { source: BoxedSource },
    #[error("invalid name filter: {source}")]
    BadFilter { source: BoxedSource },
    #[error("{url}: {reason}")]
    Item { url: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    FileReadFailed { path: String, source: BoxedSource },
    #[error("could not parse config file {path}: {source}")]
    FileParseFailed { path: String, source: BoxedSource },
}

// ========== Conversions from common library errors ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Script {
            source: Box::new(err),
        })
    }
}

// Evaluation results are decoded with serde_json; snapshot files build
// SessionStoreError explicitly instead of relying on this conversion.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Browser(BrowserError::Script {
            source: Box::new(err),
        })
    }
}

// ========== Convenience constructors ==========

impl AppError {
    pub fn launch_failed(profile_dir: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        AppError::Browser(BrowserError::LaunchFailed {
            profile_dir: profile_dir.into(),
            source: source.into(),
        })
    }

    pub fn page_creation_failed(source: impl Into<BoxedSource>) -> Self {
        AppError::Browser(BrowserError::PageCreationFailed {
            source: source.into(),
        })
    }

    pub fn navigation_failed(url: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: source.into(),
        })
    }

    pub fn navigation_timeout(url: impl Into<String>, waited_ms: u64) -> Self {
        AppError::Browser(BrowserError::NavigationTimeout {
            url: url.into(),
            waited_ms,
        })
    }

    pub fn script_timeout(waited_ms: u64) -> Self {
        AppError::Browser(BrowserError::ScriptTimeout { waited_ms })
    }

    pub fn login_timeout(waited_secs: u64) -> Self {
        AppError::Login(LoginError::Timeout { waited_secs })
    }
}

/// Crate-wide result alias.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_timeout_message_carries_mfa_guidance() {
        let err = AppError::login_timeout(180);
        let msg = err.to_string();
        assert!(msg.contains("180s"));
        assert!(msg.contains("MFA"));
    }

    #[test]
    fn item_error_names_the_url() {
        let err = AppError::Download(DownloadError::Item {
            url: "https://x/f.pdf".to_string(),
            reason: "HTTP 403".to_string(),
        });
        assert!(err.to_string().contains("https://x/f.pdf"));
        assert!(err.to_string().contains("HTTP 403"));
    }

    #[test]
    fn cdp_error_maps_to_browser_script() {
        let cdp = chromiumoxide::error::CdpError::NotFound;
        let err: AppError = cdp.into();
        assert!(matches!(err, AppError::Browser(BrowserError::Script { .. })));
    }
}
