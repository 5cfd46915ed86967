//! On-disk session snapshots kept beside the browser profile.
//!
//! Each artifact is an independent file, so a corrupt or missing one only
//! costs its own slice of state. Wiping the profile directory drops the
//! whole session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::error::SessionStoreError;
use crate::session::cookies::CookieRecord;
use crate::session::web_storage::string_map;
use crate::utils::urls::hostname;

pub const COOKIES_FILE: &str = "cookies.json";
pub const LOCAL_STORAGE_FILE: &str = "local_storage.json";
pub const SESSION_STORAGE_FILE: &str = "session_storage.json";
pub const BASE_HOST_FILE: &str = "base_host.txt";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieSnapshot {
    #[serde(default)]
    cookies: Vec<CookieRecord>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    profile_dir: PathBuf,
}

impl SessionStore {
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        SessionStore {
            profile_dir: profile_dir.into(),
        }
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Path of the cookie snapshot file.
    pub fn cookies_path(&self) -> PathBuf {
        self.profile_dir.join(COOKIES_FILE)
    }

    fn path_of(&self, file: &str) -> PathBuf {
        self.profile_dir.join(file)
    }

    /// Cookies from the snapshot; an absent file is an empty session, not an
    /// error.
    pub async fn load_cookies(&self) -> Result<Vec<CookieRecord>, SessionStoreError> {
        let path = self.cookies_path();
        let Some(text) = read_optional(&path).await? else {
            return Ok(Vec::new());
        };
        let snapshot: CookieSnapshot = serde_json::from_str(&text).map_err(|e| malformed(&path, e))?;
        Ok(snapshot.cookies)
    }

    pub async fn save_cookies(&self, cookies: &[CookieRecord]) -> Result<(), SessionStoreError> {
        let snapshot = CookieSnapshot {
            cookies: cookies.to_vec(),
        };
        self.write_json(COOKIES_FILE, &snapshot).await
    }

    pub async fn load_local_storage(&self) -> Result<BTreeMap<String, String>, SessionStoreError> {
        self.load_string_map(LOCAL_STORAGE_FILE).await
    }

    pub async fn save_local_storage(
        &self,
        map: &BTreeMap<String, String>,
    ) -> Result<(), SessionStoreError> {
        self.write_json(LOCAL_STORAGE_FILE, map).await
    }

    pub async fn load_session_storage(&self) -> Result<BTreeMap<String, String>, SessionStoreError> {
        self.load_string_map(SESSION_STORAGE_FILE).await
    }

    pub async fn save_session_storage(
        &self,
        map: &BTreeMap<String, String>,
    ) -> Result<(), SessionStoreError> {
        self.write_json(SESSION_STORAGE_FILE, map).await
    }

    /// Record the host the login actually landed on. A URL without a host
    /// writes nothing.
    pub async fn save_base_host(&self, url: &str) -> Result<(), SessionStoreError> {
        let Some(host) = hostname(url) else {
            return Ok(());
        };
        let path = self.path_of(BASE_HOST_FILE);
        fs::write(&path, format!("{host}\n"))
            .await
            .map_err(|e| write_failed(&path, e))
    }

    /// Host recorded at login time, if any.
    pub async fn load_base_host(&self) -> Option<String> {
        let text = fs::read_to_string(self.path_of(BASE_HOST_FILE)).await.ok()?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Load a storage file, keeping only string-valued entries. Non-object
    /// top levels read as empty rather than failing.
    async fn load_string_map(
        &self,
        file: &str,
    ) -> Result<BTreeMap<String, String>, SessionStoreError> {
        let path = self.path_of(file);
        let Some(text) = read_optional(&path).await? else {
            return Ok(BTreeMap::new());
        };
        let value: Value = serde_json::from_str(&text).map_err(|e| malformed(&path, e))?;
        Ok(string_map(&value))
    }

    async fn write_json<T: Serialize>(
        &self,
        file: &str,
        value: &T,
    ) -> Result<(), SessionStoreError> {
        let path = self.path_of(file);
        let text =
            serde_json::to_string_pretty(value).map_err(|e| write_failed(&path, e))?;
        fs::write(&path, text)
            .await
            .map_err(|e| write_failed(&path, e))
    }
}

/// File contents, or `None` when the file does not exist.
async fn read_optional(path: &Path) -> Result<Option<String>, SessionStoreError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SessionStoreError::ReadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        }),
    }
}

fn malformed(path: &Path, err: impl std::error::Error + Send + Sync + 'static) -> SessionStoreError {
    SessionStoreError::Malformed {
        path: path.display().to_string(),
        source: Box::new(err),
    }
}

fn write_failed(
    path: &Path,
    err: impl std::error::Error + Send + Sync + 'static,
) -> SessionStoreError {
    SessionStoreError::WriteFailed {
        path: path.display().to_string(),
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        (dir, store)
    }

    fn sample_cookie() -> CookieRecord {
        CookieRecord {
            name: "JSESSIONID".to_string(),
            value: "abc123".to_string(),
            domain: "learn.example.edu".to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: true,
            secure: true,
            session: true,
            same_site: None,
        }
    }

    #[test]
    fn cookies_round_trip() {
        let (_dir, store) = store();
        block_on(async {
            store.save_cookies(&[sample_cookie()]).await.unwrap();
            let back = store.load_cookies().await.unwrap();
            assert_eq!(back, vec![sample_cookie()]);
        });
    }

    #[test]
    fn absent_files_read_as_empty_state() {
        let (_dir, store) = store();
        block_on(async {
            assert!(store.load_cookies().await.unwrap().is_empty());
            assert!(store.load_local_storage().await.unwrap().is_empty());
            assert!(store.load_base_host().await.is_none());
        });
    }

    #[test]
    fn garbage_snapshot_is_malformed_not_a_panic() {
        let (dir, store) = store();
        std::fs::write(dir.path().join(COOKIES_FILE), "{not json").unwrap();
        block_on(async {
            let err = store.load_cookies().await.unwrap_err();
            assert!(matches!(err, SessionStoreError::Malformed { .. }));
        });
    }

    #[test]
    fn storage_load_filters_non_string_values() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join(LOCAL_STORAGE_FILE),
            r#"{"keep": "yes", "drop": 42, "also_drop": null}"#,
        )
        .unwrap();
        block_on(async {
            let map = store.load_local_storage().await.unwrap();
            assert_eq!(map.len(), 1);
            assert_eq!(map.get("keep").map(String::as_str), Some("yes"));
        });
    }

    #[test]
    fn storage_round_trip_is_sorted_json() {
        let (dir, store) = store();
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        block_on(async {
            store.save_session_storage(&map).await.unwrap();
            let text = std::fs::read_to_string(dir.path().join(SESSION_STORAGE_FILE)).unwrap();
            assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
            assert_eq!(store.load_session_storage().await.unwrap(), map);
        });
    }

    #[test]
    fn base_host_comes_from_the_url_hostname() {
        let (_dir, store) = store();
        block_on(async {
            store
                .save_base_host("https://Learn.Example.EDU/ultra/course")
                .await
                .unwrap();
            assert_eq!(store.load_base_host().await.as_deref(), Some("learn.example.edu"));
        });
    }

    #[test]
    fn hostless_url_writes_no_host_file() {
        let (dir, store) = store();
        block_on(async {
            store.save_base_host("not a url").await.unwrap();
            assert!(!dir.path().join(BASE_HOST_FILE).exists());
            assert!(store.load_base_host().await.is_none());
        });
    }
}
