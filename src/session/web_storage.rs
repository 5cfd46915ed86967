//! Web storage capture and re-injection.
//!
//! SSO service-provider flows stash state in localStorage/sessionStorage
//! during the interactive login. Replaying those pairs before the first
//! navigation lets a stored session resume without bouncing through the
//! identity provider again.

use std::collections::BTreeMap;

use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Dumps the page's localStorage as a plain object.
pub const LOCAL_STORAGE_DUMP_JS: &str = "(() => { const o = {}; try { for (let i = 0; i < localStorage.length; i++) { const k = localStorage.key(i); o[k] = localStorage.getItem(k); } } catch (e) {} return o; })()";

/// Dumps the page's sessionStorage as a plain object.
pub const SESSION_STORAGE_DUMP_JS: &str = "(() => { const o = {}; try { for (let i = 0; i < sessionStorage.length; i++) { const k = sessionStorage.key(i); o[k] = sessionStorage.getItem(k); } } catch (e) {} return o; })()";

/// String-valued entries of a JSON object; anything else is dropped.
pub(crate) fn string_map(value: &Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(obj) = value.as_object() {
        for (k, v) in obj {
            if let Some(s) = v.as_str() {
                map.insert(k.clone(), s.to_string());
            }
        }
    }
    map
}

/// Init script replaying saved storage pairs, gated so it only runs on pages
/// whose host contains `host`. Returns `None` when there is nothing to
/// replay.
///
/// Each sessionStorage write gets its own try/catch: some pages seal
/// sessionStorage early and a single refusal must not void the rest.
pub fn build_injection_script(
    host: &str,
    local: &BTreeMap<String, String>,
    session: &BTreeMap<String, String>,
) -> Option<String> {
    if local.is_empty() && session.is_empty() {
        return None;
    }
    let mut lines = vec![
        "try {".to_string(),
        format!("  if (location.host.includes('{}')) {{", js_escape(host)),
    ];
    for (k, v) in local {
        lines.push(format!(
            "    localStorage.setItem('{}','{}');",
            js_escape(k),
            js_escape(v)
        ));
    }
    for (k, v) in session {
        lines.push(format!(
            "    try {{ sessionStorage.setItem('{}','{}'); }} catch(e) {{}}",
            js_escape(k),
            js_escape(v)
        ));
    }
    lines.push("  }".to_string());
    lines.push("} catch(e) {}".to_string());
    Some(lines.join("\n"))
}

/// Escape for embedding in a single-quoted JS literal. Backslashes first,
/// then quotes.
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Register `script` to run before every document created in this page.
pub async fn register_init_script(page: &Page, script: &str) -> AppResult<()> {
    let params = AddScriptToEvaluateOnNewDocumentParams::builder()
        .source(script)
        .build()
        .map_err(AppError::Other)?;
    page.execute(params).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escape_handles_quotes_and_backslashes() {
        assert_eq!(js_escape("it's"), "it\\'s");
        assert_eq!(js_escape(r"c:\dir"), r"c:\\dir");
        assert_eq!(js_escape(r"\'"), r"\\\'");
    }

    #[test]
    fn script_is_host_gated_and_wrapped() {
        let mut local = BTreeMap::new();
        local.insert("token".to_string(), "abc".to_string());
        let script = build_injection_script("learn.example.edu", &local, &BTreeMap::new()).unwrap();
        assert!(script.starts_with("try {"));
        assert!(script.contains("location.host.includes('learn.example.edu')"));
        assert!(script.contains("localStorage.setItem('token','abc');"));
        assert!(script.ends_with("} catch(e) {}"));
    }

    #[test]
    fn session_writes_are_individually_guarded() {
        let mut session = BTreeMap::new();
        session.insert("k".to_string(), "v".to_string());
        let script = build_injection_script("h.example", &BTreeMap::new(), &session).unwrap();
        assert!(script.contains("try { sessionStorage.setItem('k','v'); } catch(e) {}"));
    }

    #[test]
    fn empty_storage_builds_nothing() {
        assert!(build_injection_script("h.example", &BTreeMap::new(), &BTreeMap::new()).is_none());
    }

    #[test]
    fn string_map_keeps_only_string_values() {
        let value = json!({"a": "1", "b": 2, "c": null, "d": {"nested": true}});
        let map = string_map(&value);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn string_map_of_non_object_is_empty() {
        assert!(string_map(&json!(["a", "b"])).is_empty());
        assert!(string_map(&json!("plain")).is_empty());
    }
}
