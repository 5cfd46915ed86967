//! REST-probe course discovery, capability layer.
//!
//! When the landing page renders no course anchors (common right after an
//! interactive login, before the card shell hydrates), the public Learn
//! REST endpoints usually still answer with the enrollment list. This
//! service runs that probe in-page so the request rides the session
//! cookies, with an embedded-script scan as the last resort.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::extract::CourseItem;
use crate::infrastructure::PageDriver;
use crate::utils::urls::{absolutize, normalize_space};

/// Probed in order; the first endpoint returning a non-empty list wins.
pub const COURSE_API_ENDPOINTS: [&str; 3] = [
    "/learn/api/public/v1/courses?limit=200&offset=0&availability.available=Yes",
    "/learn/api/public/v3/courses?limit=200&offset=0&availability.available=Yes",
    "/learn/api/v1/courses?limit=200&offset=0",
];

/// Promise-returning probe. Tries the REST endpoints with session
/// credentials, then falls back to scraping course ids out of inline
/// script blobs on whatever page is loaded.
fn probe_js() -> String {
    let endpoints = COURSE_API_ENDPOINTS
        .iter()
        .map(|e| format!("'{e}'"))
        .collect::<Vec<_>>()
        .join(", ");
    [
        "(() => new Promise(async (resolve) => {".to_string(),
        format!("  const endpoints = [{endpoints}];"),
        "  for (const ep of endpoints) {".to_string(),
        "    try {".to_string(),
        "      const r = await fetch(ep, { credentials: 'include' });".to_string(),
        "      if (!r.ok) continue;".to_string(),
        "      const j = await r.json();".to_string(),
        "      const arr = j.results || j.data || j.courses || [];".to_string(),
        "      if (Array.isArray(arr) && arr.length) {".to_string(),
        "        const mapped = arr.map(c => ({".to_string(),
        "          name: c.name || c.courseName || c.displayName || c.id || c.courseId,".to_string(),
        "          id: c.id || c.courseId || c.uuid || c.pk1 || null".to_string(),
        "        })).filter(o => o.id);".to_string(),
        "        if (mapped.length) return resolve({ ok: true, courses: mapped });".to_string(),
        "      }".to_string(),
        "    } catch (e) {}".to_string(),
        "  }".to_string(),
        "  const ids = new Set();".to_string(),
        "  const names = [];".to_string(),
        "  for (const s of document.querySelectorAll('script')) {".to_string(),
        "    const txt = s.textContent || '';".to_string(),
        r#"    const idRe = /(course_id|COURSE_ID)["'=:\s]+([a-z0-9_:-]+)/ig;"#.to_string(),
        "    let m;".to_string(),
        "    while ((m = idRe.exec(txt))) {".to_string(),
        "      if (m[2] && m[2].length < 120) ids.add(m[2]);".to_string(),
        "    }".to_string(),
        r#"    const nameRe = /"name"\s*:\s*"([^"]{3,120})"/g;"#.to_string(),
        "    while ((m = nameRe.exec(txt))) {".to_string(),
        "      if (!names.includes(m[1])) names.push(m[1]);".to_string(),
        "    }".to_string(),
        "  }".to_string(),
        "  resolve({ ok: false, courses: Array.from(ids).map((id, i) => ({ id, name: names[i] || id })) });".to_string(),
        "}))()".to_string(),
    ]
    .join("\n")
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutcome {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    courses: Vec<ProbeCourse>,
}

/// Ids and names come back as whatever the endpoint serves; pk1-style ids
/// are plain numbers, so both fields stay loosely typed until conversion.
#[derive(Debug, Default, Deserialize)]
struct ProbeCourse {
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(default)]
    name: Option<JsonValue>,
}

fn scalar_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn courses_from_outcome(outcome: ProbeOutcome, base_url: &str) -> Vec<CourseItem> {
    let mut out = Vec::new();
    for course in &outcome.courses {
        let Some(id) = course.id.as_ref().and_then(scalar_string) else {
            continue;
        };
        let label = course
            .name
            .as_ref()
            .and_then(scalar_string)
            .unwrap_or_else(|| id.clone());
        let Some(url) = absolutize(base_url, &format!("ultra/course/{id}/outline")) else {
            continue;
        };
        out.push(CourseItem {
            label: normalize_space(&label),
            url,
        });
    }
    out
}

/// Discovers enrollments without relying on the rendered page.
pub struct CourseDiscovery {
    base_url: String,
}

impl CourseDiscovery {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Run the REST probe on the current page. Never fails the caller:
    /// script errors log and yield an empty list.
    pub async fn discover_via_api(&self, driver: &PageDriver) -> Vec<CourseItem> {
        let outcome: ProbeOutcome = match driver.eval_awaiting(probe_js()).await {
            Ok(v) => v,
            Err(e) => {
                warn!("course api probe failed: {e}");
                return Vec::new();
            }
        };
        debug!(
            "course probe answered via {}",
            if outcome.ok { "rest endpoint" } else { "script scan" }
        );
        let courses = courses_from_outcome(outcome, &self.base_url);
        if courses.is_empty() {
            info!("no courses discovered via api endpoints");
        } else {
            info!("collected {} course(s) via api probe", courses.len());
        }
        courses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(courses: JsonValue) -> ProbeOutcome {
        serde_json::from_value(json!({ "ok": true, "courses": courses })).unwrap()
    }

    #[test]
    fn script_lists_every_endpoint_and_awaits_a_promise() {
        let js = probe_js();
        for ep in COURSE_API_ENDPOINTS {
            assert!(js.contains(ep));
        }
        assert!(js.contains("new Promise"));
        assert!(js.contains("credentials: 'include'"));
    }

    #[test]
    fn numeric_ids_become_strings() {
        let got = courses_from_outcome(
            outcome(json!([{ "id": 90210, "name": "Algebra" }])),
            "https://learn.example.edu/",
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].label, "Algebra");
        assert_eq!(
            got[0].url,
            "https://learn.example.edu/ultra/course/90210/outline"
        );
    }

    #[test]
    fn entries_without_an_id_are_skipped() {
        let got = courses_from_outcome(
            outcome(json!([
                { "name": "no id" },
                { "id": null, "name": "null id" },
                { "id": "", "name": "empty id" },
                { "id": "_123_1", "name": "kept" },
            ])),
            "https://learn.example.edu/",
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].label, "kept");
    }

    #[test]
    fn missing_name_falls_back_to_the_id() {
        let got = courses_from_outcome(
            outcome(json!([{ "id": "_9_1" }])),
            "https://learn.example.edu/",
        );
        assert_eq!(got[0].label, "_9_1");
    }

    #[test]
    fn names_are_whitespace_normalized() {
        let got = courses_from_outcome(
            outcome(json!([{ "id": "_9_1", "name": "  Intro \n to  Nursing " }])),
            "https://learn.example.edu/",
        );
        assert_eq!(got[0].label, "Intro to Nursing");
    }
}
