//! Filename derivation, name filtering, and collision handling for saved
//! files. The fetch itself lives in `services::file_fetcher`.

use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::error::DownloadError;

/// Longest accepted filename before sanitization trims it.
const MAX_FILENAME_CHARS: usize = 180;

/// Query parameters consulted when the URL path carries no usable name.
const FILENAME_QUERY_RE: &str = r"(?i)(?:file|name|filename)=([^&]+)";

// ========== Filename derivation ==========

/// Reduce `name` to a portable filename.
///
/// Trims whitespace, drops NUL bytes, caps the length, replaces characters
/// Windows rejects with underscores, collapses whitespace/underscore runs,
/// and strips leading/trailing dots and underscores. An empty result becomes
/// `file`.
pub fn sanitize_filename(name: &str) -> String {
    let trimmed: String = name.trim().chars().filter(|&c| c != '\0').collect();
    let capped: String = trimmed.chars().take(MAX_FILENAME_CHARS).collect();

    let mut replaced = String::with_capacity(capped.len());
    for c in capped.chars() {
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => replaced.push('_'),
            other => replaced.push(other),
        }
    }

    // Collapse runs of whitespace and underscores into a single underscore.
    let mut collapsed = String::with_capacity(replaced.len());
    let mut in_run = false;
    for c in replaced.chars() {
        if c.is_whitespace() || c == '_' {
            if !in_run {
                collapsed.push('_');
                in_run = true;
            }
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }

    let stripped = collapsed.trim_matches(|c| c == '.' || c == '_');
    if stripped.is_empty() {
        "file".to_string()
    } else {
        stripped.to_string()
    }
}

/// Derive a filename for `url`.
///
/// Takes the last path segment; when that is missing or shorter than three
/// characters, falls back to a `file=`/`name=`/`filename=` query parameter.
/// The result always ends in `.pdf` since the preview endpoints serve PDF
/// renditions without a content-disposition name.
pub fn guess_filename_from_url(url: &str) -> String {
    let (path, query) = match Url::parse(url) {
        Ok(parsed) => (
            parsed.path().to_string(),
            parsed.query().unwrap_or("").to_string(),
        ),
        // Relative inputs never reach the download path, but keep the
        // derivation total.
        Err(_) => {
            let trimmed = url.split('#').next().unwrap_or(url);
            match trimmed.split_once('?') {
                Some((p, q)) => (p.to_string(), q.to_string()),
                None => (trimmed.to_string(), String::new()),
            }
        }
    };

    let mut fname = path.rsplit('/').next().unwrap_or("").to_string();
    if fname.len() < 3 {
        if let Ok(re) = Regex::new(FILENAME_QUERY_RE) {
            if let Some(caps) = re.captures(&query) {
                fname = caps[1].to_string();
            }
        }
    }
    if !fname.to_ascii_lowercase().ends_with(".pdf") {
        fname.push_str(".pdf");
    }
    sanitize_filename(&fname)
}

// ========== Name filtering ==========

/// Case-insensitive filename filter built from either a glob-like pattern
/// (`*` and `?` wildcards, matched against the full name) or a raw regex
/// (substring search). With neither, every name matches.
pub struct NameFilter(Option<Regex>);

impl NameFilter {
    pub fn new(pattern: Option<&str>, regex: Option<&str>) -> Result<Self, DownloadError> {
        if let Some(pattern) = pattern {
            let escaped = regex::escape(pattern)
                .replace(r"\*", ".*")
                .replace(r"\?", ".");
            let anchored = format!("^{escaped}$");
            return Self::compile(&anchored);
        }
        if let Some(regex) = regex {
            return Self::compile(regex);
        }
        Ok(NameFilter(None))
    }

    fn compile(pattern: &str) -> Result<Self, DownloadError> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DownloadError::BadFilter {
                source: Box::new(e),
            })?;
        Ok(NameFilter(Some(re)))
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.0 {
            Some(re) => re.is_match(name),
            None => true,
        }
    }
}

// ========== Collision handling ==========

/// Pick a filename that collides neither with `taken_lower` (names saved
/// earlier in the batch, lowercased) nor with files already in `out_dir`.
/// Collisions get a `_1`, `_2`, ... counter inserted before the extension.
pub fn unique_filename(out_dir: &Path, candidate: &str, taken_lower: &HashSet<String>) -> String {
    let mut fname = candidate.to_string();
    let mut counter = 1usize;
    while taken_lower.contains(&fname.to_lowercase()) || out_dir.join(&fname).exists() {
        let (stem, ext) = split_stem_ext(candidate);
        fname = format!("{stem}_{counter}{ext}");
        counter += 1;
    }
    fname
}

/// Split at the final dot, keeping the dot with the extension. Names whose
/// only dot is leading keep it in the stem.
fn split_stem_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sanitize_replaces_forbidden_characters() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn sanitize_collapses_runs_and_strips_edges() {
        assert_eq!(sanitize_filename("  week   1__notes .pdf "), "week_1_notes_.pdf");
        assert_eq!(sanitize_filename("__.name._"), "name");
    }

    #[test]
    fn sanitize_drops_nul_and_caps_length() {
        assert_eq!(sanitize_filename("a\0b"), "ab");
        let long = "x".repeat(400);
        assert_eq!(sanitize_filename(&long).len(), 180);
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("..__.."), "file");
    }

    #[test]
    fn guess_uses_last_path_segment() {
        assert_eq!(
            guess_filename_from_url("https://h.example/files/week2_notes.pdf"),
            "week2_notes.pdf"
        );
    }

    #[test]
    fn guess_falls_back_to_query_for_short_names() {
        assert_eq!(
            guess_filename_from_url("https://h.example/dl?filename=syllabus.pdf&v=2"),
            "syllabus.pdf"
        );
        assert_eq!(
            guess_filename_from_url("https://h.example/f/x?name=intro"),
            "intro.pdf"
        );
    }

    #[test]
    fn guess_appends_pdf_suffix() {
        assert_eq!(
            guess_filename_from_url("https://h.example/preview/123456"),
            "123456.pdf"
        );
        assert_eq!(
            guess_filename_from_url("https://h.example/files/REPORT.PDF"),
            "REPORT.PDF"
        );
    }

    #[test]
    fn glob_pattern_matches_full_name_case_insensitively() {
        let f = NameFilter::new(Some("*.pdf"), None).unwrap();
        assert!(f.matches("notes.pdf"));
        assert!(f.matches("NOTES.PDF"));
        assert!(!f.matches("notes.docx"));

        let q = NameFilter::new(Some("week?.pdf"), None).unwrap();
        assert!(q.matches("week1.pdf"));
        assert!(!q.matches("week12.pdf"));
    }

    #[test]
    fn regex_filter_is_substring_search() {
        let f = NameFilter::new(None, Some(r"week\d+")).unwrap();
        assert!(f.matches("2024_week12_notes.pdf"));
        assert!(!f.matches("syllabus.pdf"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(NameFilter::new(None, Some("(")).is_err());
    }

    #[test]
    fn no_filter_matches_everything() {
        let f = NameFilter::new(None, None).unwrap();
        assert!(f.matches("anything.bin"));
    }

    #[test]
    fn unique_filename_counts_past_disk_and_batch_collisions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"x").unwrap();

        let mut taken = HashSet::new();
        let first = unique_filename(dir.path(), "a.pdf", &taken);
        assert_eq!(first, "a_1.pdf");

        taken.insert(first.to_lowercase());
        fs::write(dir.path().join("a_1.pdf"), b"x").unwrap();
        assert_eq!(unique_filename(dir.path(), "a.pdf", &taken), "a_2.pdf");
    }

    #[test]
    fn unique_filename_ignores_case_in_batch_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut taken = HashSet::new();
        taken.insert("notes.pdf".to_string());
        assert_eq!(unique_filename(dir.path(), "Notes.pdf", &taken), "Notes_1.pdf");
    }
}
