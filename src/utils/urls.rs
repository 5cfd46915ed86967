//! URL helpers shared by the session, login, and extraction layers.

use url::Url;

/// Hostname of a URL, lowercased. `None` when the URL does not parse or has
/// no host (e.g. `about:blank`).
pub fn hostname(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Normalize a portal landing URL to end with exactly one `/` so relative
/// joins resolve against the portal root.
pub fn normalize_base_url(raw: &str) -> String {
    format!("{}/", raw.trim_end_matches('/'))
}

/// Resolve `href` against `base_url`. Relative, protocol-relative, and
/// absolute hrefs all come out absolute; unparseable input yields `None` and
/// the caller skips the element.
pub fn absolutize(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .ok()
}

/// Collapse runs of whitespace into single spaces and trim. Mirrors how
/// anchor text is flattened before it becomes a display label.
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_lowercases_and_strips() {
        assert_eq!(
            hostname("https://Learn.UQ.edu.au/ultra/course"),
            Some("learn.uq.edu.au".to_string())
        );
        assert_eq!(hostname("not a url"), None);
        assert_eq!(hostname("about:blank"), None);
    }

    #[test]
    fn normalize_base_url_forces_single_trailing_slash() {
        assert_eq!(normalize_base_url("https://a.example.com"), "https://a.example.com/");
        assert_eq!(normalize_base_url("https://a.example.com///"), "https://a.example.com/");
        assert_eq!(normalize_base_url("https://a.example.com/"), "https://a.example.com/");
    }

    #[test]
    fn absolutize_joins_relative_paths() {
        assert_eq!(
            absolutize("https://a.example.com/", "ultra/course"),
            Some("https://a.example.com/ultra/course".to_string())
        );
        assert_eq!(
            absolutize("https://a.example.com/", "/webapps/blackboard?course_id=_1_1"),
            Some("https://a.example.com/webapps/blackboard?course_id=_1_1".to_string())
        );
    }

    #[test]
    fn absolutize_passes_through_absolute_urls() {
        assert_eq!(
            absolutize("https://a.example.com/", "https://cdn.example.com/f.pdf"),
            Some("https://cdn.example.com/f.pdf".to_string())
        );
    }

    #[test]
    fn normalize_space_flattens_runs() {
        assert_eq!(normalize_space("  COMP3506\n  Algorithms   "), "COMP3506 Algorithms");
        assert_eq!(normalize_space(""), "");
    }
}
