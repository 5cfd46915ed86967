//! Generic downloadable-link discovery within a course page.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::extract::{element_text, DownloadCandidate, UniqueItems};
use crate::utils::urls::absolutize;

/// Href fragments that mark the platform's file-backing endpoints, matched
/// against the lowercased href: attachment storage paths, generated file
/// identifiers, attachment-download queries, and item edit/document pages.
pub const DOWNLOAD_HREF_MARKERS: [&str; 5] = [
    "/bbcswebdav/",
    "xid-",
    "download?attachment_id=",
    "download?",
    "/edit/document",
];

/// Localized accessibility label fragment on per-item download buttons.
pub const DOWNLOAD_BUTTON_LABEL: &str = "download";

/// True when `href` points at one of the known file endpoints.
pub fn is_download_like(href: &str) -> bool {
    let href = href.to_ascii_lowercase();
    DOWNLOAD_HREF_MARKERS.iter().any(|m| href.contains(m))
}

/// Collect (title, absolute URL) pairs that look downloadable.
///
/// Two detectors: anchors whose href matches the endpoint markers, and
/// download-labeled buttons whose nearest ancestor anchor supplies the href
/// (the button's label becomes the title). Deduplicated by URL.
pub fn extract_downloadables(html: &str, base_url: &str) -> Vec<DownloadCandidate> {
    let document = Html::parse_document(html);
    let mut found = UniqueItems::default();

    if let Ok(anchor_sel) = Selector::parse("a[href]") {
        for a in document.select(&anchor_sel) {
            let href = match a.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            if !is_download_like(href) {
                continue;
            }
            let url = match absolutize(base_url, href) {
                Some(u) => u,
                None => continue,
            };
            let mut title = element_text(&a);
            if title.is_empty() {
                title = last_path_segment(href);
            }
            found.push(title, url);
        }
    }

    // Card layouts hide the href on an ancestor anchor and label only the
    // button.
    if let Ok(button_sel) = Selector::parse("button[aria-label]") {
        for btn in document.select(&button_sel) {
            let label = btn.value().attr("aria-label").unwrap_or("");
            if !label.to_ascii_lowercase().contains(DOWNLOAD_BUTTON_LABEL) {
                continue;
            }
            let Some(href) = ancestor_anchor_href(&btn) else {
                continue;
            };
            if let Some(url) = absolutize(base_url, &href) {
                found.push(label, url);
            }
        }
    }

    let items = found.into_vec();
    debug!("extract_downloadables matched {} unique link(s)", items.len());
    items
}

/// Nearest ancestor `<a href>` of `el`, if any.
fn ancestor_anchor_href(el: &ElementRef<'_>) -> Option<String> {
    for node in el.ancestors() {
        let Some(parent) = ElementRef::wrap(node) else {
            continue;
        };
        if parent.value().name() == "a" {
            if let Some(href) = parent.value().attr("href") {
                return Some(href.to_string());
            }
        }
    }
    None
}

/// Last path segment of an href, used when an anchor has no text.
fn last_path_segment(href: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.rsplit('/').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://learn.example.edu/";

    #[test]
    fn marker_table_matches_known_endpoints() {
        assert!(is_download_like("/bbcswebdav/pid-1-dt/file.pdf"));
        assert!(is_download_like("/files/xid-998877_1"));
        assert!(is_download_like("/webapps/x/download?attachment_id=42"));
        assert!(is_download_like("/x/download?foo=1"));
        assert!(is_download_like("/ultra/courses/_1_1/cl/edit/document/_2_1"));
        assert!(is_download_like("/BBCSWEBDAV/UPPER/CASE.PDF"));
        assert!(!is_download_like("/ultra/course"));
        assert!(!is_download_like("https://example.com/about"));
    }

    #[test]
    fn anchors_matching_markers_are_collected() {
        let html = r#"<html><body>
            <a href="/bbcswebdav/pid-3-dt/lecture1.pdf">Lecture 1</a>
            <a href="/courses/outline">Course home</a>
        </body></html>"#;
        let items = extract_downloadables(html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Lecture 1");
        assert_eq!(
            items[0].url,
            "https://learn.example.edu/bbcswebdav/pid-3-dt/lecture1.pdf"
        );
    }

    #[test]
    fn every_result_matches_a_marker_rule() {
        let html = r#"<html><body>
            <a href="/bbcswebdav/a.pdf">A</a>
            <a href="/plain/page">B</a>
            <a href="/files/xid-1_1">C</a>
            <a href="/another/page.html">D</a>
        </body></html>"#;
        for item in extract_downloadables(html, BASE) {
            assert!(is_download_like(&item.url), "unexpected item: {}", item.url);
        }
    }

    #[test]
    fn textless_anchor_titles_from_path_segment() {
        let html = r#"<a href="/bbcswebdav/pid-1/week2_notes.pdf"></a>"#;
        let items = extract_downloadables(html, BASE);
        assert_eq!(items[0].label, "week2_notes.pdf");
    }

    #[test]
    fn download_button_uses_ancestor_anchor_href() {
        let html = r#"<html><body>
            <a href="/files/xid-42_1">
              <div><button aria-label="Download Week 3 slides">⬇</button></div>
            </a>
        </body></html>"#;
        let items = extract_downloadables(html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Download Week 3 slides");
        assert_eq!(items[0].url, "https://learn.example.edu/files/xid-42_1");
    }

    #[test]
    fn download_button_without_anchor_is_skipped() {
        let html = r#"<div><button aria-label="Download">⬇</button></div>"#;
        assert!(extract_downloadables(html, BASE).is_empty());
    }

    #[test]
    fn duplicate_hrefs_collapse() {
        let html = r#"<html><body>
            <a href="/bbcswebdav/a.pdf">From anchor</a>
            <a href="/bbcswebdav/a.pdf"><button aria-label="Download a">x</button></a>
        </body></html>"#;
        let items = extract_downloadables(html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "From anchor");
    }
}
