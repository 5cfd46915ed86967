//! Course discovery from a rendered page.
//!
//! Three independent detectors cover the platform's rendering paths: classic
//! server-rendered course links, modern card titles, and cards that expose a
//! course id as a data attribute before any anchor exists. Their union is
//! deduplicated by absolute URL, first hit wins.

use scraper::{Html, Selector};
use tracing::debug;

use crate::extract::{element_text, CourseItem, UniqueItems};
use crate::utils::urls::absolutize;

/// Query fragment identifying classic-view course links.
pub const COURSE_ID_QUERY_MARKER: &str = "course_id=";

/// Modern cards nest the course anchor under a stable automation id.
pub const COURSE_CARD_TITLE_SELECTOR: &str =
    r#"[data-automation-id="course-card-title"] a[href]"#;

/// Cards that carry a course id but no anchor (lazy-rendered deployments).
pub const COURSE_CARD_DATA_SELECTOR: &str = "[data-course-id], [data-course-id-short]";

/// Outline path for a course known only by its data-attribute id.
pub fn card_outline_path(course_id: &str) -> String {
    format!("ultra/courses/{course_id}/outline")
}

const UNTITLED_COURSE: &str = "(untitled course)";
const CARD_LABEL_MAX_CHARS: usize = 200;

/// Detect courses in `html`, resolving links against `base_url`.
///
/// Returns an empty list when nothing matches; that is a valid result, not
/// an error.
pub fn extract_courses(html: &str, base_url: &str) -> Vec<CourseItem> {
    let document = Html::parse_document(html);
    let mut found = UniqueItems::default();

    // 1) Classic view: any anchor whose href carries a course_id parameter.
    if let Ok(anchor_sel) = Selector::parse("a[href]") {
        for a in document.select(&anchor_sel) {
            let href = match a.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            if !href.contains(COURSE_ID_QUERY_MARKER) {
                continue;
            }
            let url = match absolutize(base_url, href) {
                Some(u) => u,
                None => continue,
            };
            let mut label = element_text(&a);
            if label.is_empty() {
                label = a.value().attr("title").unwrap_or("").trim().to_string();
            }
            if label.is_empty() {
                label = UNTITLED_COURSE.to_string();
            }
            found.push(label, url);
        }
    }

    // 2) Modern cards with a nested anchor under the card-title attribute.
    if let Ok(card_sel) = Selector::parse(COURSE_CARD_TITLE_SELECTOR) {
        for a in document.select(&card_sel) {
            let href = match a.value().attr("href") {
                Some(h) if !h.is_empty() => h,
                _ => continue,
            };
            let label = element_text(&a);
            if label.is_empty() {
                continue;
            }
            if let Some(url) = absolutize(base_url, href) {
                found.push(label, url);
            }
        }
    }

    // 3) Cards rendered without anchors: synthesize the outline URL from the
    //    data attribute.
    if let Ok(data_sel) = Selector::parse(COURSE_CARD_DATA_SELECTOR) {
        for card in document.select(&data_sel) {
            let course_id = card
                .value()
                .attr("data-course-id")
                .or_else(|| card.value().attr("data-course-id-short"));
            let course_id = match course_id {
                Some(id) if !id.is_empty() => id,
                _ => continue,
            };
            let text = element_text(&card);
            let label: String = if text.is_empty() {
                course_id.to_string()
            } else {
                text.chars().take(CARD_LABEL_MAX_CHARS).collect()
            };
            if let Some(url) = absolutize(base_url, &card_outline_path(course_id)) {
                found.push(label, url);
            }
        }
    }

    let items = found.into_vec();
    debug!("extract_courses matched {} unique course link(s)", items.len());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://learn.example.edu/";

    #[test]
    fn classic_links_detected_with_anchor_text() {
        let html = r#"<html><body>
            <a href="/webapps/blackboard/execute/launcher?type=Course&course_id=_123_1">
              COMP3506  Algorithms &amp; Data Structures
            </a>
        </body></html>"#;
        let items = extract_courses(html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "COMP3506 Algorithms & Data Structures");
        assert!(items[0].url.contains("course_id=_123_1"));
        assert!(items[0].url.starts_with("https://learn.example.edu/"));
    }

    #[test]
    fn classic_link_without_text_falls_back_to_title_then_placeholder() {
        let html = r#"<html><body>
            <a href="/x?course_id=_1_1" title="From title"></a>
            <a href="/y?course_id=_2_1"></a>
        </body></html>"#;
        let items = extract_courses(html, BASE);
        assert_eq!(items[0].label, "From title");
        assert_eq!(items[1].label, "(untitled course)");
    }

    #[test]
    fn card_title_anchors_detected() {
        let html = r#"<html><body>
            <div data-automation-id="course-card-title">
              <a href="/ultra/courses/_55_1/outline">STAT1201</a>
            </div>
        </body></html>"#;
        let items = extract_courses(html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "STAT1201");
        assert_eq!(items[0].url, "https://learn.example.edu/ultra/courses/_55_1/outline");
    }

    #[test]
    fn data_attribute_cards_synthesize_outline_urls() {
        let html = r#"<html><body>
            <div data-course-id="_77_1">MATH1051 Calculus</div>
            <div data-course-id-short="_78_1"></div>
        </body></html>"#;
        let items = extract_courses(html, BASE);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "MATH1051 Calculus");
        assert_eq!(items[0].url, "https://learn.example.edu/ultra/courses/_77_1/outline");
        // A card with no text labels itself with the id.
        assert_eq!(items[1].label, "_78_1");
        assert_eq!(items[1].url, "https://learn.example.edu/ultra/courses/_78_1/outline");
    }

    #[test]
    fn repeated_urls_dedupe_to_first_occurrence() {
        // Same URL via detector 1 three times plus once via detector 2:
        // exactly one entry survives, labeled from the first hit.
        let html = r#"<html><body>
            <a href="/c?course_id=_9_1">First label</a>
            <a href="/c?course_id=_9_1">Second label</a>
            <a href="/c?course_id=_9_1">Third label</a>
            <div data-automation-id="course-card-title">
              <a href="/c?course_id=_9_1">Card label</a>
            </div>
        </body></html>"#;
        let items = extract_courses(html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "First label");
    }

    #[test]
    fn first_seen_order_is_preserved_across_detectors() {
        let html = r#"<html><body>
            <a href="/a?course_id=_1_1">Classic A</a>
            <div data-automation-id="course-card-title">
              <a href="/ultra/courses/_2_1/outline">Card B</a>
            </div>
            <div data-course-id="_3_1">Data C</div>
        </body></html>"#;
        let items = extract_courses(html, BASE);
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Classic A", "Card B", "Data C"]);
    }

    #[test]
    fn empty_page_yields_empty_list() {
        assert!(extract_courses("<html><body></body></html>", BASE).is_empty());
    }
}
