//! Static content extractors.
//!
//! Pure functions over a DOM snapshot plus a base URL. They never touch the
//! browser, never fail on "found nothing", and swallow per-element oddities
//! (missing attrs, unparseable hrefs) by skipping the element.

pub mod ally;
pub mod courses;
pub mod downloadables;

use std::collections::HashSet;

use serde::Serialize;

/// One discovered (label, absolute URL) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub label: String,
    pub url: String,
}

/// One enrolled course.
pub type CourseItem = ContentItem;

/// One downloadable link candidate.
pub type DownloadCandidate = ContentItem;

/// Collector that keeps the first item seen for each absolute URL,
/// preserving insertion order.
#[derive(Debug, Default)]
pub struct UniqueItems {
    seen: HashSet<String>,
    items: Vec<ContentItem>,
}

impl UniqueItems {
    pub fn push(&mut self, label: impl Into<String>, url: impl Into<String>) {
        let url = url.into();
        if self.seen.insert(url.clone()) {
            self.items.push(ContentItem {
                label: label.into(),
                url,
            });
        }
    }

    pub fn into_vec(self) -> Vec<ContentItem> {
        self.items
    }
}

/// Flattened text content of an element, whitespace-normalized.
pub(crate) fn element_text(el: &scraper::ElementRef<'_>) -> String {
    crate::utils::urls::normalize_space(&el.text().collect::<Vec<_>>().join(" "))
}
