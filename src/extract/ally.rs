//! Accessibility-engine preview URL discovery.
//!
//! Portals with the Ally integration stamp every file rendition with a
//! `data-ally-file-preview-url` attribute; those URLs fetch the original
//! uploaded file regardless of how the surrounding markup is structured.

use std::collections::BTreeSet;

use scraper::{Html, Selector};
use tracing::debug;

use crate::utils::urls::absolutize;

/// Attribute carrying the original-file preview endpoint.
pub const ALLY_PREVIEW_ATTR: &str = "data-ally-file-preview-url";

/// Absolute preview URLs found in `html`, deduplicated and ordered.
pub fn extract_ally_preview_urls(html: &str, base_url: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let mut urls = BTreeSet::new();

    let selector = format!("[{ALLY_PREVIEW_ATTR}]");
    if let Ok(sel) = Selector::parse(&selector) {
        for el in document.select(&sel) {
            let Some(raw) = el.value().attr(ALLY_PREVIEW_ATTR) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            if let Some(url) = absolutize(base_url, raw) {
                urls.insert(url);
            }
        }
    }

    debug!("extract_ally_preview_urls found {} url(s)", urls.len());
    urls
}
