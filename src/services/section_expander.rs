//! Collapsible-section expansion, capability layer.
//!
//! Ultra course outlines hide most rows behind folder and learning-module
//! toggles. This service clicks them open until nothing is left to click.
//! It knows nothing about what the rows contain.

use tracing::debug;

use crate::infrastructure::PageDriver;

/// `aria-controls` fragments that mark an expandable outline section.
/// Folders and learning modules render different control ids.
pub const EXPANSION_CONTROL_MARKERS: [&str; 2] = ["folder-contents", "learning-module-contents"];

/// Pause between click rounds so freshly revealed toggles get painted.
const ROUND_PAUSE_MS: u64 = 200;

/// One click pass over the page, recursing into same-origin frames.
/// Returns the number of elements clicked; cross-origin frames throw on
/// `contentDocument` access and are skipped.
fn expansion_js() -> String {
    let marker_test = EXPANSION_CONTROL_MARKERS
        .iter()
        .map(|m| format!("controls.includes('{m}')"))
        .collect::<Vec<_>>()
        .join(" || ");
    [
        "(() => {".to_string(),
        "  let clicked = 0;".to_string(),
        "  const sweep = (doc) => {".to_string(),
        "    doc.querySelectorAll('[aria-expanded=\"false\"][aria-controls]').forEach(el => {".to_string(),
        "      const controls = el.getAttribute('aria-controls') || '';".to_string(),
        format!("      if ({marker_test}) {{"),
        "        try { el.click(); clicked++; } catch (e) {}".to_string(),
        "      }".to_string(),
        "    });".to_string(),
        "    doc.querySelectorAll('iframe').forEach(f => {".to_string(),
        "      try { if (f.contentDocument) sweep(f.contentDocument); } catch (e) {}".to_string(),
        "    });".to_string(),
        "  };".to_string(),
        "  sweep(document);".to_string(),
        "  return clicked;".to_string(),
        "})()".to_string(),
    ]
    .join("\n")
}

/// Expands every collapsed section on the current page.
pub struct SectionExpander {
    max_rounds: u32,
}

impl SectionExpander {
    pub fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }

    /// Click toggles in rounds until a round clicks nothing or the round
    /// cap is hit. Evaluation failures end the pass instead of aborting
    /// the caller; expansion is best-effort. Returns total clicks.
    pub async fn expand_all(&self, driver: &PageDriver) -> u32 {
        let js = expansion_js();
        let mut total = 0u32;
        for round in 1..=self.max_rounds {
            match driver.eval_as::<u32>(js.as_str()).await {
                Ok(0) => {
                    debug!("section expansion settled after {} round(s)", round - 1);
                    break;
                }
                Ok(clicked) => {
                    total += clicked;
                    debug!("expansion round {round}: clicked {clicked} toggle(s)");
                    driver.settle(ROUND_PAUSE_MS).await;
                }
                Err(e) => {
                    debug!("expansion script failed, stopping: {e}");
                    break;
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_checks_every_control_marker() {
        let js = expansion_js();
        for marker in EXPANSION_CONTROL_MARKERS {
            assert!(js.contains(marker));
        }
    }

    #[test]
    fn script_is_a_plain_expression_with_frame_recursion() {
        let js = expansion_js();
        assert!(js.starts_with("(() => {"));
        assert!(js.ends_with("})()"));
        assert!(js.contains("contentDocument"));
    }
}
