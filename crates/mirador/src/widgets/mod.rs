//! Concrete widget library.
//!
//! Each family exposes the smallest surface sufficient to read current
//! state and to set desired state idempotently.

pub mod accordion;
pub mod calendar;
pub mod chart;
pub mod dialog;
pub mod dynamic_table;
pub mod file_input;
pub mod flash;
pub mod multibox;
pub mod paginator;
pub mod search;
pub mod select;
pub mod summary;
pub mod table;
pub mod tabs;
pub mod text;
pub mod toggle;
pub mod tree;

use crate::result::MiradorResult;
use crate::widget::Widget;

/// Drag one widget onto another: resolve both roots, aim for their
/// middle points, drop, and let the page settle.
pub fn drag_onto(source: &dyn Widget, target: &dyn Widget) -> MiradorResult<()> {
    let browser = source.browser();
    let (sx, sy) = browser.middle_of(source.locator())?;
    let (tx, ty) = browser.middle_of(target.locator())?;
    tracing::debug!(from = ?(sx, sy), to = ?(tx, ty), "drag and drop");
    browser.drag_and_drop(source.locator(), target.locator())
}

/// Turn a human header string into a stable identifier: lowercased,
/// spaces to underscores, other non-alphanumerics stripped.
#[must_use]
pub fn attributize(header: &str) -> String {
    header
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '_' {
                Some('_')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::browser::Browser;
    use crate::dom::{Element, PageModel};
    use crate::driver::PageModelDriver;
    use crate::locator::Locator;
    use crate::widgets::text::Text;
    use std::rc::Rc;

    #[test]
    fn test_drag_onto_resolves_both_roots() {
        let mut page = PageModel::new();
        let root = page.root();
        let a = page.append(root, Element::new("div").id("shelf-a"));
        let b = page.append(root, Element::new("div").id("shelf-b"));
        let driver = PageModelDriver::new(page);
        let browser = Browser::new(Rc::new(driver.clone()));

        let source = Text::new(browser.clone(), Locator::css("#shelf-a"));
        let target = Text::new(browser, Locator::css("#shelf-b"));
        drag_onto(&source, &target).unwrap();
        assert_eq!(driver.model().borrow().clicked(), &[a, b]);
    }

    #[test]
    fn test_attributize_basic() {
        assert_eq!(attributize("Power State"), "power_state");
    }

    #[test]
    fn test_attributize_strips_punctuation() {
        assert_eq!(attributize("Collect Contents?"), "collect_contents");
        assert_eq!(attributize("VMs & Templates"), "vms_templates");
    }

    #[test]
    fn test_attributize_collapses_whitespace() {
        assert_eq!(attributize("  Last   Updated "), "last_updated");
    }

    #[test]
    fn test_attributize_is_deterministic() {
        assert_eq!(attributize("Name"), attributize("Name"));
    }
}
