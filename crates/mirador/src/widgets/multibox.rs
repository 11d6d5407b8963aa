//! Two-box multi-select: an "available" list, a "chosen" list, and move
//! buttons between them.

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};
use crate::widgets::select::NativeSelect;

/// A multi-box select widget.
///
/// Filling is expressed as the desired chosen set; the widget computes
/// the difference and moves only what must move.
#[derive(Debug, Clone)]
pub struct MultiBoxSelect {
    base: WidgetBase,
    available: NativeSelect,
    chosen: NativeSelect,
}

impl MultiBoxSelect {
    /// Bind to the container; it holds `select.available`,
    /// `select.chosen`, and `button.move-right` / `button.move-left`.
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        let available = NativeSelect::new(
            browser.clone(),
            locator.child(Selector::css("select.available")),
        );
        let chosen = NativeSelect::new(
            browser.clone(),
            locator.child(Selector::css("select.chosen")),
        );
        Self {
            base: WidgetBase::new(browser, locator, "multi box select"),
            available,
            chosen,
        }
    }

    fn move_right(&self) -> Locator {
        self.base.locator().child(Selector::css("button.move-right"))
    }

    fn move_left(&self) -> Locator {
        self.base.locator().child(Selector::css("button.move-left"))
    }

    /// Labels currently in the chosen box
    pub fn chosen_options(&self) -> MiradorResult<Vec<String>> {
        self.chosen.all_options()
    }

    /// Labels currently in the available box
    pub fn available_options(&self) -> MiradorResult<Vec<String>> {
        self.available.all_options()
    }

    /// Drive the chosen box to exactly `labels`
    pub fn select(&self, labels: &[String]) -> MiradorResult<bool> {
        let chosen = self.chosen_options()?;
        let to_add: Vec<String> = labels
            .iter()
            .filter(|l| !chosen.contains(l))
            .cloned()
            .collect();
        let to_remove: Vec<String> = chosen
            .iter()
            .filter(|l| !labels.contains(l))
            .cloned()
            .collect();
        if to_add.is_empty() && to_remove.is_empty() {
            return Ok(false);
        }
        let browser = self.base.browser();
        if !to_add.is_empty() {
            self.available.select(&to_add)?;
            browser.click(&self.move_right())?;
        }
        if !to_remove.is_empty() {
            self.chosen.select(&to_remove)?;
            browser.click(&self.move_left())?;
        }
        Ok(true)
    }
}

impl Widget for MultiBoxSelect {
    fn browser(&self) -> &Browser {
        self.base.browser()
    }

    fn locator(&self) -> &Locator {
        self.base.locator()
    }

    fn widget_name(&self) -> &str {
        self.base.name()
    }

    fn read(&self) -> MiradorResult<Value> {
        Ok(Value::Array(
            self.chosen_options()?
                .into_iter()
                .map(Value::String)
                .collect(),
        ))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        let labels = match value {
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_str().map(ToString::to_string).ok_or_else(|| {
                        MiradorError::Fill {
                            message: format!("multi box select expects labels, got {v}"),
                        }
                    })
                })
                .collect::<MiradorResult<Vec<_>>>()?,
            other => {
                return Err(MiradorError::Fill {
                    message: format!("multi box select expects a list, got {other}"),
                })
            }
        };
        self.select(&labels)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::{Element, PageModel};
    use crate::driver::PageModelDriver;
    use serde_json::json;
    use std::rc::Rc;

    /// Page wiring the move buttons to actually transfer the options
    /// the product-side JS would move.
    fn multibox_page() -> Browser {
        let mut page = PageModel::new();
        let root = page.root();
        let container = page.append(root, Element::new("div").id("features"));
        let available = page.append(
            container,
            Element::new("select").class("available").attr("multiple", "m"),
        );
        let chosen = page.append(
            container,
            Element::new("select").class("chosen").attr("multiple", "m"),
        );
        for label in ["Compute", "Network", "Storage"] {
            page.append(available, Element::new("option").text(label));
        }
        let right = page.append(container, Element::new("button").class("move-right"));
        let left = page.append(container, Element::new("button").class("move-left"));

        let transfer = move |p: &mut PageModel, from: usize, to: usize| {
            let selected: Vec<usize> = p
                .children_of(from)
                .iter()
                .copied()
                .filter(|&o| p.node(o).selected)
                .collect();
            for option in selected {
                let label = p.node(option).text.clone();
                p.remove(option);
                p.append(to, Element::new("option").text(label));
            }
        };
        page.on_click(right, Box::new(move |p| transfer(p, available, chosen)));
        page.on_click(left, Box::new(move |p| transfer(p, chosen, available)));
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    #[test]
    fn test_fill_moves_selection() {
        let browser = multibox_page();
        let widget = MultiBoxSelect::new(browser, Locator::css("#features"));
        assert!(widget.fill(&json!(["Compute", "Storage"])).unwrap());
        assert_eq!(widget.read().unwrap(), json!(["Compute", "Storage"]));
        assert_eq!(widget.available_options().unwrap(), vec!["Network"]);
    }

    #[test]
    fn test_second_fill_with_same_set_is_noop() {
        let browser = multibox_page();
        let widget = MultiBoxSelect::new(browser, Locator::css("#features"));
        assert!(widget.fill(&json!(["Network"])).unwrap());
        assert!(!widget.fill(&json!(["Network"])).unwrap());
    }

    #[test]
    fn test_fill_removes_extras() {
        let browser = multibox_page();
        let widget = MultiBoxSelect::new(browser, Locator::css("#features"));
        widget.fill(&json!(["Compute", "Network"])).unwrap();
        assert!(widget.fill(&json!(["Compute"])).unwrap());
        assert_eq!(widget.read().unwrap(), json!(["Compute"]));
    }
}
