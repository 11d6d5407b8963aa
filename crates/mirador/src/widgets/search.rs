//! Search controls: the simple text box and the advanced expression
//! editor.

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};
use crate::widgets::text::TextInput;

/// The simple search box: text plus a submit magnifier.
#[derive(Debug, Clone)]
pub struct SimpleSearch {
    base: WidgetBase,
    input: TextInput,
}

impl SimpleSearch {
    /// Bind to the search container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        let input = TextInput::new(
            browser.clone(),
            locator.child(Selector::css("input.search-text")),
        );
        Self {
            base: WidgetBase::new(browser, locator, "search"),
            input,
        }
    }

    /// Current search text
    pub fn text(&self) -> MiradorResult<String> {
        self.input.value()
    }

    /// Type `text` and submit
    pub fn search(&self, text: &str) -> MiradorResult<()> {
        self.input.fill_text(text)?;
        self.base
            .browser()
            .click(&self.base.locator().child(Selector::css("button.search-submit")))
    }

    /// Clear the box and submit the empty search
    pub fn clear(&self) -> MiradorResult<()> {
        if self.text()?.is_empty() {
            return Ok(());
        }
        self.input.fill_text("")?;
        self.base
            .browser()
            .click(&self.base.locator().child(Selector::css("button.search-submit")))
    }
}

impl Widget for SimpleSearch {
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
        Ok(Value::String(self.text()?))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        match value {
            Value::String(text) => {
                if &self.text()? == text {
                    return Ok(false);
                }
                self.search(text)?;
                Ok(true)
            }
            other => Err(MiradorError::Fill {
                message: format!("search expects text, got {other}"),
            }),
        }
    }
}

/// The advanced search pane: an expression editor with saved filters
/// and optional per-query user-input prompts.
#[derive(Debug, Clone)]
pub struct AdvancedSearch {
    base: WidgetBase,
    expression: TextInput,
}

impl AdvancedSearch {
    /// Bind to the advanced-search pane
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        let expression = TextInput::new(
            browser.clone(),
            locator.child(Selector::css("textarea.expression")),
        );
        Self {
            base: WidgetBase::new(browser, locator, "advanced search"),
            expression,
        }
    }

    fn button(&self, class: &str) -> Locator {
        self.base.locator().child(Selector::css(&format!("button.{class}")))
    }

    /// Current expression text
    pub fn expression_text(&self) -> MiradorResult<String> {
        self.expression.value()
    }

    /// Replace the filter expression
    pub fn fill_expression(&self, expression: &str) -> MiradorResult<bool> {
        self.expression.fill_text(expression)
    }

    /// Apply the current expression
    pub fn apply_filter(&self) -> MiradorResult<()> {
        self.base.browser().click(&self.button("apply-filter"))
    }

    /// Save the current expression under `name`
    pub fn save_filter(&self, name: &str) -> MiradorResult<()> {
        let browser = self.base.browser();
        let name_input = TextInput::new(
            browser.clone(),
            self.base.locator().child(Selector::css("input.filter-name")),
        );
        name_input.fill_text(name)?;
        browser.click(&self.button("save-filter"))
    }

    /// Load the saved filter named `name`
    ///
    /// # Errors
    ///
    /// [`MiradorError::SelectItemNotFound`] when no saved filter carries
    /// the name.
    pub fn load_filter(&self, name: &str) -> MiradorResult<()> {
        let browser = self.base.browser();
        let pane = browser.element(self.base.locator())?;
        let entries = browser.find_under(&pane, &Selector::css("li.saved-filter"))?;
        for entry in &entries {
            if browser.text_of(entry)? == name {
                return browser.click_on(entry);
            }
        }
        let options = entries
            .iter()
            .map(|e| browser.text_of(e))
            .collect::<MiradorResult<Vec<_>>>()?;
        Err(MiradorError::SelectItemNotFound {
            widget: self.base.name().to_string(),
            item: name.to_string(),
            options,
        })
    }

    /// Reset the editor to an empty expression
    pub fn reset_filter(&self) -> MiradorResult<()> {
        self.base.browser().click(&self.button("reset-filter"))
    }

    /// Fill the per-query user-input prompts, keyed by prompt label.
    ///
    /// Prompted filters pop extra inputs at apply time; each prompt row
    /// is a label plus an input.
    pub fn fill_prompts(&self, values: &[(&str, &str)]) -> MiradorResult<bool> {
        let browser = self.base.browser();
        let pane = browser.element(self.base.locator())?;
        let mut changed = false;
        for (label, value) in values {
            let rows = browser.find_under(&pane, &Selector::css("div.prompt-row"))?;
            let mut matched = false;
            for row in rows {
                let labels = browser.find_under(&row, &Selector::css("> label"))?;
                let Some(row_label) = labels.first() else {
                    continue;
                };
                if browser.text_of(row_label)? != *label {
                    continue;
                }
                let inputs = browser.find_under(&row, &Selector::css("> input"))?;
                let input = inputs.first().ok_or_else(|| MiradorError::ItemNotFound {
                    message: format!("prompt '{label}' has no input"),
                })?;
                if browser.value_of(input)? != *value {
                    browser.clear_on(input)?;
                    browser.send_keys_on(input, value)?;
                    changed = true;
                }
                matched = true;
                break;
            }
            if !matched {
                return Err(MiradorError::ItemNotFound {
                    message: format!("no user-input prompt labeled '{label}'"),
                });
            }
        }
        Ok(changed)
    }
}

impl Widget for AdvancedSearch {
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
        Ok(Value::String(self.expression_text()?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::{Element, PageModel};
    use crate::driver::PageModelDriver;
    use std::rc::Rc;

    fn simple_page() -> Browser {
        let mut page = PageModel::new();
        let root = page.root();
        let pane = page.append(root, Element::new("div").id("search"));
        page.append(pane, Element::new("input").class("search-text"));
        page.append(pane, Element::new("button").class("search-submit"));
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    fn advanced_page() -> Browser {
        let mut page = PageModel::new();
        let root = page.root();
        let pane = page.append(root, Element::new("div").id("adv-search"));
        let expr = page.append(pane, Element::new("textarea").class("expression"));
        page.append(pane, Element::new("input").class("filter-name"));
        page.append(pane, Element::new("button").class("apply-filter"));
        page.append(pane, Element::new("button").class("save-filter"));
        let reset = page.append(pane, Element::new("button").class("reset-filter"));
        let saved = page.append(
            pane,
            Element::new("li").class("saved-filter").text("running vms"),
        );
        page.on_click(
            saved,
            Box::new(move |p| {
                p.node_mut(expr).value = "VM : Power State = on".to_string();
            }),
        );
        page.on_click(
            reset,
            Box::new(move |p| {
                p.node_mut(expr).value.clear();
            }),
        );
        let prompts = page.append(pane, Element::new("div").class("prompt-row"));
        page.append(prompts, Element::new("label").text("Older than"));
        page.append(prompts, Element::new("input"));
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    mod simple_tests {
        use super::*;

        #[test]
        fn test_search_types_and_submits() {
            let browser = simple_page();
            let search = SimpleSearch::new(browser, Locator::css("#search"));
            search.search("vm-alpha").unwrap();
            assert_eq!(search.text().unwrap(), "vm-alpha");
        }

        #[test]
        fn test_fill_is_idempotent() {
            let browser = simple_page();
            let search = SimpleSearch::new(browser, Locator::css("#search"));
            assert!(search.fill(&serde_json::json!("x")).unwrap());
            assert!(!search.fill(&serde_json::json!("x")).unwrap());
        }

        #[test]
        fn test_clear_on_empty_is_noop() {
            let browser = simple_page();
            let search = SimpleSearch::new(browser, Locator::css("#search"));
            search.clear().unwrap();
            assert_eq!(search.text().unwrap(), "");
        }
    }

    mod advanced_tests {
        use super::*;

        #[test]
        fn test_fill_and_reset_expression() {
            let browser = advanced_page();
            let search = AdvancedSearch::new(browser, Locator::css("#adv-search"));
            assert!(search.fill_expression("VM : Name = vm-a").unwrap());
            assert_eq!(search.expression_text().unwrap(), "VM : Name = vm-a");
            search.reset_filter().unwrap();
            assert_eq!(search.expression_text().unwrap(), "");
        }

        #[test]
        fn test_load_saved_filter() {
            let browser = advanced_page();
            let search = AdvancedSearch::new(browser, Locator::css("#adv-search"));
            search.load_filter("running vms").unwrap();
            assert_eq!(
                search.expression_text().unwrap(),
                "VM : Power State = on"
            );
        }

        #[test]
        fn test_load_unknown_filter_errors() {
            let browser = advanced_page();
            let search = AdvancedSearch::new(browser, Locator::css("#adv-search"));
            assert!(matches!(
                search.load_filter("stopped vms").unwrap_err(),
                MiradorError::SelectItemNotFound { .. }
            ));
        }

        #[test]
        fn test_fill_prompts() {
            let browser = advanced_page();
            let search = AdvancedSearch::new(browser, Locator::css("#adv-search"));
            assert!(search.fill_prompts(&[("Older than", "30")]).unwrap());
            assert!(!search.fill_prompts(&[("Older than", "30")]).unwrap());
        }

        #[test]
        fn test_unknown_prompt_errors() {
            let browser = advanced_page();
            let search = AdvancedSearch::new(browser, Locator::css("#adv-search"));
            assert!(search.fill_prompts(&[("Newer than", "1")]).is_err());
        }
    }
}
