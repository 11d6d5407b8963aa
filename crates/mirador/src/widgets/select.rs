//! Select widgets: native, bootstrap, and react flavors.

use serde_json::Value;

use crate::browser::Browser;
use crate::driver::ElementHandle;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

fn fill_labels(value: &Value, widget: &str) -> MiradorResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(MiradorError::Fill {
                    message: format!("{widget} expects labels, got {other}"),
                }),
            })
            .collect(),
        other => Err(MiradorError::Fill {
            message: format!("{widget} expects a label or list of labels, got {other}"),
        }),
    }
}

/// A native `<select>` element, single- or multi-valued.
#[derive(Debug, Clone)]
pub struct NativeSelect {
    base: WidgetBase,
}

impl NativeSelect {
    /// Bind to the select element
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "select"),
        }
    }

    fn options_with_handles(&self) -> MiradorResult<Vec<(String, ElementHandle)>> {
        let browser = self.base.browser();
        let select = browser.element(self.base.locator())?;
        let mut out = Vec::new();
        for option in browser.find_under(&select, &Selector::css("option"))? {
            out.push((browser.text_of(&option)?, option));
        }
        Ok(out)
    }

    /// Whether the select accepts multiple values
    pub fn is_multiple(&self) -> MiradorResult<bool> {
        Ok(self
            .base
            .browser()
            .get_attribute(self.base.locator(), "multiple")?
            .is_some())
    }

    /// All option labels
    pub fn all_options(&self) -> MiradorResult<Vec<String>> {
        Ok(self
            .options_with_handles()?
            .into_iter()
            .map(|(text, _)| text)
            .collect())
    }

    /// Labels of the currently selected options
    pub fn selected_options(&self) -> MiradorResult<Vec<String>> {
        let browser = self.base.browser();
        let mut out = Vec::new();
        for (text, handle) in self.options_with_handles()? {
            if browser.selected_of(&handle)? {
                out.push(text);
            }
        }
        Ok(out)
    }

    /// Label of the selected option for single-valued selects
    pub fn selected_option(&self) -> MiradorResult<Option<String>> {
        Ok(self.selected_options()?.into_iter().next())
    }

    fn click_option(&self, label: &str) -> MiradorResult<()> {
        let browser = self.base.browser();
        let options = self.options_with_handles()?;
        let found = options.iter().find(|(text, _)| text == label);
        match found {
            Some((_, handle)) => browser.click_on(handle),
            None => Err(MiradorError::SelectItemNotFound {
                widget: self.base.name().to_string(),
                item: label.to_string(),
                options: options.into_iter().map(|(text, _)| text).collect(),
            }),
        }
    }

    /// Drive selection to exactly `labels`.
    ///
    /// Multi-selects apply the delta: absent labels are selected, extra
    /// ones unselected. Single selects take the one label given.
    pub fn select(&self, labels: &[String]) -> MiradorResult<bool> {
        let current = self.selected_options()?;
        if self.is_multiple()? {
            let mut changed = false;
            for label in labels {
                if !current.contains(label) {
                    self.click_option(label)?;
                    changed = true;
                }
            }
            for label in &current {
                if !labels.contains(label) {
                    self.click_option(label)?;
                    changed = true;
                }
            }
            Ok(changed)
        } else {
            let target = labels.first().ok_or_else(|| MiradorError::Fill {
                message: "select fill requires a label".to_string(),
            })?;
            if current.first() == Some(target) {
                return Ok(false);
            }
            self.click_option(target)?;
            Ok(true)
        }
    }
}

impl Widget for NativeSelect {
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
        if self.is_multiple()? {
            Ok(Value::Array(
                self.selected_options()?
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ))
        } else {
            Ok(self
                .selected_option()?
                .map_or(Value::Null, Value::String))
        }
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        let labels = fill_labels(value, self.widget_name())?;
        self.select(&labels)
    }
}

/// A patternfly bootstrap-select: a toggle button showing the selection
/// plus a dropdown menu of `li` entries.
///
/// Menus that auto-hide after selection are not closed explicitly; the
/// close click is skipped once a selection landed.
#[derive(Debug, Clone)]
pub struct BootstrapSelect {
    base: WidgetBase,
    hides_on_select: bool,
}

impl BootstrapSelect {
    /// Bind to the `.btn-group` container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "bootstrap select"),
            hides_on_select: true,
        }
    }

    /// Mark the menu as staying open after selection
    #[must_use]
    pub const fn stays_open(mut self) -> Self {
        self.hides_on_select = false;
        self
    }

    fn toggle_locator(&self) -> Locator {
        self.base
            .locator()
            .child(Selector::css("button.dropdown-toggle"))
    }

    /// Whether the dropdown menu is open
    pub fn is_open(&self) -> MiradorResult<bool> {
        Ok(self
            .base
            .browser()
            .classes(self.base.locator())?
            .contains(&"open".to_string()))
    }

    fn open(&self) -> MiradorResult<()> {
        if !self.is_open()? {
            self.base.browser().click(&self.toggle_locator())?;
        }
        if !self.is_open()? {
            return Err(MiradorError::WidgetOperationFailed {
                widget: self.base.name().to_string(),
                message: "dropdown could not be expanded".to_string(),
            });
        }
        Ok(())
    }

    fn close_if_open(&self) -> MiradorResult<()> {
        if !self.hides_on_select && self.is_open()? {
            self.base.browser().click(&self.toggle_locator())?;
        }
        Ok(())
    }

    /// Label currently shown on the toggle button
    pub fn selected_option(&self) -> MiradorResult<String> {
        self.base.browser().text(&self.toggle_locator())
    }

    /// All option labels in the menu
    pub fn all_options(&self) -> MiradorResult<Vec<String>> {
        let browser = self.base.browser();
        let container = browser.element(self.base.locator())?;
        let mut out = Vec::new();
        for item in browser.find_under(&container, &Selector::css("ul.dropdown-menu li"))? {
            out.push(browser.text_of(&item)?);
        }
        Ok(out)
    }

    /// Select by visible label
    pub fn select_by_visible_text(&self, label: &str) -> MiradorResult<bool> {
        if self.selected_option()? == label {
            return Ok(false);
        }
        self.open()?;
        let browser = self.base.browser();
        let container = browser.element(self.base.locator())?;
        let items = browser.find_under(&container, &Selector::css("ul.dropdown-menu li"))?;
        for item in &items {
            if browser.text_of(item)? == label {
                browser.click_on(item)?;
                self.close_if_open()?;
                return Ok(true);
            }
        }
        let options = items
            .iter()
            .map(|i| browser.text_of(i))
            .collect::<MiradorResult<Vec<_>>>()?;
        Err(MiradorError::SelectItemNotFound {
            widget: self.base.name().to_string(),
            item: label.to_string(),
            options,
        })
    }
}

impl Widget for BootstrapSelect {
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
        Ok(Value::String(self.selected_option()?))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        let labels = fill_labels(value, self.widget_name())?;
        let label = labels.first().ok_or_else(|| MiradorError::Fill {
            message: "bootstrap select fill requires a label".to_string(),
        })?;
        self.select_by_visible_text(label)
    }
}

/// A react-select with optional two-level (section + value) selection.
///
/// The control shows the current value; the menu holds groups, each a
/// heading plus options.
#[derive(Debug, Clone)]
pub struct ReactSelect {
    base: WidgetBase,
}

impl ReactSelect {
    /// Bind to the select container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "react select"),
        }
    }

    fn control_locator(&self) -> Locator {
        self.base.locator().child(Selector::css("div.select-control"))
    }

    /// Currently shown value
    pub fn selected_option(&self) -> MiradorResult<String> {
        self.base
            .browser()
            .text(&self.base.locator().child(Selector::css("div.select-value")))
    }

    fn open(&self) -> MiradorResult<ElementHandle> {
        let browser = self.base.browser();
        let menu = self.base.locator().child(Selector::css("div.select-menu"));
        if !browser.is_displayed(&menu) {
            browser.click(&self.control_locator())?;
        }
        browser.element(&menu)
    }

    /// Group headings present in the menu
    pub fn sections(&self) -> MiradorResult<Vec<String>> {
        let browser = self.base.browser();
        let menu = self.open()?;
        let mut out = Vec::new();
        for heading in browser.find_under(&menu, &Selector::css("div.select-group-heading"))? {
            out.push(browser.text_of(&heading)?);
        }
        Ok(out)
    }

    /// Select `value` inside `section`
    pub fn select_in_section(&self, section: &str, value: &str) -> MiradorResult<bool> {
        if self.selected_option()? == value {
            return Ok(false);
        }
        let browser = self.base.browser();
        let menu = self.open()?;
        for group in browser.find_under(&menu, &Selector::css("div.select-group"))? {
            let headings = browser.find_under(&group, &Selector::css("div.select-group-heading"))?;
            let Some(heading) = headings.first() else {
                continue;
            };
            if browser.text_of(heading)? != section {
                continue;
            }
            let options = browser.find_under(&group, &Selector::css("div.select-option"))?;
            for option in &options {
                if browser.text_of(option)? == value {
                    browser.click_on(option)?;
                    return Ok(true);
                }
            }
            let options = options
                .iter()
                .map(|o| browser.text_of(o))
                .collect::<MiradorResult<Vec<_>>>()?;
            return Err(MiradorError::SelectItemNotFound {
                widget: self.base.name().to_string(),
                item: format!("{section} / {value}"),
                options,
            });
        }
        Err(MiradorError::SelectItemNotFound {
            widget: self.base.name().to_string(),
            item: format!("{section} / {value}"),
            options: self.sections()?,
        })
    }
}

impl Widget for ReactSelect {
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
        Ok(Value::String(self.selected_option()?))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        match value {
            Value::Array(pair) if pair.len() == 2 => {
                let section = pair[0].as_str().ok_or_else(|| MiradorError::Fill {
                    message: "react select section must be a string".to_string(),
                })?;
                let item = pair[1].as_str().ok_or_else(|| MiradorError::Fill {
                    message: "react select value must be a string".to_string(),
                })?;
                self.select_in_section(section, item)
            }
            other => Err(MiradorError::Fill {
                message: format!("react select expects [section, value], got {other}"),
            }),
        }
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

    fn browser_over(page: PageModel) -> Browser {
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    mod native_select_tests {
        use super::*;

        fn single_page() -> PageModel {
            let mut page = PageModel::new();
            let root = page.root();
            let select = page.append(root, Element::new("select").id("size"));
            page.append(select, Element::new("option").text("Small").selected(true));
            page.append(select, Element::new("option").text("Medium"));
            page.append(select, Element::new("option").text("Large"));
            page
        }

        fn multi_page() -> PageModel {
            let mut page = PageModel::new();
            let root = page.root();
            let select = page.append(
                root,
                Element::new("select").id("roles").attr("multiple", "multiple"),
            );
            page.append(select, Element::new("option").text("Admin").selected(true));
            page.append(select, Element::new("option").text("Operator"));
            page.append(select, Element::new("option").text("Viewer").selected(true));
            page
        }

        #[test]
        fn test_all_options() {
            let browser = browser_over(single_page());
            let select = NativeSelect::new(browser, Locator::css("#size"));
            assert_eq!(
                select.all_options().unwrap(),
                vec!["Small", "Medium", "Large"]
            );
        }

        #[test]
        fn test_single_fill_and_idempotence() {
            let browser = browser_over(single_page());
            let select = NativeSelect::new(browser, Locator::css("#size"));
            assert!(select.fill(&json!("Medium")).unwrap());
            assert_eq!(select.read().unwrap(), json!("Medium"));
            assert!(!select.fill(&json!("Medium")).unwrap());
        }

        #[test]
        fn test_absent_option_errors() {
            let browser = browser_over(single_page());
            let select = NativeSelect::new(browser, Locator::css("#size"));
            assert!(matches!(
                select.fill(&json!("Gigantic")).unwrap_err(),
                MiradorError::SelectItemNotFound { .. }
            ));
        }

        #[test]
        fn test_multi_fill_applies_delta() {
            let browser = browser_over(multi_page());
            let select = NativeSelect::new(browser, Locator::css("#roles"));
            // Admin stays, Viewer goes, Operator arrives.
            assert!(select
                .fill(&json!(["Admin", "Operator"]))
                .unwrap());
            assert_eq!(select.read().unwrap(), json!(["Admin", "Operator"]));
            assert!(!select.fill(&json!(["Admin", "Operator"])).unwrap());
        }
    }

    mod bootstrap_select_tests {
        use super::*;

        fn dropdown_page() -> PageModel {
            let mut page = PageModel::new();
            let root = page.root();
            let group = page.append(root, Element::new("div").id("pp").class("btn-group"));
            let toggle = page.append(
                group,
                Element::new("button").class("dropdown-toggle").text("20 items"),
            );
            let menu = page.append(group, Element::new("ul").class("dropdown-menu"));
            for label in ["10 items", "20 items", "50 items"] {
                let li = page.append(menu, Element::new("li").text(label));
                // Selecting an entry updates the toggle text and closes
                // the menu, as the product page does.
                let label = label.to_string();
                page.on_click(
                    li,
                    Box::new(move |p| {
                        p.node_mut(toggle).text = label.clone();
                        p.node_mut(group).classes.remove("open");
                    }),
                );
            }
            page.on_click(
                toggle,
                Box::new(move |p| {
                    if !p.node_mut(group).classes.insert("open".to_string()) {
                        p.node_mut(group).classes.remove("open");
                    }
                }),
            );
            page
        }

        #[test]
        fn test_selected_option_reads_toggle() {
            let browser = browser_over(dropdown_page());
            let select = BootstrapSelect::new(browser, Locator::css("#pp"));
            assert_eq!(select.selected_option().unwrap(), "20 items");
        }

        #[test]
        fn test_select_by_visible_text() {
            let browser = browser_over(dropdown_page());
            let select = BootstrapSelect::new(browser, Locator::css("#pp"));
            assert!(select.select_by_visible_text("50 items").unwrap());
            assert_eq!(select.selected_option().unwrap(), "50 items");
            assert!(!select.select_by_visible_text("50 items").unwrap());
            // Auto-hide: menu closed by the selection itself.
            assert!(!select.is_open().unwrap());
        }

        #[test]
        fn test_absent_option_lists_menu() {
            let browser = browser_over(dropdown_page());
            let select = BootstrapSelect::new(browser, Locator::css("#pp"));
            let err = select.select_by_visible_text("100 items").unwrap_err();
            match err {
                MiradorError::SelectItemNotFound { options, .. } => {
                    assert_eq!(options, vec!["10 items", "20 items", "50 items"]);
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    mod react_select_tests {
        use super::*;

        fn react_page() -> PageModel {
            let mut page = PageModel::new();
            let root = page.root();
            let container = page.append(root, Element::new("div").id("type"));
            page.append(container, Element::new("div").class("select-control"));
            let value = page.append(
                container,
                Element::new("div").class("select-value").text("Amazon"),
            );
            let menu = page.append(container, Element::new("div").class("select-menu"));
            for (section, options) in [
                ("Cloud", vec!["Amazon", "Azure"]),
                ("Infrastructure", vec!["VMware", "RHV"]),
            ] {
                let group = page.append(menu, Element::new("div").class("select-group"));
                page.append(
                    group,
                    Element::new("div").class("select-group-heading").text(section),
                );
                for option in options {
                    let o = page.append(
                        group,
                        Element::new("div").class("select-option").text(option),
                    );
                    let option = option.to_string();
                    page.on_click(
                        o,
                        Box::new(move |p| {
                            p.node_mut(value).text = option.clone();
                        }),
                    );
                }
            }
            page
        }

        #[test]
        fn test_two_level_selection() {
            let browser = browser_over(react_page());
            let select = ReactSelect::new(browser, Locator::css("#type"));
            assert!(select
                .fill(&json!(["Infrastructure", "VMware"]))
                .unwrap());
            assert_eq!(select.read().unwrap(), json!("VMware"));
            assert!(!select.fill(&json!(["Infrastructure", "VMware"])).unwrap());
        }

        #[test]
        fn test_missing_value_in_section_errors() {
            let browser = browser_over(react_page());
            let select = ReactSelect::new(browser, Locator::css("#type"));
            assert!(matches!(
                select.fill(&json!(["Cloud", "GCE"])).unwrap_err(),
                MiradorError::SelectItemNotFound { .. }
            ));
        }
    }
}
