//! Two-state widgets: checkboxes, bootstrap switches, radio groups.

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

/// A plain checkbox
#[derive(Debug, Clone)]
pub struct Checkbox {
    base: WidgetBase,
}

impl Checkbox {
    /// Bind to a locator pointing at the input element
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "checkbox"),
        }
    }

    /// Whether the box is checked
    pub fn selected(&self) -> MiradorResult<bool> {
        self.base.browser().is_selected(self.base.locator())
    }

    /// Drive to `state`, returning whether a click was needed
    pub fn set(&self, state: bool) -> MiradorResult<bool> {
        if self.selected()? == state {
            return Ok(false);
        }
        self.base.browser().click(self.base.locator())?;
        Ok(true)
    }
}

impl Widget for Checkbox {
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
        Ok(Value::Bool(self.selected()?))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        match value {
            Value::Bool(state) => self.set(*state),
            other => Err(MiradorError::Fill {
                message: format!("checkbox expects a bool, got {other}"),
            }),
        }
    }
}

/// A patternfly bootstrap-switch: a styled wrapper around a checkbox.
///
/// The wrapper carries display state; the inner input carries the value
/// and receives the clicks.
#[derive(Debug, Clone)]
pub struct BootstrapSwitch {
    base: WidgetBase,
    input: Checkbox,
}

impl BootstrapSwitch {
    /// Bind to the wrapper element
    #[must_use]
    pub fn new(browser: Browser, wrapper: Locator) -> Self {
        let input = Checkbox::new(
            browser.clone(),
            wrapper.child(Selector::css("input[type='checkbox']")),
        );
        Self {
            base: WidgetBase::new(browser, wrapper, "bootstrap switch"),
            input,
        }
    }

    /// Whether the switch is on
    pub fn selected(&self) -> MiradorResult<bool> {
        self.input.selected()
    }

    /// Drive to `state`
    pub fn set(&self, state: bool) -> MiradorResult<bool> {
        self.input.set(state)
    }
}

impl Widget for BootstrapSwitch {
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
        self.input.read()
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        self.input.fill(value)
    }
}

/// A labeled radio group.
///
/// The group root contains `label` elements, each wrapping a radio input
/// and its label text.
#[derive(Debug, Clone)]
pub struct RadioGroup {
    base: WidgetBase,
}

impl RadioGroup {
    /// Bind to the group container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "radio group"),
        }
    }

    fn labels(&self) -> MiradorResult<Vec<(String, crate::driver::ElementHandle)>> {
        let browser = self.base.browser();
        let group = browser.element(self.base.locator())?;
        let mut out = Vec::new();
        for label in browser.find_under(&group, &Selector::css("label"))? {
            let text = browser.text_of(&label)?;
            let mut inputs = browser.find_under(&label, &Selector::css("input[type='radio']"))?;
            if inputs.is_empty() {
                continue;
            }
            out.push((text, inputs.remove(0)));
        }
        Ok(out)
    }

    /// All option labels
    pub fn options(&self) -> MiradorResult<Vec<String>> {
        Ok(self.labels()?.into_iter().map(|(text, _)| text).collect())
    }

    /// Label of the selected option, if any
    pub fn selected(&self) -> MiradorResult<Option<String>> {
        let browser = self.base.browser();
        for (text, input) in self.labels()? {
            if browser.selected_of(&input)? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    /// Select the option labeled `label`, returning whether anything
    /// changed
    ///
    /// # Errors
    ///
    /// [`MiradorError::SelectItemNotFound`] when no option carries the
    /// label.
    pub fn select(&self, label: &str) -> MiradorResult<bool> {
        if self.selected()?.as_deref() == Some(label) {
            return Ok(false);
        }
        let browser = self.base.browser();
        let labels = self.labels()?;
        let found = labels.iter().find(|(text, _)| text == label);
        match found {
            Some((_, input)) => {
                browser.click_on(input)?;
                Ok(true)
            }
            None => Err(MiradorError::SelectItemNotFound {
                widget: self.base.name().to_string(),
                item: label.to_string(),
                options: labels.into_iter().map(|(text, _)| text).collect(),
            }),
        }
    }
}

impl Widget for RadioGroup {
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
        Ok(self
            .selected()?
            .map_or(Value::Null, Value::String))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        match value {
            Value::String(label) => self.select(label),
            other => Err(MiradorError::Fill {
                message: format!("radio group expects a label, got {other}"),
            }),
        }
    }
}
