//! Plain text and text-input widgets.

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

/// A read-only text element; clickable (links, titles, buttons)
#[derive(Debug, Clone)]
pub struct Text {
    base: WidgetBase,
}

impl Text {
    /// Bind to a locator
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "text"),
        }
    }

    /// The element's visible text
    pub fn text(&self) -> MiradorResult<String> {
        self.base.browser().text(self.base.locator())
    }

    /// Click the element
    pub fn click(&self) -> MiradorResult<()> {
        self.base.browser().click(self.base.locator())
    }
}

impl Widget for Text {
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
}

/// Coerce a fill value to the string the widget types.
///
/// Numeric inputs coerce by stringification; other shapes are rejected.
pub(crate) fn coerce_to_string(widget: &str, value: &Value) -> MiradorResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(MiradorError::Fill {
            message: format!("{widget} cannot be filled with {other}"),
        }),
    }
}

/// A fillable text input
#[derive(Debug, Clone)]
pub struct TextInput {
    base: WidgetBase,
}

impl TextInput {
    /// Bind to a locator
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "text input"),
        }
    }

    /// The input's current value
    pub fn value(&self) -> MiradorResult<String> {
        self.base.browser().value(self.base.locator())
    }

    /// Type `text`, returning whether the value changed
    pub fn fill_text(&self, text: &str) -> MiradorResult<bool> {
        if self.value()? == text {
            return Ok(false);
        }
        let browser = self.base.browser();
        browser.clear(self.base.locator())?;
        browser.send_keys(self.base.locator(), text)?;
        Ok(true)
    }
}

impl Widget for TextInput {
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
        Ok(Value::String(self.value()?))
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        let text = coerce_to_string(self.widget_name(), value)?;
        self.fill_text(&text)
    }
}
