//! Date entry field.

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::widget::Widget;
use crate::widgets::text::TextInput;

/// A date input filled as MM/DD/YYYY text.
///
/// The product's pickers accept typed dates, so the widget bypasses the
/// popup calendar entirely.
#[derive(Debug, Clone)]
pub struct Calendar {
    input: TextInput,
}

impl Calendar {
    /// Bind to the date input
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            input: TextInput::new(browser, locator),
        }
    }

    /// Current date text
    pub fn value(&self) -> MiradorResult<String> {
        self.input.value()
    }

    /// Fill a date given as `(month, day, year)`
    pub fn fill_date(&self, month: u32, day: u32, year: u32) -> MiradorResult<bool> {
        self.input
            .fill_text(&format!("{month:02}/{day:02}/{year:04}"))
    }
}

impl Widget for Calendar {
    fn browser(&self) -> &Browser {
        self.input.browser()
    }

    fn locator(&self) -> &Locator {
        self.input.locator()
    }

    fn widget_name(&self) -> &str {
        "calendar"
    }

    fn read(&self) -> MiradorResult<Value> {
        self.input.read()
    }

    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        match value {
            Value::String(date) => self.input.fill_text(date),
            other => Err(MiradorError::Fill {
                message: format!("calendar expects a date string, got {other}"),
            }),
        }
    }
}
