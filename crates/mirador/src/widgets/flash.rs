//! Flash-message banners.
//!
//! The product surfaces outcomes as transient banners. Tests assert on
//! them explicitly; the library never auto-dismisses an unseen error.

use std::time::Duration;

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for, WaitOptions};
use crate::widget::{Widget, WidgetBase};

/// Banner severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    /// Green banner
    Success,
    /// Yellow banner
    Warning,
    /// Red banner
    Error,
    /// Blue banner
    Info,
}

impl FlashKind {
    fn from_classes(classes: &[String]) -> Option<Self> {
        for class in classes {
            match class.as_str() {
                "alert-success" => return Some(Self::Success),
                "alert-warning" => return Some(Self::Warning),
                "alert-danger" | "alert-error" => return Some(Self::Error),
                "alert-info" => return Some(Self::Info),
                _ => {}
            }
        }
        None
    }
}

/// One observed banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    /// Severity
    pub kind: FlashKind,
    /// Banner text
    pub text: String,
}

/// The flash banner area.
#[derive(Debug, Clone)]
pub struct FlashMessages {
    base: WidgetBase,
}

impl FlashMessages {
    /// Bind to the banner container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "flash messages"),
        }
    }

    /// All banners currently shown
    pub fn messages(&self) -> MiradorResult<Vec<FlashMessage>> {
        let browser = self.base.browser();
        if !self.is_displayed() {
            return Ok(Vec::new());
        }
        let container = browser.element(self.base.locator())?;
        let mut out = Vec::new();
        for banner in browser.find_under(&container, &Selector::css("div.alert"))? {
            let classes = browser.classes_of(&banner)?;
            let kind = FlashKind::from_classes(&classes).unwrap_or(FlashKind::Info);
            out.push(FlashMessage {
                kind,
                text: browser.text_of(&banner)?,
            });
        }
        Ok(out)
    }

    /// Fail when any error banner is present, quoting it
    pub fn assert_no_error(&self) -> MiradorResult<()> {
        let errors: Vec<String> = self
            .messages()?
            .into_iter()
            .filter(|m| m.kind == FlashKind::Error)
            .map(|m| m.text)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MiradorError::WidgetOperationFailed {
                widget: self.base.name().to_string(),
                message: format!("error banner(s) present: {errors:?}"),
            })
        }
    }

    /// Wait for a banner whose text contains `substring` (optionally of
    /// a specific kind) and return it.
    ///
    /// Banners appear asynchronously after actions, so the observation
    /// window is bounded instead of instantaneous.
    pub fn assert_message(
        &self,
        substring: &str,
        kind: Option<FlashKind>,
        timeout: Duration,
    ) -> MiradorResult<FlashMessage> {
        let options = WaitOptions::new()
            .num_sec(timeout.as_secs_f64())
            .delay(Duration::from_millis(200))
            .message(format!("flash message containing {substring:?}"));
        let outcome = wait_for(
            || {
                Ok(self.messages()?.into_iter().find(|m| {
                    m.text.contains(substring) && kind.map_or(true, |k| m.kind == k)
                }))
            },
            &options,
        )?;
        Ok(outcome.value.flatten().expect("satisfied wait has a value"))
    }
}

impl Widget for FlashMessages {
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
            self.messages()?
                .into_iter()
                .map(|m| Value::String(m.text))
                .collect(),
        ))
    }
}
