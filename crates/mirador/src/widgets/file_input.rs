//! File inputs.
//!
//! Upload forms take a filesystem path. Hidden inputs (styled upload
//! buttons) are forced visible before filling, since drivers refuse to
//! type into invisible elements.

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::browser::Browser;
use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

/// A file upload input.
#[derive(Debug, Clone)]
pub struct FileInput {
    base: WidgetBase,
    force_visible: bool,
}

impl FileInput {
    /// Bind to a visible file input
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "file input"),
            force_visible: false,
        }
    }

    /// Bind to a hidden file input; its display style is forced visible
    /// before filling
    #[must_use]
    pub fn hidden(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "hidden file input"),
            force_visible: true,
        }
    }

    /// Path currently held by the input
    pub fn value(&self) -> MiradorResult<String> {
        self.base.browser().value(self.base.locator())
    }

    /// Fill with a filesystem path
    pub fn fill_path(&self, path: &Path) -> MiradorResult<bool> {
        let text = path.to_str().ok_or_else(|| MiradorError::Fill {
            message: format!("path {path:?} is not valid UTF-8"),
        })?;
        if self.value()? == text {
            return Ok(false);
        }
        let browser = self.base.browser();
        if self.force_visible && !self.is_displayed() {
            browser.set_attribute(self.base.locator(), "style", "display: block")?;
        }
        browser.clear(self.base.locator())?;
        browser.send_keys(self.base.locator(), text)?;
        Ok(true)
    }
}

impl Widget for FileInput {
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
        match value {
            Value::String(path) => self.fill_path(Path::new(path)),
            other => Err(MiradorError::Fill {
                message: format!("file input expects a path string, got {other}"),
            }),
        }
    }
}

/// Write `contents` to a temp file for feeding into a [`FileInput`].
///
/// The file is deleted when the returned handle drops.
pub fn temp_payload(contents: &[u8]) -> MiradorResult<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}
