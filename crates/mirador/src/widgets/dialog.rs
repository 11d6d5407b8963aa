//! Modal dialogs with the product's standard button titles.

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

/// A modal dialog.
#[derive(Debug, Clone)]
pub struct ModalDialog {
    base: WidgetBase,
}

impl ModalDialog {
    /// Bind to the modal container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "modal dialog"),
        }
    }

    /// Dialog title text
    pub fn title(&self) -> MiradorResult<String> {
        self.base
            .browser()
            .text(&self.base.locator().child(Selector::css("h4.modal-title")))
    }

    fn click_button(&self, caption: &str) -> MiradorResult<()> {
        let browser = self.base.browser();
        let dialog = browser.element(self.base.locator())?;
        let buttons = browser.find_under(&dialog, &Selector::css("button"))?;
        for button in &buttons {
            if browser.text_of(button)? == caption {
                return browser.click_on(button);
            }
        }
        let present = buttons
            .iter()
            .map(|b| browser.text_of(b))
            .collect::<MiradorResult<Vec<_>>>()?;
        Err(MiradorError::ItemNotFound {
            message: format!("dialog has no '{caption}' button (have {present:?})"),
        })
    }

    /// Click "Save"
    pub fn save(&self) -> MiradorResult<()> {
        self.click_button("Save")
    }

    /// Click "Cancel"
    pub fn cancel(&self) -> MiradorResult<()> {
        self.click_button("Cancel")
    }

    /// Click "Reset"
    pub fn reset(&self) -> MiradorResult<()> {
        self.click_button("Reset")
    }

    /// Click "Apply"
    pub fn apply(&self) -> MiradorResult<()> {
        self.click_button("Apply")
    }

    /// Click "Delete"
    pub fn delete(&self) -> MiradorResult<()> {
        self.click_button("Delete")
    }

    /// Click "OK"
    pub fn ok(&self) -> MiradorResult<()> {
        self.click_button("OK")
    }
}

impl Widget for ModalDialog {
    fn browser(&self) -> &Browser {
        self.base.browser()
    }

    fn locator(&self) -> &Locator {
        self.base.locator()
    }

    fn widget_name(&self) -> &str {
        self.base.name()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::{Element, PageModel};
    use crate::driver::PageModelDriver;
    use std::rc::Rc;

    fn dialog_page() -> Browser {
        let mut page = PageModel::new();
        let root = page.root();
        let modal = page.append(root, Element::new("div").class("modal"));
        page.append(
            modal,
            Element::new("h4").class("modal-title").text("Delete Key Pair"),
        );
        let footer = page.append(modal, Element::new("div").class("modal-footer"));
        let delete = page.append(footer, Element::new("button").text("Delete"));
        page.append(footer, Element::new("button").text("Cancel"));
        page.on_click(
            delete,
            Box::new(move |p| {
                p.node_mut(modal).displayed = false;
            }),
        );
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    #[test]
    fn test_title_and_button_click() {
        let browser = dialog_page();
        let dialog = ModalDialog::new(browser, Locator::css("div.modal"));
        assert_eq!(dialog.title().unwrap(), "Delete Key Pair");
        assert!(dialog.is_displayed());
        dialog.delete().unwrap();
        assert!(!dialog.is_displayed());
    }

    #[test]
    fn test_missing_button_lists_present_ones() {
        let browser = dialog_page();
        let dialog = ModalDialog::new(browser, Locator::css("div.modal"));
        let err = dialog.save().unwrap_err();
        assert!(err.to_string().contains("Delete"));
        assert!(err.to_string().contains("Cancel"));
    }
}
