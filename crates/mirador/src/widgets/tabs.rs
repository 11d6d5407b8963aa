//! Tab groups.
//!
//! A tab selects itself whenever one of its content widgets is accessed.
//! Tab activation occasionally needs a second click on slow pages, so
//! the wait on the active class is followed by one bounded retry.

use std::rc::Rc;
use std::time::Duration;

use crate::browser::Browser;
use crate::locator::{Locator, LocatorTemplate, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for, WaitOptions};
use crate::widget::{View, ViewDefinition, Widget, WidgetBase};

/// How long to wait for the `active` class before the retry click
const TAB_ACTIVE_NUM_SEC: f64 = 2.0;

/// How long to wait (warn-only) for the tab's content widget
const TAB_CONTENT_NUM_SEC: f64 = 5.0;

/// One tab in a `ul.nav-tabs` strip.
#[derive(Debug, Clone)]
pub struct Tab {
    base: WidgetBase,
    title: String,
}

impl Tab {
    /// Bind the tab titled `title` inside the strip at `strip`
    #[must_use]
    pub fn new(browser: Browser, strip: Locator, title: impl Into<String>) -> Self {
        let title = title.into();
        let template = LocatorTemplate::parse("li[data-tab='{title}']");
        let locator = strip.child(template.render(&[("title", &title)]));
        Self {
            base: WidgetBase::new(browser, locator, "tab"),
            title,
        }
    }

    /// Whether this tab is the active one
    pub fn is_active(&self) -> MiradorResult<bool> {
        Ok(self
            .base
            .browser()
            .classes(self.base.locator())?
            .contains(&"active".to_string()))
    }

    fn link_locator(&self) -> Locator {
        self.base.locator().child(Selector::css("a"))
    }

    fn wait_active(&self) -> bool {
        let options = WaitOptions::new()
            .num_sec(TAB_ACTIVE_NUM_SEC)
            .delay(Duration::from_millis(100))
            .message(format!("tab '{}' active", self.title))
            .silent_failure();
        wait_for(|| self.is_active(), &options)
            .map(|outcome| outcome.satisfied)
            .unwrap_or(false)
    }

    /// Select this tab; idempotent. Retries the click once when the
    /// active state does not land in time.
    pub fn select(&self) -> MiradorResult<bool> {
        if self.is_active()? {
            return Ok(false);
        }
        self.base.browser().click(&self.link_locator())?;
        if !self.wait_active() {
            tracing::warn!(tab = %self.title, "tab not active after click, clicking again");
            self.base.browser().click(&self.link_locator())?;
            if !self.wait_active() {
                return Err(MiradorError::WidgetOperationFailed {
                    widget: format!("tab '{}'", self.title),
                    message: "tab did not activate after retry".to_string(),
                });
            }
        }
        Ok(true)
    }

    /// Bind the tab's content view; accessing any of its children
    /// selects the tab first and waits (warn-only) for the child's
    /// container to render.
    #[must_use]
    pub fn view(&self, definition: Rc<ViewDefinition>) -> View {
        let this = self.clone();
        let view = View::attach(self.base.browser().clone(), definition);
        let probe = view.clone();
        view.with_child_access_hook(Rc::new(move |_| {
            this.select()?;
            let options = WaitOptions::new()
                .num_sec(TAB_CONTENT_NUM_SEC)
                .delay(Duration::from_millis(100))
                .message("tab content displayed")
                .silent_failure();
            let outcome = wait_for(|| Ok(probe.is_displayed()), &options)?;
            if !outcome.satisfied {
                tracing::warn!(tab = %this.title, "tab content not displayed, proceeding");
            }
            Ok(())
        }))
    }
}

impl Widget for Tab {
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
