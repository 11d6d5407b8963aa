//! Browser facade.
//!
//! A thin, synchronous facade over a [`Driver`]: scoped element lookup,
//! reads, state-changing interactions each followed by the page-safe
//! barrier, alert handling, and JavaScript execution. Widgets never talk
//! to the driver directly.

use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::driver::{Driver, ElementHandle, Rect};
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::version::ProductVersion;
use crate::wait::{wait_for, WaitOptions};

/// Page-safe barrier budget (matches the product's 20s spinner ceiling)
pub const DEFAULT_PAGE_SAFE_NUM_SEC: f64 = 20.0;

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Page-safe barrier budget in seconds
    pub page_safe_num_sec: f64,
    /// Page-safe polling interval
    pub page_safe_delay: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            page_safe_num_sec: DEFAULT_PAGE_SAFE_NUM_SEC,
            page_safe_delay: Duration::from_millis(200),
        }
    }
}

impl BrowserConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page-safe budget in seconds
    #[must_use]
    pub const fn with_page_safe_num_sec(mut self, num_sec: f64) -> Self {
        self.page_safe_num_sec = num_sec;
        self
    }

    /// Set the page-safe polling interval
    #[must_use]
    pub const fn with_page_safe_delay(mut self, delay: Duration) -> Self {
        self.page_safe_delay = delay;
        self
    }
}

/// The browser facade. Cheap to clone; all clones share one driver
/// session (sessions are exclusive to a single test worker).
#[derive(Clone)]
pub struct Browser {
    driver: Rc<dyn Driver>,
    config: BrowserConfig,
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Browser {
    /// Wrap a driver with default configuration
    #[must_use]
    pub fn new(driver: Rc<dyn Driver>) -> Self {
        Self::with_config(driver, BrowserConfig::default())
    }

    /// Wrap a driver with explicit configuration
    #[must_use]
    pub fn with_config(driver: Rc<dyn Driver>, config: BrowserConfig) -> Self {
        Self { driver, config }
    }

    /// The facade configuration
    #[must_use]
    pub const fn config(&self) -> &BrowserConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Element resolution
    // ------------------------------------------------------------------

    /// All elements matching `locator`, resolving its scope chain from
    /// the page root
    pub fn elements(&self, locator: &Locator) -> MiradorResult<Vec<ElementHandle>> {
        let mut scope: Option<ElementHandle> = None;
        for selector in &locator.scope {
            scope = Some(self.first_of(selector, scope.as_ref(), locator)?);
        }
        self.driver.find(&locator.selector, scope.as_ref())
    }

    /// First element matching `locator`
    ///
    /// # Errors
    ///
    /// [`MiradorError::NoSuchElement`] when nothing matches.
    pub fn element(&self, locator: &Locator) -> MiradorResult<ElementHandle> {
        self.elements(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| MiradorError::NoSuchElement {
                locator: locator.to_string(),
            })
    }

    fn first_of(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> MiradorResult<ElementHandle> {
        self.driver
            .find(selector, scope)?
            .into_iter()
            .next()
            .ok_or_else(|| MiradorError::NoSuchElement {
                locator: locator.to_string(),
            })
    }

    /// All elements matching `selector` under an already-resolved handle.
    ///
    /// Row/cell widgets iterate handles rather than re-rendering locators
    /// per cell.
    pub fn find_under(
        &self,
        scope: &ElementHandle,
        selector: &Selector,
    ) -> MiradorResult<Vec<ElementHandle>> {
        self.driver.find(selector, Some(scope))
    }

    /// Visible text of a resolved handle
    pub fn text_of(&self, el: &ElementHandle) -> MiradorResult<String> {
        self.driver.text(el)
    }

    /// Attribute of a resolved handle
    pub fn attr_of(&self, el: &ElementHandle, name: &str) -> MiradorResult<Option<String>> {
        self.driver.attribute(el, name)
    }

    /// Classes of a resolved handle
    pub fn classes_of(&self, el: &ElementHandle) -> MiradorResult<Vec<String>> {
        self.driver.classes(el)
    }

    /// Whether a resolved handle is displayed
    pub fn displayed_of(&self, el: &ElementHandle) -> MiradorResult<bool> {
        self.driver.is_displayed(el)
    }

    /// Whether a resolved handle is checked/selected
    pub fn selected_of(&self, el: &ElementHandle) -> MiradorResult<bool> {
        self.driver.is_selected(el)
    }

    /// Input value of a resolved handle
    pub fn value_of(&self, el: &ElementHandle) -> MiradorResult<String> {
        self.driver.value(el)
    }

    /// Click a resolved handle, then run the page-safe barrier.
    ///
    /// Unlike [`Browser::click`] there is no locator to refetch from, so
    /// staleness surfaces directly.
    pub fn click_on(&self, el: &ElementHandle) -> MiradorResult<()> {
        self.driver.click(el)?;
        self.ensure_page_safe()
    }

    /// Type keys into a resolved handle
    pub fn send_keys_on(&self, el: &ElementHandle, keys: &str) -> MiradorResult<()> {
        self.driver.send_keys(el, keys)?;
        self.ensure_page_safe()
    }

    /// Clear the value of a resolved handle
    pub fn clear_on(&self, el: &ElementHandle) -> MiradorResult<()> {
        self.driver.clear(el)?;
        self.ensure_page_safe()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Visible text at `locator`
    pub fn text(&self, locator: &Locator) -> MiradorResult<String> {
        let el = self.element(locator)?;
        self.driver.text(&el)
    }

    /// Attribute value at `locator`
    pub fn get_attribute(&self, locator: &Locator, name: &str) -> MiradorResult<Option<String>> {
        let el = self.element(locator)?;
        self.driver.attribute(&el, name)
    }

    /// CSS classes at `locator`
    pub fn classes(&self, locator: &Locator) -> MiradorResult<Vec<String>> {
        let el = self.element(locator)?;
        self.driver.classes(&el)
    }

    /// Whether `locator` resolves to a displayed element. Zero matches is
    /// `false`, never an error.
    #[must_use]
    pub fn is_displayed(&self, locator: &Locator) -> bool {
        match self.element(locator) {
            Ok(el) => self.driver.is_displayed(&el).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Whether the element at `locator` is checked/selected
    pub fn is_selected(&self, locator: &Locator) -> MiradorResult<bool> {
        let el = self.element(locator)?;
        self.driver.is_selected(&el)
    }

    /// Input value at `locator`
    pub fn value(&self, locator: &Locator) -> MiradorResult<String> {
        let el = self.element(locator)?;
        self.driver.value(&el)
    }

    /// Middle point of the element at `locator`
    pub fn middle_of(&self, locator: &Locator) -> MiradorResult<(f64, f64)> {
        let el = self.element(locator)?;
        Ok(self.driver.rect(&el)?.middle())
    }

    /// Position and size of the element at `locator`
    pub fn rect(&self, locator: &Locator) -> MiradorResult<Rect> {
        let el = self.element(locator)?;
        self.driver.rect(&el)
    }

    // ------------------------------------------------------------------
    // Interactions (each followed by the page-safe barrier)
    // ------------------------------------------------------------------

    /// Click the element at `locator`.
    ///
    /// A click through a stale handle is retried once after refetching by
    /// locator; persistent staleness surfaces.
    pub fn click(&self, locator: &Locator) -> MiradorResult<()> {
        let el = self.element(locator)?;
        if let Err(err) = self.driver.click(&el) {
            if !matches!(err, MiradorError::StaleElement { .. }) {
                return Err(err);
            }
            tracing::debug!(locator = %locator, "stale element on click, refetching");
            let el = self.element(locator)?;
            self.driver.click(&el)?;
        }
        self.ensure_page_safe()
    }

    /// Type keys into the element at `locator`
    pub fn send_keys(&self, locator: &Locator, keys: &str) -> MiradorResult<()> {
        let el = self.element(locator)?;
        self.driver.send_keys(&el, keys)?;
        self.ensure_page_safe()
    }

    /// Clear the value of the element at `locator`
    pub fn clear(&self, locator: &Locator) -> MiradorResult<()> {
        let el = self.element(locator)?;
        self.driver.clear(&el)?;
        self.ensure_page_safe()
    }

    /// Set an attribute on the element at `locator`
    pub fn set_attribute(&self, locator: &Locator, name: &str, value: &str) -> MiradorResult<()> {
        let el = self.element(locator)?;
        self.driver.set_attribute(&el, name, value)
    }

    /// Drag the element at `src` onto the element at `dst`
    pub fn drag_and_drop(&self, src: &Locator, dst: &Locator) -> MiradorResult<()> {
        let src_el = self.element(src)?;
        let dst_el = self.element(dst)?;
        self.driver.drag_and_drop(&src_el, &dst_el)?;
        self.ensure_page_safe()
    }

    /// Drag the element at `src` by a pixel offset
    pub fn drag_and_drop_to(&self, src: &Locator, x: f64, y: f64) -> MiradorResult<()> {
        let src_el = self.element(src)?;
        self.driver.drag_and_drop_to(&src_el, x, y)?;
        self.ensure_page_safe()
    }

    /// Scroll/hover the element at `locator` into interaction range
    pub fn move_to_element(&self, locator: &Locator) -> MiradorResult<ElementHandle> {
        let el = self.element(locator)?;
        self.driver.rect(&el)?;
        Ok(el)
    }

    /// Execute JavaScript in the page
    pub fn execute_script(&self, code: &str, args: &[Value]) -> MiradorResult<Value> {
        self.driver.execute_script(code, args)
    }

    /// Reload the page
    pub fn refresh(&self) -> MiradorResult<()> {
        self.driver.refresh()?;
        self.ensure_page_safe()
    }

    // ------------------------------------------------------------------
    // Synchronization and alerts
    // ------------------------------------------------------------------

    /// The page-safe barrier: poll the driver's quiescence predicate
    /// until the page reports no in-flight work.
    ///
    /// # Errors
    ///
    /// [`MiradorError::PageNotQuiescent`] when the budget elapses.
    pub fn ensure_page_safe(&self) -> MiradorResult<()> {
        let options = WaitOptions::new()
            .num_sec(self.config.page_safe_num_sec)
            .delay(self.config.page_safe_delay)
            .message("page quiescent");
        wait_for(|| self.driver.page_quiescent(), &options).map_err(|err| match err {
            MiradorError::Timeout { ms, .. } => MiradorError::PageNotQuiescent { ms },
            other => other,
        })?;
        Ok(())
    }

    /// Accept or cancel the currently open alert, typing `prompt` into
    /// it first when the alert is a prompt.
    ///
    /// # Errors
    ///
    /// [`MiradorError::AlertPresent`]-free flows call this only when an
    /// alert is expected; a missing alert is a widget operation failure.
    pub fn handle_alert(&self, prompt: Option<&str>, cancel: bool) -> MiradorResult<()> {
        if self.driver.alert_text()?.is_none() {
            return Err(MiradorError::WidgetOperationFailed {
                widget: "browser".to_string(),
                message: "no alert present".to_string(),
            });
        }
        if let Some(reply) = prompt {
            self.driver.send_alert_text(reply)?;
        }
        self.driver.handle_alert(!cancel)
    }

    /// Accept any alerts currently blocking the page
    pub fn dismiss_any_alerts(&self) -> MiradorResult<()> {
        while let Some(text) = self.driver.alert_text()? {
            tracing::warn!(alert = %text, "dismissing stray alert");
            self.driver.handle_alert(true)?;
        }
        Ok(())
    }

    /// Probe for the product's server-error page, returning its text.
    ///
    /// Navigation uses this to distinguish "my view is not here" from "the
    /// whole page is broken".
    #[must_use]
    pub fn rails_error(&self) -> Option<String> {
        let title = Locator::css("div.dialog h1");
        let body = Locator::css("div.dialog p");
        if self.is_displayed(&title) {
            let title = self.text(&title).unwrap_or_default();
            let body = self.text(&body).unwrap_or_default();
            return Some(format!("{title}: {body}"));
        }
        None
    }

    /// Version the product reports
    pub fn product_version(&self) -> MiradorResult<ProductVersion> {
        self.driver.product_version()
    }
}
