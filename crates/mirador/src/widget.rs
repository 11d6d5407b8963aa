//! Widget base and view composition.
//!
//! A widget is a node bound to a locator with the uniform contracts
//! `is_displayed` / `read` / `fill`. A view is a container widget whose
//! children are declared up front with a builder and constructed lazily
//! on first access; accessing a child fires the parent's child-access
//! hook, which is how tabs and accordions select themselves.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for, WaitOptions};

/// The uniform widget contract.
pub trait Widget {
    /// The browser this widget reads and fills through
    fn browser(&self) -> &Browser;

    /// The widget's resolved locator
    fn locator(&self) -> &Locator;

    /// Name used in error messages and logs
    fn widget_name(&self) -> &str {
        "widget"
    }

    /// Whether the widget is present and rendered. Never errors; a
    /// missing element is `false`.
    fn is_displayed(&self) -> bool {
        self.browser().is_displayed(self.locator())
    }

    /// Read the widget's current state.
    ///
    /// Concrete widgets override; the default is an explicit
    /// not-implemented failure.
    fn read(&self) -> MiradorResult<Value> {
        Err(MiradorError::WidgetOperationFailed {
            widget: self.widget_name().to_string(),
            message: "read not implemented".to_string(),
        })
    }

    /// Drive the widget to `value`, returning whether anything changed.
    ///
    /// Filling the current value again must return `false` and make no
    /// UI change.
    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        let _ = value;
        Err(MiradorError::WidgetOperationFailed {
            widget: self.widget_name().to_string(),
            message: "fill not implemented".to_string(),
        })
    }

    /// Scroll/hover the widget into interaction range
    fn move_to(&self) -> MiradorResult<()> {
        self.browser().move_to_element(self.locator()).map(|_| ())
    }

    /// Wait until the widget is displayed
    ///
    /// # Errors
    ///
    /// [`MiradorError::Timeout`] when the budget elapses first.
    fn wait_displayed(&self, timeout: Duration) -> MiradorResult<()> {
        let options = WaitOptions::new()
            .num_sec(timeout.as_secs_f64())
            .delay(Duration::from_millis(100))
            .message(format!("{} displayed", self.widget_name()));
        wait_for(|| Ok(self.is_displayed()), &options)?;
        Ok(())
    }
}

/// Common state for concrete widgets: browser, locator, display name.
#[derive(Debug, Clone)]
pub struct WidgetBase {
    browser: Browser,
    locator: Locator,
    name: String,
}

impl WidgetBase {
    /// Bind a widget to a locator
    #[must_use]
    pub fn new(browser: Browser, locator: Locator, name: impl Into<String>) -> Self {
        Self {
            browser,
            locator,
            name: name.into(),
        }
    }

    /// Bind a widget under a parent root
    #[must_use]
    pub fn under(browser: Browser, parent: &Locator, selector: Selector, name: impl Into<String>) -> Self {
        Self::new(browser, parent.child(selector), name)
    }

    /// The browser
    #[must_use]
    pub const fn browser(&self) -> &Browser {
        &self.browser
    }

    /// The locator
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// The display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Factory constructing a child widget bound under a view root
pub type WidgetFactory = Rc<dyn Fn(&Browser, &Locator) -> Rc<dyn Widget>>;

/// Hook fired before a child widget is handed out
pub type ChildAccessHook = Rc<dyn Fn(&Browser) -> MiradorResult<()>>;

/// Static description of a view: root selector plus named children in
/// declaration order.
#[derive(Clone)]
pub struct ViewDefinition {
    root: Selector,
    children: Vec<(String, WidgetFactory)>,
}

impl std::fmt::Debug for ViewDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("root", &self.root)
            .field(
                "children",
                &self.children.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ViewDefinition {
    /// Start building a view rooted at `root`
    #[must_use]
    pub fn builder(root: Selector) -> ViewBuilder {
        ViewBuilder {
            definition: Self {
                root,
                children: Vec::new(),
            },
        }
    }

    /// Names of declared children, in declaration order
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Builder for [`ViewDefinition`]; widgets are declared here the way
/// the page lays them out.
pub struct ViewBuilder {
    definition: ViewDefinition,
}

impl std::fmt::Debug for ViewBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.definition.fmt(f)
    }
}

impl ViewBuilder {
    /// Declare a named child widget. A repeated name replaces the
    /// earlier declaration, keeping its position.
    #[must_use]
    pub fn widget(
        mut self,
        name: impl Into<String>,
        factory: impl Fn(&Browser, &Locator) -> Rc<dyn Widget> + 'static,
    ) -> Self {
        let name = name.into();
        let factory: WidgetFactory = Rc::new(factory);
        if let Some(slot) = self
            .definition
            .children
            .iter_mut()
            .find(|(n, _)| *n == name)
        {
            slot.1 = factory;
        } else {
            self.definition.children.push((name, factory));
        }
        self
    }

    /// Include another view's children at this level (toolbars and
    /// sidebars shared across many pages)
    #[must_use]
    pub fn include(mut self, other: &ViewDefinition) -> Self {
        for (name, factory) in &other.children {
            if let Some(slot) = self
                .definition
                .children
                .iter_mut()
                .find(|(n, _)| n == name)
            {
                slot.1 = Rc::clone(factory);
            } else {
                self.definition
                    .children
                    .push((name.clone(), Rc::clone(factory)));
            }
        }
        self
    }

    /// Finish the definition
    #[must_use]
    pub fn build(self) -> ViewDefinition {
        self.definition
    }
}

/// A view instance: a definition bound to a browser and a root locator.
#[derive(Clone)]
pub struct View {
    browser: Browser,
    definition: Rc<ViewDefinition>,
    root: Locator,
    cache: Rc<RefCell<HashMap<String, Rc<dyn Widget>>>>,
    child_access_hook: Option<ChildAccessHook>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("root", &self.root)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl View {
    /// Bind a definition at the page root
    #[must_use]
    pub fn attach(browser: Browser, definition: Rc<ViewDefinition>) -> Self {
        let root = Locator::new(definition.root.clone());
        Self {
            browser,
            definition,
            root,
            cache: Rc::new(RefCell::new(HashMap::new())),
            child_access_hook: None,
        }
    }

    /// Bind a definition nested under a parent view's root
    #[must_use]
    pub fn attach_under(browser: Browser, definition: Rc<ViewDefinition>, parent: &Locator) -> Self {
        let root = parent.child(definition.root.clone());
        Self {
            browser,
            definition,
            root,
            cache: Rc::new(RefCell::new(HashMap::new())),
            child_access_hook: None,
        }
    }

    /// Install the child-access hook (tabs/accordions auto-select)
    #[must_use]
    pub fn with_child_access_hook(mut self, hook: ChildAccessHook) -> Self {
        self.child_access_hook = Some(hook);
        self
    }

    /// The view's root locator
    #[must_use]
    pub const fn root(&self) -> &Locator {
        &self.root
    }

    /// Access a declared child widget by name.
    ///
    /// Children are constructed lazily on first access and cached for
    /// the view's lifetime. The child-access hook (if any) runs first.
    pub fn widget(&self, name: &str) -> MiradorResult<Rc<dyn Widget>> {
        if let Some(hook) = &self.child_access_hook {
            hook(&self.browser)?;
        }
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(Rc::clone(cached));
        }
        let factory = self
            .definition
            .children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| Rc::clone(f))
            .ok_or_else(|| MiradorError::WidgetOperationFailed {
                widget: name.to_string(),
                message: format!("view has no child '{name}'"),
            })?;
        let widget = factory(&self.browser, &self.root);
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&widget));
        Ok(widget)
    }

    /// Drop cached children, forcing re-resolution on next access
    pub fn flush_widget_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl Widget for View {
    fn browser(&self) -> &Browser {
        &self.browser
    }

    fn locator(&self) -> &Locator {
        &self.root
    }

    fn widget_name(&self) -> &str {
        "view"
    }

    /// Read every displayed child into a map. Children that are not
    /// displayed are absent from the result.
    fn read(&self) -> MiradorResult<Value> {
        let mut out = Map::new();
        for name in self.definition.child_names() {
            let child = self.widget(name)?;
            if !child.is_displayed() {
                continue;
            }
            match child.read() {
                Ok(value) => {
                    out.insert(name.to_string(), value);
                }
                Err(err) if err.is_missing_element() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Value::Object(out))
    }

    /// Fill children by name from a map; true when any child changed.
    fn fill(&self, value: &Value) -> MiradorResult<bool> {
        let Value::Object(map) = value else {
            return Err(MiradorError::Fill {
                message: format!("view fill expects an object, got {value}"),
            });
        };
        let mut changed = false;
        // Declaration order, not map order: pages care about fill order.
        for name in self.definition.child_names() {
            if let Some(child_value) = map.get(name) {
                if child_value.is_null() {
                    continue;
                }
                let child = self.widget(name)?;
                changed |= child.fill(child_value)?;
            }
        }
        for key in map.keys() {
            if !self.definition.child_names().contains(&key.as_str()) {
                return Err(MiradorError::Fill {
                    message: format!("view has no child '{key}'"),
                });
            }
        }
        Ok(changed)
    }
}

/// A view parameterized by a tuple of values, able to enumerate the
/// instances present on the page.
pub trait ParameterizedView: Sized {
    /// Parameter tuple identifying one instance
    type Params: Clone;

    /// Enumerate the parameter tuples currently present
    fn all(browser: &Browser) -> MiradorResult<Vec<Self::Params>>;

    /// Bind the instance for `params`
    fn instantiate(browser: &Browser, params: Self::Params) -> Self;
}

/// Closure resolving the active branch key of a switchable view
pub type BranchReference = Rc<dyn Fn(&Browser) -> MiradorResult<String>>;

/// A view choosing one of several named child views by reading a
/// reference widget at access time.
#[derive(Clone)]
pub struct ConditionalSwitchableView {
    browser: Browser,
    branches: Vec<(String, Rc<ViewDefinition>)>,
    default_branch: String,
    reference: BranchReference,
    ignore_bad_reference: bool,
}

impl std::fmt::Debug for ConditionalSwitchableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalSwitchableView")
            .field(
                "branches",
                &self.branches.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("default_branch", &self.default_branch)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ConditionalSwitchableView`]
pub struct SwitchableViewBuilder {
    browser: Browser,
    branches: Vec<(String, Rc<ViewDefinition>)>,
    default_branch: Option<String>,
    reference: BranchReference,
    ignore_bad_reference: bool,
    duplicate: Option<String>,
}

impl std::fmt::Debug for SwitchableViewBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchableViewBuilder")
            .field(
                "branches",
                &self.branches.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ConditionalSwitchableView {
    /// Start building with the branch-key reference
    #[must_use]
    pub fn builder(
        browser: Browser,
        reference: impl Fn(&Browser) -> MiradorResult<String> + 'static,
    ) -> SwitchableViewBuilder {
        SwitchableViewBuilder {
            browser,
            branches: Vec::new(),
            default_branch: None,
            reference: Rc::new(reference),
            ignore_bad_reference: false,
            duplicate: None,
        }
    }

    /// Resolve and bind the active branch
    pub fn current(&self) -> MiradorResult<View> {
        let key = match (self.reference)(&self.browser) {
            Ok(key) => key,
            Err(err) if self.ignore_bad_reference => {
                tracing::debug!(error = %err, "bad branch reference, using default");
                self.default_branch.clone()
            }
            Err(err) => return Err(err),
        };
        let definition = self
            .branches
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, d)| Rc::clone(d));
        let definition = match definition {
            Some(found) => found,
            None if self.ignore_bad_reference => self
                .branches
                .iter()
                .find(|(name, _)| *name == self.default_branch)
                .map(|(_, d)| Rc::clone(d))
                .expect("default branch is validated at build time"),
            None => {
                return Err(MiradorError::WidgetOperationFailed {
                    widget: "switchable view".to_string(),
                    message: format!("no branch for key '{key}'"),
                })
            }
        };
        Ok(View::attach(self.browser.clone(), definition))
    }
}

impl SwitchableViewBuilder {
    /// Add a named branch. Registering a key twice is ambiguous and
    /// fails at build time.
    #[must_use]
    pub fn branch(mut self, key: impl Into<String>, definition: Rc<ViewDefinition>) -> Self {
        let key = key.into();
        if self.branches.iter().any(|(name, _)| *name == key) {
            self.duplicate.get_or_insert(key.clone());
        }
        self.branches.push((key, definition));
        self
    }

    /// Mark the mandatory default branch
    #[must_use]
    pub fn default_branch(mut self, key: impl Into<String>) -> Self {
        self.default_branch = Some(key.into());
        self
    }

    /// Silently fall back to the default branch on missing/invalid
    /// references
    #[must_use]
    pub const fn ignore_bad_reference(mut self, ignore: bool) -> Self {
        self.ignore_bad_reference = ignore;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Ambiguous (duplicate) branch keys and a missing or unknown
    /// default branch are construction-time errors.
    pub fn build(self) -> MiradorResult<ConditionalSwitchableView> {
        if let Some(key) = self.duplicate {
            return Err(MiradorError::WidgetOperationFailed {
                widget: "switchable view".to_string(),
                message: format!("ambiguous branch key '{key}'"),
            });
        }
        let default_branch = self.default_branch.ok_or_else(|| {
            MiradorError::WidgetOperationFailed {
                widget: "switchable view".to_string(),
                message: "a default branch is required".to_string(),
            }
        })?;
        if !self.branches.iter().any(|(name, _)| *name == default_branch) {
            return Err(MiradorError::WidgetOperationFailed {
                widget: "switchable view".to_string(),
                message: format!("default branch '{default_branch}' is not registered"),
            });
        }
        Ok(ConditionalSwitchableView {
            browser: self.browser,
            branches: self.branches,
            default_branch,
            reference: self.reference,
            ignore_bad_reference: self.ignore_bad_reference,
        })
    }
}
