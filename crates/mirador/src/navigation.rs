//! Navigation graph: registered steps, prerequisite resolution, and the
//! traversal that puts the browser on a target page.
//!
//! The registry is an explicit value built at startup and injected where
//! needed; nothing registers itself as an import side effect.

use std::collections::HashMap;
use std::rc::Rc;

use crate::browser::Browser;
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{View, ViewDefinition, Widget};

/// Something navigation can be requested for: an entity, a collection,
/// or the appliance itself.
pub trait NavTarget {
    /// Type-level name steps are registered against (e.g. `KeyPair`)
    fn nav_name(&self) -> String;

    /// Instance-level key, when a step is registered for one specific
    /// object rather than its whole type
    fn nav_instance(&self) -> Option<String> {
        None
    }

    /// Ancestor type names for polymorphic fallback, most specific
    /// first
    fn nav_ancestry(&self) -> Vec<String> {
        Vec::new()
    }

    /// Named attribute targets (`appliance.server`), for
    /// [`Prerequisite::Attribute`]
    fn attribute(&self, name: &str) -> Option<&dyn NavTarget> {
        let _ = name;
        None
    }
}

/// What must hold before a step's own action runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// Another destination on the same object
    Sibling(String),
    /// A destination on a named attribute chain of the object
    Attribute {
        /// Attribute names walked from the object
        path: Vec<String>,
        /// Destination on the attribute target
        destination: String,
    },
}

/// Execution context handed to a step
pub struct StepCtx<'a> {
    /// The browser session
    pub browser: &'a Browser,
    /// The object being navigated
    pub obj: &'a dyn NavTarget,
}

impl std::fmt::Debug for StepCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepCtx")
            .field("obj", &self.obj.nav_name())
            .finish_non_exhaustive()
    }
}

/// One registered navigation step.
pub trait NavStep {
    /// Step that must complete first
    fn prerequisite(&self) -> Option<Prerequisite> {
        None
    }

    /// The view this destination binds
    fn view(&self, browser: &Browser) -> Option<View> {
        let _ = browser;
        None
    }

    /// Perform the UI action that transitions to the destination
    fn step(&self, ctx: &StepCtx<'_>) -> MiradorResult<()>;

    /// Idempotent post-arrival normalization
    fn resetter(&self, ctx: &StepCtx<'_>) -> MiradorResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Whether the browser is already on this destination
    fn am_i_here(&self, ctx: &StepCtx<'_>) -> bool {
        self.view(ctx.browser)
            .map_or(false, |view| view.is_displayed())
    }

    /// Steps that cannot trip over a broken page skip the pre-step check
    fn skip_badness_check(&self) -> bool {
        false
    }
}

/// Closure type for [`SimpleStep`] actions
pub type StepFn = Rc<dyn Fn(&StepCtx<'_>) -> MiradorResult<()>>;

/// A step assembled from closures; the common case for page definitions.
#[derive(Clone)]
pub struct SimpleStep {
    prerequisite: Option<Prerequisite>,
    view_definition: Option<Rc<ViewDefinition>>,
    action: StepFn,
    resetter: Option<StepFn>,
    skip_badness_check: bool,
}

impl std::fmt::Debug for SimpleStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleStep")
            .field("prerequisite", &self.prerequisite)
            .field("has_view", &self.view_definition.is_some())
            .finish_non_exhaustive()
    }
}

impl SimpleStep {
    /// Start building a step whose action is `action`
    #[must_use]
    pub fn builder(action: impl Fn(&StepCtx<'_>) -> MiradorResult<()> + 'static) -> SimpleStepBuilder {
        SimpleStepBuilder {
            step: Self {
                prerequisite: None,
                view_definition: None,
                action: Rc::new(action),
                resetter: None,
                skip_badness_check: false,
            },
        }
    }
}

/// Builder for [`SimpleStep`]
#[derive(Debug)]
pub struct SimpleStepBuilder {
    step: SimpleStep,
}

impl SimpleStepBuilder {
    /// Require `destination` on the same object first
    #[must_use]
    pub fn prerequisite_sibling(mut self, destination: impl Into<String>) -> Self {
        self.step.prerequisite = Some(Prerequisite::Sibling(destination.into()));
        self
    }

    /// Require `destination` on an attribute of the object first
    #[must_use]
    pub fn prerequisite_attribute(
        mut self,
        path: Vec<String>,
        destination: impl Into<String>,
    ) -> Self {
        self.step.prerequisite = Some(Prerequisite::Attribute {
            path,
            destination: destination.into(),
        });
        self
    }

    /// Bind `definition` as the destination view
    #[must_use]
    pub fn view(mut self, definition: Rc<ViewDefinition>) -> Self {
        self.step.view_definition = Some(definition);
        self
    }

    /// Run `resetter` after the view binds
    #[must_use]
    pub fn resetter(mut self, resetter: impl Fn(&StepCtx<'_>) -> MiradorResult<()> + 'static) -> Self {
        self.step.resetter = Some(Rc::new(resetter));
        self
    }

    /// Skip the pre-step badness check
    #[must_use]
    pub const fn skip_badness_check(mut self) -> Self {
        self.step.skip_badness_check = true;
        self
    }

    /// Finish the step
    #[must_use]
    pub fn build(self) -> Rc<dyn NavStep> {
        Rc::new(self.step)
    }
}

impl NavStep for SimpleStep {
    fn prerequisite(&self) -> Option<Prerequisite> {
        self.prerequisite.clone()
    }

    fn view(&self, browser: &Browser) -> Option<View> {
        self.view_definition
            .as_ref()
            .map(|definition| View::attach(browser.clone(), Rc::clone(definition)))
    }

    fn step(&self, ctx: &StepCtx<'_>) -> MiradorResult<()> {
        (self.action)(ctx)
    }

    fn resetter(&self, ctx: &StepCtx<'_>) -> MiradorResult<()> {
        match &self.resetter {
            Some(resetter) => resetter(ctx),
            None => Ok(()),
        }
    }

    fn skip_badness_check(&self) -> bool {
        self.skip_badness_check
    }
}

/// The navigation registry and traversal engine.
#[derive(Default)]
pub struct NavigationGraph {
    steps: HashMap<(String, String), Rc<dyn NavStep>>,
}

impl std::fmt::Debug for NavigationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationGraph")
            .field("registered", &self.steps.len())
            .finish()
    }
}

impl NavigationGraph {
    /// An empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` for `(source, destination)`. Steps are singletons
    /// per pair; a second registration replaces the first.
    pub fn register(
        &mut self,
        source: impl Into<String>,
        destination: impl Into<String>,
        step: Rc<dyn NavStep>,
    ) {
        self.steps
            .insert((source.into(), destination.into()), step);
    }

    /// Number of registered steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve the step for `(obj, destination)`, trying the instance
    /// key, then the type, then parent types.
    fn resolve(
        &self,
        obj: &dyn NavTarget,
        destination: &str,
    ) -> MiradorResult<Rc<dyn NavStep>> {
        if let Some(instance) = obj.nav_instance() {
            if let Some(step) = self.steps.get(&(instance, destination.to_string())) {
                return Ok(Rc::clone(step));
            }
        }
        let mut sources = vec![obj.nav_name()];
        sources.extend(obj.nav_ancestry());
        for name in sources {
            if let Some(step) = self.steps.get(&(name, destination.to_string())) {
                return Ok(Rc::clone(step));
            }
        }
        Err(MiradorError::ItemNotFound {
            message: format!(
                "no navigation step for ({}, {destination})",
                obj.nav_name()
            ),
        })
    }

    /// Put the browser on `destination` for `obj`, returning the bound
    /// view (when the step declares one).
    ///
    /// Already-displayed destinations short-circuit without re-running
    /// prerequisites.
    pub fn navigate_to(
        &self,
        browser: &Browser,
        obj: &dyn NavTarget,
        destination: &str,
    ) -> MiradorResult<Option<View>> {
        let mut chain = Vec::new();
        self.go(browser, obj, destination, &mut chain)
    }

    fn go(
        &self,
        browser: &Browser,
        obj: &dyn NavTarget,
        destination: &str,
        chain: &mut Vec<String>,
    ) -> MiradorResult<Option<View>> {
        let step = self.resolve(obj, destination)?;
        let ctx = StepCtx { browser, obj };

        if step.am_i_here(&ctx) {
            tracing::debug!(
                source = %obj.nav_name(),
                destination,
                "already on destination, short-circuiting"
            );
            return Ok(step.view(browser));
        }

        match step.prerequisite() {
            Some(Prerequisite::Sibling(sibling)) => {
                self.go(browser, obj, &sibling, chain)?;
            }
            Some(Prerequisite::Attribute { path, destination: dest }) => {
                let mut target: &dyn NavTarget = obj;
                for name in &path {
                    target =
                        target
                            .attribute(name)
                            .ok_or_else(|| MiradorError::ItemNotFound {
                                message: format!(
                                    "{} has no attribute '{name}'",
                                    target.nav_name()
                                ),
                            })?;
                }
                self.go(browser, target, &dest, chain)?;
            }
            None => {}
        }

        if !step.skip_badness_check() {
            browser.dismiss_any_alerts()?;
            if let Some(rails_error) = browser.rails_error() {
                return Err(MiradorError::NavigationFailed {
                    destination: destination.to_string(),
                    chain: chain.clone(),
                    reason: format!("server error page: {rails_error}"),
                });
            }
        }

        chain.push(format!("{}/{destination}", obj.nav_name()));
        tracing::info!(source = %obj.nav_name(), destination, "navigation step");

        for attempt in 0..2 {
            step.step(&ctx)?;
            let view = step.view(browser);
            step.resetter(&ctx)?;
            match view {
                Some(view) if !view.is_displayed() => {
                    if attempt == 0 {
                        tracing::warn!(
                            destination,
                            "destination view not displayed, refreshing and retrying"
                        );
                        browser.refresh()?;
                    } else {
                        return Err(MiradorError::NavigationFailed {
                            destination: destination.to_string(),
                            chain: chain.clone(),
                            reason: "view not displayed after retry".to_string(),
                        });
                    }
                }
                view => return Ok(view),
            }
        }
        unreachable!("navigation attempts exhausted without return")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::{Element, PageModel};
    use crate::driver::PageModelDriver;
    use crate::locator::Selector;
    use std::cell::RefCell;

    struct KeyPair {
        name: String,
    }

    impl NavTarget for KeyPair {
        fn nav_name(&self) -> String {
            "KeyPair".to_string()
        }

        fn nav_instance(&self) -> Option<String> {
            Some(format!("KeyPair:{}", self.name))
        }

        fn nav_ancestry(&self) -> Vec<String> {
            vec!["CloudObject".to_string()]
        }
    }

    fn view_def(root: &str) -> Rc<ViewDefinition> {
        Rc::new(ViewDefinition::builder(Selector::css(root)).build())
    }

    /// Three pages toggled by clicks: #login-page, #all-page,
    /// #details-page.
    fn three_page_browser() -> (Browser, PageModelDriver) {
        let mut page = PageModel::new();
        let root = page.root();
        let login = page.append(root, Element::new("div").id("login-page"));
        let all = page.append(root, Element::new("div").id("all-page").hidden());
        let details = page.append(root, Element::new("div").id("details-page").hidden());
        let to_all = page.append(login, Element::new("a").id("go-all"));
        let to_details = page.append(all, Element::new("a").id("go-details"));
        page.on_click(
            to_all,
            Box::new(move |p| {
                p.node_mut(login).displayed = false;
                p.node_mut(all).displayed = true;
            }),
        );
        page.on_click(
            to_details,
            Box::new(move |p| {
                p.node_mut(all).displayed = false;
                p.node_mut(details).displayed = true;
            }),
        );
        let driver = PageModelDriver::new(page);
        (Browser::new(Rc::new(driver.clone())), driver)
    }

    fn graph(log: Rc<RefCell<Vec<&'static str>>>) -> NavigationGraph {
        let mut graph = NavigationGraph::new();
        let l = Rc::clone(&log);
        graph.register(
            "CloudObject",
            "LoggedIn",
            SimpleStep::builder(move |_| {
                l.borrow_mut().push("LoggedIn");
                Ok(())
            })
            .view(view_def("#login-page"))
            .skip_badness_check()
            .build(),
        );
        let l = Rc::clone(&log);
        graph.register(
            "KeyPair",
            "All",
            SimpleStep::builder(move |ctx| {
                l.borrow_mut().push("All");
                ctx.browser.click(&crate::locator::Locator::css("#go-all"))
            })
            .prerequisite_sibling("LoggedIn")
            .view(view_def("#all-page"))
            .build(),
        );
        let l = Rc::clone(&log);
        graph.register(
            "KeyPair",
            "Details",
            SimpleStep::builder(move |ctx| {
                l.borrow_mut().push("Details");
                ctx.browser
                    .click(&crate::locator::Locator::css("#go-details"))
            })
            .prerequisite_sibling("All")
            .view(view_def("#details-page"))
            .build(),
        );
        graph
    }

    #[test]
    fn test_prerequisite_chain_runs_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let graph = graph(Rc::clone(&log));
        let (browser, _) = three_page_browser();
        let kp = KeyPair {
            name: "k1".to_string(),
        };

        let view = graph.navigate_to(&browser, &kp, "Details").unwrap().unwrap();
        assert!(view.is_displayed());
        assert_eq!(*log.borrow(), vec!["All", "Details"]);
    }

    #[test]
    fn test_type_fallback_to_parent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let graph = graph(Rc::clone(&log));
        let (browser, _) = three_page_browser();
        let kp = KeyPair {
            name: "k1".to_string(),
        };
        // LoggedIn is registered on the parent type only.
        let view = graph.navigate_to(&browser, &kp, "LoggedIn").unwrap().unwrap();
        assert!(view.is_displayed());
    }

    #[test]
    fn test_short_circuit_when_already_displayed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let graph = graph(Rc::clone(&log));
        let (browser, _) = three_page_browser();
        let kp = KeyPair {
            name: "k1".to_string(),
        };
        graph.navigate_to(&browser, &kp, "All").unwrap();
        log.borrow_mut().clear();
        graph.navigate_to(&browser, &kp, "All").unwrap();
        assert!(log.borrow().is_empty(), "no steps re-executed");
    }

    #[test]
    fn test_unknown_destination_errors() {
        let graph = graph(Rc::new(RefCell::new(Vec::new())));
        let (browser, _) = three_page_browser();
        let kp = KeyPair {
            name: "k1".to_string(),
        };
        assert!(matches!(
            graph.navigate_to(&browser, &kp, "Timelines").unwrap_err(),
            MiradorError::ItemNotFound { .. }
        ));
    }

    #[test]
    fn test_failed_view_retries_then_raises_with_chain() {
        let mut graph = NavigationGraph::new();
        let attempts = Rc::new(RefCell::new(0u32));
        let a = Rc::clone(&attempts);
        graph.register(
            "KeyPair",
            "Broken",
            SimpleStep::builder(move |_| {
                *a.borrow_mut() += 1;
                Ok(())
            })
            .view(view_def("#never-there"))
            .skip_badness_check()
            .build(),
        );
        let (browser, _) = three_page_browser();
        let kp = KeyPair {
            name: "k1".to_string(),
        };
        let err = graph.navigate_to(&browser, &kp, "Broken").unwrap_err();
        match err {
            MiradorError::NavigationFailed { chain, .. } => {
                assert_eq!(chain, vec!["KeyPair/Broken"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(*attempts.borrow(), 2, "one retry after refresh");
    }

    #[test]
    fn test_instance_registration_wins_over_type() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut graph = graph(Rc::clone(&log));
        let l = Rc::clone(&log);
        graph.register(
            "KeyPair:special",
            "All",
            SimpleStep::builder(move |_| {
                l.borrow_mut().push("SpecialAll");
                Ok(())
            })
            .skip_badness_check()
            .build(),
        );
        let (browser, _) = three_page_browser();
        let kp = KeyPair {
            name: "special".to_string(),
        };
        graph.navigate_to(&browser, &kp, "All").unwrap();
        assert_eq!(*log.borrow(), vec!["SpecialAll"]);
    }

    #[test]
    fn test_attribute_prerequisite() {
        struct Server;
        impl NavTarget for Server {
            fn nav_name(&self) -> String {
                "Server".to_string()
            }
        }
        struct Appliance {
            server: Server,
        }
        impl NavTarget for Appliance {
            fn nav_name(&self) -> String {
                "Appliance".to_string()
            }
            fn attribute(&self, name: &str) -> Option<&dyn NavTarget> {
                (name == "server").then_some(&self.server as &dyn NavTarget)
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut graph = NavigationGraph::new();
        let l = Rc::clone(&log);
        graph.register(
            "Server",
            "LoggedIn",
            SimpleStep::builder(move |_| {
                l.borrow_mut().push("Server/LoggedIn");
                Ok(())
            })
            .skip_badness_check()
            .build(),
        );
        let l = Rc::clone(&log);
        graph.register(
            "Appliance",
            "Dashboard",
            SimpleStep::builder(move |_| {
                l.borrow_mut().push("Appliance/Dashboard");
                Ok(())
            })
            .prerequisite_attribute(vec!["server".to_string()], "LoggedIn")
            .skip_badness_check()
            .build(),
        );
        let (browser, _) = three_page_browser();
        let appliance = Appliance { server: Server };
        graph.navigate_to(&browser, &appliance, "Dashboard").unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["Server/LoggedIn", "Appliance/Dashboard"]
        );
    }
}
