//! Abstract browser driver trait.
//!
//! The Selenium/CDP plumbing is a collaborator, not part of this crate;
//! everything above talks to a [`Driver`]. [`PageModelDriver`] backs the
//! test suite with the in-memory [`PageModel`](crate::dom::PageModel).

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::{NodeId, PageModel};
use crate::locator::Selector;
use crate::result::{MiradorError, MiradorResult};
use crate::version::ProductVersion;

/// Handle to a resolved DOM element.
///
/// Carries the DOM generation it was resolved against; using a handle
/// after the page re-rendered surfaces as a stale-element error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Node id within the driver's page
    pub node: NodeId,
    /// DOM generation at resolution time
    pub generation: u64,
    /// The locator text the handle was resolved from, for error messages
    pub resolved_from: String,
}

/// Element position and size in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Middle point of the rect
    #[must_use]
    pub fn middle(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Driver operations the browser facade is built on.
///
/// All element resolutions are scoped to an optional parent handle.
pub trait Driver {
    /// Find all elements matching `selector` under `scope`
    fn find(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> MiradorResult<Vec<ElementHandle>>;

    /// Visible text of an element (own text plus descendants)
    fn text(&self, el: &ElementHandle) -> MiradorResult<String>;

    /// Attribute value, `None` when absent
    fn attribute(&self, el: &ElementHandle, name: &str) -> MiradorResult<Option<String>>;

    /// Set an attribute
    fn set_attribute(&self, el: &ElementHandle, name: &str, value: &str) -> MiradorResult<()>;

    /// CSS classes of an element
    fn classes(&self, el: &ElementHandle) -> MiradorResult<Vec<String>>;

    /// Whether the element is rendered visible
    fn is_displayed(&self, el: &ElementHandle) -> MiradorResult<bool>;

    /// Whether the element is checked/selected
    fn is_selected(&self, el: &ElementHandle) -> MiradorResult<bool>;

    /// Current input value
    fn value(&self, el: &ElementHandle) -> MiradorResult<String>;

    /// Click the element
    fn click(&self, el: &ElementHandle) -> MiradorResult<()>;

    /// Type keys into the element
    fn send_keys(&self, el: &ElementHandle, keys: &str) -> MiradorResult<()>;

    /// Clear the element's value
    fn clear(&self, el: &ElementHandle) -> MiradorResult<()>;

    /// Execute JavaScript, returning a JSON-serializable value
    fn execute_script(&self, code: &str, args: &[Value]) -> MiradorResult<Value>;

    /// One poll of the page-safe predicate; true when no work is in flight
    fn page_quiescent(&self) -> MiradorResult<bool>;

    /// Text of the currently open alert, if any
    fn alert_text(&self) -> MiradorResult<Option<String>>;

    /// Accept (or cancel) the open alert
    fn handle_alert(&self, accept: bool) -> MiradorResult<()>;

    /// Type a reply into the open alert prompt
    fn send_alert_text(&self, text: &str) -> MiradorResult<()>;

    /// Reload the page, invalidating all handles
    fn refresh(&self) -> MiradorResult<()>;

    /// Element position and size
    fn rect(&self, el: &ElementHandle) -> MiradorResult<Rect>;

    /// Drag one element onto another
    fn drag_and_drop(&self, src: &ElementHandle, dst: &ElementHandle) -> MiradorResult<()>;

    /// Drag an element by a pixel offset
    fn drag_and_drop_to(&self, src: &ElementHandle, x: f64, y: f64) -> MiradorResult<()>;

    /// Version the product reports
    fn product_version(&self) -> MiradorResult<ProductVersion>;
}

/// Driver over the in-memory [`PageModel`].
#[derive(Debug, Clone)]
pub struct PageModelDriver {
    model: Rc<RefCell<PageModel>>,
}

impl PageModelDriver {
    /// Wrap a page model
    #[must_use]
    pub fn new(model: PageModel) -> Self {
        Self {
            model: Rc::new(RefCell::new(model)),
        }
    }

    /// Shared access to the underlying model, for test setup
    #[must_use]
    pub fn model(&self) -> Rc<RefCell<PageModel>> {
        Rc::clone(&self.model)
    }

    fn check_fresh(&self, el: &ElementHandle) -> MiradorResult<()> {
        let mut model = self.model.borrow_mut();
        if model.take_stale() || el.generation != model.generation() {
            return Err(MiradorError::StaleElement {
                locator: el.resolved_from.clone(),
            });
        }
        Ok(())
    }

    fn effective_displayed(model: &PageModel, node: NodeId) -> bool {
        // Hidden ancestors hide the subtree; an inline display:none style
        // also hides.
        let mut current = Some(node);
        while let Some(id) = current {
            let n = model.node(id);
            if !n.displayed {
                return false;
            }
            if n.attributes
                .get("style")
                .is_some_and(|s| s.contains("display: none") || s.contains("display:none"))
            {
                return false;
            }
            current = model.parent_of(id);
        }
        true
    }

    fn deep_text(model: &PageModel, node: NodeId) -> String {
        let mut parts = Vec::new();
        let own = model.node(node).text.trim();
        if !own.is_empty() {
            parts.push(own.to_string());
        }
        for &child in model.children_of(node) {
            let sub = Self::deep_text(model, child);
            if !sub.is_empty() {
                parts.push(sub);
            }
        }
        parts.join(" ")
    }
}

impl Driver for PageModelDriver {
    fn find(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> MiradorResult<Vec<ElementHandle>> {
        if let Some(parent) = scope {
            self.check_fresh(parent)?;
        }
        let model = self.model.borrow();
        let scope_node = scope.map_or_else(|| model.root(), |el| el.node);
        let generation = model.generation();
        Ok(model
            .query(selector, scope_node)
            .into_iter()
            .map(|node| ElementHandle {
                node,
                generation,
                resolved_from: selector.to_string(),
            })
            .collect())
    }

    fn text(&self, el: &ElementHandle) -> MiradorResult<String> {
        self.check_fresh(el)?;
        let model = self.model.borrow();
        Ok(Self::deep_text(&model, el.node))
    }

    fn attribute(&self, el: &ElementHandle, name: &str) -> MiradorResult<Option<String>> {
        self.check_fresh(el)?;
        let model = self.model.borrow();
        let node = model.node(el.node);
        Ok(match name {
            "id" => node.id.clone(),
            "value" => Some(node.value.clone()),
            "class" => Some(node.classes.iter().cloned().collect::<Vec<_>>().join(" ")),
            _ => node.attributes.get(name).cloned(),
        })
    }

    fn set_attribute(&self, el: &ElementHandle, name: &str, value: &str) -> MiradorResult<()> {
        self.check_fresh(el)?;
        let mut model = self.model.borrow_mut();
        model
            .node_mut(el.node)
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn classes(&self, el: &ElementHandle) -> MiradorResult<Vec<String>> {
        self.check_fresh(el)?;
        let model = self.model.borrow();
        Ok(model.node(el.node).classes.iter().cloned().collect())
    }

    fn is_displayed(&self, el: &ElementHandle) -> MiradorResult<bool> {
        self.check_fresh(el)?;
        let model = self.model.borrow();
        Ok(Self::effective_displayed(&model, el.node))
    }

    fn is_selected(&self, el: &ElementHandle) -> MiradorResult<bool> {
        self.check_fresh(el)?;
        let model = self.model.borrow();
        let node = model.node(el.node);
        Ok(node.checked || node.selected)
    }

    fn value(&self, el: &ElementHandle) -> MiradorResult<String> {
        self.check_fresh(el)?;
        Ok(self.model.borrow().node(el.node).value.clone())
    }

    fn click(&self, el: &ElementHandle) -> MiradorResult<()> {
        self.check_fresh(el)?;
        self.model.borrow_mut().click(el.node);
        Ok(())
    }

    fn send_keys(&self, el: &ElementHandle, keys: &str) -> MiradorResult<()> {
        self.check_fresh(el)?;
        self.model.borrow_mut().send_keys(el.node, keys);
        Ok(())
    }

    fn clear(&self, el: &ElementHandle) -> MiradorResult<()> {
        self.check_fresh(el)?;
        self.model.borrow_mut().clear_value(el.node);
        Ok(())
    }

    fn execute_script(&self, code: &str, args: &[Value]) -> MiradorResult<Value> {
        self.model.borrow_mut().run_script(code, args)
    }

    fn page_quiescent(&self) -> MiradorResult<bool> {
        Ok(self.model.borrow_mut().poll_quiescent())
    }

    fn alert_text(&self) -> MiradorResult<Option<String>> {
        Ok(self.model.borrow().alert().map(ToString::to_string))
    }

    fn handle_alert(&self, _accept: bool) -> MiradorResult<()> {
        self.model.borrow_mut().clear_alert();
        Ok(())
    }

    fn send_alert_text(&self, text: &str) -> MiradorResult<()> {
        let mut model = self.model.borrow_mut();
        if model.alert().is_none() {
            return Err(MiradorError::ScriptError {
                message: "no alert prompt to type into".to_string(),
            });
        }
        model.set_prompt_reply(text);
        Ok(())
    }

    fn refresh(&self) -> MiradorResult<()> {
        self.model.borrow_mut().invalidate();
        Ok(())
    }

    fn rect(&self, el: &ElementHandle) -> MiradorResult<Rect> {
        self.check_fresh(el)?;
        // The page model has no layout engine; synthesize a stable rect
        // from the node id so drag math has distinct points to work with.
        let n = el.node as f64;
        Ok(Rect {
            x: n * 10.0,
            y: n * 10.0,
            width: 100.0,
            height: 20.0,
        })
    }

    fn drag_and_drop(&self, src: &ElementHandle, dst: &ElementHandle) -> MiradorResult<()> {
        self.check_fresh(src)?;
        self.check_fresh(dst)?;
        let mut model = self.model.borrow_mut();
        model.click(src.node);
        model.click(dst.node);
        Ok(())
    }

    fn drag_and_drop_to(&self, src: &ElementHandle, _x: f64, _y: f64) -> MiradorResult<()> {
        self.check_fresh(src)?;
        self.model.borrow_mut().click(src.node);
        Ok(())
    }

    fn product_version(&self) -> MiradorResult<ProductVersion> {
        let model = self.model.borrow();
        model
            .product_version()
            .parse()
            .map_err(|message| MiradorError::WidgetOperationFailed {
                widget: "browser".to_string(),
                message,
            })
    }
}
