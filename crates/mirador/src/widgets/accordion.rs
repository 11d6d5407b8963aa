//! Sidebar accordion panels.
//!
//! An accordion is a collapsible panel, usually hosting a navigation
//! tree. Accessing any child widget opens the panel first.

use std::rc::Rc;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{View, ViewDefinition, Widget, WidgetBase};
use crate::widgets::tree::Tree;

/// One accordion panel: a heading link plus a collapsible body.
#[derive(Debug, Clone)]
pub struct Accordion {
    base: WidgetBase,
}

impl Accordion {
    /// Bind to the panel container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "accordion"),
        }
    }

    fn body_locator(&self) -> Locator {
        self.base.locator().child(Selector::css("div.panel-collapse"))
    }

    fn heading_locator(&self) -> Locator {
        self.base.locator().child(Selector::css("a.panel-title"))
    }

    /// Whether the panel body is expanded
    pub fn is_opened(&self) -> MiradorResult<bool> {
        Ok(self
            .base
            .browser()
            .classes(&self.body_locator())?
            .contains(&"in".to_string()))
    }

    /// Expand the panel if collapsed; idempotent
    pub fn open(&self) -> MiradorResult<bool> {
        if self.is_opened()? {
            return Ok(false);
        }
        self.base.browser().click(&self.heading_locator())?;
        if !self.is_opened()? {
            return Err(MiradorError::WidgetOperationFailed {
                widget: self.base.name().to_string(),
                message: "panel did not expand".to_string(),
            });
        }
        Ok(true)
    }

    /// The tree inside the panel body; opens the panel first
    pub fn tree(&self) -> MiradorResult<Tree> {
        self.open()?;
        Ok(Tree::new(
            self.base.browser().clone(),
            self.body_locator().child(Selector::css("div.treeview")),
        ))
    }

    /// Bind a view over the panel body whose children auto-open the
    /// panel on access
    #[must_use]
    pub fn view(&self, definition: Rc<ViewDefinition>) -> View {
        let this = self.clone();
        View::attach_under(
            self.base.browser().clone(),
            definition,
            &self.body_locator(),
        )
        .with_child_access_hook(Rc::new(move |_| this.open().map(|_| ())))
    }
}

impl Widget for Accordion {
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
    use crate::widgets::text::Text;

    fn accordion_page() -> Browser {
        let mut page = PageModel::new();
        let root = page.root();
        let panel = page.append(root, Element::new("div").id("kp-acc").class("panel"));
        let heading = page.append(
            panel,
            Element::new("a").class("panel-title").text("Key Pairs"),
        );
        let body = page.append(panel, Element::new("div").class("panel-collapse"));
        let content = page.append(body, Element::new("div").class("content"));
        page.append(content, Element::new("span").class("hint").text("empty"));
        page.on_click(
            heading,
            Box::new(move |p| {
                if !p.node_mut(body).classes.insert("in".to_string()) {
                    p.node_mut(body).classes.remove("in");
                }
            }),
        );
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    #[test]
    fn test_open_is_idempotent() {
        let browser = accordion_page();
        let accordion = Accordion::new(browser, Locator::css("#kp-acc"));
        assert!(!accordion.is_opened().unwrap());
        assert!(accordion.open().unwrap());
        assert!(!accordion.open().unwrap());
        assert!(accordion.is_opened().unwrap());
    }

    #[test]
    fn test_child_access_auto_opens() {
        let browser = accordion_page();
        let accordion = Accordion::new(browser, Locator::css("#kp-acc"));
        let definition = Rc::new(
            ViewDefinition::builder(Selector::css("div.content"))
                .widget("hint", |browser, root| {
                    Rc::new(Text::new(browser.clone(), root.child_css("span.hint")))
                })
                .build(),
        );
        let view = accordion.view(definition);
        let _ = view.widget("hint").unwrap();
        assert!(accordion.is_opened().unwrap());
    }
}
