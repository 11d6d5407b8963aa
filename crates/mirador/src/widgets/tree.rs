//! Hierarchical tree widget (sidebar trees, datastore browsers).
//!
//! Nodes are `li` elements carrying a `data-id` identity and a
//! `span.node-label` caption, nested through `ul` lists. Node ids encode
//! ancestry as prefixes (`dc__cluster__host`), which is what picks the
//! right root when several trees render side by side.

use serde_json::Value;

use crate::browser::Browser;
use crate::driver::ElementHandle;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

/// A labeled tree with identity paths.
#[derive(Debug, Clone)]
pub struct Tree {
    base: WidgetBase,
}

impl Tree {
    /// Bind to the tree container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "tree"),
        }
    }

    fn label_of(&self, node: &ElementHandle) -> MiradorResult<String> {
        let browser = self.base.browser();
        let labels = browser.find_under(node, &Selector::css("> span.node-label"))?;
        match labels.first() {
            Some(label) => browser.text_of(label),
            None => browser.text_of(node),
        }
    }

    fn child_nodes(&self, scope: &ElementHandle) -> MiradorResult<Vec<ElementHandle>> {
        self.base
            .browser()
            .find_under(scope, &Selector::css("> ul > li"))
    }

    fn root_nodes(&self) -> MiradorResult<Vec<ElementHandle>> {
        let container = self.base.browser().element(self.base.locator())?;
        self.child_nodes(&container)
    }

    fn expand(&self, node: &ElementHandle) -> MiradorResult<()> {
        let browser = self.base.browser();
        if browser.classes_of(node)?.contains(&"collapsed".to_string()) {
            if let Some(expander) = browser
                .find_under(node, &Selector::css("> span.expander"))?
                .first()
            {
                browser.click_on(expander)?;
            }
        }
        Ok(())
    }

    fn find_child(
        &self,
        scope: &[ElementHandle],
        label: &str,
        path_so_far: &[&str],
    ) -> MiradorResult<ElementHandle> {
        let mut matches = Vec::new();
        let mut seen = Vec::new();
        for node in scope {
            let text = self.label_of(node)?;
            if text == label {
                matches.push(node.clone());
            }
            seen.push(text);
        }
        match matches.len() {
            0 => Err(MiradorError::ItemNotFound {
                message: format!(
                    "tree node '{label}' not found under {path_so_far:?} (have {seen:?})"
                ),
            }),
            1 => Ok(matches.remove(0)),
            n => Err(MiradorError::ManyEntitiesFound {
                path: format!("{path_so_far:?} -> {label}"),
                matches: n,
            }),
        }
    }

    /// Click down the tree along `path`, ending with a click on the last
    /// node.
    pub fn click_path(&self, path: &[&str]) -> MiradorResult<()> {
        if path.is_empty() {
            return Err(MiradorError::ItemNotFound {
                message: "tree path is empty".to_string(),
            });
        }
        let mut scope = self.root_nodes()?;
        let mut node: Option<ElementHandle> = None;
        for (depth, label) in path.iter().enumerate() {
            let found = self.find_child(&scope, label, &path[..depth])?;
            self.expand(&found)?;
            scope = self.child_nodes(&found)?;
            node = Some(found);
        }
        let target = node.expect("path is non-empty");
        let browser = self.base.browser();
        let label = browser.find_under(&target, &Selector::css("> span.node-label"))?;
        match label.first() {
            Some(span) => browser.click_on(span),
            None => browser.click_on(&target),
        }
    }

    fn selected_node(&self) -> MiradorResult<Option<ElementHandle>> {
        let browser = self.base.browser();
        let container = browser.element(self.base.locator())?;
        Ok(browser
            .find_under(&container, &Selector::css("li.node-selected"))?
            .into_iter()
            .next())
    }

    fn node_id(&self, node: &ElementHandle) -> MiradorResult<String> {
        Ok(self
            .base
            .browser()
            .attr_of(node, "data-id")?
            .unwrap_or_default())
    }

    /// The path of the currently selected node, from its root down.
    ///
    /// With several roots present, the root whose id shares the longest
    /// common prefix with the selected node's id wins; a tie is
    /// ambiguous.
    pub fn currently_selected(&self) -> MiradorResult<Vec<String>> {
        let Some(selected) = self.selected_node()? else {
            return Ok(Vec::new());
        };
        let selected_id = self.node_id(&selected)?;
        let roots = self.root_nodes()?;

        let root = if roots.len() == 1 {
            roots.into_iter().next().expect("one root")
        } else {
            let mut best: Vec<(usize, ElementHandle)> = Vec::new();
            for root in roots {
                let root_id = self.node_id(&root)?;
                let prefix = common_prefix_len(&root_id, &selected_id);
                best.push((prefix, root));
            }
            let max = best.iter().map(|(p, _)| *p).max().unwrap_or(0);
            let mut winners: Vec<ElementHandle> = best
                .into_iter()
                .filter(|(p, _)| *p == max)
                .map(|(_, r)| r)
                .collect();
            if winners.len() > 1 {
                return Err(MiradorError::ManyEntitiesFound {
                    path: selected_id,
                    matches: winners.len(),
                });
            }
            winners.remove(0)
        };

        let mut path = Vec::new();
        if self.descend_to_selected(&root, &mut path)? {
            Ok(path)
        } else {
            Ok(Vec::new())
        }
    }

    fn descend_to_selected(
        &self,
        node: &ElementHandle,
        path: &mut Vec<String>,
    ) -> MiradorResult<bool> {
        let browser = self.base.browser();
        path.push(self.label_of(node)?);
        if browser
            .classes_of(node)?
            .contains(&"node-selected".to_string())
        {
            return Ok(true);
        }
        for child in self.child_nodes(node)? {
            if self.descend_to_selected(&child, path)? {
                return Ok(true);
            }
        }
        path.pop();
        Ok(false)
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

impl Widget for Tree {
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
            self.currently_selected()?
                .into_iter()
                .map(Value::String)
                .collect(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::{Element, NodeId, PageModel};
    use crate::driver::PageModelDriver;
    use std::rc::Rc;

    /// Build a tree node; clicking its label marks it selected and
    /// unmarks everything else, as the product's tree JS does.
    fn add_node(page: &mut PageModel, parent_ul: NodeId, id: &str, label: &str) -> NodeId {
        let li = page.append(parent_ul, Element::new("li").attr("data-id", id));
        let span = page.append(
            li,
            Element::new("span").class("node-label").text(label),
        );
        page.on_click(
            span,
            Box::new(move |p| {
                for n in 0..p.len() {
                    p.node_mut(n).classes.remove("node-selected");
                }
                p.node_mut(li).classes.insert("node-selected".to_string());
            }),
        );
        li
    }

    fn tree_page() -> Browser {
        let mut page = PageModel::new();
        let root = page.root();
        let container = page.append(root, Element::new("div").id("sidebar-tree"));
        let top = page.append(container, Element::new("ul"));

        let dc = add_node(&mut page, top, "dc", "Datacenters");
        let dc_ul = page.append(dc, Element::new("ul"));
        let cluster = add_node(&mut page, dc_ul, "dc__cl1", "Cluster One");
        let cl_ul = page.append(cluster, Element::new("ul"));
        add_node(&mut page, cl_ul, "dc__cl1__h1", "host-a");
        add_node(&mut page, cl_ul, "dc__cl1__h2", "host-b");

        let prov = add_node(&mut page, top, "prov", "Providers");
        let prov_ul = page.append(prov, Element::new("ul"));
        add_node(&mut page, prov_ul, "prov__p1", "Amazon");

        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    #[test]
    fn test_click_path_selects_node() {
        let browser = tree_page();
        let tree = Tree::new(browser, Locator::css("#sidebar-tree"));
        tree.click_path(&["Datacenters", "Cluster One", "host-b"])
            .unwrap();
        assert_eq!(
            tree.currently_selected().unwrap(),
            vec!["Datacenters", "Cluster One", "host-b"]
        );
    }

    #[test]
    fn test_click_path_round_trip_on_root() {
        let browser = tree_page();
        let tree = Tree::new(browser, Locator::css("#sidebar-tree"));
        tree.click_path(&["Providers"]).unwrap();
        assert_eq!(tree.currently_selected().unwrap(), vec!["Providers"]);
    }

    #[test]
    fn test_missing_node_is_item_not_found() {
        let browser = tree_page();
        let tree = Tree::new(browser, Locator::css("#sidebar-tree"));
        let err = tree
            .click_path(&["Datacenters", "Cluster Two"])
            .unwrap_err();
        assert!(matches!(err, MiradorError::ItemNotFound { .. }));
    }

    #[test]
    fn test_ambiguous_label_is_many_entities() {
        let mut page = PageModel::new();
        let root = page.root();
        let container = page.append(root, Element::new("div").id("sidebar-tree"));
        let top = page.append(container, Element::new("ul"));
        add_node(&mut page, top, "a", "Nodes");
        add_node(&mut page, top, "b", "Nodes");
        let browser = Browser::new(Rc::new(PageModelDriver::new(page)));
        let tree = Tree::new(browser, Locator::css("#sidebar-tree"));
        let err = tree.click_path(&["Nodes"]).unwrap_err();
        assert!(matches!(err, MiradorError::ManyEntitiesFound { .. }));
    }

    #[test]
    fn test_no_selection_is_empty_path() {
        let browser = tree_page();
        let tree = Tree::new(browser, Locator::css("#sidebar-tree"));
        assert!(tree.currently_selected().unwrap().is_empty());
    }

    #[test]
    fn test_selected_root_picked_by_id_prefix() {
        let browser = tree_page();
        let tree = Tree::new(browser, Locator::css("#sidebar-tree"));
        tree.click_path(&["Providers", "Amazon"]).unwrap();
        // Selected id "prov__p1" shares its prefix with root "prov", not
        // "dc"; the path starts at the right root.
        assert_eq!(
            tree.currently_selected().unwrap(),
            vec!["Providers", "Amazon"]
        );
    }
}
