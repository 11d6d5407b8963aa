//! In-memory page model used by the default driver.
//!
//! The real product UI is out of scope; tests exercise widgets, views and
//! navigation against this element tree. It implements the same
//! observable surface a WebDriver-backed page exposes: a CSS-subset
//! selector engine, displayed/selected/checked state, an in-flight AJAX
//! counter for the page-safe barrier, scripted JavaScript results, click
//! hooks, and staleness via a DOM generation counter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

use crate::locator::Selector;
use crate::result::{MiradorError, MiradorResult};

/// Index of a node in the page arena
pub type NodeId = usize;

/// Handler invoked for a matching `execute_script` call; receives the
/// full script text and the call arguments
pub type ScriptHandler = Box<dyn Fn(&mut PageModel, &str, &[Value]) -> MiradorResult<Value>>;

/// Handler invoked after a node is clicked
pub type ClickHook = Box<dyn Fn(&mut PageModel)>;

/// One element in the page tree
#[derive(Debug, Clone)]
pub struct PageNode {
    /// Tag name, lowercased
    pub tag: String,
    /// Element id attribute
    pub id: Option<String>,
    /// CSS classes
    pub classes: BTreeSet<String>,
    /// Other attributes
    pub attributes: BTreeMap<String, String>,
    /// Own text content
    pub text: String,
    /// Input value
    pub value: String,
    /// Checkbox/radio checked state
    pub checked: bool,
    /// Option selected state
    pub selected: bool,
    /// Whether the element is rendered visible
    pub displayed: bool,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl PageNode {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: BTreeSet::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            selected: false,
            displayed: true,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// Declarative node spec for building test pages
#[derive(Debug, Clone)]
pub struct Element {
    node: PageNode,
}

impl Element {
    /// Start an element spec with a tag name
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            node: PageNode::new(tag),
        }
    }

    /// Set the element id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.node.id = Some(id.into());
        self
    }

    /// Add a CSS class
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.node.classes.insert(class.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.node.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.node.text = text.into();
        self
    }

    /// Set the input value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.node.value = value.into();
        self
    }

    /// Set checked state
    #[must_use]
    pub const fn checked(mut self, checked: bool) -> Self {
        self.node.checked = checked;
        self
    }

    /// Set selected state
    #[must_use]
    pub const fn selected(mut self, selected: bool) -> Self {
        self.node.selected = selected;
        self
    }

    /// Mark the element hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.node.displayed = false;
        self
    }
}

/// The page: an element arena rooted at node 0.
pub struct PageModel {
    nodes: Vec<PageNode>,
    generation: u64,
    ajax_in_flight: u32,
    /// AJAX polls armed after each state-changing interaction
    pub settle_polls: u32,
    alert: Option<String>,
    prompt_reply: Option<String>,
    stale_next_op: bool,
    script_handlers: HashMap<String, ScriptHandler>,
    click_hooks: HashMap<NodeId, ClickHook>,
    clicked: Vec<NodeId>,
    product_version: String,
}

impl std::fmt::Debug for PageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageModel")
            .field("nodes", &self.nodes.len())
            .field("generation", &self.generation)
            .field("ajax_in_flight", &self.ajax_in_flight)
            .finish_non_exhaustive()
    }
}

impl Default for PageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PageModel {
    /// Create an empty page with a `body` root
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![PageNode::new("body")],
            generation: 0,
            ajax_in_flight: 0,
            settle_polls: 0,
            alert: None,
            prompt_reply: None,
            stale_next_op: false,
            script_handlers: HashMap::new(),
            click_hooks: HashMap::new(),
            clicked: Vec::new(),
            product_version: "5.11.0.0".to_string(),
        }
    }

    /// The root node id
    #[must_use]
    pub const fn root(&self) -> NodeId {
        0
    }

    /// Number of nodes ever added (including detached ones)
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the page holds only its root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Current DOM generation; handles from older generations are stale
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Append an element under `parent`, returning its id
    pub fn append(&mut self, parent: NodeId, spec: Element) -> NodeId {
        let id = self.nodes.len();
        let mut node = spec.node;
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Remove an element (and its subtree) from its parent
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent {
            self.nodes[parent].children.retain(|&c| c != node);
        }
        self.nodes[node].parent = None;
        self.nodes[node].displayed = false;
    }

    /// Immutable access to a node
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PageNode {
        &self.nodes[id]
    }

    /// Mutable access to a node
    pub fn node_mut(&mut self, id: NodeId) -> &mut PageNode {
        &mut self.nodes[id]
    }

    /// Parent of a node, if any
    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Child ids of a node
    #[must_use]
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Ids clicked so far, in order
    #[must_use]
    pub fn clicked(&self) -> &[NodeId] {
        &self.clicked
    }

    /// Set the version the driver reports
    pub fn set_product_version(&mut self, version: impl Into<String>) {
        self.product_version = version.into();
    }

    /// Version string the driver reports
    #[must_use]
    pub fn product_version(&self) -> &str {
        &self.product_version
    }

    // ------------------------------------------------------------------
    // Quiescence, staleness, alerts, scripts
    // ------------------------------------------------------------------

    /// Arm the page-safe barrier: the next `poll_quiescent` calls count
    /// down from `polls`
    pub fn set_pending_ajax(&mut self, polls: u32) {
        self.ajax_in_flight = polls;
    }

    /// One page-safe poll; true when no AJAX remains in flight
    pub fn poll_quiescent(&mut self) -> bool {
        if self.ajax_in_flight > 0 {
            self.ajax_in_flight -= 1;
            return false;
        }
        true
    }

    /// Make the next driver operation fail with a stale element, once
    pub fn arm_stale_once(&mut self) {
        self.stale_next_op = true;
    }

    pub(crate) fn take_stale(&mut self) -> bool {
        std::mem::take(&mut self.stale_next_op)
    }

    /// Bump the DOM generation, invalidating all outstanding handles
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Raise an alert
    pub fn raise_alert(&mut self, text: impl Into<String>) {
        self.alert = Some(text.into());
    }

    /// Current alert text, if any
    #[must_use]
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Dismiss/accept the current alert
    pub fn clear_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    /// Record the reply typed into an alert prompt
    pub fn set_prompt_reply(&mut self, reply: impl Into<String>) {
        self.prompt_reply = Some(reply.into());
    }

    /// Last reply typed into an alert prompt, if any
    #[must_use]
    pub fn prompt_reply(&self) -> Option<&str> {
        self.prompt_reply.as_deref()
    }

    /// Register a handler for `execute_script` calls whose code contains
    /// `key`
    pub fn on_script(&mut self, key: impl Into<String>, handler: ScriptHandler) {
        self.script_handlers.insert(key.into(), handler);
    }

    /// Register a hook run after `node` is clicked
    pub fn on_click(&mut self, node: NodeId, hook: ClickHook) {
        self.click_hooks.insert(node, hook);
    }

    pub(crate) fn run_script(&mut self, code: &str, args: &[Value]) -> MiradorResult<Value> {
        let key = self
            .script_handlers
            .keys()
            .find(|k| code.contains(k.as_str()))
            .cloned();
        match key {
            Some(key) => {
                let handler = self.script_handlers.remove(&key).expect("handler present");
                let result = handler(self, code, args);
                self.script_handlers.insert(key, handler);
                result
            }
            None => Err(MiradorError::ScriptError {
                message: format!("no handler for script: {code}"),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Interactions
    // ------------------------------------------------------------------

    /// Click a node: toggles checkboxes, selects options, runs hooks,
    /// arms the AJAX counter
    pub fn click(&mut self, node: NodeId) {
        self.clicked.push(node);
        let tag = self.nodes[node].tag.clone();
        let input_type = self
            .nodes[node]
            .attributes
            .get("type")
            .cloned()
            .unwrap_or_default();

        if tag == "input" && (input_type == "checkbox" || input_type == "radio") {
            if input_type == "radio" {
                self.uncheck_radio_group(node);
            }
            self.nodes[node].checked = input_type == "radio" || !self.nodes[node].checked;
        } else if tag == "option" {
            self.select_option(node);
        }

        if let Some(hook) = self.click_hooks.remove(&node) {
            hook(self);
            self.click_hooks.insert(node, hook);
        }
        self.ajax_in_flight = self.settle_polls;
    }

    fn uncheck_radio_group(&mut self, node: NodeId) {
        // Radios group by `name`; unnamed radios group under the nearest
        // ancestor holding more than one of them.
        let name = self.nodes[node].attributes.get("name").cloned();
        let is_radio = |n: &PageNode| {
            n.tag == "input" && n.attributes.get("type").map(String::as_str) == Some("radio")
        };
        if let Some(name) = name {
            for other in 0..self.nodes.len() {
                if is_radio(&self.nodes[other])
                    && self.nodes[other].attributes.get("name") == Some(&name)
                {
                    self.nodes[other].checked = false;
                }
            }
            return;
        }
        let mut scope = self.nodes[node].parent;
        while let Some(ancestor) = scope {
            let mut radios = Vec::new();
            self.collect(ancestor, &mut radios);
            radios.retain(|&n| is_radio(&self.nodes[n]));
            if radios.len() > 1 || self.nodes[ancestor].parent.is_none() {
                for other in radios {
                    self.nodes[other].checked = false;
                }
                return;
            }
            scope = self.nodes[ancestor].parent;
        }
    }

    fn select_option(&mut self, option: NodeId) {
        if let Some(select) = self.nodes[option].parent {
            let multiple = self.nodes[select].attributes.contains_key("multiple");
            if multiple {
                self.nodes[option].selected = !self.nodes[option].selected;
            } else {
                let siblings = self.nodes[select].children.clone();
                for sibling in siblings {
                    self.nodes[sibling].selected = false;
                }
                self.nodes[option].selected = true;
            }
        }
    }

    /// Append keystrokes to a node's value
    pub fn send_keys(&mut self, node: NodeId, keys: &str) {
        self.nodes[node].value.push_str(keys);
        self.ajax_in_flight = self.settle_polls;
    }

    /// Clear a node's value
    pub fn clear_value(&mut self, node: NodeId) {
        self.nodes[node].value.clear();
    }

    // ------------------------------------------------------------------
    // Selector matching
    // ------------------------------------------------------------------

    /// All nodes under `scope` (exclusive) matching `selector`, in
    /// document order. Hidden subtrees still match; visibility is a
    /// separate read.
    #[must_use]
    pub fn query(&self, selector: &Selector, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(scope, &mut out);
        match selector {
            Selector::Css(css) => {
                let parsed = parse_css(css);
                out.retain(|&n| self.matches_chain(n, &parsed, scope));
            }
            Selector::Id(id) => out.retain(|&n| self.nodes[n].id.as_deref() == Some(id)),
            Selector::Text(text) => out.retain(|&n| self.nodes[n].text.trim() == text.trim()),
            Selector::TestId(id) => out.retain(|&n| {
                self.nodes[n].attributes.get("data-testid").map(String::as_str) == Some(id)
            }),
        }
        out
    }

    fn collect(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[node].children {
            out.push(child);
            self.collect(child, out);
        }
    }

    fn matches_chain(&self, node: NodeId, parsed: &CssSelector, scope: NodeId) -> bool {
        let Some(((_, last), rest)) = parsed.parts.split_last() else {
            return false;
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        // Walk right to left; each part's combinator binds it to its left
        // neighbor (greedy, no backtracking).
        let mut cur = node;
        let mut right_combinator = parsed.parts[parsed.parts.len() - 1].0;
        for (combinator, compound) in rest.iter().rev() {
            match right_combinator {
                Combinator::Child => {
                    let Some(parent) = self.nodes[cur].parent else {
                        return false;
                    };
                    if !self.matches_compound(parent, compound) {
                        return false;
                    }
                    cur = parent;
                }
                Combinator::Descendant => {
                    let mut found = false;
                    let mut current = self.nodes[cur].parent;
                    while let Some(ancestor) = current {
                        current = self.nodes[ancestor].parent;
                        if self.matches_compound(ancestor, compound) {
                            cur = ancestor;
                            found = true;
                            break;
                        }
                    }
                    if !found {
                        return false;
                    }
                }
            }
            right_combinator = *combinator;
        }
        if parsed.anchored {
            // A leading `>` anchors the first compound as a direct child
            // of the query scope.
            return self.nodes[cur].parent == Some(scope);
        }
        true
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let n = &self.nodes[node];
        if let Some(ref tag) = compound.tag {
            if &n.tag != tag {
                return false;
            }
        }
        if let Some(ref id) = compound.id {
            if n.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        for class in &compound.classes {
            if !n.classes.contains(class) {
                return false;
            }
        }
        for (name, expected) in &compound.attrs {
            let actual = match name.as_str() {
                "value" => Some(n.value.as_str()),
                _ => n.attributes.get(name).map(String::as_str),
            };
            match (actual, expected) {
                (None, _) => return false,
                (Some(_), None) => {}
                (Some(a), Some(e)) if a == e => {}
                _ => return false,
            }
        }
        true
    }
}

/// One compound selector: `tag#id.class[attr='v']`
#[derive(Debug, Default, Clone)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

/// How a compound binds to its left neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// A parsed CSS-subset selector. `anchored` is set by a leading `>`
/// (the `:scope >` form), pinning the first compound to a direct child
/// of the query scope.
#[derive(Debug, Clone)]
struct CssSelector {
    anchored: bool,
    parts: Vec<(Combinator, Compound)>,
}

fn parse_css(css: &str) -> CssSelector {
    let mut parts = Vec::new();
    let mut anchored = false;
    let mut pending = Combinator::Descendant;
    for (i, token) in css.split_whitespace().enumerate() {
        if token == ">" {
            if parts.is_empty() && i == 0 {
                anchored = true;
            }
            pending = Combinator::Child;
            continue;
        }
        parts.push((pending, parse_compound(token)));
        pending = Combinator::Descendant;
    }
    CssSelector { anchored, parts }
}

fn parse_compound(token: &str) -> Compound {
    let mut compound = Compound::default();
    let mut chars = token.chars().peekable();
    let mut buf = String::new();

    // Leading tag name
    while let Some(&c) = chars.peek() {
        if c == '#' || c == '.' || c == '[' {
            break;
        }
        buf.push(c);
        chars.next();
    }
    if !buf.is_empty() && buf != "*" {
        compound.tag = Some(buf.to_ascii_lowercase());
    }

    while let Some(c) = chars.next() {
        match c {
            '#' | '.' => {
                let mut name = String::new();
                while let Some(&nc) = chars.peek() {
                    if nc == '#' || nc == '.' || nc == '[' {
                        break;
                    }
                    name.push(nc);
                    chars.next();
                }
                if c == '#' {
                    compound.id = Some(name);
                } else {
                    compound.classes.push(name);
                }
            }
            '[' => {
                let mut body = String::new();
                for nc in chars.by_ref() {
                    if nc == ']' {
                        break;
                    }
                    body.push(nc);
                }
                if let Some((name, raw)) = body.split_once('=') {
                    let value = raw.trim_matches(|q| q == '\'' || q == '"').to_string();
                    compound.attrs.push((name.to_string(), Some(value)));
                } else {
                    compound.attrs.push((body, None));
                }
            }
            _ => {}
        }
    }
    compound
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn sample_page() -> (PageModel, NodeId, NodeId) {
        let mut page = PageModel::new();
        let root = page.root();
        let div = page.append(root, Element::new("div").id("paging_div").class("pane"));
        let ul = page.append(div, Element::new("ul").class("pagination"));
        let li = page.append(ul, Element::new("li").class("next"));
        page.append(li, Element::new("span").text("Next"));
        (page, div, li)
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_query_by_tag() {
            let (page, _, _) = sample_page();
            assert_eq!(page.query(&Selector::css("ul"), page.root()).len(), 1);
        }

        #[test]
        fn test_query_by_id_and_class() {
            let (page, div, _) = sample_page();
            let hits = page.query(&Selector::css("div#paging_div.pane"), page.root());
            assert_eq!(hits, vec![div]);
        }

        #[test]
        fn test_descendant_combinator() {
            let (page, _, li) = sample_page();
            let hits = page.query(&Selector::css("#paging_div li.next"), page.root());
            assert_eq!(hits, vec![li]);
        }

        #[test]
        fn test_scoped_query_excludes_outside() {
            let (mut page, div, _) = sample_page();
            let root = page.root();
            let other = page.append(root, Element::new("ul").class("pagination"));
            let all = page.query(&Selector::css("ul.pagination"), root);
            assert_eq!(all.len(), 2);
            let scoped = page.query(&Selector::css("ul.pagination"), div);
            assert_eq!(scoped.len(), 1);
            assert!(!scoped.contains(&other));
        }

        #[test]
        fn test_attr_selector() {
            let mut page = PageModel::new();
            let root = page.root();
            let input = page.append(
                root,
                Element::new("input").attr("type", "checkbox").attr("name", "x"),
            );
            assert_eq!(
                page.query(&Selector::css("input[type='checkbox']"), root),
                vec![input]
            );
            assert_eq!(page.query(&Selector::css("input[name]"), root), vec![input]);
            assert!(page
                .query(&Selector::css("input[type='radio']"), root)
                .is_empty());
        }

        #[test]
        fn test_text_selector_trims() {
            let (page, _, _) = sample_page();
            assert_eq!(page.query(&Selector::text("Next"), page.root()).len(), 1);
        }

        #[test]
        fn test_child_combinator() {
            let mut page = PageModel::new();
            let root = page.root();
            let outer = page.append(root, Element::new("ul"));
            let li_outer = page.append(outer, Element::new("li"));
            let inner = page.append(li_outer, Element::new("ul"));
            let li_inner = page.append(inner, Element::new("li"));
            // Descendant form matches both levels.
            assert_eq!(page.query(&Selector::css("ul li"), root).len(), 2);
            // Child form still matches both (each li is a direct ul child)
            assert_eq!(page.query(&Selector::css("ul > li"), root).len(), 2);
            // Anchoring to a scope picks one level.
            assert_eq!(page.query(&Selector::css("> ul > li"), root), vec![li_outer]);
            assert_eq!(
                page.query(&Selector::css("> ul > li"), li_outer),
                vec![li_inner]
            );
        }

        #[test]
        fn test_stable_dom_query_is_pure() {
            let (page, _, _) = sample_page();
            let a = page.query(&Selector::css("li.next"), page.root());
            let b = page.query(&Selector::css("li.next"), page.root());
            assert_eq!(a, b);
        }
    }

    mod interaction_tests {
        use super::*;

        #[test]
        fn test_checkbox_click_toggles() {
            let mut page = PageModel::new();
            let root = page.root();
            let cb = page.append(root, Element::new("input").attr("type", "checkbox"));
            page.click(cb);
            assert!(page.node(cb).checked);
            page.click(cb);
            assert!(!page.node(cb).checked);
        }

        #[test]
        fn test_radio_click_unchecks_siblings() {
            let mut page = PageModel::new();
            let root = page.root();
            let group = page.append(root, Element::new("div"));
            let a = page.append(group, Element::new("input").attr("type", "radio").checked(true));
            let b = page.append(group, Element::new("input").attr("type", "radio"));
            page.click(b);
            assert!(!page.node(a).checked);
            assert!(page.node(b).checked);
        }

        #[test]
        fn test_single_select_option_click() {
            let mut page = PageModel::new();
            let root = page.root();
            let select = page.append(root, Element::new("select"));
            let a = page.append(select, Element::new("option").text("A").selected(true));
            let b = page.append(select, Element::new("option").text("B"));
            page.click(b);
            assert!(!page.node(a).selected);
            assert!(page.node(b).selected);
        }

        #[test]
        fn test_multi_select_option_click_toggles() {
            let mut page = PageModel::new();
            let root = page.root();
            let select = page.append(root, Element::new("select").attr("multiple", "multiple"));
            let a = page.append(select, Element::new("option").text("A").selected(true));
            let b = page.append(select, Element::new("option").text("B"));
            page.click(b);
            assert!(page.node(a).selected);
            assert!(page.node(b).selected);
            page.click(a);
            assert!(!page.node(a).selected);
        }

        #[test]
        fn test_click_hook_runs() {
            let mut page = PageModel::new();
            let root = page.root();
            let button = page.append(root, Element::new("button"));
            let target = page.append(root, Element::new("div").hidden());
            page.on_click(
                button,
                Box::new(move |p| {
                    p.node_mut(target).displayed = true;
                }),
            );
            page.click(button);
            assert!(page.node(target).displayed);
        }

        #[test]
        fn test_click_arms_ajax_counter() {
            let mut page = PageModel::new();
            page.settle_polls = 2;
            let root = page.root();
            let button = page.append(root, Element::new("button"));
            page.click(button);
            assert!(!page.poll_quiescent());
            assert!(!page.poll_quiescent());
            assert!(page.poll_quiescent());
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_script_handler_dispatch() {
            let mut page = PageModel::new();
            page.on_script(
                "gtl.result",
                Box::new(|_, _, _| Ok(serde_json::json!({"total": 42}))),
            );
            let result = page.run_script("sendDataWithRx(...); return gtl.result", &[]).unwrap();
            assert_eq!(result["total"], 42);
        }

        #[test]
        fn test_unhandled_script_errors() {
            let mut page = PageModel::new();
            let err = page.run_script("return undefinedThing()", &[]).unwrap_err();
            assert!(matches!(err, MiradorError::ScriptError { .. }));
        }
    }
}
