//! Locator model: selectors, parameterized templates, and composition.
//!
//! A locator is an immutable descriptor that, given a parent context,
//! yields zero or more DOM elements. Resolving one is pure with respect
//! to the current DOM snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Selector shapes understood by the driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g. `button.primary`, `#paging_div li.next`)
    Css(String),
    /// Element id
    Id(String),
    /// Exact text content match
    Text(String),
    /// `data-testid` attribute
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test-id selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::Id(s) => write!(f, "id={s}"),
            Self::Text(s) => write!(f, "text={s}"),
            Self::TestId(s) => write!(f, "testid={s}"),
        }
    }
}

/// Quote a string for embedding in an XPath expression.
///
/// Strings holding a single quote kind are wrapped in the other kind;
/// strings holding both are split into a `concat(...)` expression.
#[must_use]
pub fn xpath_quote(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    // Both quote kinds present: join single-quoted chunks with literal
    // double-quote pieces.
    let mut parts = Vec::new();
    for (i, chunk) in value.split('"').enumerate() {
        if i > 0 {
            parts.push("'\"'".to_string());
        }
        if !chunk.is_empty() {
            parts.push(format!("'{chunk}'"));
        }
    }
    format!("concat({})", parts.join(", "))
}

/// One piece of a locator template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Verbatim selector text
    Literal(String),
    /// Named parameter bound at render time; the value is quoted before
    /// substitution
    Param(String),
}

/// A parameterized locator template.
///
/// Templates are parsed from strings using `{name}` placeholders:
/// `li[data-node={id}]`. Rendering binds parameters, quoting each value,
/// and produces a concrete [`Selector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorTemplate {
    parts: Vec<TemplatePart>,
}

impl LocatorTemplate {
    /// Parse a template from a `{name}`-placeholder string
    #[must_use]
    pub fn parse(template: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if let Some(close) = rest[open..].find('}') {
                literal.push_str(&rest[..open]);
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(TemplatePart::Param(
                    rest[open + 1..open + close].to_string(),
                ));
                rest = &rest[open + close + 1..];
            } else {
                break;
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Self { parts }
    }

    /// Names of all parameters in the template
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                TemplatePart::Param(name) => Some(name.as_str()),
                TemplatePart::Literal(_) => None,
            })
            .collect()
    }

    /// Render the template into a CSS [`Selector`], binding parameters by
    /// name. Values are substituted verbatim (CSS attribute values are
    /// quoted by the caller's literal text).
    ///
    /// Unbound parameters render as empty strings.
    #[must_use]
    pub fn render(&self, params: &[(&str, &str)]) -> Selector {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Param(name) => {
                    if let Some((_, value)) = params.iter().find(|(n, _)| n == name) {
                        out.push_str(value);
                    }
                }
            }
        }
        Selector::Css(out)
    }
}

/// A resolvable locator: a selector plus the chain of parent selectors it
/// is scoped under.
///
/// Nesting composes: a child widget resolves against its parent view's
/// current root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Outer-to-inner chain of scoping selectors
    pub scope: Vec<Selector>,
    /// The selector resolved within the scope
    pub selector: Selector,
}

impl Locator {
    /// Create a root-scoped locator
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            scope: Vec::new(),
            selector,
        }
    }

    /// Create a root-scoped CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// Scope `selector` under this locator
    #[must_use]
    pub fn child(&self, selector: Selector) -> Self {
        let mut scope = self.scope.clone();
        scope.push(self.selector.clone());
        Self { scope, selector }
    }

    /// Scope a CSS selector under this locator
    #[must_use]
    pub fn child_css(&self, selector: impl Into<String>) -> Self {
        self.child(Selector::css(selector))
    }

    /// The full outer-to-inner selector chain, ending with this locator's
    /// own selector
    #[must_use]
    pub fn chain(&self) -> Vec<&Selector> {
        self.scope.iter().chain(std::iter::once(&self.selector)).collect()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sel in &self.scope {
            write!(f, "{sel} >> ")?;
        }
        write!(f, "{}", self.selector)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod quoting_tests {
        use super::*;

        #[test]
        fn test_plain_string() {
            assert_eq!(xpath_quote("next"), "'next'");
        }

        #[test]
        fn test_single_quote_inside() {
            assert_eq!(xpath_quote("it's"), "\"it's\"");
        }

        #[test]
        fn test_double_quote_inside() {
            assert_eq!(xpath_quote("say \"hi\""), "'say \"hi\"'");
        }

        #[test]
        fn test_both_quote_kinds() {
            let quoted = xpath_quote("it's \"fine\"");
            assert!(quoted.starts_with("concat("));
            assert!(quoted.contains("'it'"));
            assert!(quoted.contains("'\"'"));
        }
    }

    mod template_tests {
        use super::*;

        #[test]
        fn test_parse_and_param_names() {
            let t = LocatorTemplate::parse("li[data-node='{id}'] span.{kind}");
            assert_eq!(t.param_names(), vec!["id", "kind"]);
        }

        #[test]
        fn test_render_binds_params() {
            let t = LocatorTemplate::parse("li[data-node='{id}']");
            let selector = t.render(&[("id", "host-42")]);
            assert_eq!(selector, Selector::css("li[data-node='host-42']"));
        }

        #[test]
        fn test_render_unbound_param_is_empty() {
            let t = LocatorTemplate::parse("td.{col}");
            assert_eq!(t.render(&[]), Selector::css("td."));
        }

        #[test]
        fn test_no_params_is_literal() {
            let t = LocatorTemplate::parse("table tbody tr");
            assert!(t.param_names().is_empty());
            assert_eq!(t.render(&[]), Selector::css("table tbody tr"));
        }

        #[test]
        fn test_rendering_is_pure() {
            let t = LocatorTemplate::parse("tr[data-row='{n}']");
            let a = t.render(&[("n", "3")]);
            let b = t.render(&[("n", "3")]);
            assert_eq!(a, b);
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_child_composition() {
            let root = Locator::css("#paging_div");
            let child = root.child_css("ul.pagination");
            assert_eq!(child.scope, vec![Selector::css("#paging_div")]);
            assert_eq!(child.selector, Selector::css("ul.pagination"));
        }

        #[test]
        fn test_chain_order_is_outer_to_inner() {
            let loc = Locator::css("#root").child_css(".mid").child_css("button");
            let chain: Vec<String> = loc.chain().iter().map(|s| s.to_string()).collect();
            assert_eq!(chain, vec!["css=#root", "css=.mid", "css=button"]);
        }

        #[test]
        fn test_display_includes_scope() {
            let loc = Locator::css("#root").child_css("button");
            assert_eq!(loc.to_string(), "css=#root >> css=button");
        }
    }
}
