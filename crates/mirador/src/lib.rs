//! Mirador: UI test-automation runtime for an infrastructure
//! management console.
//!
//! Three surfaces make tests composable:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           MIRADOR                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌──────────────┐    ┌───────────────────┐     │
//! │  │ Widget     │    │ Navigation   │    │ REST helpers      │     │
//! │  │ toolkit    │    │ graph        │    │ (entities, tasks) │     │
//! │  └─────┬──────┘    └──────┬───────┘    └─────────┬─────────┘     │
//! │        │    read/fill     │ steps                │ HTTP          │
//! │  ┌─────▼─────────────────▼──────┐      ┌─────────▼─────────┐     │
//! │  │ Browser facade over a Driver │      │ Transport seam    │     │
//! │  └──────────────────────────────┘      └───────────────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Widgets bind to DOM through parameterized locators with uniform
//! `read`/`fill`/`is_displayed` contracts; the navigation graph walks
//! registered steps (with prerequisites and resetters) until a target
//! view is displayed; the REST layer drives the same product over HTTP
//! with task-completion waits. Everything time-dependent funnels
//! through one wait kernel.

#![warn(missing_docs)]

/// Failure artifact capture (screenshots, HTML dumps)
pub mod artifacts;
/// Browser facade with the page-safe barrier
pub mod browser;
/// In-memory page model backing the default driver
pub mod dom;
/// Abstract driver seam and its page-model implementation
pub mod driver;
/// Locators: selectors, templates, quoting, composition
pub mod locator;
/// Navigation graph and traversal
pub mod navigation;
/// Report-data JS bridge for grid pages
pub mod report_data;
/// REST client, entities, tasks, and helpers
pub mod rest;
mod result;
/// Product version parsing and version-dependent picks
pub mod version;
/// Wait/retry kernel
pub mod wait;
/// Widget base and view composition
pub mod widget;
/// Concrete widget library
pub mod widgets;

pub use result::{MiradorError, MiradorResult};

/// Install a tracing subscriber honoring `RUST_LOG`, for debugging test
/// runs. Calling it twice is harmless.
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
