//! Result and error types for Mirador.

use thiserror::Error;

/// Result type for Mirador operations
pub type MiradorResult<T> = Result<T, MiradorError>;

/// Errors that can occur in Mirador
#[derive(Debug, Error)]
pub enum MiradorError {
    /// Locator resolved to zero elements when one was required
    #[error("No such element: {locator}")]
    NoSuchElement {
        /// Locator that failed to resolve
        locator: String,
    },

    /// Partial match in a tree found more than one candidate
    #[error("Ambiguous match for {path:?}: {matches} candidates")]
    ManyEntitiesFound {
        /// Path that was being matched
        path: String,
        /// Number of candidates found
        matches: usize,
    },

    /// DOM element reference invalidated between lookup and use
    #[error("Stale element: {locator}")]
    StaleElement {
        /// Locator the element was resolved from
        locator: String,
    },

    /// Page-safe barrier exceeded its timeout
    #[error("Page did not become quiescent within {ms}ms")]
    PageNotQuiescent {
        /// Barrier timeout in milliseconds
        ms: u64,
    },

    /// A navigation step's resulting view is not displayed after retry
    #[error("Navigation to '{destination}' failed after steps {chain:?}: {reason}")]
    NavigationFailed {
        /// Destination that could not be reached
        destination: String,
        /// Ordered chain of executed steps
        chain: Vec<String>,
        /// What went wrong
        reason: String,
    },

    /// A widget could not reach its intended state
    #[error("Widget '{widget}' operation failed: {message}")]
    WidgetOperationFailed {
        /// Widget name
        widget: String,
        /// Error message
        message: String,
    },

    /// A select widget was asked to pick an absent option
    #[error("Select '{widget}' has no item '{item}' (options: {options:?})")]
    SelectItemNotFound {
        /// Widget name
        widget: String,
        /// Requested item
        item: String,
        /// Options actually present
        options: Vec<String>,
    },

    /// Dynamic table could not locate its action row
    #[error("Dynamic table add failed: {message}")]
    DynamicTableAddError {
        /// Error message
        message: String,
    },

    /// A navigation step could not find the UI element it needs
    #[error("Item not found: {message}")]
    ItemNotFound {
        /// Error message
        message: String,
    },

    /// In-page JavaScript raised
    #[error("Script error: {message}")]
    ScriptError {
        /// Error message from the script
        message: String,
    },

    /// An unexpected alert is blocking interaction
    #[error("Unexpected alert present: {text}")]
    AlertPresent {
        /// Alert text
        text: String,
    },

    /// REST action returned 404 / RecordNotFound
    #[error("REST record not found at {href}: {message}")]
    RestRecordNotFound {
        /// Entity href
        href: String,
        /// Server message
        message: String,
    },

    /// REST action returned 400
    #[error("REST bad request: {message}")]
    RestBadRequest {
        /// Server message
        message: String,
    },

    /// A server-side task ended in a non-ok state
    #[error("Task {task_id} failed with status \"{status}\", message \"{message}\"")]
    RestTaskFailed {
        /// Task id
        task_id: String,
        /// Terminal status
        status: String,
        /// Task message, verbatim from the server
        message: String,
    },

    /// Collection action is not implemented by this product version
    #[error("Action `{action}` for {collection} is not available")]
    RestActionNotAvailable {
        /// Collection name
        collection: String,
        /// Action name
        action: String,
    },

    /// A response assertion did not hold
    #[error("Response assertion failed: {message}")]
    ResponseAssertion {
        /// What was expected vs observed
        message: String,
    },

    /// A wait exceeded its allotted duration
    #[error("Timed out after {ms}ms: {message}")]
    Timeout {
        /// Elapsed budget in milliseconds
        ms: u64,
        /// What was being waited for
        message: String,
    },

    /// A fill value could not be applied to the widget
    #[error("Fill failed: {message}")]
    Fill {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MiradorError {
    /// Whether this error signals a missing element, the one condition
    /// `is_displayed` swallows into `false`.
    #[must_use]
    pub const fn is_missing_element(&self) -> bool {
        matches!(self, Self::NoSuchElement { .. })
    }
}
