//! Report-data bridge.
//!
//! Grid pages expose an in-page controller; instead of scraping rows out
//! of the DOM, the bridge issues JSON commands through `execute_script`
//! and reads the result from a well-known global. The page-safe barrier
//! runs before and after every command, since commands both depend on
//! and trigger grid refreshes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::browser::Browser;
use crate::result::{MiradorError, MiradorResult};
use crate::widgets::attributize;

/// The in-page controller name
pub const CONTROLLER: &str = "reportDataController";

/// The global the page stores command results in
pub const RESULT_GLOBAL: &str = "ManageIQ.qe.gtl.result";

/// One command sent to the in-page controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeCommand {
    /// Controller name
    pub controller: String,
    /// Action to invoke
    pub action: String,
    /// Positional payload, if the action takes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
}

impl BridgeCommand {
    /// A command without payload
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            controller: CONTROLLER.to_string(),
            action: action.into(),
            data: None,
        }
    }

    /// Attach a single payload value
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(vec![data]);
        self
    }

    /// The JavaScript snippet dispatching this command and returning the
    /// result global
    pub fn to_script(&self) -> MiradorResult<String> {
        let payload = serde_json::to_string(self)?;
        Ok(format!(
            "sendDataWithRx({payload}); return {RESULT_GLOBAL}"
        ))
    }
}

/// Range of items shown by the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRange {
    /// First item ordinal on the page (1-based)
    pub start: u64,
    /// Last item ordinal on the page
    pub end: u64,
    /// Total items across all pages
    pub total: u64,
}

/// Typed client for the report-data controller.
#[derive(Debug, Clone)]
pub struct ReportDataClient {
    browser: Browser,
}

impl ReportDataClient {
    /// Bind to a browser session
    #[must_use]
    pub fn new(browser: Browser) -> Self {
        Self { browser }
    }

    /// The browser this client issues commands through
    #[must_use]
    pub const fn browser(&self) -> &Browser {
        &self.browser
    }

    fn invoke(&self, command: &BridgeCommand) -> MiradorResult<Value> {
        let script = command.to_script()?;
        tracing::debug!(action = %command.action, "report data command");
        self.browser.ensure_page_safe()?;
        let result = self.browser.execute_script(&script, &[])?;
        self.browser.ensure_page_safe()?;
        Ok(result)
    }

    fn invoke_action(&self, action: &str) -> MiradorResult<Value> {
        self.invoke(&BridgeCommand::new(action))
    }

    fn invoke_with(&self, action: &str, data: Value) -> MiradorResult<Value> {
        self.invoke(&BridgeCommand::new(action).with_data(data))
    }

    // ------------------------------------------------------------------
    // Item commands
    // ------------------------------------------------------------------

    /// All grid items, with cell keys attributized
    pub fn get_all_items(&self) -> MiradorResult<Vec<Value>> {
        let result = self.invoke_action("get_all_items")?;
        let items = result.as_array().cloned().unwrap_or_default();
        Ok(items.into_iter().map(normalize_item).collect())
    }

    /// One grid item by id
    pub fn get_item(&self, id: u64) -> MiradorResult<Value> {
        Ok(normalize_item(self.invoke_with("get_item", json!(id))?))
    }

    /// Whether the item's row/tile is rendered
    pub fn is_displayed(&self, id: u64) -> MiradorResult<bool> {
        Ok(self.invoke_with("is_displayed", json!(id))?.as_bool() == Some(true))
    }

    /// Whether the item is selected
    pub fn is_selected(&self, id: u64) -> MiradorResult<bool> {
        Ok(self.invoke_with("is_selected", json!(id))?.as_bool() == Some(true))
    }

    /// Select the item
    pub fn select(&self, id: u64) -> MiradorResult<()> {
        self.invoke_with("select", json!(id)).map(|_| ())
    }

    /// Unselect the item
    pub fn unselect(&self, id: u64) -> MiradorResult<()> {
        self.invoke_with("unselect", json!(id)).map(|_| ())
    }

    /// Click through to the item
    pub fn click(&self, id: u64) -> MiradorResult<()> {
        self.invoke_with("click", json!(id)).map(|_| ())
    }

    /// Select or unselect every item on the page
    pub fn select_all(&self, state: bool) -> MiradorResult<()> {
        self.invoke_with("select_all", json!(state)).map(|_| ())
    }

    /// Ids of items whose cells match `keys`.
    ///
    /// The page-side comparison keys use spaces, not underscores, and
    /// compares stringified values; the client normalizes both.
    pub fn query(&self, keys: &[(&str, &str)]) -> MiradorResult<Vec<u64>> {
        let mut payload = serde_json::Map::new();
        for (key, value) in keys {
            payload.insert(key.replace('_', " "), json!(value));
        }
        let result = self.invoke_with("query", Value::Object(payload))?;
        let ids = result
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("id").and_then(parse_id))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Pagination commands
    // ------------------------------------------------------------------

    /// The current page's item range
    pub fn pagination_range(&self) -> MiradorResult<PaginationRange> {
        let value = self.invoke_action("pagination_range")?;
        serde_json::from_value(value).map_err(Into::into)
    }

    /// Current page number (1-based)
    pub fn current_page(&self) -> MiradorResult<u64> {
        as_u64(&self.invoke_action("get_current_page")?, "get_current_page")
    }

    /// Total page count; the page occasionally reports null before the
    /// grid settles, which the caller wraps in a short wait
    pub fn pages_amount(&self) -> MiradorResult<Value> {
        self.invoke_action("get_pages_amount")
    }

    /// Items shown per page
    pub fn items_per_page(&self) -> MiradorResult<u64> {
        as_u64(
            &self.invoke_action("get_items_per_page")?,
            "get_items_per_page",
        )
    }

    /// Set items shown per page
    pub fn set_items_per_page(&self, value: u64) -> MiradorResult<()> {
        self.invoke_with("set_items_per_page", json!(value)).map(|_| ())
    }

    /// Set sorting column and direction
    pub fn set_sorting(&self, column: &str, ascending: bool) -> MiradorResult<()> {
        self.invoke_with(
            "set_sorting",
            json!({"columnName": column, "isAscending": ascending}),
        )
        .map(|_| ())
    }

    /// Current sorting, as the page reports it
    pub fn get_sorting(&self) -> MiradorResult<Value> {
        self.invoke_action("get_sorting")
    }

    /// Advance one page
    pub fn next_page(&self) -> MiradorResult<()> {
        self.invoke_action("next_page").map(|_| ())
    }

    /// Go back one page
    pub fn previous_page(&self) -> MiradorResult<()> {
        self.invoke_action("previous_page").map(|_| ())
    }

    /// Jump to the first page
    pub fn first_page(&self) -> MiradorResult<()> {
        self.invoke_action("first_page").map(|_| ())
    }

    /// Jump to the last page
    pub fn last_page(&self) -> MiradorResult<()> {
        self.invoke_action("last_page").map(|_| ())
    }

    /// Jump to page `number`
    pub fn go_to_page(&self, number: u64) -> MiradorResult<()> {
        self.invoke_with("go_to_page", json!(number)).map(|_| ())
    }
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value, action: &str) -> MiradorResult<u64> {
    value.as_u64().ok_or_else(|| MiradorError::ScriptError {
        message: format!("{action} returned non-numeric {value}"),
    })
}

/// Attributize the cell keys of one grid item
fn normalize_item(item: Value) -> Value {
    let Value::Object(map) = item else {
        return item;
    };
    let mut out = serde_json::Map::new();
    for (key, value) in map {
        out.insert(attributize(&key), value);
    }
    Value::Object(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::PageModel;
    use crate::driver::PageModelDriver;
    use std::rc::Rc;

    fn scripted_browser(handler: crate::dom::ScriptHandler) -> Browser {
        let mut page = PageModel::new();
        page.on_script(RESULT_GLOBAL, handler);
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    mod command_tests {
        use super::*;

        #[test]
        fn test_script_embeds_payload_and_global() {
            let command = BridgeCommand::new("get_item").with_data(json!(7));
            let script = command.to_script().unwrap();
            assert!(script.contains("sendDataWithRx"));
            assert!(script.contains("\"action\":\"get_item\""));
            assert!(script.contains("\"data\":[7]"));
            assert!(script.ends_with(RESULT_GLOBAL));
        }

        #[test]
        fn test_payloadless_command_omits_data() {
            let script = BridgeCommand::new("next_page").to_script().unwrap();
            assert!(!script.contains("\"data\""));
        }
    }

    mod client_tests {
        use super::*;

        #[test]
        fn test_get_all_items_normalizes_keys() {
            let browser = scripted_browser(Box::new(|_, _, _| {
                Ok(json!([{"Power State": "on", "id": 1}]))
            }));
            let client = ReportDataClient::new(browser);
            let items = client.get_all_items().unwrap();
            assert_eq!(items[0]["power_state"], json!("on"));
        }

        #[test]
        fn test_query_converts_keys_and_collects_ids() {
            let browser = scripted_browser(Box::new(|_, _, _| {
                Ok(json!([{"id": "11"}, {"id": 12}]))
            }));
            let client = ReportDataClient::new(browser);
            let ids = client.query(&[("power_state", "on")]).unwrap();
            assert_eq!(ids, vec![11, 12]);
        }

        #[test]
        fn test_pagination_range_deserializes() {
            let browser = scripted_browser(Box::new(|_, _, _| {
                Ok(json!({"start": 1, "end": 20, "total": 67}))
            }));
            let client = ReportDataClient::new(browser);
            let range = client.pagination_range().unwrap();
            assert_eq!(range.total, 67);
        }

        #[test]
        fn test_non_numeric_page_count_is_script_error() {
            let browser = scripted_browser(Box::new(|_, _, _| Ok(json!("NaN"))));
            let client = ReportDataClient::new(browser);
            assert!(client.items_per_page().is_err());
        }
    }
}
