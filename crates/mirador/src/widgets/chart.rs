//! Timeline/utilization charts.
//!
//! The charting library renders into SVG with no stable DOM contract, so
//! reads go through its JavaScript API instead of scraping paths.

use serde_json::{json, Value};

use crate::browser::Browser;
use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};

/// Shared behavior of the line and stacked chart flavors.
#[derive(Debug, Clone)]
struct ChartCore {
    base: WidgetBase,
    chart_id: String,
}

impl ChartCore {
    fn new(browser: Browser, locator: Locator, chart_id: String, name: &str) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, name),
            chart_id,
        }
    }

    fn call(&self, method: &str, args: &[Value]) -> MiradorResult<Value> {
        let code = format!(
            "return ManageIQ.charts.chartsData['{}'].api.{method}()",
            self.chart_id
        );
        self.base.browser().execute_script(&code, args)
    }

    fn categories(&self) -> MiradorResult<Vec<String>> {
        let value = self.call("categories", &[])?;
        as_string_list(&value, "categories")
    }

    fn legends(&self) -> MiradorResult<Vec<String>> {
        let value = self.call("data_names", &[])?;
        as_string_list(&value, "data_names")
    }

    fn events_for(&self, category: &str) -> MiradorResult<Vec<Value>> {
        let value = self.call("data_values", &[json!(category)])?;
        Ok(value
            .get(category)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    fn toggle_legend(&self, name: &str, on: bool) -> MiradorResult<()> {
        let method = if on { "show" } else { "hide" };
        self.call(method, &[json!(name)]).map(|_| ())
    }

    fn tooltips(&self) -> MiradorResult<Vec<Value>> {
        let value = self.call("tooltip_data", &[])?;
        Ok(value.as_array().cloned().unwrap_or_default())
    }
}

fn as_string_list(value: &Value, what: &str) -> MiradorResult<Vec<String>> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .ok_or_else(|| MiradorError::ScriptError {
            message: format!("chart {what} returned non-list {value}"),
        })
}

/// A single-series-per-legend line chart.
#[derive(Debug, Clone)]
pub struct LineChart {
    core: ChartCore,
}

impl LineChart {
    /// Bind to the chart container; `chart_id` keys the page's chart
    /// registry
    #[must_use]
    pub fn new(browser: Browser, locator: Locator, chart_id: impl Into<String>) -> Self {
        Self {
            core: ChartCore::new(browser, locator, chart_id.into(), "line chart"),
        }
    }

    /// X-axis categories
    pub fn categories(&self) -> MiradorResult<Vec<String>> {
        self.core.categories()
    }

    /// Legend names
    pub fn legends(&self) -> MiradorResult<Vec<String>> {
        self.core.legends()
    }

    /// Events recorded under `category`
    pub fn events_for(&self, category: &str) -> MiradorResult<Vec<Value>> {
        self.core.events_for(category)
    }

    /// Show or hide a legend's series
    pub fn toggle_legend(&self, name: &str, on: bool) -> MiradorResult<()> {
        self.core.toggle_legend(name, on)
    }

    /// Tooltip payloads at each tick
    pub fn tooltips(&self) -> MiradorResult<Vec<Value>> {
        self.core.tooltips()
    }
}

impl Widget for LineChart {
    fn browser(&self) -> &Browser {
        self.core.base.browser()
    }

    fn locator(&self) -> &Locator {
        self.core.base.locator()
    }

    fn widget_name(&self) -> &str {
        self.core.base.name()
    }

    fn read(&self) -> MiradorResult<Value> {
        Ok(json!({
            "categories": self.categories()?,
            "legends": self.legends()?,
        }))
    }
}

/// A stacked chart; same API surface, values accumulate per category.
#[derive(Debug, Clone)]
pub struct StackedChart {
    core: ChartCore,
}

impl StackedChart {
    /// Bind to the chart container
    #[must_use]
    pub fn new(browser: Browser, locator: Locator, chart_id: impl Into<String>) -> Self {
        Self {
            core: ChartCore::new(browser, locator, chart_id.into(), "stacked chart"),
        }
    }

    /// X-axis categories
    pub fn categories(&self) -> MiradorResult<Vec<String>> {
        self.core.categories()
    }

    /// Legend names
    pub fn legends(&self) -> MiradorResult<Vec<String>> {
        self.core.legends()
    }

    /// Events recorded under `category`
    pub fn events_for(&self, category: &str) -> MiradorResult<Vec<Value>> {
        self.core.events_for(category)
    }

    /// Show or hide a legend's series
    pub fn toggle_legend(&self, name: &str, on: bool) -> MiradorResult<()> {
        self.core.toggle_legend(name, on)
    }

    /// Tooltip payloads at each tick
    pub fn tooltips(&self) -> MiradorResult<Vec<Value>> {
        self.core.tooltips()
    }

    /// Sum of the values stacked under `category`
    pub fn total_for(&self, category: &str) -> MiradorResult<f64> {
        Ok(self
            .events_for(category)?
            .iter()
            .filter_map(Value::as_f64)
            .sum())
    }
}

impl Widget for StackedChart {
    fn browser(&self) -> &Browser {
        self.core.base.browser()
    }

    fn locator(&self) -> &Locator {
        self.core.base.locator()
    }

    fn widget_name(&self) -> &str {
        self.core.base.name()
    }

    fn read(&self) -> MiradorResult<Value> {
        Ok(json!({
            "categories": self.categories()?,
            "legends": self.legends()?,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::{Element, PageModel};
    use crate::driver::PageModelDriver;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn chart_browser() -> Browser {
        let hidden: Rc<RefCell<HashSet<String>>> = Rc::new(RefCell::new(HashSet::new()));
        let mut page = PageModel::new();
        let root = page.root();
        page.append(root, Element::new("div").id("util-chart"));
        page.on_script(
            "ManageIQ.charts.chartsData['util']",
            Box::new(move |_, code, args| {
                if code.contains(".api.categories()") {
                    Ok(json!(["Mon", "Tue", "Wed"]))
                } else if code.contains(".api.data_names()") {
                    let hidden = hidden.borrow();
                    let names: Vec<&str> = ["cpu", "memory"]
                        .into_iter()
                        .filter(|n| !hidden.contains(*n))
                        .collect();
                    Ok(json!(names))
                } else if code.contains(".api.data_values()") {
                    Ok(json!({"Mon": [10.0, 20.0], "Tue": [5.0]}))
                } else if code.contains(".api.hide()") {
                    hidden
                        .borrow_mut()
                        .insert(args[0].as_str().unwrap_or_default().to_string());
                    Ok(Value::Null)
                } else if code.contains(".api.show()") {
                    hidden
                        .borrow_mut()
                        .remove(args[0].as_str().unwrap_or_default());
                    Ok(Value::Null)
                } else if code.contains(".api.tooltip_data()") {
                    Ok(json!([{"tick": "Mon", "value": 30.0}]))
                } else {
                    Ok(Value::Null)
                }
            }),
        );
        Browser::new(Rc::new(PageModelDriver::new(page)))
    }

    #[test]
    fn test_categories_and_legends() {
        let chart = LineChart::new(chart_browser(), Locator::css("#util-chart"), "util");
        assert_eq!(chart.categories().unwrap(), vec!["Mon", "Tue", "Wed"]);
        assert_eq!(chart.legends().unwrap(), vec!["cpu", "memory"]);
    }

    #[test]
    fn test_legend_toggle_round_trip() {
        let chart = LineChart::new(chart_browser(), Locator::css("#util-chart"), "util");
        chart.toggle_legend("cpu", false).unwrap();
        assert_eq!(chart.legends().unwrap(), vec!["memory"]);
        chart.toggle_legend("cpu", true).unwrap();
        assert_eq!(chart.legends().unwrap(), vec!["cpu", "memory"]);
    }

    #[test]
    fn test_stacked_total() {
        let chart = StackedChart::new(chart_browser(), Locator::css("#util-chart"), "util");
        assert!((chart.total_for("Mon").unwrap() - 30.0).abs() < f64::EPSILON);
        assert!((chart.total_for("Wed").unwrap()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tooltips() {
        let chart = LineChart::new(chart_browser(), Locator::css("#util-chart"), "util");
        let tips = chart.tooltips().unwrap();
        assert_eq!(tips[0]["tick"], json!("Mon"));
    }
}
