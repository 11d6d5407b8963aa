//! Paginators: the JS-bridged controller and the legacy DOM variant.

use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::report_data::ReportDataClient;
use crate::result::{MiradorError, MiradorResult};
use crate::wait::{wait_for, WaitOptions};
use crate::widget::{Widget, WidgetBase};
use crate::widgets::select::NativeSelect;
use crate::widgets::table::{Row, Table};

/// How long to wait out the bridge's transient null page count
const PAGES_AMOUNT_NUM_SEC: f64 = 10.0;

/// JS-bridged paginator: all state flows through the report-data
/// controller rather than the DOM.
#[derive(Debug, Clone)]
pub struct Paginator {
    client: ReportDataClient,
}

impl Paginator {
    /// Bind over a report-data client
    #[must_use]
    pub fn new(client: ReportDataClient) -> Self {
        Self { client }
    }

    /// The underlying bridge client
    #[must_use]
    pub const fn client(&self) -> &ReportDataClient {
        &self.client
    }

    /// Items shown per page
    pub fn items_per_page(&self) -> MiradorResult<u64> {
        self.client.items_per_page()
    }

    /// Set items shown per page
    pub fn set_items_per_page(&self, value: u64) -> MiradorResult<()> {
        self.client.set_items_per_page(value)
    }

    /// Current page number (1-based)
    pub fn cur_page(&self) -> MiradorResult<u64> {
        self.client.current_page()
    }

    /// Total page count.
    ///
    /// The bridge reports null while the grid settles; the value is
    /// waited on until non-null, then must be numeric.
    pub fn pages_amount(&self) -> MiradorResult<u64> {
        let options = WaitOptions::new()
            .num_sec(PAGES_AMOUNT_NUM_SEC)
            .delay(Duration::from_millis(250))
            .message("pages amount available");
        let outcome = wait_for(|| self.client.pages_amount(), &options)?;
        let value = outcome.value.unwrap_or(Value::Null);
        value.as_u64().ok_or_else(|| MiradorError::ScriptError {
            message: format!("get_pages_amount returned non-numeric {value}"),
        })
    }

    /// Total item count across pages
    pub fn items_amount(&self) -> MiradorResult<u64> {
        Ok(self.client.pagination_range()?.total)
    }

    /// Advance one page
    pub fn next_page(&self) -> MiradorResult<()> {
        self.client.next_page()
    }

    /// Go back one page
    pub fn prev_page(&self) -> MiradorResult<()> {
        self.client.previous_page()
    }

    /// Jump to the first page
    pub fn first_page(&self) -> MiradorResult<()> {
        self.client.first_page()
    }

    /// Jump to the last page
    pub fn last_page(&self) -> MiradorResult<()> {
        self.client.last_page()
    }

    /// Jump to page `number`
    pub fn go_to_page(&self, number: u64) -> MiradorResult<()> {
        self.client.go_to_page(number)
    }

    /// Select every item on every page
    pub fn check_all(&self) -> MiradorResult<()> {
        self.client.select_all(true)
    }

    /// Clear the selection
    pub fn uncheck_all(&self) -> MiradorResult<()> {
        self.client.select_all(false)
    }

    /// Set grid sorting
    pub fn sort(&self, column: &str, ascending: bool) -> MiradorResult<()> {
        self.client.set_sorting(column, ascending)
    }

    /// Current sorting, as the page reports it
    pub fn sorted_by(&self) -> MiradorResult<Value> {
        self.client.get_sorting()
    }

    /// Iterate the pages in order, yielding the current page number
    /// after each advance. Starts from page one.
    pub fn pages(&self) -> MiradorResult<Pages<'_>> {
        if self.cur_page()? != 1 {
            tracing::debug!("resetting paginator to first page");
            self.first_page()?;
        }
        Ok(Pages {
            paginator: self,
            total: self.pages_amount()?,
            done: false,
            started: false,
        })
    }
}

/// Iterator over paginator pages; see [`Paginator::pages`]
#[derive(Debug)]
pub struct Pages<'a> {
    paginator: &'a Paginator,
    total: u64,
    done: bool,
    started: bool,
}

impl Iterator for Pages<'_> {
    type Item = MiradorResult<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return match self.paginator.cur_page() {
                Ok(page) => {
                    self.done = page >= self.total;
                    Some(Ok(page))
                }
                Err(err) => {
                    self.done = true;
                    Some(Err(err))
                }
            };
        }
        if let Err(err) = self.paginator.next_page() {
            self.done = true;
            return Some(Err(err));
        }
        match self.paginator.cur_page() {
            Ok(page) => {
                self.done = page >= self.total;
                Some(Ok(page))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Legacy DOM-scraping paginator for pages without the JS bridge.
///
/// Reads the "N-M of T" caption and drives the First/Prev/Next/Last
/// buttons; a grayed-out button reads as absent.
#[derive(Debug, Clone)]
pub struct DomPaginator {
    base: WidgetBase,
    items_on_page: NativeSelect,
}

impl DomPaginator {
    /// Bind to the pagination pane
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        let items_on_page = NativeSelect::new(
            browser.clone(),
            locator.child(Selector::css("select#ppsetting")),
        );
        Self {
            base: WidgetBase::new(browser, locator, "paginator"),
            items_on_page,
        }
    }

    /// `(highest item shown, total items)` parsed from the caption
    pub fn page_info(&self) -> MiradorResult<(u64, u64)> {
        let caption = self
            .base
            .browser()
            .text(&self.base.locator().child(Selector::css("span.pagination-info")))?;
        let re = Regex::new(r"(\d+)?\s*-?\s*(\d+)\s+of\s+(\d+)").expect("valid regex");
        let captures = re
            .captures(&caption)
            .ok_or_else(|| MiradorError::WidgetOperationFailed {
                widget: self.base.name().to_string(),
                message: format!("cannot parse page info from {caption:?}"),
            })?;
        let max_item = captures[2].parse().unwrap_or(0);
        let total = captures[3].parse().unwrap_or(0);
        Ok((max_item, total))
    }

    /// Items shown per page, from the per-page select
    pub fn items_per_page(&self) -> MiradorResult<u64> {
        let selected =
            self.items_on_page
                .selected_option()?
                .ok_or_else(|| MiradorError::WidgetOperationFailed {
                    widget: self.base.name().to_string(),
                    message: "no items-per-page selection".to_string(),
                })?;
        selected
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| MiradorError::WidgetOperationFailed {
                widget: self.base.name().to_string(),
                message: format!("cannot parse items per page from {selected:?}"),
            })
    }

    /// Set items shown per page
    pub fn set_items_per_page(&self, value: u64) -> MiradorResult<bool> {
        self.items_on_page.select(&[format!("{value} items")])
    }

    /// Total item count
    pub fn items_amount(&self) -> MiradorResult<u64> {
        Ok(self.page_info()?.1)
    }

    /// Current page number, derived from the caption and page size
    pub fn cur_page(&self) -> MiradorResult<u64> {
        let (max_item, _) = self.page_info()?;
        let per_page = self.items_per_page()?;
        if max_item <= per_page {
            Ok(1)
        } else {
            Ok(max_item.div_ceil(per_page))
        }
    }

    /// Total page count, derived from the caption and page size
    pub fn pages_amount(&self) -> MiradorResult<u64> {
        let (_, total) = self.page_info()?;
        if total == 0 {
            return Ok(1);
        }
        Ok(total.div_ceil(self.items_per_page()?))
    }

    fn click_button(&self, command: &str) -> MiradorResult<()> {
        let browser = self.base.browser();
        let li = self
            .base
            .locator()
            .child(Selector::css(&format!("li.{command}")));
        if browser
            .classes(&li)?
            .contains(&"disabled".to_string())
        {
            return Err(MiradorError::NoSuchElement {
                locator: format!("paginator button '{command}' is absent/grayed out"),
            });
        }
        browser.click(&li.child(Selector::css("span")))
    }

    /// Advance one page
    pub fn next_page(&self) -> MiradorResult<()> {
        self.click_button("next")
    }

    /// Go back one page
    pub fn prev_page(&self) -> MiradorResult<()> {
        self.click_button("prev")
    }

    /// Jump to the first page (no-op when already there)
    pub fn first_page(&self) -> MiradorResult<()> {
        if self.cur_page()? != 1 {
            self.click_button("first")?;
        }
        Ok(())
    }

    /// Jump to the last page (no-op when already there)
    pub fn last_page(&self) -> MiradorResult<()> {
        if self.cur_page()? != self.pages_amount()? {
            self.click_button("last")?;
        }
        Ok(())
    }

    /// Iterate pages in order, yielding the page number after each
    /// advance
    pub fn pages(&self) -> MiradorResult<Vec<u64>> {
        let mut visited = Vec::new();
        if !self.is_displayed() {
            return Ok(visited);
        }
        self.first_page()?;
        let total = self.pages_amount()?;
        for _ in 1..=total {
            visited.push(self.cur_page()?);
            if self.cur_page()? == total {
                break;
            }
            self.next_page()?;
        }
        Ok(visited)
    }

    /// Find the first row matching `filters` across all pages
    ///
    /// # Errors
    ///
    /// [`MiradorError::ItemNotFound`] when no page holds a match.
    pub fn find_row_on_pages(&self, table: &Table, filters: &[(&str, &str)]) -> MiradorResult<Row> {
        self.first_page()?;
        let total = self.pages_amount()?;
        for _ in 1..=total {
            if let Ok(row) = table.row(filters) {
                return Ok(row);
            }
            if self.cur_page()? == total {
                break;
            }
            self.next_page()?;
        }
        Err(MiradorError::ItemNotFound {
            message: format!("no row matching {filters:?} on any page"),
        })
    }
}

impl Widget for DomPaginator {
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
    use crate::report_data::RESULT_GLOBAL;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Simulated grid state behind the report-data bridge: 67 items at
    /// 20 per page. `null_polls` makes get_pages_amount report null that
    /// many times first.
    fn bridged_paginator(start_page: u64, null_polls: u32) -> Paginator {
        let state = Rc::new(RefCell::new((start_page, null_polls)));
        let mut page = PageModel::new();
        page.on_script(
            RESULT_GLOBAL,
            Box::new(move |_, code, _| {
                let payload = code
                    .trim_start_matches("sendDataWithRx(")
                    .split("); return")
                    .next()
                    .unwrap_or_default();
                let command: Value = serde_json::from_str(payload).unwrap();
                let action = command["action"].as_str().unwrap_or_default();
                let mut state = state.borrow_mut();
                let total_pages = 4u64;
                Ok(match action {
                    "get_current_page" => json!(state.0),
                    "get_pages_amount" => {
                        if state.1 > 0 {
                            state.1 -= 1;
                            Value::Null
                        } else {
                            json!(total_pages)
                        }
                    }
                    "get_items_per_page" => json!(20),
                    "set_items_per_page" => Value::Null,
                    "pagination_range" => {
                        let start = (state.0 - 1) * 20 + 1;
                        let end = (state.0 * 20).min(67);
                        json!({"start": start, "end": end, "total": 67})
                    }
                    "next_page" => {
                        state.0 = (state.0 + 1).min(total_pages);
                        Value::Null
                    }
                    "previous_page" => {
                        state.0 = state.0.saturating_sub(1).max(1);
                        Value::Null
                    }
                    "first_page" => {
                        state.0 = 1;
                        Value::Null
                    }
                    "last_page" => {
                        state.0 = total_pages;
                        Value::Null
                    }
                    "go_to_page" => {
                        state.0 = command["data"][0].as_u64().unwrap_or(1);
                        Value::Null
                    }
                    _ => Value::Null,
                })
            }),
        );
        let browser = Browser::new(Rc::new(PageModelDriver::new(page)));
        Paginator::new(ReportDataClient::new(browser))
    }

    mod bridged_tests {
        use super::*;

        #[test]
        fn test_pages_visits_each_exactly_once_in_order() {
            let paginator = bridged_paginator(1, 0);
            let visited: Vec<u64> = paginator
                .pages()
                .unwrap()
                .collect::<MiradorResult<Vec<_>>>()
                .unwrap();
            assert_eq!(visited, vec![1, 2, 3, 4]);
        }

        #[test]
        fn test_pages_resets_to_first() {
            let paginator = bridged_paginator(3, 0);
            let visited: Vec<u64> = paginator
                .pages()
                .unwrap()
                .collect::<MiradorResult<Vec<_>>>()
                .unwrap();
            assert_eq!(visited, vec![1, 2, 3, 4]);
        }

        #[test]
        fn test_pages_amount_waits_out_null() {
            let paginator = bridged_paginator(1, 2);
            assert_eq!(paginator.pages_amount().unwrap(), 4);
        }

        #[test]
        fn test_items_amount_from_range() {
            let paginator = bridged_paginator(1, 0);
            assert_eq!(paginator.items_amount().unwrap(), 67);
        }

        #[test]
        fn test_go_to_page() {
            let paginator = bridged_paginator(1, 0);
            paginator.go_to_page(3).unwrap();
            assert_eq!(paginator.cur_page().unwrap(), 3);
        }
    }

    mod dom_tests {
        use super::*;
        use crate::dom::NodeId;

        /// DOM pane over 45 items at 20 per page; buttons update the
        /// caption like the server-rendered pane does.
        fn dom_pane() -> Browser {
            let mut page = PageModel::new();
            let root = page.root();
            let pane = page.append(root, Element::new("div").id("paging_div"));
            let info = page.append(
                pane,
                Element::new("span").class("pagination-info").text("1-20 of 45"),
            );
            let select = page.append(pane, Element::new("select").id("ppsetting"));
            page.append(select, Element::new("option").text("20 items").selected(true));
            page.append(select, Element::new("option").text("50 items"));

            let cur = Rc::new(RefCell::new(1u64));
            let captions = ["1-20 of 45", "21-40 of 45", "41-45 of 45"];
            let mut button = |page: &mut PageModel, pane: NodeId, class: &str, delta: i64| {
                let li = page.append(pane, Element::new("li").class(class));
                let span = page.append(li, Element::new("span"));
                let cur = Rc::clone(&cur);
                page.on_click(
                    span,
                    Box::new(move |p| {
                        let mut c = cur.borrow_mut();
                        *c = if delta == i64::MAX {
                            3
                        } else if delta == i64::MIN {
                            1
                        } else {
                            (*c as i64 + delta).clamp(1, 3) as u64
                        };
                        p.node_mut(info).text = captions[(*c - 1) as usize].to_string();
                    }),
                );
            };
            button(&mut page, pane, "next", 1);
            button(&mut page, pane, "prev", -1);
            button(&mut page, pane, "first", i64::MIN);
            button(&mut page, pane, "last", i64::MAX);
            Browser::new(Rc::new(PageModelDriver::new(page)))
        }

        #[test]
        fn test_page_info_parse() {
            let paginator = DomPaginator::new(dom_pane(), Locator::css("#paging_div"));
            assert_eq!(paginator.page_info().unwrap(), (20, 45));
            assert_eq!(paginator.items_per_page().unwrap(), 20);
            assert_eq!(paginator.cur_page().unwrap(), 1);
            assert_eq!(paginator.pages_amount().unwrap(), 3);
        }

        #[test]
        fn test_pages_iteration() {
            let paginator = DomPaginator::new(dom_pane(), Locator::css("#paging_div"));
            assert_eq!(paginator.pages().unwrap(), vec![1, 2, 3]);
        }

        #[test]
        fn test_set_items_per_page_round_trip() {
            let paginator = DomPaginator::new(dom_pane(), Locator::css("#paging_div"));
            assert!(paginator.set_items_per_page(50).unwrap());
            assert_eq!(paginator.items_per_page().unwrap(), 50);
        }

        #[test]
        fn test_disabled_button_reads_as_absent() {
            let mut page = PageModel::new();
            let root = page.root();
            let pane = page.append(root, Element::new("div").id("paging_div"));
            page.append(
                pane,
                Element::new("span").class("pagination-info").text("1-5 of 5"),
            );
            let select = page.append(pane, Element::new("select").id("ppsetting"));
            page.append(select, Element::new("option").text("20 items").selected(true));
            let li = page.append(pane, Element::new("li").class("next").class("disabled"));
            page.append(li, Element::new("span"));
            let browser = Browser::new(Rc::new(PageModelDriver::new(page)));

            let paginator = DomPaginator::new(browser, Locator::css("#paging_div"));
            assert!(matches!(
                paginator.next_page().unwrap_err(),
                MiradorError::NoSuchElement { .. }
            ));
        }
    }
}
