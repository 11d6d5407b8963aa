//! Data tables: header-keyed cell access, sorting, bulk selection.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::browser::Browser;
use crate::driver::ElementHandle;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};
use crate::widgets::attributize;

/// Sort direction shown by a column header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl SortOrder {
    fn from_classes(classes: &[String]) -> Option<Self> {
        if classes.iter().any(|c| c == "sorting_asc") {
            Some(Self::Asc)
        } else if classes.iter().any(|c| c == "sorting_desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }
}

/// One table row; cells are addressed by attributized header name.
#[derive(Debug, Clone)]
pub struct Row {
    browser: Browser,
    handle: ElementHandle,
    headers: Rc<Vec<String>>,
    /// Zero-based position within the table body
    pub index: usize,
}

impl Row {
    /// Cell handles in column order
    pub fn cells(&self) -> MiradorResult<Vec<ElementHandle>> {
        self.browser
            .find_under(&self.handle, &Selector::css("> td"))
    }

    /// Cell by zero-based column position
    pub fn cell_at(&self, index: usize) -> MiradorResult<ElementHandle> {
        self.cells()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| MiradorError::ItemNotFound {
                message: format!("row {} has no column {index}", self.index),
            })
    }

    /// Cell by attributized header name
    pub fn cell(&self, column: &str) -> MiradorResult<ElementHandle> {
        let index = self
            .headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| MiradorError::ItemNotFound {
                message: format!("no column '{column}' (have {:?})", self.headers),
            })?;
        self.cell_at(index)
    }

    /// Text of the cell under `column`
    pub fn text(&self, column: &str) -> MiradorResult<String> {
        let cell = self.cell(column)?;
        self.browser.text_of(&cell)
    }

    /// The whole row as a header-keyed map
    pub fn read(&self) -> MiradorResult<Value> {
        let mut out = Map::new();
        for (header, cell) in self.headers.iter().zip(self.cells()?) {
            out.insert(header.clone(), Value::String(self.browser.text_of(&cell)?));
        }
        Ok(Value::Object(out))
    }

    /// Click the row (first cell)
    pub fn click(&self) -> MiradorResult<()> {
        let cell = self.cell_at(0)?;
        self.browser.click_on(&cell)
    }
}

/// A static data table.
#[derive(Debug, Clone)]
pub struct Table {
    base: WidgetBase,
}

impl Table {
    /// Bind to the table element
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "table"),
        }
    }

    fn header_handles(&self) -> MiradorResult<Vec<ElementHandle>> {
        let browser = self.base.browser();
        let table = browser.element(self.base.locator())?;
        browser.find_under(&table, &Selector::css("> thead > tr > th"))
    }

    /// Raw header captions, in column order
    pub fn headers(&self) -> MiradorResult<Vec<String>> {
        let browser = self.base.browser();
        self.header_handles()?
            .iter()
            .map(|th| browser.text_of(th))
            .collect()
    }

    /// Attributized header names, in column order
    pub fn attributized_headers(&self) -> MiradorResult<Vec<String>> {
        Ok(self.headers()?.iter().map(|h| attributize(h)).collect())
    }

    fn row_handles(&self) -> MiradorResult<Vec<ElementHandle>> {
        let browser = self.base.browser();
        let table = browser.element(self.base.locator())?;
        browser.find_under(&table, &Selector::css("> tbody > tr"))
    }

    /// All body rows
    pub fn rows(&self) -> MiradorResult<Vec<Row>> {
        let headers = Rc::new(self.attributized_headers()?);
        Ok(self
            .row_handles()?
            .into_iter()
            .enumerate()
            .map(|(index, handle)| Row {
                browser: self.base.browser().clone(),
                handle,
                headers: Rc::clone(&headers),
                index,
            })
            .collect())
    }

    /// Row by zero-based body position
    pub fn row_at(&self, index: usize) -> MiradorResult<Row> {
        self.rows()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| MiradorError::ItemNotFound {
                message: format!("table has no row {index}"),
            })
    }

    /// First row where every `(column, value)` filter matches the cell
    /// text
    ///
    /// # Errors
    ///
    /// [`MiradorError::ItemNotFound`] when no row matches.
    pub fn row(&self, filters: &[(&str, &str)]) -> MiradorResult<Row> {
        for row in self.rows()? {
            let mut all = true;
            for (column, expected) in filters {
                if row.text(column)? != *expected {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(row);
            }
        }
        Err(MiradorError::ItemNotFound {
            message: format!("no row matching {filters:?}"),
        })
    }

    /// First row satisfying `predicate`
    pub fn row_by<F>(&self, predicate: F) -> MiradorResult<Option<Row>>
    where
        F: Fn(&Row) -> MiradorResult<bool>,
    {
        for row in self.rows()? {
            if predicate(&row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Attributized name of the column the table is sorted by, if any
    pub fn sorted_by(&self) -> MiradorResult<Option<String>> {
        let browser = self.base.browser();
        for (th, header) in self.header_handles()?.iter().zip(self.headers()?) {
            if SortOrder::from_classes(&browser.classes_of(th)?).is_some() {
                return Ok(Some(attributize(&header)));
            }
        }
        Ok(None)
    }

    /// Current sort direction, if any
    pub fn sort_order(&self) -> MiradorResult<Option<SortOrder>> {
        let browser = self.base.browser();
        for th in self.header_handles()? {
            if let Some(order) = SortOrder::from_classes(&browser.classes_of(&th)?) {
                return Ok(Some(order));
            }
        }
        Ok(None)
    }

    /// Sort by `column` in `order`, clicking the header as needed.
    ///
    /// A header click flips between ascending and descending, so two
    /// clicks bound the search; failing to reach the order after that is
    /// a widget failure.
    pub fn sort_by(&self, column: &str, order: SortOrder) -> MiradorResult<bool> {
        if self.sorted_by()?.as_deref() == Some(column) && self.sort_order()? == Some(order) {
            return Ok(false);
        }
        let browser = self.base.browser();
        for _ in 0..2 {
            let position = self
                .attributized_headers()?
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| MiradorError::ItemNotFound {
                    message: format!("no column '{column}'"),
                })?;
            let th = self.header_handles()?.remove(position);
            browser.click_on(&th)?;
            if self.sorted_by()?.as_deref() == Some(column) && self.sort_order()? == Some(order) {
                return Ok(true);
            }
        }
        Err(MiradorError::WidgetOperationFailed {
            widget: self.base.name().to_string(),
            message: format!("could not sort by '{column}' {order:?}"),
        })
    }

    fn master_checkbox(&self) -> Locator {
        self.base
            .locator()
            .child(Selector::css("> thead input[type='checkbox']"))
    }

    /// Check the bulk-select box
    pub fn check_all(&self) -> MiradorResult<()> {
        let browser = self.base.browser();
        if !browser.is_selected(&self.master_checkbox())? {
            browser.click(&self.master_checkbox())?;
        }
        Ok(())
    }

    /// Uncheck the bulk-select box
    pub fn uncheck_all(&self) -> MiradorResult<()> {
        let browser = self.base.browser();
        if browser.is_selected(&self.master_checkbox())? {
            browser.click(&self.master_checkbox())?;
        }
        Ok(())
    }
}

impl Widget for Table {
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
        let mut out = Vec::new();
        for row in self.rows()? {
            out.push(row.read()?);
        }
        Ok(Value::Array(out))
    }
}
