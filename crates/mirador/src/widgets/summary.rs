//! Summary tables: label/value pairs on detail pages, with rowspan
//! groups and nested tables.

use serde_json::{Map, Value};

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};
use crate::widgets::attributize;

/// A two-column summary table: field labels (`th`) on the left, values
/// (`td`) on the right.
#[derive(Debug, Clone)]
pub struct SummaryTable {
    base: WidgetBase,
}

impl SummaryTable {
    /// Bind to the table element
    #[must_use]
    pub fn new(browser: Browser, locator: Locator) -> Self {
        Self {
            base: WidgetBase::new(browser, locator, "summary table"),
        }
    }

    fn row_handles(&self) -> MiradorResult<Vec<crate::driver::ElementHandle>> {
        let browser = self.base.browser();
        let table = browser.element(self.base.locator())?;
        browser.find_under(&table, &Selector::css("> tbody > tr"))
    }

    /// Field labels in page order
    pub fn fields(&self) -> MiradorResult<Vec<String>> {
        let browser = self.base.browser();
        let mut out = Vec::new();
        for row in self.row_handles()? {
            if let Some(th) = browser.find_under(&row, &Selector::css("> th"))?.first() {
                out.push(browser.text_of(th)?);
            }
        }
        Ok(out)
    }

    /// Value text(s) for `field`.
    ///
    /// A field whose label cell spans several rows returns the values of
    /// all spanned rows.
    ///
    /// # Errors
    ///
    /// [`MiradorError::ItemNotFound`] when the field is absent.
    pub fn get_text_of(&self, field: &str) -> MiradorResult<Vec<String>> {
        let browser = self.base.browser();
        let rows = self.row_handles()?;
        for (index, row) in rows.iter().enumerate() {
            let Some(th) = browser.find_under(row, &Selector::css("> th"))?.first().cloned()
            else {
                continue;
            };
            if browser.text_of(&th)? != field {
                continue;
            }
            let span: usize = browser
                .attr_of(&th, "rowspan")?
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            let mut values = Vec::new();
            for spanned in rows.iter().skip(index).take(span) {
                for td in browser.find_under(spanned, &Selector::css("> td"))? {
                    values.push(browser.text_of(&td)?);
                }
            }
            return Ok(values);
        }
        Err(MiradorError::ItemNotFound {
            message: format!("summary table has no field '{field}'"),
        })
    }

    /// Single value for `field`; errors when the field spans rows
    pub fn get_single_text_of(&self, field: &str) -> MiradorResult<String> {
        let mut values = self.get_text_of(field)?;
        if values.len() != 1 {
            return Err(MiradorError::WidgetOperationFailed {
                widget: self.base.name().to_string(),
                message: format!("field '{field}' holds {} values", values.len()),
            });
        }
        Ok(values.remove(0))
    }

    /// Click the value cell of `field` (links on detail pages)
    pub fn click_at(&self, field: &str) -> MiradorResult<()> {
        let browser = self.base.browser();
        for row in self.row_handles()? {
            let Some(th) = browser.find_under(&row, &Selector::css("> th"))?.first().cloned()
            else {
                continue;
            };
            if browser.text_of(&th)? == field {
                if let Some(td) = browser.find_under(&row, &Selector::css("> td"))?.first() {
                    return browser.click_on(td);
                }
            }
        }
        Err(MiradorError::ItemNotFound {
            message: format!("summary table has no field '{field}'"),
        })
    }
}

impl Widget for SummaryTable {
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
        let mut out = Map::new();
        for field in self.fields()? {
            let values = self.get_text_of(&field)?;
            let value = if values.len() == 1 {
                Value::String(values.into_iter().next().expect("one value"))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            out.insert(attributize(&field), value);
        }
        Ok(Value::Object(out))
    }
}

/// A summary table nested inside another summary table's value cell.
#[derive(Debug, Clone)]
pub struct NestedSummaryTable {
    inner: SummaryTable,
}

impl NestedSummaryTable {
    /// Bind to the nested table under `parent`'s value column
    #[must_use]
    pub fn new(browser: Browser, parent: &Locator) -> Self {
        let locator = parent.child(Selector::css("td table"));
        Self {
            inner: SummaryTable::new(browser, locator),
        }
    }

    /// The nested table widget
    #[must_use]
    pub const fn table(&self) -> &SummaryTable {
        &self.inner
    }
}

impl Widget for NestedSummaryTable {
    fn browser(&self) -> &Browser {
        self.inner.browser()
    }

    fn locator(&self) -> &Locator {
        self.inner.locator()
    }

    fn widget_name(&self) -> &str {
        "nested summary table"
    }

    fn read(&self) -> MiradorResult<Value> {
        self.inner.read()
    }
}
