//! Dynamic tables: an action row materializes editable widgets for
//! adding a record in place.

use serde_json::Value;

use crate::browser::Browser;
use crate::locator::{Locator, Selector};
use crate::result::{MiradorError, MiradorResult};
use crate::widget::{Widget, WidgetBase};
use crate::widgets::table::{Row, Table};

/// Where the action row sits in the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRowPosition {
    /// First body row
    Top,
    /// Last body row
    Bottom,
}

/// A table whose action row, once clicked, turns into an editable row.
#[derive(Debug, Clone)]
pub struct DynamicTable {
    base: WidgetBase,
    table: Table,
    position: ActionRowPosition,
}

impl DynamicTable {
    /// Bind to the table element
    #[must_use]
    pub fn new(browser: Browser, locator: Locator, position: ActionRowPosition) -> Self {
        let table = Table::new(browser.clone(), locator.clone());
        Self {
            base: WidgetBase::new(browser, locator, "dynamic table"),
            table,
            position,
        }
    }

    /// The underlying table
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    fn action_row(&self) -> MiradorResult<(usize, Row)> {
        let rows = self.table.rows()?;
        let browser = self.base.browser();
        let pick = match self.position {
            ActionRowPosition::Top => rows.into_iter().next(),
            ActionRowPosition::Bottom => rows.into_iter().last(),
        };
        match pick {
            Some(row) => {
                let cell = row.cell_at(0)?;
                let classes = browser.classes_of(&cell)?;
                if classes.iter().any(|c| c == "action-cell") {
                    Ok((row.index, row))
                } else {
                    Err(MiradorError::DynamicTableAddError {
                        message: format!(
                            "row {} is not an action row (classes {classes:?})",
                            row.index
                        ),
                    })
                }
            }
            None => Err(MiradorError::DynamicTableAddError {
                message: "table has no rows, nothing to click".to_string(),
            }),
        }
    }

    /// Rows holding data (the action row excluded)
    pub fn data_rows(&self) -> MiradorResult<Vec<Row>> {
        let (action_index, _) = self.action_row()?;
        Ok(self
            .table
            .rows()?
            .into_iter()
            .filter(|row| row.index != action_index)
            .collect())
    }

    /// Click the action row, materializing the editable widgets.
    /// Returns the action row's index.
    ///
    /// # Errors
    ///
    /// [`MiradorError::DynamicTableAddError`] when the action row cannot
    /// be located.
    pub fn row_add(&self) -> MiradorResult<usize> {
        let (index, row) = self.action_row()?;
        row.click()?;
        Ok(index)
    }

    /// Click the in-row save control, finalizing the pending row.
    /// Returns the index of the last data row.
    pub fn row_save(&self) -> MiradorResult<usize> {
        let browser = self.base.browser();
        let save = self
            .base
            .locator()
            .child(Selector::css("button[title='Save']"));
        if !browser.is_displayed(&save) {
            return Err(MiradorError::DynamicTableAddError {
                message: "no pending row to save".to_string(),
            });
        }
        browser.click(&save)?;
        let rows = self.data_rows()?;
        rows.last()
            .map(|row| match self.position {
                ActionRowPosition::Top => row.index - 1,
                ActionRowPosition::Bottom => row.index,
            })
            .ok_or_else(|| MiradorError::DynamicTableAddError {
                message: "no data rows after save".to_string(),
            })
    }
}

impl Widget for DynamicTable {
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
        for row in self.data_rows()? {
            out.push(row.read()?);
        }
        Ok(Value::Array(out))
    }
}
