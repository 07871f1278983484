//! Table store: table id -> dynamically-schemed grid.
//!
//! Rows are addressed two ways. Positional indices are checked against the
//! current row count on every call and are only as stable as the caller's
//! view of the table. Row ids are assigned at insertion and survive
//! reordering, so concurrent editors should prefer them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tsi_schemas::{
    CellValue, ColumnDefinition, Row, TableData, TableOperationRequest, TableOperationResult,
};

use crate::positions_table::positions_table;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    NotFound(String),
    InvalidIndex { index: usize, len: usize },
    RowNotFound(String),
    NotPermitted { table_id: String, action: &'static str },
    InvalidArgument(String),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::NotFound(id) => write!(f, "Table {id} not found"),
            TableError::InvalidIndex { index, len } => {
                write!(f, "Invalid row index {index} (table has {len} rows)")
            }
            TableError::RowNotFound(id) => write!(f, "Row {id} not found"),
            TableError::NotPermitted { table_id, action } => {
                write!(f, "Table {table_id} does not allow {action}")
            }
            TableError::InvalidArgument(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for TableError {}

// ---------------------------------------------------------------------------
// Operation outcome
// ---------------------------------------------------------------------------

/// What `TableStore::apply` did.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub result: TableOperationResult,
    /// Console line to record for the operation.
    pub console_line: String,
    /// False for read-only operations (`select`).
    pub mutated: bool,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TableStore {
    tables: HashMap<String, TableData>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the empty positions table.
    pub fn with_default_tables() -> Self {
        let mut store = Self::new();
        let table = positions_table();
        store.put(table.table_id.clone(), table);
        store
    }

    pub fn get(&self, table_id: &str) -> Option<&TableData> {
        self.tables.get(table_id)
    }

    pub fn contains(&self, table_id: &str) -> bool {
        self.tables.contains_key(table_id)
    }

    /// Sorted table ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self) -> BTreeMap<String, TableData> {
        self.tables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Full replace. The stored table takes `table_id` as its id, rows
    /// without an id get one, and `last_modified` is bumped.
    pub fn put(&mut self, table_id: impl Into<String>, mut table: TableData) {
        let table_id = table_id.into();
        table.table_id = table_id.clone();
        for row in &mut table.rows {
            row.ensure_id();
        }
        table.touch();
        self.tables.insert(table_id, table);
    }

    fn table_mut(&mut self, table_id: &str) -> Result<&mut TableData, TableError> {
        self.tables
            .get_mut(table_id)
            .ok_or_else(|| TableError::NotFound(table_id.to_string()))
    }

    /// Append a row and return its index.
    pub fn add_row(
        &mut self,
        table_id: &str,
        cells: BTreeMap<String, CellValue>,
    ) -> Result<(usize, String), TableError> {
        let table = self.table_mut(table_id)?;
        ensure(table, table.settings.allow_add, "adding rows")?;
        let row = Row::new(cells);
        let row_id = row.row_id.clone();
        table.rows.push(row);
        table.touch();
        Ok((table.rows.len() - 1, row_id))
    }

    /// With `column_id`, replace that one cell with `data["value"]` when
    /// present. Otherwise merge every key of `data` into the row.
    pub fn update_row(
        &mut self,
        table_id: &str,
        index: usize,
        column_id: Option<&str>,
        data: &BTreeMap<String, CellValue>,
    ) -> Result<(), TableError> {
        let table = self.table_mut(table_id)?;
        ensure(table, table.settings.allow_edit, "editing rows")?;
        let len = table.rows.len();
        let row = table
            .rows
            .get_mut(index)
            .ok_or(TableError::InvalidIndex { index, len })?;
        merge_into(row, column_id, data);
        table.touch();
        Ok(())
    }

    pub fn update_row_by_id(
        &mut self,
        table_id: &str,
        row_id: &str,
        column_id: Option<&str>,
        data: &BTreeMap<String, CellValue>,
    ) -> Result<usize, TableError> {
        let index = self.index_of(table_id, row_id)?;
        self.update_row(table_id, index, column_id, data)?;
        Ok(index)
    }

    /// Remove and return the row at `index`. Out-of-range leaves the table
    /// untouched.
    pub fn delete_row(&mut self, table_id: &str, index: usize) -> Result<Row, TableError> {
        let table = self.table_mut(table_id)?;
        ensure(table, table.settings.allow_delete, "deleting rows")?;
        let len = table.rows.len();
        if index >= len {
            return Err(TableError::InvalidIndex { index, len });
        }
        let row = table.rows.remove(index);
        table.touch();
        Ok(row)
    }

    pub fn delete_row_by_id(&mut self, table_id: &str, row_id: &str) -> Result<Row, TableError> {
        let index = self.index_of(table_id, row_id)?;
        self.delete_row(table_id, index)
    }

    pub fn index_of(&self, table_id: &str, row_id: &str) -> Result<usize, TableError> {
        let table = self
            .get(table_id)
            .ok_or_else(|| TableError::NotFound(table_id.to_string()))?;
        table
            .rows
            .iter()
            .position(|r| r.row_id == row_id)
            .ok_or_else(|| TableError::RowNotFound(row_id.to_string()))
    }

    /// Column definitions, empty for an unknown table.
    pub fn columns(&self, table_id: &str) -> Vec<ColumnDefinition> {
        self.get(table_id)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    pub fn set_columns(
        &mut self,
        table_id: &str,
        columns: Vec<ColumnDefinition>,
    ) -> Result<(), TableError> {
        let table = self.table_mut(table_id)?;
        table.columns = columns;
        table.touch();
        Ok(())
    }

    /// Dispatch a screen-originated row operation.
    pub fn apply(&mut self, req: &TableOperationRequest) -> Result<OperationOutcome, TableError> {
        let name = self
            .get(&req.table_id)
            .map(|t| t.table_name.clone())
            .ok_or_else(|| TableError::NotFound(req.table_id.clone()))?;

        match req.operation.trim().to_ascii_lowercase().as_str() {
            "add" => {
                let (index, row_id) = self.add_row(&req.table_id, req.data.clone())?;
                Ok(OperationOutcome {
                    result: TableOperationResult::ok("Row added successfully")
                        .with("rowIndex", index as i64)
                        .with("rowId", row_id),
                    console_line: format!("Row added to {name}"),
                    mutated: true,
                })
            }
            "update" => {
                let index = required_index(req)?;
                self.update_row(&req.table_id, index, req.column_id.as_deref(), &req.data)?;
                Ok(OperationOutcome {
                    result: TableOperationResult::ok("Row updated successfully")
                        .with("rowIndex", index as i64),
                    console_line: format!("Row {index} updated in {name}"),
                    mutated: true,
                })
            }
            "delete" => {
                let index = required_index(req)?;
                let row = self.delete_row(&req.table_id, index)?;
                Ok(OperationOutcome {
                    result: TableOperationResult::ok("Row deleted successfully")
                        .with("rowId", row.row_id),
                    console_line: format!("Row {index} deleted from {name}"),
                    mutated: true,
                })
            }
            "select" => {
                let label = match req.row_index {
                    Some(index) => {
                        let len = self.get(&req.table_id).map_or(0, |t| t.rows.len());
                        if index >= len {
                            return Err(TableError::InvalidIndex { index, len });
                        }
                        index.to_string()
                    }
                    None => String::new(),
                };
                let mut result = TableOperationResult::ok("Row selected");
                result.data = req.data.clone();
                Ok(OperationOutcome {
                    result,
                    console_line: format!("Row {label} selected in {name}"),
                    mutated: false,
                })
            }
            other => Err(TableError::InvalidArgument(format!(
                "Unknown operation: {other}"
            ))),
        }
    }
}

fn ensure(table: &TableData, allowed: bool, action: &'static str) -> Result<(), TableError> {
    if allowed {
        Ok(())
    } else {
        Err(TableError::NotPermitted {
            table_id: table.table_id.clone(),
            action,
        })
    }
}

fn required_index(req: &TableOperationRequest) -> Result<usize, TableError> {
    req.row_index
        .ok_or_else(|| TableError::InvalidArgument("rowIndex is required".to_string()))
}

fn merge_into(row: &mut Row, column_id: Option<&str>, data: &BTreeMap<String, CellValue>) {
    match (column_id.filter(|c| !c.is_empty()), data.get("value")) {
        (Some(col), Some(value)) => row.set(col, value.clone()),
        _ => {
            for (k, v) in data {
                row.set(k.as_str(), v.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(pairs: &[(&str, &str)]) -> BTreeMap<String, CellValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
            .collect()
    }

    fn store() -> TableStore {
        let mut s = TableStore::new();
        s.put("t", TableData::new("t", "Test Table"));
        s
    }

    #[test]
    fn put_overrides_id_and_assigns_row_ids() {
        let mut s = TableStore::new();
        let mut t = TableData::new("other", "X");
        t.rows.push(Row::default());
        s.put("mine", t);
        let got = s.get("mine").unwrap();
        assert_eq!(got.table_id, "mine");
        assert!(!got.rows[0].row_id.is_empty());
    }

    #[test]
    fn add_returns_index_and_id() {
        let mut s = store();
        assert_eq!(s.add_row("t", cells(&[("a", "1")])).unwrap().0, 0);
        let (idx, id) = s.add_row("t", cells(&[("a", "2")])).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(s.index_of("t", &id).unwrap(), 1);
    }

    #[test]
    fn update_single_cell_vs_merge() {
        let mut s = store();
        s.add_row("t", cells(&[("a", "1"), ("b", "2")])).unwrap();

        s.update_row("t", 0, Some("a"), &cells(&[("value", "9")])).unwrap();
        let row = &s.get("t").unwrap().rows[0];
        assert_eq!(row.get("a"), Some(&CellValue::from("9")));
        assert_eq!(row.get("value"), None);

        s.update_row("t", 0, None, &cells(&[("b", "3"), ("c", "4")])).unwrap();
        let row = &s.get("t").unwrap().rows[0];
        assert_eq!(row.get("b"), Some(&CellValue::from("3")));
        assert_eq!(row.get("c"), Some(&CellValue::from("4")));
    }

    #[test]
    fn update_out_of_range_is_invalid_index() {
        let mut s = store();
        let err = s.update_row("t", 0, None, &BTreeMap::new()).unwrap_err();
        assert_eq!(err, TableError::InvalidIndex { index: 0, len: 0 });
    }

    #[test]
    fn delete_by_id_survives_reordering() {
        let mut s = store();
        let (_, first) = s.add_row("t", cells(&[("n", "first")])).unwrap();
        let (_, second) = s.add_row("t", cells(&[("n", "second")])).unwrap();
        s.delete_row_by_id("t", &first).unwrap();
        let removed = s.delete_row_by_id("t", &second).unwrap();
        assert_eq!(removed.get("n"), Some(&CellValue::from("second")));
        assert_eq!(
            s.delete_row_by_id("t", &second).unwrap_err(),
            TableError::RowNotFound(second)
        );
    }

    #[test]
    fn permission_flags_are_enforced() {
        let mut s = store();
        s.add_row("t", BTreeMap::new()).unwrap();
        let mut t = s.get("t").unwrap().clone();
        t.settings.allow_add = false;
        t.settings.allow_delete = false;
        s.put("t", t);

        assert!(matches!(
            s.add_row("t", BTreeMap::new()),
            Err(TableError::NotPermitted { .. })
        ));
        assert!(matches!(
            s.delete_row("t", 0),
            Err(TableError::NotPermitted { .. })
        ));
        assert!(s.update_row("t", 0, None, &cells(&[("x", "y")])).is_ok());
    }

    #[test]
    fn unknown_table_and_columns() {
        let mut s = store();
        assert_eq!(
            s.add_row("nope", BTreeMap::new()).unwrap_err(),
            TableError::NotFound("nope".to_string())
        );
        assert!(s.columns("nope").is_empty());
        assert!(s.set_columns("nope", Vec::new()).is_err());
    }

    #[test]
    fn apply_dispatches_and_reports() {
        let mut s = store();
        let mut req = TableOperationRequest {
            table_id: "t".to_string(),
            operation: "ADD".to_string(),
            data: cells(&[("a", "1")]),
            ..Default::default()
        };
        let out = s.apply(&req).unwrap();
        assert!(out.mutated);
        assert_eq!(out.console_line, "Row added to Test Table");
        assert_eq!(out.result.data.get("rowIndex"), Some(&CellValue::from(0i64)));

        req.operation = "select".to_string();
        req.row_index = Some(0);
        let out = s.apply(&req).unwrap();
        assert!(!out.mutated);
        assert_eq!(out.console_line, "Row 0 selected in Test Table");

        req.operation = "update".to_string();
        req.row_index = None;
        assert!(matches!(s.apply(&req), Err(TableError::InvalidArgument(_))));

        req.operation = "sort".to_string();
        let err = s.apply(&req).unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: sort");
    }
}
