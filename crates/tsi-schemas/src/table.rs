//! Dynamically-schemed tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::CellValue;

/// Column data types understood by screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnDefinition {
    pub id: String,
    /// Display name.
    pub name: String,
    pub data_type: DataType,
    pub editable: bool,
    pub visible: bool,
    pub format: String,
}

impl Default for ColumnDefinition {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            data_type: DataType::String,
            editable: false,
            visible: true,
            format: String::new(),
        }
    }
}

impl ColumnDefinition {
    pub fn new(id: &str, name: &str, data_type: DataType, editable: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            data_type,
            editable,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.to_string();
        self
    }
}

/// Per-table permission flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableSettings {
    pub allow_add: bool,
    pub allow_edit: bool,
    pub allow_delete: bool,
    pub allow_sort: bool,
    pub allow_filter: bool,
    pub theme: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            allow_add: true,
            allow_edit: true,
            allow_delete: true,
            allow_sort: true,
            allow_filter: true,
            theme: "default".to_string(),
        }
    }
}

/// Column id that carries the row id on the wire. Not usable as a cell.
pub const ROW_ID_KEY: &str = "rowId";

/// One table row.
///
/// On the wire a row is a flat object keyed by column id. `rowId` is the one
/// reserved key: it is assigned on insertion and stays with the row for its
/// whole life, unlike its position in `TableData::rows`. Clients may omit it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub row_id: String,
    #[serde(flatten)]
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new(mut cells: BTreeMap<String, CellValue>) -> Self {
        cells.remove(ROW_ID_KEY);
        Self {
            row_id: new_row_id(),
            cells,
        }
    }

    pub fn get(&self, column_id: &str) -> Option<&CellValue> {
        self.cells.get(column_id)
    }

    pub fn set(&mut self, column_id: impl Into<String>, value: impl Into<CellValue>) {
        let column_id = column_id.into();
        if column_id != ROW_ID_KEY {
            self.cells.insert(column_id, value.into());
        }
    }

    /// Fill in a row id if the row arrived without one.
    pub fn ensure_id(&mut self) {
        if self.row_id.is_empty() {
            self.row_id = new_row_id();
        }
    }
}

fn new_row_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(default)]
    pub table_id: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub settings: TableSettings,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
}

impl TableData {
    pub fn new(table_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            table_name: table_name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            settings: TableSettings::default(),
            last_modified: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// A row-level request against one table, as sent by screens.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOperationRequest {
    pub table_id: String,
    /// `add` | `update` | `delete` | `select`
    pub operation: String,
    pub row_index: Option<usize>,
    pub column_id: Option<String>,
    pub data: BTreeMap<String, CellValue>,
    pub metadata: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOperationResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: BTreeMap<String, CellValue>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TableOperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<CellValue>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn rows_are_flat_objects_keyed_by_column() {
        let row: Row = serde_json::from_value(json!({
            "rowId": "r1",
            "symbol": "AAPL",
            "quantity": 100,
            "live": true
        }))
        .unwrap();
        assert_eq!(row.row_id, "r1");
        assert_eq!(row.cells.len(), 3);
        assert_eq!(row.get("symbol"), Some(&CellValue::Text("AAPL".into())));
        assert_eq!(row.get("quantity"), Some(&CellValue::Number(Decimal::from(100))));

        let back = serde_json::to_value(&row).unwrap();
        assert_eq!(back["rowId"], "r1");
        assert_eq!(back["symbol"], "AAPL");
        assert!(back.get("cells").is_none());
    }

    #[test]
    fn missing_row_id_is_left_blank_and_not_serialized() {
        let mut row: Row = serde_json::from_value(json!({ "note": "watch" })).unwrap();
        assert!(row.row_id.is_empty());
        assert!(serde_json::to_value(&row).unwrap().get("rowId").is_none());

        row.ensure_id();
        assert_eq!(row.row_id.len(), 32);
    }

    #[test]
    fn row_id_cannot_be_set_as_a_cell() {
        let mut row = Row::default();
        row.set(ROW_ID_KEY, "spoofed");
        row.set("note", "x");
        assert!(row.row_id.is_empty());
        assert_eq!(row.cells.len(), 1);
    }
}
