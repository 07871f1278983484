//! Structured UI events (button clicks, toggles, row edits).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    #[serde(default = "new_event_id")]
    pub event_id: String,
    #[serde(default)]
    pub event_type: String,
    /// Table, Field, Button, ...
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: String,
}

fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

impl EventData {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_id: new_event_id(),
            event_type: event_type.into(),
            source: source.into(),
            source_id: String::new(),
            data: Map::new(),
            timestamp: Utc::now(),
            user_id: String::new(),
        }
    }
}

/// Event type tags used by screens.
pub mod event_types {
    pub const TABLE_ROW_ADDED: &str = "table.row.added";
    pub const TABLE_ROW_UPDATED: &str = "table.row.updated";
    pub const TABLE_ROW_DELETED: &str = "table.row.deleted";
    pub const TABLE_ROW_SELECTED: &str = "table.row.selected";
    pub const TABLE_CELL_CHANGED: &str = "table.cell.changed";
    pub const TABLE_SORTED: &str = "table.sorted";
    pub const TABLE_FILTERED: &str = "table.filtered";

    pub const FIELD_CHANGED: &str = "field.changed";
    pub const FIELD_FOCUSED: &str = "field.focused";
    pub const FIELD_BLURRED: &str = "field.blurred";

    pub const BUTTON_CLICKED: &str = "button.clicked";
    pub const TOGGLE_CHANGED: &str = "toggle.changed";

    pub const PAGE_LOADED: &str = "page.loaded";
    pub const PAGE_UNLOADED: &str = "page.unloaded";
    pub const PAGE_RESIZED: &str = "page.resized";

    pub const CUSTOM_ACTION: &str = "custom.action";
}
