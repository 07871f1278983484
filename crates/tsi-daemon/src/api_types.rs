//! Request and response types for the tsi-daemon HTTP endpoints and the
//! push hub frames.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests and the CLI. No business logic lives here.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tsi_schemas::{CellValue, ColumnDefinition, EventData, TableData};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Standard `{ success, message, data }` reply for commands and mutations.
/// Error responses use the same shape with `success: false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReadResponse {
    pub field_name: String,
    pub value: String,
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldWriteRequest {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldWriteResponse {
    pub field_name: String,
    pub value: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllFieldsResponse {
    pub fields: BTreeMap<String, String>,
    pub success: bool,
    pub timestamp: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCommentRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleResponse {
    pub success: bool,
    pub messages: Vec<String>,
    pub count: usize,
}

impl ConsoleResponse {
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            success: true,
            count: messages.len(),
            messages,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentQuery {
    pub count: Option<usize>,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub is_connected: bool,
    pub status: String,
    pub timestamp: DateTime<Local>,
    pub connected_clients: usize,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableListResponse {
    pub tables: Vec<String>,
}

/// Body of `PUT /api/trading/tables/:id/rows/:index`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowUpdateRequest {
    pub column_id: Option<String>,
    pub data: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnsResponse {
    pub table_id: String,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResponse {
    pub success: bool,
    pub table: TableData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub success: bool,
    pub events: Vec<EventData>,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Push hub frames
// ---------------------------------------------------------------------------

/// Client -> server call on `/api/trading/hub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

/// Server -> caller reply to one `HubRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubReply {
    /// Always `"result"`; distinguishes replies from bus pushes.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    pub method: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HubReply {
    pub fn ok(id: Option<String>, method: impl Into<String>, data: Value) -> Self {
        Self {
            kind: "result".to_string(),
            id,
            method: method.into(),
            ok: true,
            data: (!data.is_null()).then_some(data),
            error: None,
        }
    }

    pub fn err(id: Option<String>, method: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: "result".to_string(),
            id,
            method: method.into(),
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
