//! Screen operations shared by the HTTP routes and the push hub.
//!
//! Every public function here is one externally visible operation. It
//! mutates the stores, records the console line and `last_command` the
//! screen expects, then broadcasts whatever changed. Broadcasting never
//! fails an operation; see [`AppState::publish`].
//!
//! Locks are taken one store at a time and released before the next is
//! touched, so a concurrent reader may see the book updated before the
//! console line that describes it.

use std::collections::BTreeMap;

use chrono::Local;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use tsi_broker_mock::{normalize_symbol, BrokerError};
use tsi_schemas::{
    AccountSummary, CellValue, ColumnDefinition, EventData, OrderRequest, OrderResult, Position,
    TableData, TableOperationRequest, TableOperationResult, UiState,
};
use tsi_screen::fields::{ACCOUNT_BALANCE, CONNECTION_STATUS, ORDER_INPUTS, TOTAL_PNL};
use tsi_screen::{positions_to_table, table_to_positions, TableError, POSITIONS_TABLE_ID};

use crate::api_types::{CommandResponse, SystemStatus};
use crate::error::ApiError;
use crate::state::{AppState, BusMsg};

pub const CMD_PLACE_ORDER: &str = "place_order";
pub const CMD_CLEAR_FIELDS: &str = "clear_fields";
pub const CMD_REFRESH_POSITIONS: &str = "refresh_positions";

fn require(value: &str, what: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::bad_request(format!("{what} is required")));
    }
    Ok(v.to_string())
}

fn money(d: Decimal) -> String {
    format!("{:.2}", d)
}

async fn set_last_command(st: &AppState, command: String) {
    st.fields.write().await.update_last_command(command);
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

pub async fn read_field(st: &AppState, name: &str) -> Result<String, ApiError> {
    let name = require(name, "Field name")?;
    Ok(st.fields.read().await.get(&name))
}

pub async fn write_field(st: &AppState, name: &str, value: String) -> Result<(), ApiError> {
    let name = require(name, "Field name")?;
    st.fields.write().await.set(name.clone(), value.clone());
    info!(field = %name, value = %value, "field written");
    st.publish(BusMsg::FieldUpdate {
        field_name: name,
        value,
    });
    Ok(())
}

pub async fn all_fields(st: &AppState) -> BTreeMap<String, String> {
    st.fields.read().await.get_all()
}

// ---------------------------------------------------------------------------
// Named commands
// ---------------------------------------------------------------------------

pub async fn run_command(st: &AppState, name: &str) -> Result<CommandResponse, ApiError> {
    match name.trim().to_ascii_lowercase().as_str() {
        CMD_PLACE_ORDER => place_order_from_fields(st).await,
        CMD_CLEAR_FIELDS => clear_fields(st).await,
        CMD_REFRESH_POSITIONS => refresh_positions(st).await,
        other => Err(ApiError::not_found(format!("Unknown command: {other}"))),
    }
}

async fn place_order_from_fields(st: &AppState) -> Result<CommandResponse, ApiError> {
    let parsed = st.fields.read().await.order_from_fields();
    let order = match parsed {
        Ok(order) => order,
        Err(e) => {
            {
                let mut f = st.fields.write().await;
                f.update_status(format!("Order validation failed: {e}"));
                f.update_last_command("PLACE_ORDER_FAILED");
            }
            warn!(error = %e, "order validation failed");
            st.publish_fields().await;
            return Err(e.into());
        }
    };

    let outcome = st.book.write().await.place_order(&order);
    match outcome {
        Ok(res) => {
            {
                let mut f = st.fields.write().await;
                f.clear_many(&ORDER_INPUTS);
                f.update_last_command(format!("PLACE_ORDER_SUCCESS_{}", order.symbol));
            }
            info!(symbol = %order.symbol, order_id = %res.order_id, "order placed from screen");
            st.log_console(&format!("Order placed successfully: {}", res.message))
                .await;
            st.publish(BusMsg::OrderPlaced(res.clone()));
            st.publish_positions().await;
            st.publish_fields().await;
            Ok(CommandResponse::ok(res.message).with_data(json!({ "orderId": res.order_id })))
        }
        Err(e) => {
            set_last_command(st, "PLACE_ORDER_FAILED".to_string()).await;
            warn!(symbol = %order.symbol, error = %e, "order rejected");
            st.log_console(&format!("Order failed: {e}")).await;
            st.publish_fields().await;
            Err(e.into())
        }
    }
}

async fn clear_fields(st: &AppState) -> Result<CommandResponse, ApiError> {
    {
        let mut f = st.fields.write().await;
        f.reset_order_entry();
        f.update_last_command("CLEAR_FIELDS");
    }
    info!("order entry fields cleared");
    st.log_console("All fields cleared").await;
    st.publish_fields().await;
    Ok(CommandResponse::ok("All fields cleared successfully"))
}

async fn refresh_positions(st: &AppState) -> Result<CommandResponse, ApiError> {
    let summary = account_summary(st).await;
    set_last_command(st, "REFRESH_POSITIONS".to_string()).await;
    info!(total_pnl = %summary.total_pnl, "positions refreshed");
    st.log_console(&format!(
        "Positions refreshed - Total P&L: ${}",
        money(summary.total_pnl)
    ))
    .await;
    st.publish_fields().await;
    st.publish(BusMsg::PositionsUpdate(summary.clone()));
    Ok(
        CommandResponse::ok("Positions refreshed successfully").with_data(json!({
            "accountBalance": summary.account_balance,
            "totalPnL": summary.total_pnl,
            "positionCount": summary.positions.len(),
        })),
    )
}

// ---------------------------------------------------------------------------
// Position book
// ---------------------------------------------------------------------------

/// Current account view. Also mirrors balance and P&L into their fields
/// and pushes the fields to subscribers.
pub async fn account_summary(st: &AppState) -> AccountSummary {
    let summary = st.book.read().await.summary();
    {
        let mut f = st.fields.write().await;
        f.set(ACCOUNT_BALANCE, money(summary.account_balance));
        f.set(TOTAL_PNL, money(summary.total_pnl));
    }
    st.publish_fields().await;
    summary
}

pub async fn place_order(st: &AppState, order: &OrderRequest) -> Result<OrderResult, ApiError> {
    let outcome = st.book.write().await.place_order(order);
    match outcome {
        Ok(res) => {
            info!(symbol = %order.symbol, order_id = %res.order_id, "order placed");
            st.log_console(&format!(
                "Order placed: {} {} @ {} - {}",
                order.symbol, order.quantity, order.price, res.message
            ))
            .await;
            st.publish(BusMsg::OrderPlaced(res.clone()));
            st.publish_positions().await;
            Ok(res)
        }
        Err(e) => {
            warn!(symbol = %order.symbol, error = %e, "order rejected");
            st.log_console(&format!("Order failed: {e}")).await;
            Err(e.into())
        }
    }
}

/// Common tail of every direct book edit: `last_command`, console, pushes.
async fn finish_book_op(
    st: &AppState,
    command: &str,
    symbol: &str,
    outcome: Result<CommandResponse, BrokerError>,
    console_line: impl FnOnce(&CommandResponse) -> String,
) -> Result<CommandResponse, ApiError> {
    match outcome {
        Ok(resp) => {
            set_last_command(st, format!("{command}_{symbol}")).await;
            info!(command, symbol, "{}", resp.message);
            st.log_console(&console_line(&resp)).await;
            st.publish_positions().await;
            st.publish_fields().await;
            Ok(resp)
        }
        Err(e) => {
            set_last_command(st, format!("{command}_FAILED")).await;
            warn!(command, symbol, error = %e, "position edit rejected");
            st.publish_fields().await;
            Err(e.into())
        }
    }
}

pub async fn add_position(st: &AppState, position: Position) -> Result<CommandResponse, ApiError> {
    let symbol = require(&position.symbol, "Symbol")?.to_uppercase();
    let outcome = st
        .book
        .write()
        .await
        .add_position(position)
        .map(|r| CommandResponse::ok(r.message));
    finish_book_op(st, "ADD_ROW", &symbol, outcome, |r| {
        format!("Position added: {symbol} - {}", r.message)
    })
    .await
}

pub async fn delete_position(st: &AppState, symbol: &str) -> Result<CommandResponse, ApiError> {
    let symbol = normalize_symbol(&require(symbol, "Symbol")?);
    let outcome = st.book.write().await.delete_position(&symbol).map(|p| {
        CommandResponse::ok(format!(
            "Position deleted successfully: {} ({} shares)",
            p.symbol, p.quantity
        ))
    });
    finish_book_op(st, "DELETE_ROW", &symbol, outcome, |r| {
        format!("Position deleted: {symbol} - {}", r.message)
    })
    .await
}

pub async fn update_position(
    st: &AppState,
    symbol: &str,
    position: Position,
) -> Result<CommandResponse, ApiError> {
    let symbol = normalize_symbol(&require(symbol, "Symbol")?);
    let outcome = st
        .book
        .write()
        .await
        .update_position(&symbol, position)
        .map(|r| CommandResponse::ok(r.message));
    finish_book_op(st, "UPDATE_ROW", &symbol, outcome, |r| {
        format!("Position updated: {symbol} - {}", r.message)
    })
    .await
}

pub async fn toggle_live(st: &AppState, symbol: &str) -> Result<CommandResponse, ApiError> {
    let symbol = normalize_symbol(&require(symbol, "Symbol")?);
    let outcome = st.book.write().await.toggle_live(&symbol);
    if let Ok(flag) = &outcome {
        st.publish(BusMsg::PositionToggled {
            symbol: symbol.clone(),
            field: "live".to_string(),
            value: json!(flag),
        });
    }
    let outcome = outcome.map(|flag| {
        CommandResponse::ok(format!("Live for {symbol} set to {flag}"))
            .with_data(json!({ "symbol": symbol, "live": flag }))
    });
    finish_book_op(st, "TOGGLE_LIVE", &symbol, outcome, |r| {
        format!("Live toggled for {symbol}: {}", r.message)
    })
    .await
}

pub async fn toggle_flatten(st: &AppState, symbol: &str) -> Result<CommandResponse, ApiError> {
    let symbol = normalize_symbol(&require(symbol, "Symbol")?);
    let outcome = st.book.write().await.toggle_flatten(&symbol);
    if let Ok(flatten) = &outcome {
        st.publish(BusMsg::PositionToggled {
            symbol: symbol.clone(),
            field: "flatten".to_string(),
            value: json!(flatten),
        });
    }
    let outcome = outcome.map(|flatten| {
        CommandResponse::ok(format!("Flatten for {symbol} set to {flatten}"))
            .with_data(json!({ "symbol": symbol, "flatten": flatten }))
    });
    finish_book_op(st, "TOGGLE_FLATTEN", &symbol, outcome, |r| {
        format!("Flatten toggled for {symbol}: {}", r.message)
    })
    .await
}

/// Replace the whole book from an external position list.
pub async fn refresh_with_positions(
    st: &AppState,
    positions: Vec<Position>,
) -> Result<CommandResponse, ApiError> {
    let supplied = positions.len();
    let kept = st.book.write().await.replace_all(positions);
    info!(supplied, kept, "position book replaced");
    st.log_console(&format!("Webpage refreshed with {supplied} positions"))
        .await;
    st.publish_positions().await;
    Ok(CommandResponse::ok(format!("Position book replaced ({kept} positions)"))
        .with_data(json!({ "supplied": supplied, "positionCount": kept })))
}

/// Positions as the screen shows them, ordered by symbol.
pub async fn positions(st: &AppState) -> Vec<Position> {
    st.book.read().await.positions()
}

pub async fn system_status(st: &AppState) -> SystemStatus {
    let count = st.book.read().await.len();
    st.fields
        .write()
        .await
        .set(CONNECTION_STATUS, "Connected");
    st.publish_fields().await;
    SystemStatus {
        is_connected: true,
        status: format!("Trading system operational - {count} positions"),
        timestamp: Local::now(),
        connected_clients: st.connected_clients(),
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

pub async fn add_console_comment(st: &AppState, message: &str) -> Result<CommandResponse, ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    st.log_console(message).await;
    Ok(CommandResponse::ok("Comment added to console").with_data(json!({ "message": message })))
}

pub async fn console_messages(st: &AppState) -> Vec<String> {
    st.console.read().await.all()
}

pub async fn console_recent(st: &AppState, count: usize) -> Vec<String> {
    st.console.read().await.recent(count)
}

pub async fn clear_console(st: &AppState) -> CommandResponse {
    st.console.write().await.clear();
    info!("console cleared");
    st.publish_console().await;
    CommandResponse::ok("Console cleared")
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Rebuild the positions table from the book, keeping each row's id and
/// screen-owned cells.
pub async fn sync_positions_table(st: &AppState) -> TableData {
    let book = st.book.read().await.positions();
    let mut tables = st.tables.write().await;
    let table = positions_to_table(&book, tables.get(POSITIONS_TABLE_ID));
    tables.put(POSITIONS_TABLE_ID, table);
    tables
        .get(POSITIONS_TABLE_ID)
        .cloned()
        .unwrap_or_else(tsi_screen::positions_table)
}

/// Push edited positions-table rows into the book.
async fn write_back_positions(st: &AppState, table: &TableData) {
    let positions = table_to_positions(table);
    let kept = st.book.write().await.replace_all(positions);
    info!(positions = kept, "positions table written back to book");
    st.publish_positions().await;
}

pub async fn table_ids(st: &AppState) -> Vec<String> {
    st.tables.read().await.ids()
}

pub async fn get_table(st: &AppState, table_id: &str) -> Result<TableData, ApiError> {
    if table_id == POSITIONS_TABLE_ID {
        return Ok(sync_positions_table(st).await);
    }
    st.tables
        .read()
        .await
        .get(table_id)
        .cloned()
        .ok_or_else(|| TableError::NotFound(table_id.to_string()).into())
}

/// Full replace of one table, creating it if needed.
pub async fn put_table(
    st: &AppState,
    table_id: &str,
    table: TableData,
) -> Result<CommandResponse, ApiError> {
    let table_id = require(table_id, "Table id")?;
    let stored = {
        let mut tables = st.tables.write().await;
        tables.put(table_id.clone(), table);
        tables.get(&table_id).cloned()
    };
    let Some(stored) = stored else {
        return Err(ApiError::internal(format!("table {table_id} vanished after put")));
    };
    if table_id == POSITIONS_TABLE_ID {
        write_back_positions(st, &stored).await;
    }
    info!(table_id = %table_id, rows = stored.rows.len(), "table replaced");
    st.log_console(&format!("Table {table_id} updated from client"))
        .await;
    let rows = stored.rows.len();
    st.publish(BusMsg::TableDataUpdate(stored));
    Ok(CommandResponse::ok(format!("Table {table_id} updated"))
        .with_data(json!({ "tableId": table_id, "rowCount": rows })))
}

/// Dispatch one row operation against a table.
pub async fn table_operation(
    st: &AppState,
    req: &TableOperationRequest,
) -> Result<TableOperationResult, ApiError> {
    let positions = req.table_id == POSITIONS_TABLE_ID;
    if positions {
        sync_positions_table(st).await;
    }

    let outcome = st.tables.write().await.apply(req);
    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            warn!(table_id = %req.table_id, operation = %req.operation, error = %e, "table operation rejected");
            return Err(e.into());
        }
    };

    info!(table_id = %req.table_id, operation = %req.operation, "table operation applied");
    st.log_console(&outcome.console_line).await;

    if outcome.mutated {
        let table = st.tables.read().await.get(&req.table_id).cloned();
        if let Some(table) = table {
            if positions {
                write_back_positions(st, &table).await;
            }
            st.publish(BusMsg::TableDataUpdate(table));
        }
    }
    Ok(outcome.result)
}

pub async fn add_row(
    st: &AppState,
    table_id: &str,
    data: BTreeMap<String, CellValue>,
) -> Result<TableOperationResult, ApiError> {
    let req = TableOperationRequest {
        table_id: table_id.to_string(),
        operation: "add".to_string(),
        data,
        ..Default::default()
    };
    table_operation(st, &req).await
}

pub async fn update_row(
    st: &AppState,
    table_id: &str,
    row_index: usize,
    column_id: Option<String>,
    data: BTreeMap<String, CellValue>,
) -> Result<TableOperationResult, ApiError> {
    let req = TableOperationRequest {
        table_id: table_id.to_string(),
        operation: "update".to_string(),
        row_index: Some(row_index),
        column_id,
        data,
        ..Default::default()
    };
    table_operation(st, &req).await
}

pub async fn delete_row(
    st: &AppState,
    table_id: &str,
    row_index: usize,
) -> Result<TableOperationResult, ApiError> {
    let req = TableOperationRequest {
        table_id: table_id.to_string(),
        operation: "delete".to_string(),
        row_index: Some(row_index),
        ..Default::default()
    };
    table_operation(st, &req).await
}

pub async fn change_cell(
    st: &AppState,
    table_id: &str,
    row_index: usize,
    column_id: &str,
    value: CellValue,
) -> Result<TableOperationResult, ApiError> {
    let column_id = require(column_id, "Column id")?;
    let mut data = BTreeMap::new();
    data.insert("value".to_string(), value);
    update_row(st, table_id, row_index, Some(column_id), data).await
}

pub async fn table_columns(st: &AppState, table_id: &str) -> Vec<ColumnDefinition> {
    st.tables.read().await.columns(table_id)
}

pub async fn set_table_columns(
    st: &AppState,
    table_id: &str,
    columns: Vec<ColumnDefinition>,
) -> Result<CommandResponse, ApiError> {
    st.tables
        .write()
        .await
        .set_columns(table_id, columns.clone())?;
    info!(table_id, columns = columns.len(), "table columns replaced");
    st.log_console(&format!("Table columns updated for {table_id}"))
        .await;
    let count = columns.len();
    st.publish(BusMsg::TableColumnsUpdate {
        table_id: table_id.to_string(),
        columns,
    });
    Ok(CommandResponse::ok(format!("Columns updated for {table_id}"))
        .with_data(json!({ "columnCount": count })))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub async fn ingest_event(st: &AppState, event: EventData) -> Result<CommandResponse, ApiError> {
    if event.event_type.trim().is_empty() {
        return Err(ApiError::bad_request("eventType is required"));
    }
    let line = format!("Event received: {} from {}", event.event_type, event.source);
    let event_id = event.event_id.clone();
    let evicted = st.events.write().await.push(event.clone());
    info!(event_type = %event.event_type, source = %event.source, evicted, "event ingested");
    st.publish(BusMsg::EventNotification(event));
    st.log_console(&line).await;
    Ok(CommandResponse::ok("Event processed").with_data(json!({ "eventId": event_id })))
}

pub async fn recent_events(st: &AppState, count: usize) -> Vec<EventData> {
    st.events.read().await.recent(count)
}

// ---------------------------------------------------------------------------
// Whole-screen snapshot
// ---------------------------------------------------------------------------

pub async fn ui_state(st: &AppState) -> UiState {
    sync_positions_table(st).await;
    let fields = st.fields.read().await.get_all();
    let tables = st.tables.read().await.snapshot();
    let console = st.console.read().await.all();
    let mut meta = Map::new();
    meta.insert("service".into(), Value::from(st.build.service));
    meta.insert("version".into(), Value::from(st.build.version));
    meta.insert("connectedClients".into(), Value::from(st.connected_clients()));
    meta.insert("lastUpdated".into(), json!(chrono::Utc::now()));
    UiState {
        fields,
        tables,
        console,
        meta,
    }
}
