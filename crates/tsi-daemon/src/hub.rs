//! Push hub on `GET /api/trading/hub` (WebSocket).
//!
//! Each connection gets one writer task fed by two queues: replies to this
//! client's own calls and its subscription to the bus. The read half stays
//! in the connection task and dispatches calls one at a time. A failed
//! write ends that connection only; other subscribers never notice.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tsi_schemas::{
    CellValue, ColumnDefinition, EventData, OrderRequest, Position, TableData,
    TableOperationRequest,
};
use uuid::Uuid;

use crate::api_types::{HubReply, HubRequest};
use crate::error::ApiError;
use crate::service;
use crate::state::{AppState, BusMsg};

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Every method a hub client may invoke, with its named arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "args", rename_all_fields = "camelCase")]
pub enum HubCall {
    GetPositions,
    PlaceOrder(OrderRequest),
    ToggleLive {
        symbol: String,
    },
    ToggleFlatten {
        symbol: String,
    },
    AddPosition(Position),
    DeletePosition {
        symbol: String,
    },
    UpdatePosition {
        symbol: String,
        position: Position,
    },
    AddConsoleComment {
        message: String,
    },
    ClearConsole,
    RefreshWebPage {
        positions: Vec<Position>,
    },
    GetWebPage,
    GetWebPageData,
    GetTableData {
        table_id: String,
    },
    ReceiveTableUpdate {
        table_id: String,
        table: TableData,
    },
    GetFieldData {
        field_id: String,
    },
    ReceiveFieldUpdate {
        field_id: String,
        value: String,
    },
    GetAllFields,
    ReceiveEvent(EventData),
    HandleTableOperation(TableOperationRequest),
    HandleTableRowAdd {
        table_id: String,
        #[serde(default)]
        row_data: BTreeMap<String, CellValue>,
    },
    HandleTableRowUpdate {
        table_id: String,
        row_index: usize,
        #[serde(default)]
        row_data: BTreeMap<String, CellValue>,
    },
    HandleTableRowDelete {
        table_id: String,
        row_index: usize,
    },
    HandleTableCellChange {
        table_id: String,
        row_index: usize,
        column_id: String,
        #[serde(default)]
        new_value: CellValue,
    },
    GetTableColumns {
        table_id: String,
    },
    UpdateTableColumns {
        table_id: String,
        columns: Vec<ColumnDefinition>,
    },
    RunCommand {
        name: String,
    },
}

impl HubCall {
    /// Decode a `{ method, args }` frame. Unit methods accept absent or
    /// null args.
    pub fn from_request(req: &HubRequest) -> Result<Self, ApiError> {
        let frame = if req.args.is_null() {
            json!({ "method": req.method })
        } else {
            json!({ "method": req.method, "args": req.args })
        };
        Ok(serde_json::from_value(frame)?)
    }
}

fn to_value<T: serde::Serialize>(v: T) -> Result<Value, ApiError> {
    serde_json::to_value(v).map_err(|e| ApiError::internal(e.to_string()))
}

/// Run one call and return the reply payload.
pub async fn dispatch(st: &AppState, call: HubCall) -> Result<Value, ApiError> {
    use HubCall::*;
    match call {
        GetPositions => to_value(service::account_summary(st).await),
        PlaceOrder(order) => to_value(service::place_order(st, &order).await?),
        ToggleLive { symbol } => to_value(service::toggle_live(st, &symbol).await?),
        ToggleFlatten { symbol } => to_value(service::toggle_flatten(st, &symbol).await?),
        AddPosition(p) => to_value(service::add_position(st, p).await?),
        DeletePosition { symbol } => to_value(service::delete_position(st, &symbol).await?),
        UpdatePosition { symbol, position } => {
            to_value(service::update_position(st, &symbol, position).await?)
        }
        AddConsoleComment { message } => {
            to_value(service::add_console_comment(st, &message).await?)
        }
        ClearConsole => to_value(service::clear_console(st).await),
        RefreshWebPage { positions } => {
            to_value(service::refresh_with_positions(st, positions).await?)
        }
        GetWebPage => to_value(service::positions(st).await),
        GetWebPageData => to_value(service::ui_state(st).await),
        GetTableData { table_id } => to_value(service::get_table(st, &table_id).await?),
        ReceiveTableUpdate { table_id, table } => {
            to_value(service::put_table(st, &table_id, table).await?)
        }
        GetFieldData { field_id } => {
            let value = service::read_field(st, &field_id).await?;
            Ok(json!({ "fieldName": field_id, "value": value }))
        }
        ReceiveFieldUpdate { field_id, value } => {
            service::write_field(st, &field_id, value.clone()).await?;
            st.log_console(&format!("Field {field_id} updated from client"))
                .await;
            Ok(json!({ "fieldName": field_id, "value": value }))
        }
        GetAllFields => to_value(service::all_fields(st).await),
        ReceiveEvent(event) => to_value(service::ingest_event(st, event).await?),
        HandleTableOperation(req) => to_value(service::table_operation(st, &req).await?),
        HandleTableRowAdd { table_id, row_data } => {
            to_value(service::add_row(st, &table_id, row_data).await?)
        }
        HandleTableRowUpdate {
            table_id,
            row_index,
            row_data,
        } => to_value(service::update_row(st, &table_id, row_index, None, row_data).await?),
        HandleTableRowDelete {
            table_id,
            row_index,
        } => to_value(service::delete_row(st, &table_id, row_index).await?),
        HandleTableCellChange {
            table_id,
            row_index,
            column_id,
            new_value,
        } => to_value(
            service::change_cell(st, &table_id, row_index, &column_id, new_value).await?,
        ),
        GetTableColumns { table_id } => to_value(service::table_columns(st, &table_id).await),
        UpdateTableColumns { table_id, columns } => {
            to_value(service::set_table_columns(st, &table_id, columns).await?)
        }
        RunCommand { name } => to_value(service::run_command(st, &name).await?),
    }
}

/// Decode and run one frame, always producing a reply.
pub async fn handle_request(st: &AppState, req: HubRequest) -> HubReply {
    let result = match HubCall::from_request(&req) {
        Ok(call) => dispatch(st, call).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(data) => HubReply::ok(req.id, req.method, data),
        Err(e) => {
            debug!(method = %req.method, error = %e, "hub call failed");
            HubReply::err(req.id, req.method, e.message)
        }
    }
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

pub(crate) async fn hub_handler(
    ws: WebSocketUpgrade,
    State(st): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

async fn handle_socket(socket: WebSocket, st: Arc<AppState>) {
    let conn_id = Uuid::new_v4().simple().to_string();
    // Subscribe before announcing so this client sees its own connect line.
    let bus_rx = st.bus.subscribe();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<String>();
    let (sink, mut stream) = socket.split();

    st.hub_clients.fetch_add(1, Ordering::Relaxed);
    info!(conn_id = %conn_id, "hub client connected");

    // Initial state for the caller only.
    for msg in [
        BusMsg::UiState(service::ui_state(&st).await),
        BusMsg::PositionsUpdate(st.book.read().await.summary()),
    ] {
        if let Ok(text) = serde_json::to_string(&msg) {
            let _ = reply_tx.send(text);
        }
    }

    let mut writer = tokio::spawn(write_loop(conn_id.clone(), sink, reply_rx, bus_rx));
    st.log_console(&format!("Client connected: {conn_id}")).await;

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(frame)) = frame else { break };
                let text = match frame {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let reply = match serde_json::from_str::<HubRequest>(&text) {
                    Ok(req) => handle_request(&st, req).await,
                    Err(e) => HubReply::err(None, "", format!("malformed frame: {e}")),
                };
                match serde_json::to_string(&reply) {
                    Ok(text) => {
                        if reply_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(conn_id = %conn_id, error = %e, "could not encode hub reply"),
                }
            }
            _ = &mut writer => break,
        }
    }

    writer.abort();
    st.hub_clients.fetch_sub(1, Ordering::Relaxed);
    info!(conn_id = %conn_id, "hub client disconnected");
    st.log_console(&format!("Client disconnected: {conn_id}")).await;
}

/// Forward replies and bus messages to one socket until either side closes
/// or a write fails.
async fn write_loop(
    conn_id: String,
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut replies: mpsc::UnboundedReceiver<String>,
    mut bus: broadcast::Receiver<BusMsg>,
) {
    loop {
        let text = tokio::select! {
            biased;
            reply = replies.recv() => match reply {
                Some(text) => text,
                None => break,
            },
            msg = bus.recv() => match msg {
                Ok(msg) => match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "could not encode bus message");
                        continue;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(conn_id = %conn_id, skipped, "hub client lagged; messages dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            warn!(conn_id = %conn_id, error = %e, "hub write failed; closing connection");
            break;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(method: &str, args: Value) -> HubRequest {
        HubRequest {
            id: Some("1".into()),
            method: method.into(),
            args,
        }
    }

    #[test]
    fn unit_and_struct_calls_decode() {
        assert!(matches!(
            HubCall::from_request(&req("GetPositions", Value::Null)).unwrap(),
            HubCall::GetPositions
        ));
        match HubCall::from_request(&req(
            "HandleTableCellChange",
            json!({ "tableId": "t", "rowIndex": 2, "columnId": "qty", "newValue": 5 }),
        ))
        .unwrap()
        {
            HubCall::HandleTableCellChange {
                table_id,
                row_index,
                column_id,
                ..
            } => {
                assert_eq!((table_id.as_str(), row_index, column_id.as_str()), ("t", 2, "qty"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_method_is_a_client_error() {
        let err = HubCall::from_request(&req("Explode", Value::Null)).unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
    }

    #[tokio::test]
    async fn handle_request_wraps_errors() {
        let st = AppState::new();
        let reply = handle_request(&st, req("ToggleLive", json!({ "symbol": "NOPE" }))).await;
        assert!(!reply.ok);
        assert_eq!(reply.id.as_deref(), Some("1"));
        assert_eq!(reply.error.as_deref(), Some("Position for NOPE not found"));

        let reply = handle_request(&st, req("GetFieldData", json!({ "fieldId": "order_type" }))).await;
        assert!(reply.ok);
        assert_eq!(reply.data.unwrap()["value"], "BUY");
    }
}
