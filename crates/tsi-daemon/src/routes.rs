//! Axum router and all HTTP handlers for tsi-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: decode, call into `service`, wrap
//! the result in the JSON envelope.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use chrono::Local;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tsi_schemas::{
    ColumnDefinition, EventData, OrderRequest, Position, TableData, TableOperationRequest,
};

use crate::{
    api_types::{
        AddCommentRequest, AllFieldsResponse, CommandResponse, ConsoleResponse, EventsResponse,
        FieldReadResponse, FieldWriteRequest, FieldWriteResponse, HealthResponse, RecentQuery,
        RowUpdateRequest, TableColumnsResponse, TableListResponse, TableResponse,
    },
    error::ApiError,
    hub::hub_handler,
    service,
    state::{AppState, BusMsg},
};

type ApiResult<T> = Result<T, ApiError>;

/// Default page size for `console/recent` and `events`.
const DEFAULT_RECENT: usize = 50;

/// Turn a JSON extractor rejection into the standard error envelope.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

fn path<T>(segments: Result<Path<T>, PathRejection>) -> ApiResult<T> {
    segments
        .map(|Path(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/hub", get(hub_handler))
        // fields
        .route("/screen/read/:field", get(read_field))
        .route("/screen/write/:field", post(write_field))
        .route("/screen/read_all", get(read_all))
        // commands
        .route("/command/:name", post(run_command))
        // position rows
        .route("/rows/add", post(add_row))
        .route("/rows/update/:symbol", put(update_row))
        .route("/rows/delete/:symbol", axum::routing::delete(delete_row))
        .route("/rows/toggle-live/:symbol", post(toggle_live))
        .route("/rows/toggle-flatten/:symbol", post(toggle_flatten))
        .route("/orders", post(place_order))
        .route("/positions", get(positions))
        .route("/positions/refresh", post(refresh_positions))
        .route("/status", get(system_status))
        // console
        .route("/console/add", post(console_add))
        .route("/console/messages", get(console_messages))
        .route("/console/recent", get(console_recent))
        .route("/console/clear", post(console_clear))
        // tables
        .route("/tables", get(list_tables))
        .route("/tables/operation", post(table_operation))
        .route("/tables/:id", get(get_table).put(put_table))
        .route("/tables/:id/rows", post(table_add_row))
        .route(
            "/tables/:id/rows/:index",
            put(table_update_row).delete(table_delete_row),
        )
        .route("/tables/:id/columns", get(get_columns).put(put_columns))
        // events
        .route("/events", get(list_events).post(post_event));

    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .nest("/api/trading", api)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

pub(crate) async fn read_field(
    State(st): State<Arc<AppState>>,
    Path(field): Path<String>,
) -> ApiResult<Json<FieldReadResponse>> {
    let value = service::read_field(&st, &field).await?;
    Ok(Json(FieldReadResponse {
        field_name: field,
        value,
        success: true,
    }))
}

pub(crate) async fn write_field(
    State(st): State<Arc<AppState>>,
    Path(field): Path<String>,
    payload: Result<Json<FieldWriteRequest>, JsonRejection>,
) -> ApiResult<Json<FieldWriteResponse>> {
    let req = body(payload)?;
    service::write_field(&st, &field, req.value.clone()).await?;
    Ok(Json(FieldWriteResponse {
        field_name: field,
        value: req.value,
        success: true,
    }))
}

pub(crate) async fn read_all(State(st): State<Arc<AppState>>) -> Json<AllFieldsResponse> {
    Json(AllFieldsResponse {
        fields: service::all_fields(&st).await,
        success: true,
        timestamp: Local::now(),
    })
}

// ---------------------------------------------------------------------------
// Commands and position rows
// ---------------------------------------------------------------------------

pub(crate) async fn run_command(
    State(st): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<CommandResponse>> {
    Ok(Json(service::run_command(&st, &name).await?))
}

pub(crate) async fn add_row(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<Position>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let position = body(payload)?;
    Ok(Json(service::add_position(&st, position).await?))
}

pub(crate) async fn update_row(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    payload: Result<Json<Position>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let position = body(payload)?;
    Ok(Json(service::update_position(&st, &symbol, position).await?))
}

pub(crate) async fn delete_row(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<CommandResponse>> {
    Ok(Json(service::delete_position(&st, &symbol).await?))
}

pub(crate) async fn toggle_live(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<CommandResponse>> {
    Ok(Json(service::toggle_live(&st, &symbol).await?))
}

pub(crate) async fn toggle_flatten(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<CommandResponse>> {
    Ok(Json(service::toggle_flatten(&st, &symbol).await?))
}

pub(crate) async fn place_order(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let order = body(payload)?;
    let res = service::place_order(&st, &order).await?;
    Ok(Json(
        CommandResponse::ok(res.message.clone()).with_data(serde_json::json!(res)),
    ))
}

pub(crate) async fn positions(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(service::account_summary(&st).await)
}

pub(crate) async fn refresh_positions(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<Vec<Position>>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let positions = body(payload)?;
    Ok(Json(service::refresh_with_positions(&st, positions).await?))
}

pub(crate) async fn system_status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(service::system_status(&st).await)
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

pub(crate) async fn console_add(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let req = body(payload)?;
    Ok(Json(service::add_console_comment(&st, &req.message).await?))
}

pub(crate) async fn console_messages(State(st): State<Arc<AppState>>) -> Json<ConsoleResponse> {
    Json(ConsoleResponse::new(service::console_messages(&st).await))
}

pub(crate) async fn console_recent(
    State(st): State<Arc<AppState>>,
    params: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Json<ConsoleResponse>> {
    let count = query(params)?.count.unwrap_or(DEFAULT_RECENT);
    Ok(Json(ConsoleResponse::new(
        service::console_recent(&st, count).await,
    )))
}

pub(crate) async fn console_clear(State(st): State<Arc<AppState>>) -> Json<CommandResponse> {
    Json(service::clear_console(&st).await)
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub(crate) async fn list_tables(State(st): State<Arc<AppState>>) -> Json<TableListResponse> {
    Json(TableListResponse {
        tables: service::table_ids(&st).await,
    })
}

pub(crate) async fn get_table(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TableResponse>> {
    let table = service::get_table(&st, &id).await?;
    Ok(Json(TableResponse {
        success: true,
        table,
    }))
}

pub(crate) async fn put_table(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<TableData>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let table = body(payload)?;
    Ok(Json(service::put_table(&st, &id, table).await?))
}

pub(crate) async fn table_add_row(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<RowUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<tsi_schemas::TableOperationResult>> {
    let req = body(payload)?;
    Ok(Json(service::add_row(&st, &id, req.data).await?))
}

pub(crate) async fn table_update_row(
    State(st): State<Arc<AppState>>,
    segments: Result<Path<(String, usize)>, PathRejection>,
    payload: Result<Json<RowUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<tsi_schemas::TableOperationResult>> {
    let (id, index) = path(segments)?;
    let req = body(payload)?;
    Ok(Json(
        service::update_row(&st, &id, index, req.column_id, req.data).await?,
    ))
}

pub(crate) async fn table_delete_row(
    State(st): State<Arc<AppState>>,
    segments: Result<Path<(String, usize)>, PathRejection>,
) -> ApiResult<Json<tsi_schemas::TableOperationResult>> {
    let (id, index) = path(segments)?;
    Ok(Json(service::delete_row(&st, &id, index).await?))
}

pub(crate) async fn get_columns(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<TableColumnsResponse> {
    let columns = service::table_columns(&st, &id).await;
    Json(TableColumnsResponse {
        table_id: id,
        columns,
    })
}

pub(crate) async fn put_columns(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Vec<ColumnDefinition>>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let columns = body(payload)?;
    Ok(Json(service::set_table_columns(&st, &id, columns).await?))
}

pub(crate) async fn table_operation(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<TableOperationRequest>, JsonRejection>,
) -> ApiResult<Json<tsi_schemas::TableOperationResult>> {
    let req = body(payload)?;
    Ok(Json(service::table_operation(&st, &req).await?))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub(crate) async fn list_events(
    State(st): State<Arc<AppState>>,
    params: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Json<EventsResponse>> {
    let count = query(params)?.count.unwrap_or(DEFAULT_RECENT);
    let events = service::recent_events(&st, count).await;
    Ok(Json(EventsResponse {
        success: true,
        count: events.len(),
        events,
    }))
}

pub(crate) async fn post_event(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<EventData>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let event = body(payload)?;
    Ok(Json(service::ingest_event(&st, event).await?))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.kind()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
