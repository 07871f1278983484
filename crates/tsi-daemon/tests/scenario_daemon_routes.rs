//! In-process scenario tests for the tsi-daemon HTTP surface.
//!
//! The router is driven through `tower::ServiceExt::oneshot` without binding
//! a socket. Invariants covered:
//!
//! - Reading a field that was never written yields `""` with `success: true`.
//! - Every failure uses the `{ success: false, message }` envelope, including
//!   malformed JSON bodies.
//! - A rejected table operation leaves the table exactly as it was.
//! - Selling a whole position removes it from the book.
//! - Rows travel as flat objects keyed by column id.
//! - Orders too large to represent are rejected and the book stays readable.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot
use tsi_daemon::{routes, state::AppState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> Arc<AppState> {
    Arc::new(AppState::new())
}

async fn call(st: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let bytes: bytes::Bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).expect("body is not valid JSON");
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn send(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn is_console_line(line: &str, text: &str) -> bool {
    let b = line.as_bytes();
    line.len() == 11 + text.len()
        && b[0] == b'['
        && b[3] == b':'
        && b[6] == b':'
        && &line[9..11] == "] "
        && line.ends_with(text)
}

// ---------------------------------------------------------------------------
// Health and fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_service_name() {
    let st = make_state();
    let (status, json) = call(&st, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "tsi-daemon");
}

#[tokio::test]
async fn unknown_field_reads_empty_string() {
    let st = make_state();
    let (status, json) = call(&st, get("/api/trading/screen/read/never_written")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["fieldName"], "never_written");
    assert_eq!(json["value"], "");
}

#[tokio::test]
async fn written_field_reads_back_and_shows_in_read_all() {
    let st = make_state();
    let (status, json) = call(
        &st,
        send(
            "POST",
            "/api/trading/screen/write/symbol_input",
            json!({ "value": "NVDA" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], "NVDA");

    let (_, json) = call(&st, get("/api/trading/screen/read/symbol_input")).await;
    assert_eq!(json["value"], "NVDA");

    let (_, json) = call(&st, get("/api/trading/screen/read_all")).await;
    assert_eq!(json["fields"]["symbol_input"], "NVDA");
    assert_eq!(json["fields"]["order_type"], "BUY");
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn place_order_command_with_blank_inputs_is_rejected() {
    let st = make_state();
    let (status, json) = call(&st, empty("POST", "/api/trading/command/place_order")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Symbol is required");

    let (_, json) = call(&st, get("/api/trading/screen/read/last_command")).await;
    assert_eq!(json["value"], "PLACE_ORDER_FAILED");
}

#[tokio::test]
async fn unknown_command_is_404() {
    let st = make_state();
    let (status, json) = call(&st, empty("POST", "/api/trading/command/self_destruct")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Unknown command: self_destruct");
}

#[tokio::test]
async fn clear_fields_resets_order_entry() {
    let st = make_state();
    call(
        &st,
        send(
            "POST",
            "/api/trading/screen/write/order_type",
            json!({ "value": "SELL" }),
        ),
    )
    .await;
    let (status, _) = call(&st, empty("POST", "/api/trading/command/clear_fields")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&st, get("/api/trading/screen/read_all")).await;
    assert_eq!(json["fields"]["order_type"], "BUY");
    assert_eq!(json["fields"]["last_command"], "CLEAR_FIELDS");
}

// ---------------------------------------------------------------------------
// Position rows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn adding_an_existing_symbol_conflicts() {
    let st = make_state();
    let (status, json) = call(
        &st,
        send(
            "POST",
            "/api/trading/rows/add",
            json!({ "symbol": "tsla", "quantity": 10, "avgPrice": 250.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, json) = call(&st, get("/api/trading/positions")).await;
    assert_eq!(json["positions"]["TSLA"]["quantity"], 10);

    let (status, json) = call(
        &st,
        send(
            "POST",
            "/api/trading/rows/add",
            json!({ "symbol": "TSLA", "quantity": 5, "avgPrice": 251.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn toggle_live_flips_the_flag() {
    let st = make_state();
    let (status, _) = call(&st, empty("POST", "/api/trading/rows/toggle-live/MSFT")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&st, get("/api/trading/positions")).await;
    assert_eq!(json["positions"]["MSFT"]["live"], "ON");

    let (status, json) = call(&st, empty("POST", "/api/trading/rows/toggle-live/ZZZZ")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn selling_the_whole_position_removes_it() {
    let st = make_state();
    let (status, json) = call(
        &st,
        send(
            "POST",
            "/api/trading/orders",
            json!({ "symbol": "AAPL", "quantity": 100, "price": 160.0, "orderType": "SELL" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Order executed: SELL 100 AAPL @ $160.00");

    let (_, json) = call(&st, get("/api/trading/positions")).await;
    assert!(json["positions"].get("AAPL").is_none());
    assert!(json["positions"].get("GOOGL").is_some());
}

#[tokio::test]
async fn status_counts_positions() {
    let st = make_state();
    let (status, json) = call(&st, get("/api/trading/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isConnected"], true);
    assert_eq!(json["status"], "Trading system operational - 3 positions");
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

#[tokio::test]
async fn console_comment_is_timestamped() {
    let st = make_state();
    let (status, _) = call(
        &st,
        send("POST", "/api/trading/console/add", json!({ "message": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&st, get("/api/trading/console/recent?count=1")).await;
    assert_eq!(json["count"], 1);
    let line = json["messages"][0].as_str().unwrap();
    assert!(is_console_line(line, "hello"), "unexpected line {line:?}");

    let (status, json) = call(
        &st,
        send("POST", "/api/trading/console/add", json!({ "message": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Message is required");
}

#[tokio::test]
async fn console_clear_leaves_one_marker() {
    let st = make_state();
    call(&st, empty("POST", "/api/trading/console/clear")).await;
    let (_, json) = call(&st, get("/api/trading/console/messages")).await;
    assert_eq!(json["count"], 1);
    assert!(is_console_line(
        json["messages"][0].as_str().unwrap(),
        "Console cleared"
    ));
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_past_end_is_rejected_and_table_unchanged() {
    let st = make_state();
    let (status, _) = call(
        &st,
        send(
            "PUT",
            "/api/trading/tables/watchlist",
            json!({
                "tableName": "Watchlist",
                "columns": [{ "id": "sym", "name": "Symbol", "dataType": "string" }],
                "rows": [{ "sym": "AMD" }, { "sym": "INTC" }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, before) = call(&st, get("/api/trading/tables/watchlist")).await;

    let (status, json) = call(&st, empty("DELETE", "/api/trading/tables/watchlist/rows/5")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (_, after) = call(&st, get("/api/trading/tables/watchlist")).await;
    assert_eq!(before["table"]["rows"], after["table"]["rows"]);
    assert_eq!(after["table"]["rows"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn table_operation_add_then_delete() {
    let st = make_state();
    call(
        &st,
        send("PUT", "/api/trading/tables/notes", json!({ "tableName": "Notes" })),
    )
    .await;

    let (status, json) = call(
        &st,
        send(
            "POST",
            "/api/trading/tables/operation",
            json!({ "tableId": "notes", "operation": "add", "data": { "text": "buy dip" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Row added successfully");

    let (_, json) = call(&st, get("/api/trading/console/recent?count=1")).await;
    assert!(is_console_line(
        json["messages"][0].as_str().unwrap(),
        "Row added to Notes"
    ));

    let (status, _) = call(
        &st,
        send(
            "POST",
            "/api/trading/tables/operation",
            json!({ "tableId": "notes", "operation": "delete", "rowIndex": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&st, get("/api/trading/tables/notes")).await;
    assert!(json["table"]["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_table_is_404() {
    let st = make_state();
    let (status, json) = call(&st, get("/api/trading/tables/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Table nope not found");
}

#[tokio::test]
async fn positions_table_tracks_the_book() {
    let st = make_state();
    let (_, json) = call(&st, get("/api/trading/tables")).await;
    assert!(json["tables"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "positions_table"));

    let (_, json) = call(&st, get("/api/trading/tables/positions_table")).await;
    let rows = json["table"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|r| r["symbol"] == "GOOGL"));
    assert!(rows.iter().all(|r| r["rowId"].is_string()));
}

#[tokio::test]
async fn flat_rows_written_to_positions_table_reach_the_book() {
    let st = make_state();
    let (status, json) = call(
        &st,
        send(
            "PUT",
            "/api/trading/tables/positions_table",
            json!({
                "tableName": "Trading Positions",
                "rows": [{
                    "symbol": "AAPL",
                    "quantity": 100,
                    "avgPrice": 150.25,
                    "currentPrice": 155.30,
                    "live": "ON",
                    "flatten": false,
                    "notes": "core"
                }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["rowCount"], 1);

    let (_, json) = call(&st, get("/api/trading/positions")).await;
    let positions = json["positions"].as_object().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions["AAPL"]["quantity"], 100);
    assert_eq!(positions["AAPL"]["live"], "ON");

    let (_, json) = call(&st, get("/api/trading/tables/positions_table")).await;
    assert_eq!(json["table"]["rows"][0]["notes"], "core");
}

#[tokio::test]
async fn unchanged_positions_table_round_trips_through_the_book() {
    let st = make_state();
    let (status, _) = call(
        &st,
        send(
            "POST",
            "/api/trading/orders",
            json!({ "symbol": "AAPL", "quantity": 200, "price": 160.01, "orderType": "BUY" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let before = st.book.read().await.positions();

    let (_, json) = call(&st, get("/api/trading/tables/positions_table")).await;
    let (status, _) = call(
        &st,
        send("PUT", "/api/trading/tables/positions_table", json["table"].clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let after = st.book.read().await.positions();
    assert_eq!(before, after);
    assert_eq!(
        after[0].avg_price,
        "156.756667".parse::<rust_decimal::Decimal>().unwrap()
    );
}

#[tokio::test]
async fn oversized_order_is_rejected_and_positions_stay_readable() {
    let st = make_state();
    let (status, json) = call(
        &st,
        send(
            "POST",
            "/api/trading/orders",
            json!({
                "symbol": "BIG",
                "quantity": 9_000_000_000_000_000_000_i64,
                "price": 100_000_000_000_i64,
                "orderType": "BUY"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, json) = call(&st, get("/api/trading/positions")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["positions"].get("BIG").is_none());
    assert_eq!(json["positions"].as_object().unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Events and envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn posted_event_is_listed_and_logged() {
    let st = make_state();
    let (status, _) = call(
        &st,
        send(
            "POST",
            "/api/trading/events",
            json!({ "eventType": "price_alert", "source": "scanner" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&st, get("/api/trading/events?count=10")).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["events"][0]["eventType"], "price_alert");

    let (_, json) = call(&st, get("/api/trading/console/recent?count=1")).await;
    assert!(is_console_line(
        json["messages"][0].as_str().unwrap(),
        "Event received: price_alert from scanner"
    ));
}

#[tokio::test]
async fn malformed_json_uses_the_error_envelope() {
    let st = make_state();
    let req = Request::builder()
        .method("POST")
        .uri("/api/trading/orders")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, json) = call(&st, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(!json["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn bad_path_and_query_values_use_the_error_envelope() {
    let st = make_state();
    for req in [
        empty("DELETE", "/api/trading/tables/positions_table/rows/abc"),
        get("/api/trading/console/recent?count=x"),
        get("/api/trading/events?count=-1"),
    ] {
        let (status, json) = call(&st, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert!(!json["message"].as_str().unwrap().is_empty());
    }
}
