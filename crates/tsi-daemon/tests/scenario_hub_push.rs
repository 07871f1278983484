//! Scenario: hub clients over a real WebSocket.
//!
//! Invariants covered:
//!
//! - A new connection receives the full `ui_state` snapshot before anything else.
//! - A call is answered with a `result` frame carrying the caller's id.
//! - A state change made by one client is pushed to every other client.
//! - A malformed frame gets an error reply and the connection stays usable.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tsi_daemon::{routes, state::AppState};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve() -> String {
    let st = Arc::new(AppState::new());
    let app = routes::build_router(st);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/api/trading/hub")
}

/// Read frames until one satisfies `pred`, failing after two seconds.
async fn next_matching(client: &mut Client, pred: impl Fn(&Value) -> bool) -> Value {
    let wait = async {
        loop {
            let frame = client.next().await.expect("stream ended").expect("ws error");
            if let Message::Text(text) = frame {
                let v: Value = serde_json::from_str(&text).expect("frame is not JSON");
                if pred(&v) {
                    return v;
                }
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("timed out waiting for frame")
}

async fn call(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string()))
        .await
        .expect("send failed");
}

#[tokio::test]
async fn first_frame_is_the_ui_snapshot() {
    let url = serve().await;
    let (mut a, _) = connect_async(url.as_str()).await.unwrap();

    let first = next_matching(&mut a, |_| true).await;
    assert_eq!(first["type"], "ui_state");
    assert_eq!(first["fields"]["order_type"], "BUY");
    assert!(first["tables"]["positions_table"].is_object());
    assert_eq!(first["meta"]["service"], "tsi-daemon");
}

#[tokio::test]
async fn toggle_from_one_client_reaches_the_other() {
    let url = serve().await;
    let (mut a, _) = connect_async(url.as_str()).await.unwrap();
    next_matching(&mut a, |v| v["type"] == "ui_state").await;
    let (mut b, _) = connect_async(url.as_str()).await.unwrap();
    next_matching(&mut b, |v| v["type"] == "ui_state").await;

    call(
        &mut a,
        json!({ "id": "7", "method": "ToggleLive", "args": { "symbol": "msft" } }),
    )
    .await;

    let reply = next_matching(&mut a, |v| v["type"] == "result" && v["id"] == "7").await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["method"], "ToggleLive");

    let pushed = next_matching(&mut b, |v| v["type"] == "position_toggled").await;
    assert_eq!(pushed["symbol"], "MSFT");
    assert_eq!(pushed["field"], "live");
    assert_eq!(pushed["value"], "ON");

    let positions = next_matching(&mut b, |v| v["type"] == "positions_update").await;
    assert!(positions["positions"]["MSFT"].is_object());
}

#[tokio::test]
async fn malformed_frame_gets_an_error_reply() {
    let url = serve().await;
    let (mut a, _) = connect_async(url.as_str()).await.unwrap();
    next_matching(&mut a, |v| v["type"] == "ui_state").await;

    a.send(Message::Text("not json".into())).await.unwrap();
    let reply = next_matching(&mut a, |v| v["type"] == "result").await;
    assert_eq!(reply["ok"], false);

    call(&mut a, json!({ "id": "2", "method": "GetAllFields" })).await;
    let reply = next_matching(&mut a, |v| v["type"] == "result" && v["id"] == "2").await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["data"]["status_display"], "System Ready");
}
