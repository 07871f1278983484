//! `tsi watch` and `tsi hub-call`: talk to the push hub over WebSocket.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

use super::{plain, print_json};

/// `http://host:port` -> `ws://host:port/api/trading/hub`.
pub fn hub_url(base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        anyhow::bail!("unsupported url scheme: {base_url}")
    };
    Ok(format!("{ws}/api/trading/hub"))
}

/// One-line summary of a pushed frame.
pub fn describe(frame: &Value) -> String {
    let kind = plain(&frame["type"]);
    match kind.as_str() {
        "heartbeat" => format!("heartbeat ts_millis={}", plain(&frame["tsMillis"])),
        "console_update" => {
            let last = frame["messages"]
                .as_array()
                .and_then(|m| m.last())
                .map(plain)
                .unwrap_or_default();
            format!("console_update last={last}")
        }
        "positions_update" => format!(
            "positions_update positions={} total_pnl={}",
            frame["positions"].as_object().map(|m| m.len()).unwrap_or(0),
            plain(&frame["totalPnL"])
        ),
        "field_update" => format!(
            "field_update {}={}",
            plain(&frame["fieldName"]),
            plain(&frame["value"])
        ),
        "position_toggled" => format!(
            "position_toggled symbol={} {}={}",
            plain(&frame["symbol"]),
            plain(&frame["field"]),
            plain(&frame["value"])
        ),
        "table_data_update" => format!(
            "table_data_update table_id={} rows={}",
            plain(&frame["tableId"]),
            frame["rows"].as_array().map(|r| r.len()).unwrap_or(0)
        ),
        "event_notification" => format!(
            "event_notification type={} source={}",
            plain(&frame["eventType"]),
            plain(&frame["source"])
        ),
        "result" => format!(
            "result id={} method={} ok={} {}",
            plain(&frame["id"]),
            plain(&frame["method"]),
            plain(&frame["ok"]),
            if frame["ok"] == true {
                String::new()
            } else {
                format!("error={}", plain(&frame["error"]))
            }
        )
        .trim_end()
        .to_string(),
        other => other.to_string(),
    }
}

/// Print pushed frames until `limit` have been shown or the hub closes.
pub async fn watch(base_url: &str, limit: Option<usize>, heartbeats: bool, raw: bool) -> Result<()> {
    let url = hub_url(base_url)?;
    let (mut ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("hub connect failed: {url}"))?;
    info!(%url, "watching hub");

    let mut shown = 0usize;
    while let Some(frame) = ws.next().await {
        let frame = frame.context("hub read failed")?;
        let text = match frame {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let v: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "skipping non-JSON frame");
                continue;
            }
        };
        if !heartbeats && v["type"] == "heartbeat" {
            continue;
        }
        if raw {
            print_json(&v)?;
        } else {
            println!("{}", describe(&v));
        }
        shown += 1;
        if limit.is_some_and(|n| shown >= n) {
            break;
        }
    }
    let _ = ws.close(None).await;
    Ok(())
}

/// Invoke one hub method and print its reply.
pub async fn call(base_url: &str, method: &str, args: Option<Value>, timeout: Duration) -> Result<()> {
    let url = hub_url(base_url)?;
    let (mut ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("hub connect failed: {url}"))?;

    let frame = match args {
        Some(args) => json!({ "id": "cli", "method": method, "args": args }),
        None => json!({ "id": "cli", "method": method }),
    };
    ws.send(Message::Text(frame.to_string()))
        .await
        .context("hub send failed")?;

    let reply = tokio::time::timeout(timeout, next_reply(&mut ws, "cli"))
        .await
        .context("timed out waiting for hub reply")??;

    let _ = ws.close(None).await;
    if reply["ok"] != true {
        anyhow::bail!("{method} failed: {}", plain(&reply["error"]));
    }
    print_json(&reply["data"])
}

async fn next_reply<S>(ws: &mut S, id: &str) -> Result<Value>
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = ws.next().await {
        let Message::Text(text) = frame.context("hub read failed")? else {
            continue;
        };
        let v: Value = serde_json::from_str(&text).context("hub sent invalid JSON")?;
        if v["type"] == "result" && v["id"] == id {
            return Ok(v);
        }
    }
    anyhow::bail!("hub closed before replying")
}
