//! Position book commands: summary, orders, and direct row edits.

use anyhow::Result;
use rust_decimal::Decimal;
use serde_json::Value;
use tsi_schemas::{LiveFlag, OrderRequest, Position, Side};

use super::{plain, print_message, ApiClient};

/// Print the account summary, one position per line.
pub async fn summary(api: &ApiClient) -> Result<()> {
    let v = api.get("/positions").await?;
    println!("account_balance={}", plain(&v["accountBalance"]));
    println!("total_pnl={}", plain(&v["totalPnL"]));
    if let Some(positions) = v["positions"].as_object() {
        for p in positions.values() {
            println!("{}", position_line(p));
        }
    }
    Ok(())
}

pub fn position_line(p: &Value) -> String {
    format!(
        "symbol={} qty={} avg={} mark={} pnl={} live={} flatten={}",
        plain(&p["symbol"]),
        plain(&p["quantity"]),
        plain(&p["avgPrice"]),
        plain(&p["currentPrice"]),
        plain(&p["pnl"]),
        plain(&p["live"]),
        plain(&p["flatten"]),
    )
}

pub async fn order(
    api: &ApiClient,
    symbol: &str,
    quantity: i64,
    price: Decimal,
    side: Side,
) -> Result<()> {
    let req = OrderRequest::new(symbol, quantity, price, side);
    let v = api.post("/orders", &req).await?;
    print_message(&v);
    if let Some(id) = v["data"].get("orderId") {
        println!("order_id={}", plain(id));
    }
    Ok(())
}

/// Build the position body sent by `add` and `update`.
pub fn position_body(
    symbol: &str,
    quantity: i64,
    avg_price: Decimal,
    current_price: Option<Decimal>,
    live: bool,
    flatten: bool,
) -> Position {
    let mut p = Position::new(symbol, quantity, avg_price);
    p.current_price = current_price.unwrap_or(Decimal::ZERO);
    p.live = LiveFlag::from(live);
    p.flatten = flatten;
    p
}

pub async fn add(api: &ApiClient, position: &Position) -> Result<()> {
    let v = api.post("/rows/add", position).await?;
    print_message(&v);
    Ok(())
}

pub async fn update(api: &ApiClient, symbol: &str, position: &Position) -> Result<()> {
    let v = api.put(&format!("/rows/update/{symbol}"), position).await?;
    print_message(&v);
    Ok(())
}

pub async fn delete(api: &ApiClient, symbol: &str) -> Result<()> {
    let v = api.delete(&format!("/rows/delete/{symbol}")).await?;
    print_message(&v);
    Ok(())
}

pub async fn toggle_live(api: &ApiClient, symbol: &str) -> Result<()> {
    let v = api
        .post_empty(&format!("/rows/toggle-live/{symbol}"))
        .await?;
    print_message(&v);
    Ok(())
}

pub async fn toggle_flatten(api: &ApiClient, symbol: &str) -> Result<()> {
    let v = api
        .post_empty(&format!("/rows/toggle-flatten/{symbol}"))
        .await?;
    print_message(&v);
    Ok(())
}

/// Replace the whole book with the positions in a JSON array.
pub async fn refresh(api: &ApiClient, positions: Value) -> Result<()> {
    let positions: Vec<Position> = serde_json::from_value(positions)?;
    let v = api.post("/positions/refresh", &positions).await?;
    print_message(&v);
    Ok(())
}
