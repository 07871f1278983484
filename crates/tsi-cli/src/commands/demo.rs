//! `tsi demo`: scripted walk-through of the screen API against a running
//! daemon. Each step prints what it did; the first failing step aborts.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde_json::json;
use tsi_schemas::{LiveFlag, Position};

use super::{plain, ApiClient};

async fn read(api: &ApiClient, field: &str) -> Result<String> {
    let v = api.get(&format!("/screen/read/{field}")).await?;
    Ok(plain(&v["value"]))
}

async fn write(api: &ApiClient, field: &str, value: &str) -> Result<()> {
    api.post(&format!("/screen/write/{field}"), &json!({ "value": value }))
        .await
        .with_context(|| format!("write {field} failed"))?;
    Ok(())
}

fn demo_position(quantity: i64, avg_cents: i64, live: LiveFlag, flatten: bool) -> Position {
    let mut p = Position::new("TSLA", quantity, Decimal::new(avg_cents, 2));
    p.current_price = Decimal::new(25500, 2);
    p.live = live;
    p.flatten = flatten;
    p
}

pub async fn run(api: &ApiClient) -> Result<()> {
    println!("demo_target={}", api.base_url());

    println!("step=1 fields");
    println!("  symbol_input(before)='{}'", read(api, "symbol_input").await?);
    write(api, "symbol_input", "AAPL").await?;
    println!("  symbol_input(after)='{}'", read(api, "symbol_input").await?);

    println!("step=2 order_entry");
    for (field, value) in [
        ("symbol_input", "MSFT"),
        ("quantity_input", "100"),
        ("price_input", "380.50"),
        ("order_type", "BUY"),
    ] {
        write(api, field, value).await?;
        println!("  {field}={value}");
    }

    println!("step=3 place_order");
    let v = api.post_empty("/command/place_order").await?;
    println!("  message={}", plain(&v["message"]));
    println!("  status_display='{}'", read(api, "status_display").await?);

    println!("step=4 system_state");
    for field in ["last_command", "account_balance", "total_pnl"] {
        println!("  {field}={}", read(api, field).await?);
    }

    println!("step=5 rows");
    let v = api
        .post("/rows/add", &demo_position(50, 25000, LiveFlag::On, false))
        .await?;
    println!("  add={}", plain(&v["message"]));
    let v = api
        .put(
            "/rows/update/TSLA",
            &demo_position(75, 24800, LiveFlag::Off, true),
        )
        .await?;
    println!("  update={}", plain(&v["message"]));
    let v = api.post_empty("/rows/toggle-live/TSLA").await?;
    println!("  toggle_live={}", plain(&v["message"]));
    let v = api.post_empty("/rows/toggle-flatten/TSLA").await?;
    println!("  toggle_flatten={}", plain(&v["message"]));
    let v = api.delete("/rows/delete/TSLA").await?;
    println!("  delete={}", plain(&v["message"]));

    println!("step=6 console");
    for msg in [
        "Trading session started",
        "Portfolio analysis completed",
        "Risk check passed",
    ] {
        api.post("/console/add", &json!({ "message": msg })).await?;
    }
    let v = api.get("/console/recent?count=5").await?;
    for line in v["messages"].as_array().into_iter().flatten() {
        println!("  {}", plain(line));
    }

    println!("step=7 positions");
    let v = api.get("/positions").await?;
    for p in v["positions"].as_object().into_iter().flat_map(|m| m.values()) {
        println!("  {}", super::positions::position_line(p));
    }

    println!("demo_complete=true");
    Ok(())
}
