//! Field, command, console and status commands.

use anyhow::Result;
use serde_json::{json, Value};

use super::{plain, print_message, ApiClient};

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

pub async fn field_get(api: &ApiClient, name: &str) -> Result<()> {
    let v = api.get(&format!("/screen/read/{name}")).await?;
    println!("{}={}", name, plain(&v["value"]));
    Ok(())
}

pub async fn field_set(api: &ApiClient, name: &str, value: &str) -> Result<()> {
    api.post(&format!("/screen/write/{name}"), &json!({ "value": value }))
        .await?;
    println!("written=true {name}={value}");
    Ok(())
}

pub async fn field_all(api: &ApiClient) -> Result<()> {
    let v = api.get("/screen/read_all").await?;
    if let Some(fields) = v["fields"].as_object() {
        for (k, val) in fields {
            println!("{}={}", k, plain(val));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub async fn command(api: &ApiClient, name: &str) -> Result<()> {
    let v = api.post_empty(&format!("/command/{name}")).await?;
    println!("command={name} success={}", v["success"]);
    print_message(&v);
    if let Some(data) = v.get("data").and_then(Value::as_object) {
        for (k, val) in data {
            println!("{}={}", k, plain(val));
        }
    }
    Ok(())
}

pub async fn status(api: &ApiClient) -> Result<()> {
    let v = api.get("/status").await?;
    println!("connected={}", v["isConnected"]);
    println!("status={}", plain(&v["status"]));
    println!("connected_clients={}", v["connectedClients"]);
    println!("timestamp={}", plain(&v["timestamp"]));
    Ok(())
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

pub async fn console_add(api: &ApiClient, message: &str) -> Result<()> {
    let v = api
        .post("/console/add", &json!({ "message": message }))
        .await?;
    print_message(&v);
    Ok(())
}

pub async fn console_list(api: &ApiClient, recent: Option<usize>) -> Result<()> {
    let v = match recent {
        Some(n) => api.get(&format!("/console/recent?count={n}")).await?,
        None => api.get("/console/messages").await?,
    };
    if let Some(lines) = v["messages"].as_array() {
        for line in lines {
            println!("{}", plain(line));
        }
    }
    Ok(())
}

pub async fn console_clear(api: &ApiClient) -> Result<()> {
    let v = api.post_empty("/console/clear").await?;
    print_message(&v);
    Ok(())
}
