//! Table and event commands.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use super::{plain, print_json, print_message, ApiClient};

pub async fn list(api: &ApiClient) -> Result<()> {
    let v = api.get("/tables").await?;
    if let Some(ids) = v["tables"].as_array() {
        for id in ids {
            println!("{}", plain(id));
        }
    }
    Ok(())
}

/// Print one table as tab-separated rows under a header of column ids.
pub async fn show(api: &ApiClient, table_id: &str, raw: bool) -> Result<()> {
    let v = api.get(&format!("/tables/{table_id}")).await?;
    let table = &v["table"];
    if raw {
        return print_json(table);
    }
    for line in render(table) {
        println!("{line}");
    }
    Ok(())
}

pub fn render(table: &Value) -> Vec<String> {
    let columns: Vec<String> = table["columns"]
        .as_array()
        .map(|cols| cols.iter().map(|c| plain(&c["id"])).collect())
        .unwrap_or_default();
    let mut out = vec![columns.join("\t")];
    for row in table["rows"].as_array().into_iter().flatten() {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| plain(&row[c.as_str()]))
            .collect();
        out.push(cells.join("\t"));
    }
    out
}

pub async fn put(api: &ApiClient, table_id: &str, table: Value) -> Result<()> {
    let v = api.put(&format!("/tables/{table_id}"), &table).await?;
    print_message(&v);
    Ok(())
}

pub async fn add_row(api: &ApiClient, table_id: &str, data: Value) -> Result<()> {
    let v = api
        .post(&format!("/tables/{table_id}/rows"), &json!({ "data": data }))
        .await?;
    print_message(&v);
    Ok(())
}

pub async fn update_row(api: &ApiClient, table_id: &str, index: usize, data: Value) -> Result<()> {
    let v = api
        .put(
            &format!("/tables/{table_id}/rows/{index}"),
            &json!({ "data": data }),
        )
        .await?;
    print_message(&v);
    Ok(())
}

pub async fn delete_row(api: &ApiClient, table_id: &str, index: usize) -> Result<()> {
    let v = api
        .delete(&format!("/tables/{table_id}/rows/{index}"))
        .await?;
    print_message(&v);
    Ok(())
}

pub async fn columns(api: &ApiClient, table_id: &str) -> Result<()> {
    let v = api.get(&format!("/tables/{table_id}/columns")).await?;
    for c in v["columns"].as_array().into_iter().flatten() {
        println!(
            "id={} name={} type={} editable={}",
            plain(&c["id"]),
            plain(&c["name"]),
            plain(&c["dataType"]),
            plain(&c["editable"]),
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub async fn send_event(
    api: &ApiClient,
    event_type: &str,
    source: &str,
    source_id: Option<String>,
    data: Option<Value>,
) -> Result<()> {
    let data = match data {
        Some(Value::Object(m)) => m,
        Some(_) => anyhow::bail!("event data must be a JSON object"),
        None => Map::new(),
    };
    let body = json!({
        "eventType": event_type,
        "source": source,
        "sourceId": source_id.unwrap_or_default(),
        "data": data,
    });
    let v = api.post("/events", &body).await?;
    print_message(&v);
    if let Some(id) = v["data"].get("eventId") {
        println!("event_id={}", plain(id));
    }
    Ok(())
}

pub async fn list_events(api: &ApiClient, count: usize) -> Result<()> {
    let v = api.get(&format!("/events?count={count}")).await?;
    for e in v["events"].as_array().into_iter().flatten() {
        let data = serde_json::to_string(&e["data"]).context("serialize event data failed")?;
        println!(
            "{} type={} source={} data={}",
            plain(&e["timestamp"]),
            plain(&e["eventType"]),
            plain(&e["source"]),
            data
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_follows_column_order_and_blanks_missing_cells() {
        let table = json!({
            "columns": [{ "id": "sym" }, { "id": "note" }],
            "rows": [
                { "rowId": "a1", "sym": "AMD", "note": "watch" },
                { "sym": "INTC" }
            ]
        });
        assert_eq!(render(&table), vec!["sym\tnote", "AMD\twatch", "INTC\t"]);
    }
}
