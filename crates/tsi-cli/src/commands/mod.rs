//! Command handler modules for the `tsi` CLI.
//!
//! `ApiClient` and the output helpers shared by every command path live
//! here. Command-specific logic lives in the submodules.

pub mod demo;
pub mod positions;
pub mod screen;
pub mod tables;
pub mod watch;

use std::fs;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Prefix of every screen route on the daemon.
const API_PREFIX: &str = "/api/trading";

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Thin wrapper over `reqwest::Client` that speaks the daemon's JSON envelope.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base, API_PREFIX, path)
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None::<&Value>).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<Value> {
        self.send(Method::POST, path, None::<&Value>).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, path, None::<&Value>).await
    }

    async fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value> {
        let url = self.url(path);
        debug!(%method, %url, "request");
        let mut req = self.http.request(method.clone(), &url);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("request failed: {method} {url}"))?;
        let status = resp.status();
        let text = resp.text().await.context("read response body failed")?;
        check_envelope(status, &text)
    }
}

/// Decode a daemon response, turning a failure envelope into an error that
/// carries the server's message.
pub fn check_envelope(status: StatusCode, text: &str) -> Result<Value> {
    let body: Value = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
    if status.is_success() {
        return Ok(body);
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| text.trim().to_string());
    anyhow::bail!("{} {}", status.as_u16(), message)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load a JSON value from either an inline string or a file path.
pub fn load_json(inline: Option<String>, file: Option<String>) -> Result<Value> {
    if let Some(p) = file {
        let bytes = fs::read(&p).with_context(|| format!("read file failed: {p}"))?;
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
        let raw = String::from_utf8(bytes.to_vec()).context("file must be UTF-8 text")?;
        return serde_json::from_str(raw.trim()).with_context(|| format!("{p} must contain valid JSON"));
    }

    let raw = inline.context("must provide inline JSON or --file")?;
    serde_json::from_str(raw.trim()).context("argument must be valid JSON")
}

/// Print the envelope's `message` as `message=...`, if present.
pub fn print_message(resp: &Value) {
    if let Some(m) = resp.get("message").and_then(Value::as_str) {
        println!("message={m}");
    }
}

/// Print a JSON value, pretty.
pub fn print_json(v: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v).context("serialize json failed")?);
    Ok(())
}

/// Render a scalar JSON value without quotes.
pub fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_surfaces_server_message() {
        let err = check_envelope(
            StatusCode::CONFLICT,
            r#"{"success":false,"message":"Position for TSLA already exists. Use UpdateRow to modify it."}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "409 Position for TSLA already exists. Use UpdateRow to modify it."
        );
    }

    #[test]
    fn non_json_failure_falls_back_to_body_text() {
        let err = check_envelope(StatusCode::BAD_GATEWAY, "upstream down\n").unwrap_err();
        assert_eq!(err.to_string(), "502 upstream down");
    }

    #[test]
    fn success_returns_body() {
        let v = check_envelope(StatusCode::OK, r#"{"value":"AAPL"}"#).unwrap();
        assert_eq!(v["value"], "AAPL");
    }

    #[test]
    fn url_joins_prefix_without_double_slash() {
        let c = ApiClient::new("http://localhost:5000/");
        assert_eq!(
            c.url("/screen/read/x"),
            "http://localhost:5000/api/trading/screen/read/x"
        );
    }

    #[test]
    fn plain_strips_quotes() {
        assert_eq!(plain(&Value::from("ON")), "ON");
        assert_eq!(plain(&Value::from(3)), "3");
        assert_eq!(plain(&Value::Null), "");
    }
}
