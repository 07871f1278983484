//! Daemon configuration from environment variables.
//!
//! `main.rs` loads `.env.local` (if present) before calling
//! [`DaemonConfig::from_env`], so local overrides live in that file.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;

pub const ENV_ADDR: &str = "TSI_DAEMON_ADDR";
pub const ENV_PRICE_TICK_MS: &str = "TSI_PRICE_TICK_MS";
pub const ENV_INITIAL_BALANCE: &str = "TSI_INITIAL_BALANCE";
pub const ENV_DEMO_POSITIONS: &str = "TSI_DEMO_POSITIONS";
pub const ENV_BUS_CAPACITY: &str = "TSI_BUS_CAPACITY";
pub const ENV_CORS_ANY_ORIGIN: &str = "TSI_CORS_ANY_ORIGIN";

#[derive(Clone, Debug, PartialEq)]
pub struct DaemonConfig {
    pub addr: SocketAddr,
    /// Interval between random-walk price steps.
    pub price_tick: Duration,
    pub initial_balance: Decimal,
    /// Seed the book with the AAPL / GOOGL / MSFT demo positions.
    pub demo_positions: bool,
    pub bus_capacity: usize,
    pub cors_any_origin: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            price_tick: Duration::from_millis(2000),
            initial_balance: Decimal::new(5_000_000, 2),
            demo_positions: true,
            bus_capacity: 1024,
            cors_any_origin: false,
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables keep
    /// their defaults; unparseable ones are an error naming the variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ADDR) {
            cfg.addr = parse(ENV_ADDR, &v)?;
        }
        if let Some(v) = get(ENV_PRICE_TICK_MS) {
            let ms: u64 = parse(ENV_PRICE_TICK_MS, &v)?;
            anyhow::ensure!(ms > 0, "{ENV_PRICE_TICK_MS} must be greater than zero");
            cfg.price_tick = Duration::from_millis(ms);
        }
        if let Some(v) = get(ENV_INITIAL_BALANCE) {
            cfg.initial_balance = parse(ENV_INITIAL_BALANCE, &v)?;
        }
        if let Some(v) = get(ENV_DEMO_POSITIONS) {
            cfg.demo_positions = parse_flag(ENV_DEMO_POSITIONS, &v)?;
        }
        if let Some(v) = get(ENV_BUS_CAPACITY) {
            let cap: usize = parse(ENV_BUS_CAPACITY, &v)?;
            anyhow::ensure!(cap > 0, "{ENV_BUS_CAPACITY} must be greater than zero");
            cfg.bus_capacity = cap;
        }
        if let Some(v) = get(ENV_CORS_ANY_ORIGIN) {
            cfg.cors_any_origin = parse_flag(ENV_CORS_ANY_ORIGIN, &v)?;
        }
        Ok(cfg)
    }
}

fn parse<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}

fn parse_flag(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid value for {key}: {raw:?} (expected true/false)"),
    }
}
