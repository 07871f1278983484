//! Wire and data types shared by every tsi crate.
//!
//! Everything here is plain serde data. Field names are `camelCase` on the
//! wire because the screen surface talks to browser pages and external
//! engines that already speak that dialect. No business logic lives here
//! beyond derived values (PnL, market value) that are pure functions of a
//! single record.

pub mod cell;
pub mod event;
pub mod table;

pub use cell::CellValue;
pub use event::{event_types, EventData};
pub use table::{
    ColumnDefinition, DataType, Row, TableData, TableOperationRequest, TableOperationResult,
    TableSettings, ROW_ID_KEY,
};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LiveFlag
// ---------------------------------------------------------------------------

/// Per-position "live" switch, rendered as `"ON"` / `"OFF"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiveFlag {
    On,
    #[default]
    Off,
}

impl LiveFlag {
    pub fn toggled(self) -> Self {
        match self {
            LiveFlag::On => LiveFlag::Off,
            LiveFlag::Off => LiveFlag::On,
        }
    }

    pub fn is_on(self) -> bool {
        self == LiveFlag::On
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiveFlag::On => "ON",
            LiveFlag::Off => "OFF",
        }
    }
}

impl From<bool> for LiveFlag {
    fn from(on: bool) -> Self {
        if on {
            LiveFlag::On
        } else {
            LiveFlag::Off
        }
    }
}

impl fmt::Display for LiveFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// One symbol's holding in the position book.
///
/// `quantity` is signed: positive = long, negative = short. A position with
/// zero quantity never lives in the book; it is removed instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub live: LiveFlag,
    pub flatten: bool,
}

impl Position {
    /// A fresh position marked at its entry price.
    pub fn new(symbol: impl Into<String>, quantity: i64, avg_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_price,
            current_price: avg_price,
            live: LiveFlag::Off,
            flatten: false,
        }
    }

    // Derived values read as zero when they do not fit a `Decimal`.

    /// `(current - avg) * quantity`
    pub fn pnl(&self) -> Decimal {
        self.current_price
            .checked_sub(self.avg_price)
            .and_then(|d| d.checked_mul(Decimal::from(self.quantity)))
            .unwrap_or(Decimal::ZERO)
    }

    /// `pnl / (avg * |quantity|)`, zero when the average price is zero.
    pub fn pnl_percent(&self) -> Decimal {
        let basis = Decimal::from(self.quantity)
            .abs()
            .checked_mul(self.avg_price)
            .unwrap_or(Decimal::ZERO);
        if basis.is_zero() {
            return Decimal::ZERO;
        }
        self.pnl().checked_div(basis).unwrap_or(Decimal::ZERO)
    }

    pub fn market_value(&self) -> Decimal {
        self.current_price
            .checked_mul(Decimal::from(self.quantity))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn view(&self) -> PositionView {
        PositionView {
            pnl: self.pnl(),
            pnl_percent: self.pnl_percent(),
            position: self.clone(),
        }
    }
}

/// A position plus its derived PnL, as pushed to screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    #[serde(flatten)]
    pub position: Position,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
}

// ---------------------------------------------------------------------------
// AccountSummary
// ---------------------------------------------------------------------------

/// Aggregate view over the position book. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_balance: Decimal,
    #[serde(rename = "totalPnL")]
    pub total_pnl: Decimal,
    pub positions: BTreeMap<String, PositionView>,
    pub last_update: DateTime<Utc>,
}

impl AccountSummary {
    pub fn from_positions<'a>(
        account_balance: Decimal,
        positions: impl IntoIterator<Item = &'a Position>,
    ) -> Self {
        let positions: BTreeMap<String, PositionView> = positions
            .into_iter()
            .map(|p| (p.symbol.clone(), p.view()))
            .collect();
        let total_pnl = positions
            .values()
            .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v.pnl));
        Self {
            account_balance,
            total_pnl,
            positions,
            last_update: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// BUY or SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("Order type must be BUY or SELL (got '{other}')")),
        }
    }
}

/// An order as submitted by a screen or an engine.
///
/// `order_type` stays a string on the wire so an invalid side is reported by
/// the backend's validation instead of a JSON decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: i64,
    pub price: Decimal,
    #[serde(default = "default_order_type")]
    pub order_type: String,
}

fn default_order_type() -> String {
    "BUY".to_string()
}

impl OrderRequest {
    pub fn new(symbol: impl Into<String>, quantity: i64, price: Decimal, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            price,
            order_type: side.as_str().to_string(),
        }
    }

    pub fn side(&self) -> Result<Side, String> {
        self.order_type.parse()
    }
}

/// Outcome of an order or a position-book mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub success: bool,
    pub message: String,
    pub order_id: String,
}

impl OrderResult {
    pub fn ok(message: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            order_id: order_id.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            order_id: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiState
// ---------------------------------------------------------------------------

/// Whole-screen snapshot: everything a freshly connected page needs to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub fields: BTreeMap<String, String>,
    pub tables: BTreeMap<String, TableData>,
    pub console: Vec<String>,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}
