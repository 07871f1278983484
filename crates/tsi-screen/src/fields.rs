//! Named string fields (`GetGUIField` / `PutGUIField`).
//!
//! Reads of a name that was never written return `""`. Writes create the key
//! on first use. Concurrent writers race last-writer-wins; the store has no
//! versioning.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::Local;
use rust_decimal::Decimal;
use tsi_schemas::{OrderRequest, Side};

pub const SYMBOL_INPUT: &str = "symbol_input";
pub const QUANTITY_INPUT: &str = "quantity_input";
pub const PRICE_INPUT: &str = "price_input";
pub const ORDER_TYPE: &str = "order_type";
pub const STATUS_DISPLAY: &str = "status_display";
pub const LAST_COMMAND: &str = "last_command";
pub const LAST_UPDATED: &str = "last_updated";
pub const ACCOUNT_BALANCE: &str = "account_balance";
pub const TOTAL_PNL: &str = "total_pnl";
pub const CONNECTION_STATUS: &str = "connection_status";

/// The order-entry inputs cleared after a fill or by `clear_fields`.
pub const ORDER_INPUTS: [&str; 3] = [SYMBOL_INPUT, QUANTITY_INPUT, PRICE_INPUT];

/// Validation failure while building an order from the entry fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Invalid(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Invalid(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for FieldError {}

#[derive(Debug, Clone)]
pub struct FieldStore {
    fields: HashMap<String, String>,
}

impl Default for FieldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldStore {
    /// A store seeded with the default screen fields.
    pub fn new() -> Self {
        let mut fields = HashMap::new();
        for (k, v) in [
            (SYMBOL_INPUT, ""),
            (QUANTITY_INPUT, ""),
            (PRICE_INPUT, ""),
            (ORDER_TYPE, "BUY"),
            (STATUS_DISPLAY, "System Ready"),
            (LAST_COMMAND, "None"),
            (ACCOUNT_BALANCE, "0.00"),
            (TOTAL_PNL, "0.00"),
            (CONNECTION_STATUS, "Connected"),
        ] {
            fields.insert(k.to_string(), v.to_string());
        }
        fields.insert(LAST_UPDATED.to_string(), clock_now());
        Self { fields }
    }

    pub fn get(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Clearing writes the empty string; the key keeps existing.
    pub fn clear(&mut self, name: &str) {
        self.set(name, "");
    }

    pub fn clear_many(&mut self, names: &[&str]) {
        for name in names {
            self.clear(name);
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Sorted snapshot of every field.
    pub fn get_all(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Write `status_display` and stamp `last_updated`.
    pub fn update_status(&mut self, message: impl Into<String>) {
        self.set(STATUS_DISPLAY, message);
        self.set(LAST_UPDATED, clock_now());
    }

    pub fn update_last_command(&mut self, command: impl Into<String>) {
        self.set(LAST_COMMAND, command);
    }

    /// Clear the order-entry inputs and reset the side to BUY.
    pub fn reset_order_entry(&mut self) {
        self.clear_many(&ORDER_INPUTS);
        self.set(ORDER_TYPE, Side::Buy.as_str());
    }

    /// Build an order from the current entry fields.
    pub fn order_from_fields(&self) -> Result<OrderRequest, FieldError> {
        let symbol = self.get(SYMBOL_INPUT).trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(FieldError::Invalid("Symbol is required".to_string()));
        }

        let quantity = match self.get(QUANTITY_INPUT).trim().parse::<i64>() {
            Ok(q) if q > 0 => q,
            _ => return Err(FieldError::Invalid("Valid quantity is required".to_string())),
        };

        let price = match self.get(PRICE_INPUT).trim().parse::<Decimal>() {
            Ok(p) if p > Decimal::ZERO => p,
            _ => return Err(FieldError::Invalid("Valid price is required".to_string())),
        };

        let side = self
            .get(ORDER_TYPE)
            .parse::<Side>()
            .map_err(|_| FieldError::Invalid("Order type must be BUY or SELL".to_string()))?;

        Ok(OrderRequest::new(symbol, quantity, price, side))
    }
}

fn clock_now() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_seeded() {
        let f = FieldStore::new();
        assert_eq!(f.get(ORDER_TYPE), "BUY");
        assert_eq!(f.get(STATUS_DISPLAY), "System Ready");
        assert_eq!(f.get(CONNECTION_STATUS), "Connected");
        assert!(f.exists(SYMBOL_INPUT));
        assert_eq!(f.len(), 10);
    }

    #[test]
    fn unknown_field_reads_empty_and_write_creates() {
        let mut f = FieldStore::new();
        assert_eq!(f.get("never_written"), "");
        assert!(!f.exists("never_written"));
        f.set("never_written", "x");
        assert_eq!(f.get("never_written"), "x");
    }

    #[test]
    fn clear_many_keeps_keys() {
        let mut f = FieldStore::new();
        f.set(SYMBOL_INPUT, "AAPL");
        f.set(PRICE_INPUT, "1.5");
        f.clear_many(&[SYMBOL_INPUT, PRICE_INPUT]);
        assert_eq!(f.get(SYMBOL_INPUT), "");
        assert!(f.exists(PRICE_INPUT));
    }

    #[test]
    fn order_from_fields_happy_path() {
        let mut f = FieldStore::new();
        f.set(SYMBOL_INPUT, " msft ");
        f.set(QUANTITY_INPUT, "10");
        f.set(PRICE_INPUT, "380.75");
        f.set(ORDER_TYPE, "sell");
        let o = f.order_from_fields().unwrap();
        assert_eq!(o.symbol, "MSFT");
        assert_eq!(o.quantity, 10);
        assert_eq!(o.side().unwrap(), Side::Sell);
    }

    #[test]
    fn order_from_fields_reports_first_problem() {
        let mut f = FieldStore::new();
        assert_eq!(
            f.order_from_fields().unwrap_err().to_string(),
            "Symbol is required"
        );
        f.set(SYMBOL_INPUT, "AAPL");
        f.set(QUANTITY_INPUT, "0");
        assert_eq!(
            f.order_from_fields().unwrap_err().to_string(),
            "Valid quantity is required"
        );
        f.set(QUANTITY_INPUT, "5");
        f.set(PRICE_INPUT, "-1");
        assert_eq!(
            f.order_from_fields().unwrap_err().to_string(),
            "Valid price is required"
        );
        f.set(PRICE_INPUT, "10");
        f.set(ORDER_TYPE, "HOLD");
        assert_eq!(
            f.order_from_fields().unwrap_err().to_string(),
            "Order type must be BUY or SELL"
        );
    }

    #[test]
    fn status_helpers_write_their_fields() {
        let mut f = FieldStore::new();
        f.update_status("busy");
        f.update_last_command("CLEAR_FIELDS");
        assert_eq!(f.get(STATUS_DISPLAY), "busy");
        assert_eq!(f.get(LAST_COMMAND), "CLEAR_FIELDS");
        assert_eq!(f.get(LAST_UPDATED).len(), 8);
    }
}
