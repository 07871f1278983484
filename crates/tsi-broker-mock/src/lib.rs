//! In-memory mock trading backend.
//!
//! A `PositionBook` stands in for a real broker: orders fill immediately at
//! the requested price, positions can be edited directly, and `nudge_prices`
//! applies one step of a bounded random walk to every mark.
//!
//! Symbols are trimmed and upper-cased on every entry point, so `"aapl"` and
//! `"AAPL"` address the same position. A position whose quantity nets to
//! zero is removed from the book.

use std::collections::BTreeMap;

use rand::Rng;
use rust_decimal::Decimal;
use tsi_schemas::{AccountSummary, LiveFlag, OrderRequest, OrderResult, Position, Side};

mod error;

pub use error::BrokerError;

/// Smallest mark the random walk will produce.
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest random-walk step, in cents.
pub const MAX_STEP_CENTS: i64 = 100;

/// Decimal places kept on a recomputed average price.
pub const AVG_PRICE_DP: u32 = 6;

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Eight upper-case hex characters.
pub fn new_order_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id.to_uppercase()
}

#[derive(Clone, Debug)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
    balance: Decimal,
}

impl PositionBook {
    pub fn new(balance: Decimal) -> Self {
        Self {
            positions: BTreeMap::new(),
            balance,
        }
    }

    /// AAPL long, GOOGL short, MSFT long, marked slightly off their entries.
    pub fn with_demo_positions(balance: Decimal) -> Self {
        let mut book = Self::new(balance);
        for (symbol, qty, avg, cur) in [
            ("AAPL", 100, Decimal::new(15025, 2), Decimal::new(15530, 2)),
            ("GOOGL", -50, Decimal::new(280000, 2), Decimal::new(279550, 2)),
            ("MSFT", 200, Decimal::new(38075, 2), Decimal::new(38520, 2)),
        ] {
            let mut p = Position::new(symbol, qty, avg);
            p.current_price = cur;
            book.positions.insert(symbol.to_string(), p);
        }
        book
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(&normalize_symbol(symbol))
    }

    /// Snapshot ordered by symbol.
    pub fn positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary::from_positions(self.balance, self.positions.values())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Fill `order` immediately at its limit price.
    ///
    /// Offsetting an existing position exactly closes it. Otherwise the
    /// average becomes `|old_qty * old_avg + signed_qty * price| / new_qty`,
    /// rounded to `AVG_PRICE_DP` places, and the mark moves to the fill
    /// price. Fills whose notional does not fit a `Decimal` are rejected
    /// before the book changes.
    pub fn place_order(&mut self, order: &OrderRequest) -> Result<OrderResult, BrokerError> {
        let symbol = normalize_symbol(&order.symbol);
        if symbol.is_empty() {
            return Err(BrokerError::InvalidArgument("Symbol is required".into()));
        }
        if order.quantity <= 0 {
            return Err(BrokerError::InvalidArgument(
                "Quantity must be greater than zero".into(),
            ));
        }
        if order.price <= Decimal::ZERO {
            return Err(BrokerError::InvalidArgument(
                "Price must be greater than zero".into(),
            ));
        }
        let side = order.side().map_err(BrokerError::InvalidArgument)?;
        let signed = match side {
            Side::Buy => order.quantity,
            Side::Sell => -order.quantity,
        };
        let fill = notional(signed, order.price)?;

        match self.positions.get_mut(&symbol) {
            Some(existing) => {
                let new_qty = existing.quantity.checked_add(signed).ok_or_else(too_large)?;
                if new_qty == 0 {
                    self.positions.remove(&symbol);
                } else {
                    let cost = notional(existing.quantity, existing.avg_price)?
                        .checked_add(fill)
                        .ok_or_else(too_large)?;
                    let avg = (cost / Decimal::from(new_qty)).abs().round_dp(AVG_PRICE_DP);
                    notional(new_qty, avg)?;
                    notional(new_qty, order.price)?;
                    existing.avg_price = avg;
                    existing.quantity = new_qty;
                    existing.current_price = order.price;
                }
            }
            None => {
                let p = Position::new(symbol.clone(), signed, order.price);
                self.positions.insert(symbol.clone(), p);
            }
        }

        Ok(OrderResult::ok(
            format!(
                "Order executed: {} {} {} @ ${:.2}",
                side, order.quantity, symbol, order.price
            ),
            new_order_id(),
        ))
    }

    // -----------------------------------------------------------------------
    // Direct edits
    // -----------------------------------------------------------------------

    /// Insert a new position. A non-positive current price defaults to the
    /// average price.
    pub fn add_position(&mut self, position: Position) -> Result<OrderResult, BrokerError> {
        let position = validated(position)?;
        if self.positions.contains_key(&position.symbol) {
            return Err(BrokerError::DuplicateSymbol(position.symbol));
        }
        let message = format!(
            "Position added successfully: {} ({} shares @ ${:.2})",
            position.symbol, position.quantity, position.avg_price
        );
        self.positions.insert(position.symbol.clone(), position);
        Ok(OrderResult::ok(message, ""))
    }

    pub fn delete_position(&mut self, symbol: &str) -> Result<Position, BrokerError> {
        let symbol = normalize_symbol(symbol);
        self.positions
            .remove(&symbol)
            .ok_or(BrokerError::NotFound(symbol))
    }

    /// Overwrite quantity, average, flags and (when positive) the mark of
    /// an existing position.
    pub fn update_position(
        &mut self,
        symbol: &str,
        update: Position,
    ) -> Result<OrderResult, BrokerError> {
        let symbol = normalize_symbol(symbol);
        let Some(existing) = self.positions.get_mut(&symbol) else {
            return Err(BrokerError::NotFound(symbol));
        };
        if update.quantity == 0 {
            return Err(BrokerError::InvalidArgument(
                "Quantity cannot be zero".into(),
            ));
        }
        if update.avg_price <= Decimal::ZERO {
            return Err(BrokerError::InvalidArgument(
                "Average price must be greater than zero".into(),
            ));
        }
        let mark = if update.current_price > Decimal::ZERO {
            update.current_price
        } else {
            existing.current_price
        };
        notional(update.quantity, update.avg_price)?;
        notional(update.quantity, mark)?;
        existing.quantity = update.quantity;
        existing.avg_price = update.avg_price;
        existing.current_price = mark;
        existing.live = update.live;
        existing.flatten = update.flatten;
        Ok(OrderResult::ok(
            format!(
                "Position updated successfully: {} ({} shares @ ${:.2})",
                symbol, existing.quantity, existing.avg_price
            ),
            "",
        ))
    }

    pub fn toggle_live(&mut self, symbol: &str) -> Result<LiveFlag, BrokerError> {
        let p = self.position_mut(symbol)?;
        p.live = p.live.toggled();
        Ok(p.live)
    }

    pub fn toggle_flatten(&mut self, symbol: &str) -> Result<bool, BrokerError> {
        let p = self.position_mut(symbol)?;
        p.flatten = !p.flatten;
        Ok(p.flatten)
    }

    /// Replace the whole book. Entries with no symbol, zero quantity or an
    /// oversized notional are dropped; a later duplicate symbol wins.
    /// Returns the resulting size.
    pub fn replace_all(&mut self, positions: impl IntoIterator<Item = Position>) -> usize {
        self.positions.clear();
        for mut p in positions {
            p.symbol = normalize_symbol(&p.symbol);
            if p.symbol.is_empty() || p.quantity == 0 {
                continue;
            }
            if p.current_price <= Decimal::ZERO {
                p.current_price = p.avg_price;
            }
            if notional(p.quantity, p.avg_price).is_err()
                || notional(p.quantity, p.current_price).is_err()
            {
                continue;
            }
            self.positions.insert(p.symbol.clone(), p);
        }
        self.positions.len()
    }

    fn position_mut(&mut self, symbol: &str) -> Result<&mut Position, BrokerError> {
        let symbol = normalize_symbol(symbol);
        match self.positions.get_mut(&symbol) {
            Some(p) => Ok(p),
            None => Err(BrokerError::NotFound(symbol)),
        }
    }

    // -----------------------------------------------------------------------
    // Market simulation
    // -----------------------------------------------------------------------

    /// One random-walk step: every mark moves by a uniform whole-cent delta
    /// in `[-1.00, +1.00]`, is rounded to cents and floored at `0.01`.
    pub fn nudge_prices<R: Rng>(&mut self, rng: &mut R) {
        for p in self.positions.values_mut() {
            let delta = Decimal::new(rng.gen_range(-MAX_STEP_CENTS..=MAX_STEP_CENTS), 2);
            let Some(moved) = p.current_price.checked_add(delta) else {
                continue;
            };
            let moved = moved.round_dp(2).max(MIN_PRICE);
            if notional(p.quantity, moved).is_ok() {
                p.current_price = moved;
            }
        }
    }
}

fn validated(mut p: Position) -> Result<Position, BrokerError> {
    p.symbol = normalize_symbol(&p.symbol);
    if p.symbol.is_empty() {
        return Err(BrokerError::InvalidArgument("Symbol is required".into()));
    }
    if p.quantity == 0 {
        return Err(BrokerError::InvalidArgument(
            "Quantity cannot be zero".into(),
        ));
    }
    if p.avg_price <= Decimal::ZERO {
        return Err(BrokerError::InvalidArgument(
            "Average price must be greater than zero".into(),
        ));
    }
    if p.current_price <= Decimal::ZERO {
        p.current_price = p.avg_price;
    }
    notional(p.quantity, p.avg_price)?;
    notional(p.quantity, p.current_price)?;
    Ok(p)
}

/// `quantity * price`, rejected when it does not fit a `Decimal`.
fn notional(quantity: i64, price: Decimal) -> Result<Decimal, BrokerError> {
    Decimal::from(quantity)
        .checked_mul(price)
        .ok_or_else(too_large)
}

fn too_large() -> BrokerError {
    BrokerError::InvalidArgument("Quantity times price is too large".into())
}
