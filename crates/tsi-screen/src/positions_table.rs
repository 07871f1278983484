//! Mapping between the position book and the `positions_table` grid.
//!
//! The book is the source of truth for the fixed columns. Every other column
//! is opaque pass-through data owned by the screen: it is carried from row to
//! row by symbol and never read by trading logic.

use std::collections::{BTreeMap, HashMap};

use chrono::Local;
use rust_decimal::Decimal;
use tsi_schemas::{CellValue, ColumnDefinition, DataType, LiveFlag, Position, Row, TableData};

pub const POSITIONS_TABLE_ID: &str = "positions_table";
pub const POSITIONS_TABLE_NAME: &str = "Trading Positions";

/// Columns derived from (or stored in) a `Position`. Everything else is custom.
pub const FIXED_COLUMNS: [&str; 10] = [
    "symbol",
    "quantity",
    "avgPrice",
    "currentPrice",
    "marketValue",
    "unrealizedPL",
    "unrealizedPLPercent",
    "live",
    "flatten",
    "lastUpdate",
];

pub fn positions_columns() -> Vec<ColumnDefinition> {
    use DataType::{Boolean, Currency, Date, Number};
    let text = DataType::String;
    vec![
        ColumnDefinition::new("symbol", "Symbol", text, true),
        ColumnDefinition::new("quantity", "Quantity", Number, true),
        ColumnDefinition::new("avgPrice", "Avg Price", Currency, true).with_format("C2"),
        ColumnDefinition::new("currentPrice", "Current Price", Currency, false).with_format("C2"),
        ColumnDefinition::new("marketValue", "Market Value", Currency, false).with_format("C2"),
        ColumnDefinition::new("unrealizedPL", "Unrealized P&L", Currency, false).with_format("C2"),
        ColumnDefinition::new("unrealizedPLPercent", "P&L %", Number, false).with_format("P2"),
        ColumnDefinition::new("live", "Live", text, true),
        ColumnDefinition::new("flatten", "Flatten", Boolean, true),
        ColumnDefinition::new("strategy", "Strategy", text, true),
        ColumnDefinition::new("account", "Account", text, true),
        ColumnDefinition::new("notes", "Notes", text, true),
        ColumnDefinition::new("stopLoss", "Stop Loss", Currency, true).with_format("C2"),
        ColumnDefinition::new("takeProfit", "Take Profit", Currency, true).with_format("C2"),
        ColumnDefinition::new("orderType", "Order Type", text, true),
        ColumnDefinition::new("lastUpdate", "Last Update", Date, false).with_format("HH:mm:ss"),
    ]
}

/// The empty default positions table.
pub fn positions_table() -> TableData {
    let mut table = TableData::new(POSITIONS_TABLE_ID, POSITIONS_TABLE_NAME);
    table.columns = positions_columns();
    table.settings.theme = "trading".to_string();
    table
}

pub fn position_to_row(position: &Position) -> Row {
    let mut cells = BTreeMap::new();
    cells.insert("symbol".to_string(), CellValue::from(position.symbol.as_str()));
    cells.insert("quantity".to_string(), CellValue::from(position.quantity));
    cells.insert("avgPrice".to_string(), CellValue::from(position.avg_price));
    cells.insert("currentPrice".to_string(), CellValue::from(position.current_price));
    cells.insert("marketValue".to_string(), CellValue::from(position.market_value()));
    cells.insert("unrealizedPL".to_string(), CellValue::from(position.pnl()));
    cells.insert(
        "unrealizedPLPercent".to_string(),
        CellValue::from(position.pnl_percent()),
    );
    cells.insert("live".to_string(), CellValue::from(position.live.as_str()));
    cells.insert("flatten".to_string(), CellValue::from(position.flatten));
    cells.insert(
        "lastUpdate".to_string(),
        CellValue::from(Local::now().format("%H:%M:%S").to_string()),
    );
    Row::new(cells)
}

/// Build the grid for `positions`.
///
/// With a `template`, its name, columns and settings are kept, and each
/// existing row's id and custom cells follow its symbol into the new row.
pub fn positions_to_table<'a>(
    positions: impl IntoIterator<Item = &'a Position>,
    template: Option<&TableData>,
) -> TableData {
    let mut table = match template {
        Some(t) => TableData {
            rows: Vec::new(),
            ..t.clone()
        },
        None => positions_table(),
    };

    let carried: HashMap<String, &Row> = template
        .map(|t| {
            t.rows
                .iter()
                .filter_map(|r| {
                    let sym = r.get("symbol")?.as_text();
                    (!sym.is_empty()).then_some((sym, r))
                })
                .collect()
        })
        .unwrap_or_default();

    for position in positions {
        let mut row = position_to_row(position);
        if let Some(prev) = carried.get(&position.symbol) {
            if !prev.row_id.is_empty() {
                row.row_id = prev.row_id.clone();
            }
            for (k, v) in &prev.cells {
                if !is_fixed(k) {
                    row.cells.insert(k.clone(), v.clone());
                }
            }
        }
        table.rows.push(row);
    }
    table.touch();
    table
}

pub fn is_fixed(column_id: &str) -> bool {
    FIXED_COLUMNS.contains(&column_id)
}

/// A position read back from a grid row, with the row's custom cells.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub position: Position,
    pub custom: BTreeMap<String, CellValue>,
}

/// Absent or unreadable numbers read as zero, absent strings as empty.
pub fn row_to_position(row: &Row) -> PositionRow {
    let num = |k: &str| {
        row.get(k)
            .and_then(CellValue::as_decimal)
            .unwrap_or(Decimal::ZERO)
    };
    let flag = |k: &str| row.get(k).and_then(CellValue::as_bool).unwrap_or(false);

    let position = Position {
        symbol: row
            .get("symbol")
            .map(|c| c.as_text().trim().to_uppercase())
            .unwrap_or_default(),
        quantity: row.get("quantity").and_then(CellValue::as_i64).unwrap_or(0),
        avg_price: num("avgPrice"),
        current_price: num("currentPrice"),
        live: LiveFlag::from(flag("live")),
        flatten: flag("flatten"),
    };
    let custom = row
        .cells
        .iter()
        .filter(|(k, _)| !is_fixed(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    PositionRow { position, custom }
}

/// Positions held by `table`, skipping rows with no symbol or zero quantity.
pub fn table_to_positions(table: &TableData) -> Vec<Position> {
    table
        .rows
        .iter()
        .map(|r| row_to_position(r).position)
        .filter(|p| !p.symbol.is_empty() && p.quantity != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn book() -> Vec<Position> {
        let mut msft = Position::new("MSFT", 200, dec("380.75"));
        msft.current_price = dec("385.20");
        msft.live = LiveFlag::On;
        let mut googl = Position::new("GOOGL", -50, dec("2800.00"));
        googl.flatten = true;
        vec![msft, googl]
    }

    #[test]
    fn default_table_has_sixteen_columns() {
        let t = positions_table();
        assert_eq!(t.columns.len(), 16);
        assert_eq!(t.settings.theme, "trading");
        assert!(t.rows.is_empty());
    }

    #[test]
    fn row_carries_derived_columns() {
        let row = position_to_row(&book()[0]);
        assert_eq!(row.get("marketValue"), Some(&CellValue::Number(dec("77040.00"))));
        assert_eq!(row.get("unrealizedPL"), Some(&CellValue::Number(dec("890.00"))));
        assert_eq!(row.get("live"), Some(&CellValue::from("ON")));
        assert!(!row.row_id.is_empty());
    }

    #[test]
    fn custom_cells_and_row_ids_follow_the_symbol() {
        let positions = book();
        let mut first = positions_to_table(&positions, None);
        first.rows[1].set("notes", "hedge");
        let id = first.rows[1].row_id.clone();

        let second = positions_to_table(positions.iter().rev(), Some(&first));
        assert_eq!(second.rows[0].get("notes"), Some(&CellValue::from("hedge")));
        assert_eq!(second.rows[0].row_id, id);
        assert_eq!(second.rows[1].get("notes"), None);
    }

    #[test]
    fn missing_cells_default_to_zero_and_empty() {
        let back = row_to_position(&Row::default());
        assert_eq!(back.position.symbol, "");
        assert_eq!(back.position.quantity, 0);
        assert_eq!(back.position.avg_price, Decimal::ZERO);
        assert!(back.custom.is_empty());
    }

    #[test]
    fn unknown_columns_are_pass_through() {
        let mut row = position_to_row(&book()[0]);
        row.set("strategy", "momentum");
        let back = row_to_position(&row);
        assert_eq!(back.custom.get("strategy"), Some(&CellValue::from("momentum")));
        assert!(!back.custom.contains_key("marketValue"));
    }
}
