//! tsi-screen
//!
//! In-memory state behind a remote trading screen: named string fields,
//! dynamically-schemed tables, the console feed and the structured UI event
//! queue, plus the mapping between the position book and the positions table.
//!
//! Every store here is a plain owned struct with `&mut self` mutators. Callers
//! that share a store across tasks wrap it in exactly one lock (the daemon
//! uses `Arc<tokio::sync::RwLock<_>>`); nothing here is a process-wide static.

pub mod console;
pub mod events;
pub mod fields;
pub mod positions_table;
pub mod tables;

pub use console::ConsoleLog;
pub use events::EventLog;
pub use fields::{FieldError, FieldStore};
pub use positions_table::{
    positions_table, positions_to_table, row_to_position, table_to_positions, PositionRow,
    POSITIONS_TABLE_ID,
};
pub use tables::{OperationOutcome, TableError, TableStore};
