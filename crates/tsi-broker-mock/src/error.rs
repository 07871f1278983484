use std::fmt;

/// Position-book failures. Each maps to one client-facing error class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Missing or malformed input (empty symbol, non-positive quantity/price, bad side).
    InvalidArgument(String),
    /// No position for the symbol.
    NotFound(String),
    /// `add_position` for a symbol already in the book.
    DuplicateSymbol(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::InvalidArgument(msg) => f.write_str(msg),
            BrokerError::NotFound(sym) => write!(f, "Position for {sym} not found"),
            BrokerError::DuplicateSymbol(sym) => write!(
                f,
                "Position for {sym} already exists. Use UpdateRow to modify it."
            ),
        }
    }
}

impl std::error::Error for BrokerError {}
