pub mod parser;

pub use parser::{parse_uci_message, parse_uci_move, UciMessage};

use chess::MoveParseError;

/// Errors from parsing a single line of engine output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciError {
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
    #[error("Invalid move {0}: {1}")]
    InvalidMove(String, #[source] MoveParseError),
}
