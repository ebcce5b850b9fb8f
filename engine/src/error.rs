use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::ProtocolState;
use crate::uci::UciError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine is {actual}, expected {expected}")]
    ProtocolState {
        expected: ProtocolState,
        actual: ProtocolState,
    },
    #[error("malformed engine reply: {0}")]
    ProtocolParse(String),
    #[error("engine did not reply within {0:?}")]
    ProtocolTimeout(Duration),
    #[error("search was cancelled")]
    Cancelled,
    #[error("engine connection closed")]
    Closed,
    #[error("engine did not complete the UCI handshake in time")]
    HandshakeTimeout,
    #[error("Stockfish not found")]
    NotFound,
    #[error("failed to spawn engine at {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UciError> for EngineError {
    fn from(err: UciError) -> Self {
        EngineError::ProtocolParse(err.to_string())
    }
}
