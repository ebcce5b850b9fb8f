//! UCI engine bridge.
//!
//! [`protocol::Protocol`] tracks the conversation with a UCI engine without
//! doing any I/O. [`EngineBridge`] drives it over a child process (or any
//! async byte stream) from a single worker task.

pub mod bridge;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod protocol;
pub mod stockfish;
pub mod uci;

pub use bridge::{EngineBridge, PendingSearch};
pub use config::{EngineConfig, EngineOption};
pub use error::EngineError;
pub use protocol::{Inbound, Protocol, ProtocolState};
pub use uci::{UciError, UciMessage};

use chess::Move;

/// Events broadcast by the bridge to any number of observers
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Info(EngineInfo),
    RawUciMessage {
        direction: UciMessageDirection,
        message: String,
    },
    /// The engine is gone; no further events follow.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciMessageDirection {
    ToEngine,
    FromEngine,
}

/// Engine analysis information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u8>,
    pub currmove: Option<Move>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
    pub string: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i8), // Negative for being mated
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::Mate(n) => write!(f, "#{}", n),
        }
    }
}
