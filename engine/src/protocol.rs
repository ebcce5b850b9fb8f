//! The UCI conversation as a plain state machine.
//!
//! `Protocol` never touches a pipe. Callers feed it every line the engine
//! prints, in order, and write out the command lines it hands back.

use std::fmt;

use chess::Move;

use crate::config::EngineOption;
use crate::error::EngineError;
use crate::uci::{parse_uci_message, UciError, UciMessage};
use crate::EngineInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Uninitialized,
    HandshakeSent,
    Ready,
    SearchInFlight,
    Terminated,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolState::Uninitialized => "uninitialized",
            ProtocolState::HandshakeSent => "handshake sent",
            ProtocolState::Ready => "ready",
            ProtocolState::SearchInFlight => "searching",
            ProtocolState::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// What a line from the engine means for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Handshake finished.
    Ready,
    /// Result of the search in flight.
    BestMove(Move),
    /// The search in flight ended with an unreadable `bestmove`.
    SearchFailed(UciError),
    Info(EngineInfo),
    /// Reply to a search that was abandoned earlier.
    StaleBestMove,
    Ignored,
}

#[derive(Debug)]
pub struct Protocol {
    state: ProtocolState,
    /// `bestmove` lines still owed for abandoned searches.
    stale_replies: u32,
    engine_name: Option<String>,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol {
    pub fn new() -> Self {
        Self {
            state: ProtocolState::Uninitialized,
            stale_replies: 0,
            engine_name: None,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Name reported by `id name` during the handshake.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    /// Commands that open the conversation: `uci`, the options, then `isready`.
    pub fn handshake(&mut self, options: &[EngineOption]) -> Result<Vec<String>, EngineError> {
        self.expect(ProtocolState::Uninitialized)?;

        let mut commands = Vec::with_capacity(options.len() + 2);
        commands.push("uci".to_string());
        commands.extend(options.iter().map(EngineOption::to_command));
        commands.push("isready".to_string());

        self.state = ProtocolState::HandshakeSent;
        Ok(commands)
    }

    /// Commands that start a fixed-depth search of `fen`.
    pub fn begin_search(&mut self, fen: &str, depth: u8) -> Result<Vec<String>, EngineError> {
        self.expect(ProtocolState::Ready)?;
        self.state = ProtocolState::SearchInFlight;
        Ok(vec![
            format!("position fen {}", fen),
            format!("go depth {}", depth),
        ])
    }

    /// Give up on the search in flight.
    ///
    /// Returns the `stop` command to send, or `None` if nothing was running.
    /// The engine still owes one `bestmove` for the abandoned `go`; that line
    /// is swallowed when it arrives.
    pub fn abandon_search(&mut self) -> Option<String> {
        if self.state != ProtocolState::SearchInFlight {
            return None;
        }
        self.stale_replies += 1;
        self.state = ProtocolState::Ready;
        Some("stop".to_string())
    }

    /// The `quit` command, unless the conversation is already over.
    pub fn terminate(&mut self) -> Option<String> {
        if self.state == ProtocolState::Terminated {
            return None;
        }
        self.state = ProtocolState::Terminated;
        Some("quit".to_string())
    }

    /// The engine's output ended.
    pub fn mark_closed(&mut self) {
        self.state = ProtocolState::Terminated;
    }

    /// Classify one line of engine output.
    pub fn on_line(&mut self, line: &str) -> Inbound {
        let line = line.trim();
        if self.state == ProtocolState::Terminated {
            return Inbound::Ignored;
        }

        if line.split_whitespace().next() == Some("bestmove") {
            return self.on_best_move(line);
        }

        match parse_uci_message(line) {
            Ok(UciMessage::ReadyOk) if self.state == ProtocolState::HandshakeSent => {
                self.state = ProtocolState::Ready;
                Inbound::Ready
            }
            Ok(UciMessage::Id { name, value }) => {
                if name == "name" {
                    self.engine_name = Some(value);
                }
                Inbound::Ignored
            }
            Ok(UciMessage::Info(info)) => Inbound::Info(info),
            Ok(_) | Err(_) => Inbound::Ignored,
        }
    }

    fn on_best_move(&mut self, line: &str) -> Inbound {
        if self.stale_replies > 0 {
            self.stale_replies -= 1;
            return Inbound::StaleBestMove;
        }
        if self.state != ProtocolState::SearchInFlight {
            tracing::warn!("Unsolicited bestmove while {}: {}", self.state, line);
            return Inbound::Ignored;
        }

        self.state = ProtocolState::Ready;
        match parse_uci_message(line) {
            Ok(UciMessage::BestMove { mv, .. }) => Inbound::BestMove(mv),
            Ok(_) => Inbound::SearchFailed(UciError::MalformedMessage(line.to_string())),
            Err(e) => Inbound::SearchFailed(e),
        }
    }

    fn expect(&self, expected: ProtocolState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::ProtocolState {
                expected,
                actual: self.state,
            })
        }
    }
}
