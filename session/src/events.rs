use engine::{EngineInfo, UciMessageDirection};
use serde::Serialize;

use super::snapshot::SessionSnapshot;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SessionEvent {
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    /// Transient engine analysis (frequent, lightweight).
    EngineThinking(EngineInfo),
    /// UCI debug log entry.
    UciMessage(UciLogEntry),
    /// Error notification.
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct UciLogEntry {
    pub direction: UciDirection,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UciDirection {
    ToEngine,
    FromEngine,
}

impl From<UciMessageDirection> for UciDirection {
    fn from(direction: UciMessageDirection) -> Self {
        match direction {
            UciMessageDirection::ToEngine => UciDirection::ToEngine,
            UciMessageDirection::FromEngine => UciDirection::FromEngine,
        }
    }
}
