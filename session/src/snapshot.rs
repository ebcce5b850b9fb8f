use std::collections::BTreeMap;

use chess::GameStatus;
use serde::Serialize;

/// Complete, immutable snapshot of session state.
/// Sent to clients on every state change and on subscribe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    /// Bumped by every reset.
    pub generation: u64,
    pub fen: String,
    pub side_to_move: String,
    /// `None` when both sides are human.
    pub human_side: Option<String>,
    pub status: StatusView,
    pub is_terminal: bool,
    pub in_check: bool,
    /// Origin square to legal destination squares for the side to move.
    pub destinations: BTreeMap<String, Vec<String>>,
    pub move_count: usize,
    pub history: Vec<MoveRecord>,
    pub last_move: Option<(String, String)>,
    pub engine_thinking: bool,
    /// Set once the engine has failed; play stays frozen until reset.
    pub engine_error: Option<String>,
}

/// A single move in the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub piece: String,
    pub captured: Option<String>,
    pub promotion: Option<String>,
    pub san: String,
    pub fen_after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusView {
    Ongoing,
    Checkmate { winner: String },
    Stalemate,
    Draw { reason: String },
}

impl From<GameStatus> for StatusView {
    fn from(status: GameStatus) -> Self {
        match status {
            GameStatus::Ongoing => StatusView::Ongoing,
            GameStatus::Checkmate { winner } => StatusView::Checkmate {
                winner: winner.as_str().to_string(),
            },
            GameStatus::Stalemate => StatusView::Stalemate,
            GameStatus::Draw(reason) => StatusView::Draw {
                reason: reason.to_string(),
            },
        }
    }
}
