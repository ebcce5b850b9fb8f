use chess::{PieceColor, PieceKind};

/// Who controls each side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// The engine plays whichever side the human does not.
    HumanVsEngine { human_side: PieceColor },
    /// Both sides are driven through `make_move`; no engine involved.
    HumanVsHuman,
}

impl Default for GameMode {
    fn default() -> Self {
        GameMode::HumanVsEngine {
            human_side: PieceColor::White,
        }
    }
}

impl GameMode {
    pub fn engine_side(&self) -> Option<PieceColor> {
        match self {
            GameMode::HumanVsEngine { human_side } => Some(human_side.opposite()),
            GameMode::HumanVsHuman => None,
        }
    }

    pub fn human_side(&self) -> Option<PieceColor> {
        match self {
            GameMode::HumanVsEngine { human_side } => Some(*human_side),
            GameMode::HumanVsHuman => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub game_mode: GameMode,
    /// Plies the engine searches per move.
    pub search_depth: u8,
    /// Piece a pawn becomes when a move reaches the last rank without naming one.
    pub default_promotion: PieceKind,
    /// Extra attempts after the engine answers with an unreadable move.
    pub max_search_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_mode: GameMode::default(),
            search_depth: 15,
            default_promotion: PieceKind::Queen,
            max_search_retries: 1,
        }
    }
}
