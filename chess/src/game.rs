use std::fmt;

use crate::fen::FenError;
use crate::moves::Move;
use crate::position::Position;
use crate::san::format_san;
use crate::types::{Piece, PieceColor, PieceKind};

/// A game in progress: the current position plus every move that led to it.
#[derive(Debug, Clone)]
pub struct Game {
    position: Position,
    history: Vec<HistoryEntry>,
}

/// A played move together with the position it was played from.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub mv: Move,
    pub piece: Piece,
    pub captured: Option<PieceKind>,
    pub san: String,
    /// FEN after this move.
    pub fen: String,
    pub before: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    FiftyMoveRule,
    InsufficientMaterial,
    ThreefoldRepetition,
}

/// Outcome of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: PieceColor },
    Stalemate,
    Draw(DrawReason),
}

impl GameStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DrawReason::FiftyMoveRule => "fifty-move rule",
            DrawReason::InsufficientMaterial => "insufficient material",
            DrawReason::ThreefoldRepetition => "threefold repetition",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Ongoing => write!(f, "ongoing"),
            GameStatus::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            GameStatus::Stalemate => write!(f, "stalemate"),
            GameStatus::Draw(reason) => write!(f, "draw by {}", reason),
        }
    }
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self {
            position: Position::starting(),
            history: Vec::new(),
        }
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position = Position::from_fen(fen)?;
        Ok(Self {
            position,
            history: Vec::new(),
        })
    }

    /// Get the current board position
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Get the move history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|entry| entry.mv)
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.position.side_to_move()
    }

    /// Legal moves of the piece standing on `from`.
    pub fn legal_moves_from(&self, from: crate::Square) -> Vec<Move> {
        self.position.legal_moves_from(from)
    }

    /// All legal moves for the side to move.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.position.legal_moves()
    }

    /// Play a legal move.
    ///
    /// On failure nothing changes and the caller gets `GameError::IllegalMove`.
    pub fn apply(&mut self, mv: Move) -> Result<&Position, GameError> {
        if !self.position.is_legal(mv) {
            return Err(GameError::IllegalMove(mv));
        }
        let piece = self
            .position
            .piece_at(mv.from)
            .ok_or(GameError::IllegalMove(mv))?;

        let flags = self.position.move_flags(mv);
        let captured = if flags.en_passant {
            Some(PieceKind::Pawn)
        } else {
            self.position.piece_at(mv.to).map(|p| p.kind)
        };
        let san = format_san(&self.position, mv);

        let next = self.position.play_unchecked(mv);
        let before = std::mem::replace(&mut self.position, next);

        self.history.push(HistoryEntry {
            mv,
            piece,
            captured,
            san,
            fen: self.position.to_fen(),
            before,
        });

        Ok(&self.position)
    }

    /// Back to the standard starting position with an empty history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && !self.position.has_legal_moves()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && !self.position.has_legal_moves()
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.position.halfmove_clock() >= 100
    }

    pub fn is_insufficient_material(&self) -> bool {
        self.position.is_insufficient_material()
    }

    /// How many times the current position has occurred, counting itself.
    ///
    /// Only positions since the last capture or pawn move can repeat.
    pub fn repetition_count(&self) -> usize {
        let key = self.position.repetition_key();
        let earlier = self
            .history
            .iter()
            .rev()
            .take(self.position.halfmove_clock() as usize)
            .filter(|entry| entry.before.repetition_key() == key)
            .count();
        earlier + 1
    }

    pub fn is_threefold_repetition(&self) -> bool {
        self.repetition_count() >= 3
    }

    /// Fifty-move rule, insufficient material or threefold repetition.
    pub fn is_draw(&self) -> bool {
        self.draw_reason().is_some()
    }

    pub fn draw_reason(&self) -> Option<DrawReason> {
        if self.is_fifty_move_draw() {
            Some(DrawReason::FiftyMoveRule)
        } else if self.is_insufficient_material() {
            Some(DrawReason::InsufficientMaterial)
        } else if self.is_threefold_repetition() {
            Some(DrawReason::ThreefoldRepetition)
        } else {
            None
        }
    }

    /// Get the current game status
    pub fn status(&self) -> GameStatus {
        if !self.position.has_legal_moves() {
            return if self.is_check() {
                GameStatus::Checkmate {
                    winner: self.side_to_move().opposite(),
                }
            } else {
                GameStatus::Stalemate
            };
        }
        match self.draw_reason() {
            Some(reason) => GameStatus::Draw(reason),
            None => GameStatus::Ongoing,
        }
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        self.position.to_fen()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(Move),
    #[error("FEN parse error: {0}")]
    Fen(#[from] FenError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(game: &mut Game, moves: &[&str]) {
        for uci in moves {
            game.apply(Move::from_uci(uci).unwrap())
                .unwrap_or_else(|e| panic!("{uci}: {e}"));
        }
    }

    #[test]
    fn test_illegal_move_leaves_state_unchanged() {
        let mut game = Game::new();
        let before = game.to_fen();
        let err = game.apply(Move::from_uci("e2e5").unwrap()).unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)));
        assert_eq!(game.to_fen(), before);
        assert!(game.history().is_empty());
    }

    #[test]
    fn test_history_records_san_and_capture() {
        let mut game = Game::new();
        play(&mut game, &["e2e4", "d7d5", "e4d5"]);
        let last = game.history().last().unwrap();
        assert_eq!(last.san, "exd5");
        assert_eq!(last.captured, Some(PieceKind::Pawn));
        assert_eq!(last.fen, game.to_fen());
        assert_eq!(game.last_move(), Some(Move::from_uci("e4d5").unwrap()));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut game = Game::new();
        play(&mut game, &["e2e4", "e7e5"]);
        game.reset();
        assert!(game.history().is_empty());
        assert_eq!(game.to_fen(), crate::position::START_FEN);
    }

    #[test]
    fn test_threefold_repetition() {
        let mut game = Game::new();
        play(
            &mut game,
            &["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1"],
        );
        assert_eq!(game.repetition_count(), 2);
        assert!(!game.is_draw());
        play(&mut game, &["f6g8"]);
        assert_eq!(game.repetition_count(), 3);
        assert_eq!(
            game.status(),
            GameStatus::Draw(DrawReason::ThreefoldRepetition)
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let game = Game::from_fen("4k3/8/8/8/8/8/R7/4K3 b - - 100 80").unwrap();
        assert!(game.is_fifty_move_draw());
        assert_eq!(game.status(), GameStatus::Draw(DrawReason::FiftyMoveRule));
    }

    #[test]
    fn test_clocks_at_their_limit_keep_counting_safely() {
        let mut game = Game::from_fen("4k3/8/8/8/8/8/8/4K2R w - - 100000 100000").unwrap();
        play(&mut game, &["h1h2", "e8d8"]);
        assert_eq!(game.position().halfmove_clock(), 100_002);
        assert_eq!(game.position().fullmove_number(), 100_001);
        assert!(game.is_fifty_move_draw());

        let near_max = Position {
            halfmove_clock: u32::MAX,
            fullmove_number: u32::MAX,
            ..Position::from_fen("4k3/8/8/8/8/8/8/4K2R b - - 0 1").unwrap()
        };
        let next = near_max.play_unchecked(Move::from_uci("e8d8").unwrap());
        assert_eq!(next.halfmove_clock(), u32::MAX);
        assert_eq!(next.fullmove_number(), u32::MAX);
    }

    #[test]
    fn test_stalemate() {
        let game = Game::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(game.is_stalemate());
        assert!(!game.is_checkmate());
        assert_eq!(game.status(), GameStatus::Stalemate);
    }

    #[test]
    fn test_checkmate_status_names_winner() {
        let game = Game::from_fen("7k/6Q1/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(game.is_checkmate());
        assert_eq!(
            game.status(),
            GameStatus::Checkmate {
                winner: PieceColor::White
            }
        );
        assert!(game.status().is_terminal());
    }
}
