//! Chess rules: positions, legal move generation, game state and FEN.

pub mod dests;
pub mod fen;
pub mod game;
mod movegen;
pub mod moves;
pub mod position;
pub mod san;
pub mod square;
pub mod types;

pub use dests::DestinationIndex;
pub use fen::{format_fen, parse_fen, FenError};
pub use game::{DrawReason, Game, GameError, GameStatus, HistoryEntry};
pub use moves::{Move, MoveFlags, MoveParseError};
pub use position::{CastleSide, CastlingRights, Position, RepetitionKey, START_FEN};
pub use san::format_san;
pub use square::{format_square, Square, SquareParseError};
pub use types::{Piece, PieceColor, PieceKind};
