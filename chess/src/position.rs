//! Board position: piece placement plus the state FEN carries.

use std::fmt;

use crate::fen::{self, FenError};
use crate::moves::{Move, MoveFlags};
use crate::square::Square;
use crate::types::{Piece, PieceColor, PieceKind};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    King,
    Queen,
}

impl CastleSide {
    /// File the rook starts on.
    pub(crate) fn rook_file(self) -> u8 {
        match self {
            Self::King => 7,
            Self::Queen => 0,
        }
    }
}

/// Remaining castling rights, per color and wing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    white_king: bool,
    white_queen: bool,
    black_king: bool,
    black_queen: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_king: true,
        white_queen: true,
        black_king: true,
        black_queen: true,
    };

    pub const NONE: CastlingRights = CastlingRights {
        white_king: false,
        white_queen: false,
        black_king: false,
        black_queen: false,
    };

    pub fn has(&self, color: PieceColor, side: CastleSide) -> bool {
        *self.flag(color, side)
    }

    pub fn set(&mut self, color: PieceColor, side: CastleSide, value: bool) {
        *self.flag_mut(color, side) = value;
    }

    pub fn remove_color(&mut self, color: PieceColor) {
        self.set(color, CastleSide::King, false);
        self.set(color, CastleSide::Queen, false);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Drop the right tied to a rook's home corner once anything leaves or lands there.
    fn touch_square(&mut self, sq: Square) {
        for color in [PieceColor::White, PieceColor::Black] {
            if sq.rank() != color.back_rank() {
                continue;
            }
            for side in [CastleSide::King, CastleSide::Queen] {
                if sq.file() == side.rook_file() {
                    self.set(color, side, false);
                }
            }
        }
    }

    fn flag(&self, color: PieceColor, side: CastleSide) -> &bool {
        match (color, side) {
            (PieceColor::White, CastleSide::King) => &self.white_king,
            (PieceColor::White, CastleSide::Queen) => &self.white_queen,
            (PieceColor::Black, CastleSide::King) => &self.black_king,
            (PieceColor::Black, CastleSide::Queen) => &self.black_queen,
        }
    }

    fn flag_mut(&mut self, color: PieceColor, side: CastleSide) -> &mut bool {
        match (color, side) {
            (PieceColor::White, CastleSide::King) => &mut self.white_king,
            (PieceColor::White, CastleSide::Queen) => &mut self.white_queen,
            (PieceColor::Black, CastleSide::King) => &mut self.black_king,
            (PieceColor::Black, CastleSide::Queen) => &mut self.black_queen,
        }
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        for (flag, c) in [
            (self.white_king, 'K'),
            (self.white_queen, 'Q'),
            (self.black_king, 'k'),
            (self.black_queen, 'q'),
        ] {
            if flag {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

/// A complete chess position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub(crate) board: [Option<Piece>; 64],
    pub(crate) side_to_move: PieceColor,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

/// The parts of a position that decide whether two positions repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepetitionKey {
    board: [Option<Piece>; 64],
    side_to_move: PieceColor,
    castling: CastlingRights,
    en_passant: Option<Square>,
}

impl Position {
    /// The standard starting position.
    pub fn starting() -> Self {
        let mut board = [None; 64];
        for (file, kind) in BACK_RANK.iter().enumerate() {
            let file = file as u8;
            board[Square::at(file, 0).index()] = Some(Piece::new(*kind, PieceColor::White));
            board[Square::at(file, 1).index()] =
                Some(Piece::new(PieceKind::Pawn, PieceColor::White));
            board[Square::at(file, 6).index()] =
                Some(Piece::new(PieceKind::Pawn, PieceColor::Black));
            board[Square::at(file, 7).index()] = Some(Piece::new(*kind, PieceColor::Black));
        }
        Self {
            board,
            side_to_move: PieceColor::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        fen::parse_fen(fen)
    }

    pub fn to_fen(&self) -> String {
        fen::format_fen(self)
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board[sq.index()]
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.side_to_move
    }

    pub fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn king_square(&self, color: PieceColor) -> Option<Square> {
        Square::all().find(|sq| self.piece_at(*sq) == Some(Piece::new(PieceKind::King, color)))
    }

    /// Occupied squares with their pieces, a1 first.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    /// Whether the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.is_in_check(self.side_to_move)
    }

    /// Derive capture / castle / en-passant / double-push flags for `mv`.
    pub fn move_flags(&self, mv: Move) -> MoveFlags {
        let Some(piece) = self.piece_at(mv.from) else {
            return MoveFlags::default();
        };
        let target = self.piece_at(mv.to);
        let is_pawn = piece.kind == PieceKind::Pawn;
        let en_passant = is_pawn
            && mv.from.file() != mv.to.file()
            && target.is_none()
            && self.en_passant == Some(mv.to);

        MoveFlags {
            capture: target.is_some() || en_passant,
            castle: piece.kind == PieceKind::King && mv.from.file().abs_diff(mv.to.file()) == 2,
            en_passant,
            double_push: is_pawn && mv.from.rank().abs_diff(mv.to.rank()) == 2,
        }
    }

    /// Play `mv` without checking legality and return the resulting position.
    ///
    /// `mv` must come from this position's move generator; anything else may
    /// produce a position that violates the king-safety invariant.
    pub fn play_unchecked(&self, mv: Move) -> Position {
        let mut next = self.clone();
        let Some(piece) = self.piece_at(mv.from) else {
            return next;
        };
        let us = piece.color;
        let flags = self.move_flags(mv);

        next.board[mv.from.index()] = None;

        if flags.en_passant {
            if let Some(victim) = mv.to.offset(0, -us.forward()) {
                next.board[victim.index()] = None;
            }
        }

        if flags.castle {
            let rank = us.back_rank();
            let (rook_from, rook_to) = if mv.to.file() == 6 { (7, 5) } else { (0, 3) };
            next.board[Square::at(rook_from, rank).index()] = None;
            next.board[Square::at(rook_to, rank).index()] = Some(Piece::new(PieceKind::Rook, us));
        }

        let placed = match mv.promotion {
            Some(kind) if piece.kind == PieceKind::Pawn => Piece::new(kind, us),
            _ => piece,
        };
        next.board[mv.to.index()] = Some(placed);

        if piece.kind == PieceKind::King {
            next.castling.remove_color(us);
        }
        next.castling.touch_square(mv.from);
        next.castling.touch_square(mv.to);

        next.en_passant = if flags.double_push {
            mv.from.offset(0, us.forward())
        } else {
            None
        };

        next.halfmove_clock = if piece.kind == PieceKind::Pawn || flags.capture {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };

        if us == PieceColor::Black {
            next.fullmove_number = next.fullmove_number.saturating_add(1);
        }
        next.side_to_move = us.opposite();
        next
    }

    /// Key used for threefold repetition.
    ///
    /// The en-passant square only counts when a legal en-passant capture exists.
    pub fn repetition_key(&self) -> RepetitionKey {
        let en_passant = self.en_passant.filter(|ep| {
            [-1, 1].into_iter().any(|df| {
                ep.offset(df, -self.side_to_move.forward())
                    .filter(|from| {
                        self.piece_at(*from)
                            == Some(Piece::new(PieceKind::Pawn, self.side_to_move))
                    })
                    .is_some_and(|from| {
                        self.legal_moves_from(from).iter().any(|mv| mv.to == *ep)
                    })
            })
        });

        RepetitionKey {
            board: self.board,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant,
        }
    }

    /// Neither side can possibly deliver mate.
    pub fn is_insufficient_material(&self) -> bool {
        let mut minors = Vec::new();
        for (sq, piece) in self.pieces() {
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Knight | PieceKind::Bishop => minors.push((sq, piece.kind)),
                PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen => return false,
            }
        }

        match minors.as_slice() {
            [] | [_] => true,
            [(first, PieceKind::Bishop), rest @ ..] => rest
                .iter()
                .all(|(sq, kind)| *kind == PieceKind::Bishop && sq.is_dark() == first.is_dark()),
            _ => false,
        }
    }

    /// Check the structural invariants every reachable position satisfies.
    pub(crate) fn validate(&self) -> Result<(), FenError> {
        for color in [PieceColor::White, PieceColor::Black] {
            let kings = self
                .pieces()
                .filter(|(_, p)| *p == Piece::new(PieceKind::King, color))
                .count();
            if kings != 1 {
                return Err(FenError::IllegalPosition(format!(
                    "expected one {} king, found {}",
                    color, kings
                )));
            }
        }

        if self
            .pieces()
            .any(|(sq, p)| p.kind == PieceKind::Pawn && (sq.rank() == 0 || sq.rank() == 7))
        {
            return Err(FenError::IllegalPosition(
                "pawn on first or last rank".to_string(),
            ));
        }

        if self.is_in_check(self.side_to_move.opposite()) {
            return Err(FenError::IllegalPosition(
                "side not to move is in check".to_string(),
            ));
        }

        Ok(())
    }

    /// Drop castling rights whose king or rook has left its home square.
    pub(crate) fn sanitize_castling(&mut self) {
        for color in [PieceColor::White, PieceColor::Black] {
            let rank = color.back_rank();
            let king_home = self.piece_at(Square::at(4, rank))
                == Some(Piece::new(PieceKind::King, color));
            for side in [CastleSide::King, CastleSide::Queen] {
                let rook_home = self.piece_at(Square::at(side.rook_file(), rank))
                    == Some(Piece::new(PieceKind::Rook, color));
                if !(king_home && rook_home) {
                    self.castling.set(color, side, false);
                }
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::starting()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        Move::from_uci(s).unwrap()
    }

    #[test]
    fn test_starting_matches_start_fen() {
        assert_eq!(Position::starting().to_fen(), START_FEN);
    }

    #[test]
    fn test_double_push_sets_en_passant() {
        let pos = Position::starting().play_unchecked(mv("d2d4"));
        assert_eq!(pos.en_passant(), Some("d3".parse().unwrap()));
        let pos = pos.play_unchecked(mv("g8f6"));
        assert_eq!(pos.en_passant(), None);
    }

    #[test]
    fn test_clocks_advance() {
        let pos = Position::starting()
            .play_unchecked(mv("g1f3"))
            .play_unchecked(mv("g8f6"));
        assert_eq!(pos.halfmove_clock(), 2);
        assert_eq!(pos.fullmove_number(), 2);
        let pos = pos.play_unchecked(mv("e2e4"));
        assert_eq!(pos.halfmove_clock(), 0);
    }

    #[test]
    fn test_rook_move_clears_one_right() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let pos = pos.play_unchecked(mv("h1h2"));
        assert_eq!(pos.castling_rights().to_string(), "Qkq");
        let pos = pos.play_unchecked(mv("a8a1"));
        assert_eq!(pos.castling_rights().to_string(), "k");
    }

    #[test]
    fn test_castle_moves_rook() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let pos = pos.play_unchecked(mv("e1g1"));
        assert_eq!(pos.to_fen(), "r3k2r/8/8/8/8/8/8/R4RK1 b kq - 1 1");
        let pos = pos.play_unchecked(mv("e8c8"));
        assert_eq!(pos.to_fen(), "2kr3r/8/8/8/8/8/8/R4RK1 w - - 2 2");
    }

    #[test]
    fn test_en_passant_removes_pawn() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        let flags = pos.move_flags(mv("e5d6"));
        assert!(flags.en_passant && flags.capture);
        let pos = pos.play_unchecked(mv("e5d6"));
        assert_eq!(pos.to_fen(), "4k3/8/3P4/8/8/8/8/4K3 b - - 0 2");
    }

    #[test]
    fn test_insufficient_material() {
        let cases = [
            ("4k3/8/8/8/8/8/8/4K3 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/4KN2 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1", true),
            // both bishops on dark squares
            ("4kb2/8/8/8/8/8/8/2B1K3 w - - 0 1", true),
            // opposite-colored bishops
            ("4k1b1/8/8/8/8/8/8/2B1K3 w - - 0 1", false),
            ("4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1", false),
            ("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", false),
        ];
        for (fen, expected) in cases {
            let pos = Position::from_fen(fen).unwrap();
            assert_eq!(pos.is_insufficient_material(), expected, "{fen}");
        }
    }

    #[test]
    fn test_repetition_key_ignores_unusable_en_passant() {
        let with_ep = Position::from_fen("4k3/8/8/8/3P4/8/8/4K3 b - d3 0 1").unwrap();
        let without = Position::from_fen("4k3/8/8/8/3P4/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(with_ep.repetition_key(), without.repetition_key());
    }
}
