//! Pseudo-legal move generation, attack detection and the legality filter.

use smallvec::SmallVec;

use crate::moves::Move;
use crate::position::{CastleSide, Position};
use crate::square::Square;
use crate::types::{Piece, PieceColor, PieceKind};

type Offsets = [(i8, i8)];

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Moves from a single square never exceed 27 (a centralized queen).
pub(crate) type MoveList = SmallVec<[Move; 32]>;

impl Position {
    /// Every move of the piece on `from` that obeys its movement rules,
    /// ignoring whether the mover's king is left attacked.
    pub(crate) fn pseudo_legal_moves_from(&self, from: Square) -> MoveList {
        let mut moves = MoveList::new();
        let Some(piece) = self.piece_at(from) else {
            return moves;
        };
        if piece.color != self.side_to_move {
            return moves;
        }

        let color = piece.color;
        match piece.kind {
            PieceKind::Pawn => self.pawn_moves(from, color, &mut moves),
            PieceKind::Knight => self.step_moves(from, color, &KNIGHT_OFFSETS, &mut moves),
            PieceKind::Bishop => self.slide_moves(from, color, &BISHOP_DIRECTIONS, &mut moves),
            PieceKind::Rook => self.slide_moves(from, color, &ROOK_DIRECTIONS, &mut moves),
            PieceKind::Queen => {
                self.slide_moves(from, color, &ROOK_DIRECTIONS, &mut moves);
                self.slide_moves(from, color, &BISHOP_DIRECTIONS, &mut moves);
            }
            PieceKind::King => {
                self.step_moves(from, color, &KING_OFFSETS, &mut moves);
                self.castling_moves(from, color, &mut moves);
            }
        }
        moves
    }

    /// Legal moves of the piece on `from`.
    ///
    /// Empty when the square is empty, holds a piece of the side not to move,
    /// or the piece has nowhere legal to go.
    pub fn legal_moves_from(&self, from: Square) -> Vec<Move> {
        self.pseudo_legal_moves_from(from)
            .into_iter()
            .filter(|mv| self.keeps_king_safe(*mv))
            .collect()
    }

    /// All legal moves for the side to move, grouped by origin square a1..h8.
    pub fn legal_moves(&self) -> Vec<Move> {
        Square::all()
            .flat_map(|sq| self.legal_moves_from(sq))
            .collect()
    }

    pub fn has_legal_moves(&self) -> bool {
        Square::all().any(|sq| {
            self.pseudo_legal_moves_from(sq)
                .into_iter()
                .any(|mv| self.keeps_king_safe(mv))
        })
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        self.legal_moves_from(mv.from).contains(&mv)
    }

    pub fn is_in_check(&self, color: PieceColor) -> bool {
        self.king_square(color)
            .is_some_and(|king| self.is_attacked(king, color.opposite()))
    }

    /// Whether any piece of color `by` attacks `target`.
    pub fn is_attacked(&self, target: Square, by: PieceColor) -> bool {
        let holds = |sq: Option<Square>, kind: PieceKind| {
            sq.and_then(|s| self.piece_at(s)) == Some(Piece::new(kind, by))
        };

        // A pawn of `by` attacks diagonally forward, so look one rank back.
        if [-1, 1]
            .into_iter()
            .any(|df| holds(target.offset(df, -by.forward()), PieceKind::Pawn))
        {
            return true;
        }

        if KNIGHT_OFFSETS
            .iter()
            .any(|&(df, dr)| holds(target.offset(df, dr), PieceKind::Knight))
        {
            return true;
        }

        if KING_OFFSETS
            .iter()
            .any(|&(df, dr)| holds(target.offset(df, dr), PieceKind::King))
        {
            return true;
        }

        let slider_hits = |directions: &Offsets, kind: PieceKind| {
            directions.iter().any(|&dir| {
                self.first_piece_along(target, dir).is_some_and(|p| {
                    p.color == by && (p.kind == kind || p.kind == PieceKind::Queen)
                })
            })
        };

        slider_hits(&ROOK_DIRECTIONS[..], PieceKind::Rook)
            || slider_hits(&BISHOP_DIRECTIONS[..], PieceKind::Bishop)
    }

    fn keeps_king_safe(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        !self.play_unchecked(mv).is_in_check(us)
    }

    fn first_piece_along(&self, from: Square, (df, dr): (i8, i8)) -> Option<Piece> {
        let mut current = from;
        while let Some(next) = current.offset(df, dr) {
            if let Some(piece) = self.piece_at(next) {
                return Some(piece);
            }
            current = next;
        }
        None
    }

    fn pawn_moves(&self, from: Square, color: PieceColor, moves: &mut MoveList) {
        let dir = color.forward();
        let start_rank = match color {
            PieceColor::White => 1,
            PieceColor::Black => 6,
        };

        if let Some(one) = from.offset(0, dir) {
            if self.piece_at(one).is_none() {
                push_pawn_move(from, one, color, moves);
                if from.rank() == start_rank {
                    if let Some(two) = one.offset(0, dir) {
                        if self.piece_at(two).is_none() {
                            moves.push(Move::new(from, two));
                        }
                    }
                }
            }
        }

        for df in [-1, 1] {
            let Some(to) = from.offset(df, dir) else {
                continue;
            };
            let captures_enemy = self.piece_at(to).is_some_and(|p| p.color != color);
            if captures_enemy || self.en_passant == Some(to) {
                push_pawn_move(from, to, color, moves);
            }
        }
    }

    fn step_moves(&self, from: Square, color: PieceColor, offsets: &Offsets, moves: &mut MoveList) {
        for &(df, dr) in offsets {
            if let Some(to) = from.offset(df, dr) {
                if self.piece_at(to).map_or(true, |p| p.color != color) {
                    moves.push(Move::new(from, to));
                }
            }
        }
    }

    fn slide_moves(
        &self,
        from: Square,
        color: PieceColor,
        directions: &Offsets,
        moves: &mut MoveList,
    ) {
        for &(df, dr) in directions {
            let mut current = from;
            while let Some(to) = current.offset(df, dr) {
                match self.piece_at(to) {
                    None => moves.push(Move::new(from, to)),
                    Some(p) => {
                        if p.color != color {
                            moves.push(Move::new(from, to));
                        }
                        break;
                    }
                }
                current = to;
            }
        }
    }

    fn castling_moves(&self, from: Square, color: PieceColor, moves: &mut MoveList) {
        let rank = color.back_rank();
        if from != Square::at(4, rank) {
            return;
        }
        let enemy = color.opposite();

        for side in [CastleSide::King, CastleSide::Queen] {
            if !self.castling.has(color, side) {
                continue;
            }
            // (squares that must be empty, squares the king crosses and lands on)
            let (between, king_path): (&[u8], [u8; 2]) = match side {
                CastleSide::King => (&[5, 6][..], [5, 6]),
                CastleSide::Queen => (&[1, 2, 3][..], [3, 2]),
            };

            let rook = Square::at(side.rook_file(), rank);
            if self.piece_at(rook) != Some(Piece::new(PieceKind::Rook, color)) {
                continue;
            }
            if between
                .iter()
                .any(|&file| self.piece_at(Square::at(file, rank)).is_some())
            {
                continue;
            }
            if self.is_attacked(from, enemy)
                || king_path
                    .iter()
                    .any(|&file| self.is_attacked(Square::at(file, rank), enemy))
            {
                continue;
            }
            moves.push(Move::new(from, Square::at(king_path[1], rank)));
        }
    }
}

fn push_pawn_move(from: Square, to: Square, color: PieceColor, moves: &mut MoveList) {
    if to.rank() == color.opposite().back_rank() {
        for kind in PieceKind::PROMOTIONS {
            moves.push(Move::with_promotion(from, to, kind));
        }
    } else {
        moves.push(Move::new(from, to));
    }
}
