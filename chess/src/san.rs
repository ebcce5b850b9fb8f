//! Standard Algebraic Notation for the move list.

use crate::moves::Move;
use crate::position::Position;
use crate::types::PieceKind;

/// Format a legal move as SAN, including check and mate suffixes.
pub fn format_san(position: &Position, mv: Move) -> String {
    let Some(piece) = position.piece_at(mv.from) else {
        return mv.to_uci();
    };
    let flags = position.move_flags(mv);
    let mut san = String::new();

    if flags.castle {
        san.push_str(if mv.to.file() == 6 { "O-O" } else { "O-O-O" });
    } else {
        match piece.kind {
            PieceKind::Pawn => {
                if flags.capture {
                    san.push(mv.from.file_char());
                }
            }
            kind => {
                san.push(kind.to_char_upper());
                san.push_str(&disambiguation(position, mv, kind));
            }
        }
        if flags.capture {
            san.push('x');
        }
        san.push_str(&mv.to.to_string());
        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(promo.to_char_upper());
        }
    }

    let next = position.play_unchecked(mv);
    if next.is_check() {
        san.push(if next.has_legal_moves() { '+' } else { '#' });
    }
    san
}

/// Origin file and/or rank needed when another piece of the same kind can
/// reach the same square.
fn disambiguation(position: &Position, mv: Move, kind: PieceKind) -> String {
    let rivals: Vec<_> = position
        .legal_moves()
        .into_iter()
        .filter(|other| {
            other.to == mv.to
                && other.from != mv.from
                && position.piece_at(other.from).map(|p| p.kind) == Some(kind)
        })
        .map(|other| other.from)
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.file() != mv.from.file()) {
        mv.from.file_char().to_string()
    } else if rivals.iter().all(|sq| sq.rank() != mv.from.rank()) {
        mv.from.rank_char().to_string()
    } else {
        mv.from.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn san(fen: &str, uci: &str) -> String {
        let pos = Position::from_fen(fen).unwrap();
        format_san(&pos, Move::from_uci(uci).unwrap())
    }

    #[test]
    fn test_basic_moves() {
        let start = crate::position::START_FEN;
        assert_eq!(san(start, "e2e4"), "e4");
        assert_eq!(san(start, "g1f3"), "Nf3");
    }

    #[test]
    fn test_captures_and_promotion() {
        assert_eq!(
            san("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1", "e4d5"),
            "exd5"
        );
        assert_eq!(
            san("3rk3/4P3/8/8/8/8/8/4K3 w - - 0 1", "e7d8q"),
            "exd8=Q+"
        );
    }

    #[test]
    fn test_castling() {
        assert_eq!(san("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1", "e1g1"), "O-O");
        assert_eq!(san("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1", "e1c1"), "O-O-O");
    }

    #[test]
    fn test_disambiguation() {
        // Knights on b1 and f1 can both reach d2.
        assert_eq!(san("4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1", "b1d2"), "Nbd2");
        // Rooks on a1 and a5 share a file.
        assert_eq!(san("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1", "a1a3"), "R1a3");
    }

    #[test]
    fn test_mate_suffix() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2";
        assert_eq!(san(fen, "d8h4"), "Qh4#");
    }
}
