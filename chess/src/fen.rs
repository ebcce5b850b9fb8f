use crate::position::{CastleSide, CastlingRights, Position};
use crate::square::Square;
use crate::types::{Piece, PieceColor, PieceKind};

/// Largest move clock accepted from FEN. No real game comes close.
const MAX_CLOCK: u32 = 100_000;

/// Parse a FEN string into a Position.
///
/// Accepts the full six fields, or the first four with the clocks defaulting
/// to `0 1`. Rejects positions no legal game can reach: missing or extra
/// kings, pawns on the back ranks, or the side not to move in check.
pub fn parse_fen(fen: &str) -> Result<Position, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() != 6 && parts.len() != 4 {
        return Err(FenError::InvalidFormat);
    }

    let board = parse_placement(parts[0])?;

    let side_to_move = match parts[1] {
        "w" => PieceColor::White,
        "b" => PieceColor::Black,
        other => return Err(FenError::InvalidSideToMove(other.to_string())),
    };

    let castling = parse_castling(parts[2])?;

    let en_passant = match parts[3] {
        "-" => None,
        s => Some(
            s.parse::<Square>()
                .map_err(|_| FenError::InvalidEnPassant(s.to_string()))?,
        ),
    };

    let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
        let halfmove: u32 = parts[4]
            .parse()
            .ok()
            .filter(|n| *n <= MAX_CLOCK)
            .ok_or_else(|| FenError::InvalidClock(parts[4].to_string()))?;
        let fullmove: u32 = parts[5]
            .parse()
            .ok()
            .filter(|n| (1..=MAX_CLOCK).contains(n))
            .ok_or_else(|| FenError::InvalidClock(parts[5].to_string()))?;
        (halfmove, fullmove)
    } else {
        (0, 1)
    };

    let mut position = Position {
        board,
        side_to_move,
        castling,
        en_passant,
        halfmove_clock,
        fullmove_number,
    };

    if let Some(ep) = en_passant {
        validate_en_passant(&position, ep)?;
    }
    position.sanitize_castling();
    position.validate()?;

    Ok(position)
}

/// Format a Position as a FEN string.
pub fn format_fen(position: &Position) -> String {
    let mut placement = String::new();
    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            match position.piece_at(Square::at(file, rank)) {
                Some(piece) => {
                    if empty > 0 {
                        placement.push_str(&empty.to_string());
                        empty = 0;
                    }
                    placement.push(piece.to_fen_char());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            placement.push_str(&empty.to_string());
        }
        if rank > 0 {
            placement.push('/');
        }
    }

    let en_passant = position
        .en_passant()
        .map_or_else(|| "-".to_string(), |sq| sq.to_string());

    format!(
        "{} {} {} {} {} {}",
        placement,
        position.side_to_move().fen_char(),
        position.castling_rights(),
        en_passant,
        position.halfmove_clock(),
        position.fullmove_number()
    )
}

fn parse_placement(placement: &str) -> Result<[Option<Piece>; 64], FenError> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(FenError::InvalidBoardLayout);
    }

    let mut board = [None; 64];
    for (rank_idx, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - rank_idx as u8;
        let mut file = 0u8;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                if !(1..=8).contains(&skip) {
                    return Err(FenError::InvalidBoardLayout);
                }
                file += skip as u8;
            } else {
                let piece = Piece::from_fen_char(c).ok_or(FenError::InvalidPiece(c))?;
                let sq = Square::from_coords(file, rank).ok_or(FenError::InvalidBoardLayout)?;
                board[sq.index()] = Some(piece);
                file += 1;
            }
            if file > 8 {
                return Err(FenError::InvalidBoardLayout);
            }
        }
        if file != 8 {
            return Err(FenError::InvalidBoardLayout);
        }
    }

    Ok(board)
}

fn parse_castling(field: &str) -> Result<CastlingRights, FenError> {
    let mut rights = CastlingRights::NONE;
    if field == "-" {
        return Ok(rights);
    }

    for c in field.chars() {
        let (color, side) = match c {
            'K' => (PieceColor::White, CastleSide::King),
            'Q' => (PieceColor::White, CastleSide::Queen),
            'k' => (PieceColor::Black, CastleSide::King),
            'q' => (PieceColor::Black, CastleSide::Queen),
            _ => return Err(FenError::InvalidCastling(field.to_string())),
        };
        if rights.has(color, side) {
            return Err(FenError::InvalidCastling(field.to_string()));
        }
        rights.set(color, side, true);
    }

    Ok(rights)
}

/// The target must sit directly behind a pawn that could just have double-pushed.
fn validate_en_passant(position: &Position, ep: Square) -> Result<(), FenError> {
    let mover = position.side_to_move();
    let pushed = mover.opposite();
    let expected_rank = match mover {
        PieceColor::White => 5,
        PieceColor::Black => 2,
    };

    let pawn_square = ep.offset(0, -mover.forward());
    let origin = ep.offset(0, mover.forward());
    let valid = ep.rank() == expected_rank
        && position.piece_at(ep).is_none()
        && origin.is_some_and(|sq| position.piece_at(sq).is_none())
        && pawn_square.and_then(|sq| position.piece_at(sq))
            == Some(Piece::new(PieceKind::Pawn, pushed));

    if valid {
        Ok(())
    } else {
        Err(FenError::InvalidEnPassant(ep.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout")]
    InvalidBoardLayout,
    #[error("Invalid piece character: {0}")]
    InvalidPiece(char),
    #[error("Invalid side to move: {0}")]
    InvalidSideToMove(String),
    #[error("Invalid castling rights: {0}")]
    InvalidCastling(String),
    #[error("Invalid en passant square: {0}")]
    InvalidEnPassant(String),
    #[error("Invalid move clock: {0}")]
    InvalidClock(String),
    #[error("Illegal position: {0}")]
    IllegalPosition(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::START_FEN;

    #[test]
    fn test_round_trip() {
        for fen in [
            START_FEN,
            "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq d3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 12 40",
        ] {
            assert_eq!(format_fen(&parse_fen(fen).unwrap()), fen);
        }
    }

    #[test]
    fn test_four_field_fen_defaults_clocks() {
        let pos = parse_fen("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.fullmove_number(), 1);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_fen(""), Err(FenError::InvalidFormat));
        assert_eq!(
            parse_fen("8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::InvalidBoardLayout)
        );
        assert_eq!(
            parse_fen("4k3/8/8/8/8/8/8/4K4 w - - 0 1"),
            Err(FenError::InvalidBoardLayout)
        );
        assert_eq!(
            parse_fen("4k3/8/8/8/8/8/8/4X3 w - - 0 1"),
            Err(FenError::InvalidPiece('X'))
        );
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1"),
            Err(FenError::InvalidSideToMove(_))
        ));
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 w KK - 0 1"),
            Err(FenError::InvalidCastling(_))
        ));
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 w - e3 0 1"),
            Err(FenError::InvalidEnPassant(_))
        ));
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 0"),
            Err(FenError::InvalidClock(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_clocks() {
        for fen in [
            "4k3/8/8/8/8/8/8/4K2R w - - 4294967295 1",
            "4k3/8/8/8/8/8/8/4K2R w - - 100001 1",
            "4k3/8/8/8/8/8/8/4K2R b - - 0 4294967295",
            "4k3/8/8/8/8/8/8/4K2R w - - 4294967296 1",
        ] {
            assert!(
                matches!(parse_fen(fen), Err(FenError::InvalidClock(_))),
                "{fen} should be rejected"
            );
        }
        let pos = parse_fen("4k3/8/8/8/8/8/8/4K2R w - - 100000 100000").unwrap();
        assert_eq!(pos.halfmove_clock(), 100_000);
    }

    #[test]
    fn test_rejects_illegal_positions() {
        // no black king
        assert!(matches!(
            parse_fen("8/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::IllegalPosition(_))
        ));
        // black in check with white to move
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4RK2 w - - 0 1"),
            Err(FenError::IllegalPosition(_))
        ));
        // pawn on the back rank
        assert!(matches!(
            parse_fen("P3k3/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::IllegalPosition(_))
        ));
    }

    #[test]
    fn test_drops_impossible_castling_rights() {
        let pos = parse_fen("4k3/8/8/8/8/8/8/4K3 w KQkq - 0 1").unwrap();
        assert_eq!(pos.castling_rights(), CastlingRights::NONE);
    }
}
