use std::fmt;
use std::str::FromStr;

use crate::square::Square;
use crate::types::PieceKind;

/// A move from one square to another.
///
/// Castling is written as the king's two-square step (`e1g1`), which is also
/// how UCI encodes it. Capture, castle, en-passant and double-push flags are
/// derived from the position via [`crate::Position::move_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

/// Context-dependent properties of a move in a given position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveFlags {
    pub capture: bool,
    pub castle: bool,
    pub en_passant: bool,
    pub double_push: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveParseError {
    #[error("Invalid move length: {0}")]
    InvalidLength(String),
    #[error("Invalid square in move: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: PieceKind) -> Self {
        Self {
            from,
            to,
            promotion: Some(promotion),
        }
    }

    /// Parse UCI move text (e2e4, e7e8q).
    pub fn from_uci(s: &str) -> Result<Self, MoveParseError> {
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(MoveParseError::InvalidLength(s.to_string()));
        }

        let from: Square = s[0..2]
            .parse()
            .map_err(|_| MoveParseError::InvalidSquare(s.to_string()))?;
        let to: Square = s[2..4]
            .parse()
            .map_err(|_| MoveParseError::InvalidSquare(s.to_string()))?;

        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => {
                let kind = PieceKind::from_char(c)
                    .filter(|k| k.is_promotion_target() && c.is_ascii_lowercase())
                    .ok_or_else(|| MoveParseError::InvalidPromotion(s.to_string()))?;
                Some(kind)
            }
        };

        Ok(Self {
            from,
            to,
            promotion,
        })
    }

    /// Format move for UCI ("e2e4", "e7e8q").
    pub fn to_uci(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promo) = self.promotion {
            write!(f, "{}", promo.to_char_lower())?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = MoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Move::from_uci(s)
    }
}
