//! Legal destinations per origin square, for highlighting on the board.

use std::collections::BTreeMap;

use crate::position::Position;
use crate::square::Square;

/// Map from origin square to the ordered, de-duplicated squares it can move to.
///
/// Always built from scratch for one position; there is no way to patch it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationIndex {
    entries: BTreeMap<Square, Vec<Square>>,
}

impl DestinationIndex {
    /// Index every piece of the side to move that has at least one legal move.
    pub fn compute(position: &Position) -> Self {
        let mut entries = BTreeMap::new();
        for (from, piece) in position.pieces() {
            if piece.color != position.side_to_move() {
                continue;
            }
            let mut targets: Vec<Square> = position
                .legal_moves_from(from)
                .into_iter()
                .map(|mv| mv.to)
                .collect();
            if targets.is_empty() {
                continue;
            }
            targets.sort();
            // promotion variants share a destination
            targets.dedup();
            entries.insert(from, targets);
        }
        Self { entries }
    }

    pub fn get(&self, from: Square) -> Option<&[Square]> {
        self.entries.get(&from).map(Vec::as_slice)
    }

    pub fn contains(&self, from: Square, to: Square) -> bool {
        self.get(from).is_some_and(|targets| targets.contains(&to))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Square, &[Square])> {
        self.entries.iter().map(|(from, to)| (*from, to.as_slice()))
    }

    /// Number of origin squares with at least one destination.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The same mapping keyed by square names, as a UI consumes it.
    pub fn to_named(&self) -> BTreeMap<String, Vec<String>> {
        self.iter()
            .map(|(from, to)| {
                (
                    from.to_string(),
                    to.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_initial_index() {
        let index = DestinationIndex::compute(&Position::starting());
        // eight pawns plus two knights
        assert_eq!(index.len(), 10);
        assert_eq!(index.get(sq("g1")), Some(&[sq("f3"), sq("h3")][..]));
        assert_eq!(index.get(sq("e2")), Some(&[sq("e3"), sq("e4")][..]));
        assert!(index.get(sq("e1")).is_none());
        assert!(index.get(sq("e7")).is_none());
    }

    #[test]
    fn test_promotions_collapse() {
        let pos = Position::from_fen("3r4/4P3/8/8/8/8/k7/4K3 w - - 0 1").unwrap();
        let index = DestinationIndex::compute(&pos);
        assert_eq!(index.get(sq("e7")), Some(&[sq("d8"), sq("e8")][..]));
    }

    #[test]
    fn test_follows_side_to_move() {
        let pos = Position::starting().play_unchecked(crate::Move::from_uci("e2e4").unwrap());
        let index = DestinationIndex::compute(&pos);
        assert!(index.contains(sq("e7"), sq("e5")));
        assert!(!index.contains(sq("e2"), sq("e4")));
        let named = index.to_named();
        assert_eq!(named["b8"], vec!["a6".to_string(), "c6".to_string()]);
    }

    #[test]
    fn test_checkmated_side_has_empty_index() {
        let pos = Position::from_fen("7k/6Q1/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(DestinationIndex::compute(&pos).is_empty());
    }
}
