//! Plain-text rendering of session snapshots.

use std::fmt::Write;

use chess::{PieceColor, Position, Square};
use session::{SessionSnapshot, StatusView};

/// Render the board with rank and file labels, from `perspective`'s side.
pub fn board(position: &Position, perspective: PieceColor) -> String {
    let ranks: Vec<u8> = match perspective {
        PieceColor::White => (0..8).rev().collect(),
        PieceColor::Black => (0..8).collect(),
    };
    let files: Vec<u8> = match perspective {
        PieceColor::White => (0..8).collect(),
        PieceColor::Black => (0..8).rev().collect(),
    };

    let mut out = String::new();
    for &rank in &ranks {
        let _ = write!(out, "{} ", rank + 1);
        for &file in &files {
            let c = Square::from_coords(file, rank)
                .and_then(|sq| position.piece_at(sq))
                .map_or('.', |piece| piece.to_fen_char());
            out.push(' ');
            out.push(c);
        }
        out.push('\n');
    }
    out.push_str("  ");
    for &file in &files {
        out.push(' ');
        out.push((b'a' + file) as char);
    }
    out.push('\n');
    out
}

/// One line describing whose turn it is and how the game stands.
pub fn status_line(snapshot: &SessionSnapshot) -> String {
    let mut line = match &snapshot.status {
        StatusView::Ongoing => {
            let mut s = format!("{} to move", snapshot.side_to_move);
            if snapshot.in_check {
                s.push_str(" (check)");
            }
            s
        }
        StatusView::Checkmate { winner } => format!("checkmate, {} wins", winner),
        StatusView::Stalemate => "stalemate".to_string(),
        StatusView::Draw { reason } => format!("draw by {}", reason),
    };
    if snapshot.engine_thinking {
        line.push_str(", engine thinking");
    }
    if let Some(error) = &snapshot.engine_error {
        let _ = write!(line, "\nengine stopped: {} (type `new` to start over)", error);
    }
    line
}

/// Full human-readable view of a snapshot.
pub fn snapshot(snapshot: &SessionSnapshot) -> String {
    let perspective = match snapshot.human_side.as_deref() {
        Some("black") => PieceColor::Black,
        _ => PieceColor::White,
    };
    let mut out = String::new();
    match chess::parse_fen(&snapshot.fen) {
        Ok(position) => out.push_str(&board(&position, perspective)),
        Err(e) => {
            let _ = writeln!(out, "unreadable position {}: {}", snapshot.fen, e);
        }
    }
    if let Some(record) = snapshot.history.last() {
        let _ = writeln!(out, "last move: {}", record.san);
    }
    out.push_str(&status_line(snapshot));
    out
}

/// The destination index, one origin square per line.
pub fn destinations(snapshot: &SessionSnapshot) -> String {
    snapshot
        .destinations
        .iter()
        .map(|(from, to)| format!("{}: {}", from, to.join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}
