//! Parsing of the line commands typed at the prompt.

use chess::{Move, MoveParseError, PieceKind, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Move {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    },
    New,
    Fen,
    Moves,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command `{0}` (type `help`)")]
    Unknown(String),
    #[error("bad move `{0}`: {1}")]
    BadMove(String, #[source] MoveParseError),
}

pub const HELP: &str = "\
commands:
  e2e4, e7e8q   play a move (promotion piece optional, queen by default)
  new           start a new game
  fen           print the current position
  moves         list legal destinations per square
  quit          leave";

pub fn parse(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => Ok(Input::Empty),
        "new" | "reset" => Ok(Input::New),
        "fen" => Ok(Input::Fen),
        "moves" => Ok(Input::Moves),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        word if looks_like_move(word) => {
            let mv = Move::from_uci(word)
                .map_err(|e| InputError::BadMove(line.to_string(), e))?;
            Ok(Input::Move {
                from: mv.from,
                to: mv.to,
                promotion: mv.promotion,
            })
        }
        _ => Err(InputError::Unknown(line.to_string())),
    }
}

fn looks_like_move(word: &str) -> bool {
    (word.len() == 4 || word.len() == 5)
        && word.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && word.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_moves() {
        assert_eq!(
            parse("e2e4").unwrap(),
            Input::Move {
                from: sq("e2"),
                to: sq("e4"),
                promotion: None
            }
        );
        assert_eq!(
            parse(" e7e8n\n").unwrap(),
            Input::Move {
                from: sq("e7"),
                to: sq("e8"),
                promotion: Some(PieceKind::Knight)
            }
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("new").unwrap(), Input::New);
        assert_eq!(parse("FEN").unwrap(), Input::Fen);
        assert_eq!(parse("moves").unwrap(), Input::Moves);
        assert_eq!(parse("quit").unwrap(), Input::Quit);
        assert_eq!(parse("   ").unwrap(), Input::Empty);
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(parse("e2e9"), Err(InputError::BadMove(..))));
        assert!(matches!(parse("e7e8k"), Err(InputError::BadMove(..))));
        assert!(matches!(parse("castle"), Err(InputError::Unknown(_))));
    }
}
