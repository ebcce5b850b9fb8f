use chess::Move;

use crate::{EngineInfo, Score, UciError};

/// Incoming message from UCI engine
#[derive(Debug, Clone, PartialEq)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    BestMove { mv: Move, ponder: Option<Move> },
    Info(EngineInfo),
}

/// Parse one line of engine output.
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let mut tokens = line.split_whitespace();
    let malformed = || UciError::MalformedMessage(line.to_string());

    match tokens.next() {
        Some("uciok") => Ok(UciMessage::UciOk),
        Some("readyok") => Ok(UciMessage::ReadyOk),
        Some("id") => {
            let name = tokens.next().ok_or_else(malformed)?.to_string();
            let value = tokens.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Err(malformed());
            }
            Ok(UciMessage::Id { name, value })
        }
        Some("bestmove") => {
            let mv = parse_uci_move(tokens.next().ok_or_else(malformed)?)?;
            // A garbled ponder move does not invalidate the best move.
            let ponder = match (tokens.next(), tokens.next()) {
                (Some("ponder"), Some(ponder)) => parse_uci_move(ponder).ok(),
                _ => None,
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }
        Some("info") => Ok(UciMessage::Info(parse_info(tokens))),
        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

type Tokens<'a> = std::iter::Peekable<std::str::SplitWhitespace<'a>>;

/// Fields of an `info` line. Unknown keys and unreadable values are skipped.
fn parse_info(tokens: std::str::SplitWhitespace<'_>) -> EngineInfo {
    let mut tokens: Tokens<'_> = tokens.peekable();
    let mut info = EngineInfo::default();

    while let Some(key) = tokens.next() {
        match key {
            "depth" => info.depth = number(&mut tokens),
            "seldepth" => info.seldepth = number(&mut tokens),
            "time" => info.time_ms = number(&mut tokens),
            "nodes" => info.nodes = number(&mut tokens),
            "nps" => info.nps = number(&mut tokens),
            "multipv" => info.multipv = number(&mut tokens),
            "hashfull" => info.hashfull = number(&mut tokens),
            "currmove" => {
                info.currmove = tokens.next().and_then(|s| parse_uci_move(s).ok());
            }
            "score" => {
                info.score = match (tokens.next(), number::<i32>(&mut tokens)) {
                    (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                    (Some("mate"), Some(n)) => i8::try_from(n).ok().map(Score::Mate),
                    _ => None,
                };
            }
            "pv" => {
                while let Some(token) = tokens.next_if(|t| !is_keyword(t)) {
                    if let Ok(mv) = parse_uci_move(token) {
                        info.pv.push(mv);
                    }
                }
            }
            "string" => {
                // Free text runs to the end of the line
                info.string = Some(tokens.by_ref().collect::<Vec<_>>().join(" "));
            }
            _ => {}
        }
    }

    info
}

fn number<T: std::str::FromStr>(tokens: &mut Tokens<'_>) -> Option<T> {
    tokens.next().and_then(|s| s.parse().ok())
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "cpuload"
            | "string"
    )
}

/// Parse a move in long algebraic notation (`e2e4`, `e7e8q`).
pub fn parse_uci_move(s: &str) -> Result<Move, UciError> {
    Move::from_uci(s).map_err(|e| UciError::InvalidMove(s.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        match msg {
            UciMessage::BestMove { mv, ponder } => {
                assert_eq!(mv.to_uci(), "e2e4");
                assert_eq!(ponder.unwrap().to_uci(), "e7e5");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_bestmove_with_promotion() {
        let msg = parse_uci_message("bestmove a7a8n").unwrap();
        assert_eq!(
            msg,
            UciMessage::BestMove {
                mv: Move::from_uci("a7a8n").unwrap(),
                ponder: None
            }
        );
    }

    #[test]
    fn test_bad_ponder_keeps_bestmove() {
        let msg = parse_uci_message("bestmove g1f3 ponder zz").unwrap();
        assert!(matches!(msg, UciMessage::BestMove { ponder: None, .. }));
    }

    #[test]
    fn test_malformed_bestmove() {
        assert!(matches!(
            parse_uci_message("bestmove"),
            Err(UciError::MalformedMessage(_))
        ));
        for bad in ["bestmove e2", "bestmove e2e9", "bestmove e7e8x", "bestmove e2e4e5"] {
            assert!(
                matches!(parse_uci_message(bad), Err(UciError::InvalidMove(..))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_parse_info() {
        let msg = parse_uci_message("info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert!(matches!(info.score, Some(Score::Centipawns(35))));
                assert_eq!(info.nodes, Some(15234));
                assert_eq!(info.pv.len(), 2);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_info_mate_and_string() {
        let msg = parse_uci_message("info depth 3 score mate -2 string NNUE evaluation enabled")
            .unwrap();
        let UciMessage::Info(info) = msg else {
            panic!("Wrong message type");
        };
        assert!(matches!(info.score, Some(Score::Mate(-2))));
        assert_eq!(info.string.as_deref(), Some("NNUE evaluation enabled"));
    }

    #[test]
    fn test_parse_id_and_unknown() {
        assert_eq!(
            parse_uci_message("id name Stockfish 16").unwrap(),
            UciMessage::Id {
                name: "name".to_string(),
                value: "Stockfish 16".to_string()
            }
        );
        assert!(matches!(
            parse_uci_message("option name Hash type spin"),
            Err(UciError::UnknownMessage(_))
        ));
    }
}
