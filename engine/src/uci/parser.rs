use cozy_chess::{Move, Piece};

use super::UciError;

/// Incoming message from a UCI engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// `mv` is `None` when the engine answered `bestmove (none)`.
    BestMove { mv: Option<Move>, ponder: Option<Move> },
    Info(EngineInfo),
    /// Engine-side complaint about a command it received.
    Error(String),
}

/// Search progress reported on `info` lines. Logged, never acted upon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<Move>,
    pub string: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i8), // Negative for being mated
}

/// Parse one line of engine output.
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let line = line.trim();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(UciError::MalformedMessage(line.to_string()));
            }
            Ok(UciMessage::Id {
                name: tokens[1].to_string(),
                value: tokens[2..].join(" "),
            })
        }

        Some(&"bestmove") => {
            let Some(&mv) = tokens.get(1) else {
                return Err(UciError::MalformedMessage(line.to_string()));
            };
            let mv = match mv {
                "(none)" | "0000" => None,
                text => Some(parse_uci_move(text)?),
            };
            let ponder = match tokens.get(2..4) {
                Some(["ponder", text]) => parse_uci_move(text).ok(),
                _ => None,
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        Some(&"error") => Ok(UciMessage::Error(tokens[1..].join(" "))),
        // Stockfish's reply to anything it cannot parse
        Some(&"Unknown") if line.starts_with("Unknown command") => {
            Ok(UciMessage::Error(line.to_string()))
        }

        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                info.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let (Some(&kind), Some(value)) = (tokens.get(i), tokens.get(i + 1)) {
                    info.score = match kind {
                        "cp" => value.parse().ok().map(Score::Centipawns),
                        "mate" => value.parse().ok().map(Score::Mate),
                        _ => None,
                    };
                    i += 1;
                }
            }
            "pv" => {
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    if let Ok(mv) = parse_uci_move(tokens[i]) {
                        info.pv.push(mv);
                    }
                    i += 1;
                }
                continue;
            }
            "string" => {
                // Free text runs to the end of the line
                info.string = Some(tokens[i + 1..].join(" "));
                break;
            }
            _ => {}
        }
        i += 1;
    }

    info
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

/// Parse compact move notation (`e2e4`, `e7e8q`).
pub fn parse_uci_move(s: &str) -> Result<Move, UciError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(UciError::InvalidMove(s.to_string()));
    }

    let from = chess::parse_square(&s[0..2]).ok_or_else(|| UciError::InvalidMove(s.to_string()))?;
    let to = chess::parse_square(&s[2..4]).ok_or_else(|| UciError::InvalidMove(s.to_string()))?;

    let promotion = match s.get(4..5) {
        None => None,
        Some("q") => Some(Piece::Queen),
        Some("r") => Some(Piece::Rook),
        Some("b") => Some(Piece::Bishop),
        Some("n") => Some(Piece::Knight),
        Some(_) => return Err(UciError::InvalidPromotion(s.to_string())),
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::format_uci_move;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        match msg {
            UciMessage::BestMove { mv, ponder } => {
                assert_eq!(format_uci_move(mv.unwrap()), "e2e4");
                assert_eq!(format_uci_move(ponder.unwrap()), "e7e5");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_bestmove_none() {
        assert_eq!(
            parse_uci_message("bestmove (none)").unwrap(),
            UciMessage::BestMove {
                mv: None,
                ponder: None
            }
        );
    }

    #[test]
    fn test_parse_promotion() {
        let mv = parse_uci_move("e7e8q").unwrap();
        assert_eq!(mv.promotion, Some(Piece::Queen));
        assert!(matches!(
            parse_uci_move("e7e8k"),
            Err(UciError::InvalidPromotion(_))
        ));
        assert!(parse_uci_move("e9e8").is_err());
        assert!(parse_uci_move("e7").is_err());
    }

    #[test]
    fn test_parse_info() {
        let msg = parse_uci_message("info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert_eq!(info.score, Some(Score::Centipawns(35)));
                assert_eq!(info.nodes, Some(15234));
                assert_eq!(info.pv.len(), 2);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_info_string() {
        let msg = parse_uci_message("info string NNUE evaluation enabled").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.string.as_deref(), Some("NNUE evaluation enabled"));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_error_lines() {
        assert_eq!(
            parse_uci_message("Unknown command: 'frobnicate'").unwrap(),
            UciMessage::Error("Unknown command: 'frobnicate'".to_string())
        );
        assert!(matches!(
            parse_uci_message("bogus output"),
            Err(UciError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_handshake_tokens() {
        assert_eq!(parse_uci_message("uciok\r").unwrap(), UciMessage::UciOk);
        assert_eq!(parse_uci_message("readyok").unwrap(), UciMessage::ReadyOk);
        assert!(matches!(
            parse_uci_message("id name Stockfish 16").unwrap(),
            UciMessage::Id { ref name, ref value } if name == "name" && value == "Stockfish 16"
        ));
    }
}
