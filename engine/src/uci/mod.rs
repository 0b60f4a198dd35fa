pub mod framing;
pub mod parser;

pub use framing::LineBuffer;
pub use parser::{parse_uci_message, parse_uci_move, EngineInfo, Score, UciMessage};

#[derive(Debug, thiserror::Error)]
pub enum UciError {
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
