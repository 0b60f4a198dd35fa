pub mod board_display;
pub mod converters;
pub mod fen;
pub mod game;
pub mod san;
pub mod session;
pub mod status;
pub mod strength;
pub mod types;
pub mod uci;

pub use board_display::{DisplayBoard, DisplayBoardError};
pub use converters::*;
pub use game::{Game, GameError, HistoryEntry, StartPosition};
pub use session::{AppliedMove, Destination, GameSession, MovablePiece, SessionError, SessionSetup};
pub use status::GameStatus;
pub use strength::{Personality, StrengthLevel};
pub use types::{PieceColor, PieceKind};
pub use uci::{convert_uci_castling_to_cozy, format_uci_move, to_standard_castling};
