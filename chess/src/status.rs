use serde::{Deserialize, Serialize};

use crate::game::Game;

/// Lifecycle status of a game session.
///
/// Everything except `Setup` and `Resigned` is derived from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Setup,
    Playing,
    Check,
    Checkmate,
    /// Insufficient material, fifty-move rule, or an engine with no move.
    Draw,
    Stalemate,
    ThreefoldRepetition,
    Resigned,
}

impl GameStatus {
    /// Classify the current board position.
    pub fn from_game(game: &Game) -> Self {
        if !game.has_legal_moves() {
            return if game.in_check() {
                Self::Checkmate
            } else {
                Self::Stalemate
            };
        }
        if game.repetition_count() >= 3 {
            return Self::ThreefoldRepetition;
        }
        if game.insufficient_material() || game.fifty_move_rule() {
            return Self::Draw;
        }
        if game.in_check() {
            return Self::Check;
        }
        Self::Playing
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Checkmate
                | Self::Draw
                | Self::Stalemate
                | Self::ThreefoldRepetition
                | Self::Resigned
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Playing => "playing",
            Self::Check => "check",
            Self::Checkmate => "checkmate",
            Self::Draw => "draw",
            Self::Stalemate => "stalemate",
            Self::ThreefoldRepetition => "threefold_repetition",
            Self::Resigned => "resigned",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
