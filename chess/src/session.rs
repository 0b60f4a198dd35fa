//! One chess game as played against the engine in a single channel.

use cozy_chess::{Move, Piece, Square};
use serde::{Deserialize, Serialize};

use crate::converters::format_square;
use crate::game::{Game, GameError, HistoryEntry};
use crate::status::GameStatus;
use crate::strength::StrengthLevel;
use crate::types::{PieceColor, PieceKind};
use crate::uci::{convert_uci_castling_to_cozy, to_standard_castling};

/// Choices made during setup. Immutable once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSetup {
    pub player_color: PieceColor,
    pub strength: StrengthLevel,
}

/// A move that was committed to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub from: Square,
    /// Landing square; castling reports the king's destination.
    pub to: Square,
    pub piece: PieceKind,
    pub color: PieceColor,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub san: String,
    pub uci: String,
    /// Session status after the move.
    pub status: GameStatus,
}

/// A piece of the side to move that has at least one legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovablePiece {
    pub square: Square,
    pub kind: PieceKind,
    pub color: PieceColor,
}

/// A legal target for a selected piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Session already configured")]
    AlreadyConfigured,
    #[error("Session has not been configured yet")]
    NotConfigured,
    #[error("Game is over ({0})")]
    GameOver(GameStatus),
}

#[derive(Debug, Clone)]
pub struct GameSession {
    game: Game,
    setup: Option<SessionSetup>,
    status: GameStatus,
}

impl GameSession {
    /// New session on the standard starting position, awaiting setup.
    pub fn new() -> Self {
        Self::with_game(Game::new())
    }

    /// New session on an arbitrary position, awaiting setup.
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        Ok(Self::with_game(Game::from_fen(fen)?))
    }

    fn with_game(game: Game) -> Self {
        Self {
            game,
            setup: None,
            status: GameStatus::Setup,
        }
    }

    pub fn configure(
        &mut self,
        player_color: PieceColor,
        strength: StrengthLevel,
    ) -> Result<(), SessionError> {
        if self.setup.is_some() {
            return Err(SessionError::AlreadyConfigured);
        }
        self.setup = Some(SessionSetup {
            player_color,
            strength,
        });
        self.status = GameStatus::from_game(&self.game);
        Ok(())
    }

    /// Apply a move given as origin and landing square.
    ///
    /// Castling may be given as the king's landing square or the rook's
    /// square. A pawn reaching the last rank without a hint becomes a queen.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<AppliedMove, SessionError> {
        self.ensure_active()?;

        let board = self.game.position();
        let candidates = self.game.legal_moves_from(from);
        let reaches = |mv: &Move| mv.to == to || to_standard_castling(board, *mv).to == to;

        let wanted = if candidates.iter().any(|mv| reaches(mv) && mv.promotion.is_some()) {
            Some(promotion.map(Piece::from).unwrap_or(Piece::Queen))
        } else {
            None
        };

        let mv = candidates
            .iter()
            .copied()
            .find(|mv| reaches(mv) && mv.promotion == wanted)
            .ok_or_else(|| {
                SessionError::IllegalMove(format!("{}{}", format_square(from), format_square(to)))
            })?;

        self.commit(mv)
    }

    /// Apply a move reported by the engine (castling as king two squares).
    pub fn apply_uci_move(&mut self, mv: Move) -> Result<AppliedMove, SessionError> {
        self.ensure_active()?;
        let mv = if self.game.position().piece_on(mv.from) == Some(Piece::King) {
            convert_uci_castling_to_cozy(mv, &self.game.legal_moves())
        } else {
            mv
        };
        self.commit(mv)
    }

    fn commit(&mut self, mv: Move) -> Result<AppliedMove, SessionError> {
        let board = self.game.position();
        let landing = to_standard_castling(board, mv).to;
        let entry = self
            .game
            .make_move(mv)
            .map_err(|_| SessionError::IllegalMove(crate::uci::format_uci_move(mv)))?;
        self.status = GameStatus::from_game(&self.game);

        Ok(AppliedMove {
            from: entry.from,
            to: landing,
            piece: entry.piece.into(),
            color: entry.piece_color.into(),
            captured: entry.captured.map(Into::into),
            promotion: entry.promotion.map(Into::into),
            san: entry.san,
            uci: entry.uci,
            status: self.status,
        })
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.setup.is_none() {
            return Err(SessionError::NotConfigured);
        }
        if self.status.is_terminal() {
            return Err(SessionError::GameOver(self.status));
        }
        Ok(())
    }

    /// Resign on behalf of the player. No-op once the game is over.
    pub fn resign(&mut self) {
        if !self.status.is_terminal() {
            self.status = GameStatus::Resigned;
        }
    }

    /// End the game as a draw, e.g. when the engine has no move to offer.
    pub fn adjudicate_draw(&mut self) {
        if !self.status.is_terminal() {
            self.status = GameStatus::Draw;
        }
    }

    /// Pieces of `color` that can move, king first and pawns last, then by square.
    pub fn movable_pieces(&self, color: PieceColor) -> Vec<MovablePiece> {
        if self.status.is_terminal() || self.side_to_move() != color {
            return Vec::new();
        }

        let mut pieces: Vec<MovablePiece> = Vec::new();
        self.game.position().generate_moves(|mvs| {
            if !mvs.to.is_empty() && !pieces.iter().any(|p| p.square == mvs.from) {
                pieces.push(MovablePiece {
                    square: mvs.from,
                    kind: mvs.piece.into(),
                    color,
                });
            }
            false
        });

        pieces.sort_by_key(|p| (p.kind.priority(), p.square as usize));
        pieces
    }

    /// Legal targets of the piece on `square`, sorted by square.
    pub fn legal_destinations(&self, square: Square) -> Vec<Destination> {
        let board = self.game.position();
        if self.status.is_terminal() || board.color_on(square) != Some(board.side_to_move()) {
            return Vec::new();
        }

        let mut destinations: Vec<Destination> = self
            .game
            .legal_moves_from(square)
            .into_iter()
            .map(|mv| Destination {
                to: to_standard_castling(board, mv).to,
                promotion: mv.promotion.map(|_| PieceKind::Queen),
            })
            .collect();
        destinations.sort_by_key(|d| d.to as usize);
        destinations.dedup();
        destinations
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn setup(&self) -> Option<SessionSetup> {
        self.setup
    }

    pub fn player_color(&self) -> Option<PieceColor> {
        self.setup.map(|s| s.player_color)
    }

    pub fn engine_color(&self) -> Option<PieceColor> {
        self.player_color().map(PieceColor::opposite)
    }

    pub fn strength(&self) -> Option<StrengthLevel> {
        self.setup.map(|s| s.strength)
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.game.side_to_move().into()
    }

    /// True when the game is live and the player is on move.
    pub fn is_player_turn(&self) -> bool {
        !self.is_terminal() && self.player_color() == Some(self.side_to_move())
    }

    pub fn in_check(&self) -> bool {
        self.game.in_check()
    }

    pub fn fen(&self) -> String {
        self.game.to_fen()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.game.history()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}
