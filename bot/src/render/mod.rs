//! Render requests handed to the chat platform.
//!
//! A request is everything one game message shows: a status line, the board
//! and the actions the player may take next.

pub mod board;
pub mod status;
pub mod ui;

use chess::{GameSession, PieceColor, StrengthLevel};
use cozy_chess::Square;

pub use board::{BoardImage, BoardRenderer, Highlights};
pub use ui::{Action, ActionRow, Button, ButtonAction, ButtonStyle, MenuKind, MenuOption, SelectMenu};

use crate::orchestrator::EndReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub status_text: String,
    pub board: Option<BoardImage>,
    /// Empty once the game has ended.
    pub actions: Vec<ActionRow>,
    /// Inline notice, e.g. a rejected move.
    pub notice: Option<String>,
    /// Opponent's remark on its last move.
    pub commentary: Option<String>,
}

impl RenderRequest {
    fn new(status_text: String, board: Option<BoardImage>, actions: Vec<ActionRow>) -> Self {
        Self {
            status_text,
            board,
            actions,
            notice: None,
            commentary: None,
        }
    }

    /// Setup view with whatever has been chosen so far.
    pub fn setup(strength: Option<StrengthLevel>, color: Option<PieceColor>) -> Self {
        Self::new(
            status::setup_text(strength, color),
            None,
            ui::setup_menus(strength, color),
        )
    }

    /// Player on move: piece buttons, or the destinations of `selected`.
    pub fn player_turn(session: &GameSession, selected: Option<Square>) -> Self {
        let highlights = BoardRenderer::highlights(session, selected);
        let actions = match selected {
            Some(square) => ui::move_rows(square, &session.legal_destinations(square)),
            None => {
                let color = session.player_color().unwrap_or(PieceColor::White);
                ui::piece_rows(&session.movable_pieces(color))
            }
        };
        Self::new(
            status::turn_text(session),
            Some(BoardRenderer::render(session, &highlights)),
            actions,
        )
    }

    /// Abandoned setup, without menus.
    pub fn expired() -> Self {
        Self::new(status::expired_text().to_string(), None, Vec::new())
    }

    /// Configured game while the engine starts up. Only resigning is offered.
    pub fn starting(session: &GameSession) -> Self {
        Self::new(
            status::starting_text(session),
            Some(BoardRenderer::render(session, &Highlights::default())),
            ui::thinking_rows(),
        )
    }

    /// Engine on move. Only resigning is offered.
    pub fn thinking(session: &GameSession) -> Self {
        let highlights = BoardRenderer::highlights(session, None);
        Self::new(
            status::thinking_text(session),
            Some(BoardRenderer::render(session, &highlights)),
            ui::thinking_rows(),
        )
    }

    /// Final board with no controls.
    pub fn finished(session: &GameSession, reason: &EndReason) -> Self {
        let highlights = BoardRenderer::highlights(session, None);
        Self::new(
            status::final_text(session, reason),
            Some(BoardRenderer::render(session, &highlights)),
            Vec::new(),
        )
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn with_commentary(mut self, commentary: Option<String>) -> Self {
        self.commentary = commentary;
        self
    }

    /// All buttons in row order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.actions
            .iter()
            .flat_map(|row| row.actions.iter())
            .filter_map(|action| match action {
                Action::Button(button) => Some(button),
                Action::Menu(_) => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::parse_square;

    fn sq(s: &str) -> Square {
        parse_square(s).unwrap()
    }

    #[test]
    fn test_setup_has_no_board() {
        let request = RenderRequest::setup(None, None);
        assert!(request.board.is_none());
        assert_eq!(request.actions.len(), 2);
        assert_eq!(request.buttons().count(), 0);
    }

    #[test]
    fn test_player_turn_selection_scopes_buttons() {
        let mut session = GameSession::new();
        session
            .configure(PieceColor::White, StrengthLevel::Advanced)
            .unwrap();

        let idle = RenderRequest::player_turn(&session, None);
        assert!(idle
            .buttons()
            .any(|b| b.action == ButtonAction::SelectPiece(sq("e2"))));

        let selected = RenderRequest::player_turn(&session, Some(sq("e2")));
        let moves: Vec<ButtonAction> = selected
            .buttons()
            .map(|b| b.action)
            .filter(|a| matches!(a, ButtonAction::Move { .. }))
            .collect();
        assert_eq!(moves.len(), 2);
        assert!(selected.buttons().any(|b| b.action == ButtonAction::Cancel));
        assert!(selected.board.unwrap().text.contains("[♙]"));
    }

    #[test]
    fn test_starting_offers_only_resign() {
        let mut session = GameSession::new();
        session
            .configure(PieceColor::Black, StrengthLevel::Casual)
            .unwrap();
        let request = RenderRequest::starting(&session);
        assert!(request.board.is_some());
        let actions: Vec<ButtonAction> = request.buttons().map(|b| b.action).collect();
        assert_eq!(actions, vec![ButtonAction::Resign]);
        assert!(request.status_text.contains("getting ready"));
    }

    #[test]
    fn test_finished_has_no_actions() {
        let mut session = GameSession::new();
        session
            .configure(PieceColor::Black, StrengthLevel::Master)
            .unwrap();
        session.resign();
        let request = RenderRequest::finished(&session, &EndReason::Resigned)
            .with_notice("bye");
        assert!(request.actions.is_empty());
        assert!(request.board.is_some());
        assert_eq!(request.notice.as_deref(), Some("bye"));
        assert!(request.status_text.contains("The Machine wins"));
    }
}
