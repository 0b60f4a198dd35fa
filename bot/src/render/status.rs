//! Status lines shown above the board.

use chess::{GameSession, GameStatus, PieceColor, StrengthLevel};

use super::ui::color_name;
use crate::orchestrator::EndReason;

fn opponent(session: &GameSession) -> &'static str {
    session
        .strength()
        .map(|s| s.personality().name)
        .unwrap_or("The engine")
}

pub fn setup_text(strength: Option<StrengthLevel>, color: Option<PieceColor>) -> String {
    let strength = strength
        .map(|s| format!("{} - {}", s.label(), s.personality().name))
        .unwrap_or_else(|| "not chosen".to_string());
    let color = color.map(color_name).unwrap_or("not chosen");
    format!(
        "New chess game. Pick a difficulty and your color.\nDifficulty: {}\nColor: {}",
        strength, color
    )
}

pub fn expired_text() -> &'static str {
    "This game setup expired. Use /chess to start a new game."
}

pub fn turn_text(session: &GameSession) -> String {
    let color = session.player_color().map(color_name).unwrap_or("White");
    let mut text = format!("Your move as {} against {}.", color, opponent(session));
    if session.in_check() {
        text.push_str(" You are in check!");
    }
    text
}

pub fn starting_text(session: &GameSession) -> String {
    let color = session.player_color().map(color_name).unwrap_or("White");
    format!("You play {}. {} is getting ready...", color, opponent(session))
}

pub fn thinking_text(session: &GameSession) -> String {
    if session.in_check() {
        format!("Check! {} is thinking...", opponent(session))
    } else {
        format!("{} is thinking...", opponent(session))
    }
}

pub fn final_text(session: &GameSession, reason: &EndReason) -> String {
    let opponent = opponent(session);
    match reason {
        EndReason::GameOver(GameStatus::Checkmate) => {
            if session.player_color() == Some(session.side_to_move()) {
                format!("Checkmate. {} wins.", opponent)
            } else {
                "Checkmate! You win.".to_string()
            }
        }
        EndReason::GameOver(GameStatus::Stalemate) => "Stalemate. The game is a draw.".to_string(),
        EndReason::GameOver(GameStatus::ThreefoldRepetition) => {
            "Draw by threefold repetition.".to_string()
        }
        EndReason::GameOver(GameStatus::Draw) => {
            if session.game().insufficient_material() {
                "Draw by insufficient material.".to_string()
            } else {
                "Draw by the fifty-move rule.".to_string()
            }
        }
        EndReason::GameOver(status) => format!("Game over ({}).", status),
        EndReason::Resigned => format!("You resigned. {} wins.", opponent),
        EndReason::EngineNoMove => {
            format!("{} has no move to play. The game is a draw.", opponent)
        }
        EndReason::EngineFailure(detail) => {
            format!("Game ended: the chess engine failed ({}).", detail)
        }
    }
}
