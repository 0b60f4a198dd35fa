//! Selectable actions shown under the board.

use chess::{format_square, Destination, MovablePiece, PieceColor, PieceKind, StrengthLevel};
use cozy_chess::Square;

pub const MAX_BUTTONS_PER_ROW: usize = 5;
pub const MAX_ROWS: usize = 5;
/// Move buttons leave the last row to the cancel/resign controls.
pub const MAX_MOVE_ROWS: usize = MAX_ROWS - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRow {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu(SelectMenu),
    Button(Button),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Strength,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectMenu {
    pub kind: MenuKind,
    pub placeholder: String,
    pub options: Vec<MenuOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub action: ButtonAction,
    pub label: String,
    pub style: ButtonStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    SelectPiece(Square),
    Move {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    },
    Cancel,
    Resign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// Difficulty and color menus, with any choice already made preselected.
pub fn setup_menus(strength: Option<StrengthLevel>, color: Option<PieceColor>) -> Vec<ActionRow> {
    let strength_menu = SelectMenu {
        kind: MenuKind::Strength,
        placeholder: "Choose a difficulty".to_string(),
        options: StrengthLevel::ALL
            .into_iter()
            .map(|level| MenuOption {
                value: level.id().to_string(),
                label: format!("{} - {}", level.label(), level.personality().name),
                selected: strength == Some(level),
            })
            .collect(),
    };

    let color_menu = SelectMenu {
        kind: MenuKind::Color,
        placeholder: "Choose your color".to_string(),
        options: [PieceColor::White, PieceColor::Black]
            .into_iter()
            .map(|c| MenuOption {
                value: c.as_str().to_string(),
                label: color_name(c).to_string(),
                selected: color == Some(c),
            })
            .collect(),
    };

    vec![
        ActionRow {
            actions: vec![Action::Menu(strength_menu)],
        },
        ActionRow {
            actions: vec![Action::Menu(color_menu)],
        },
    ]
}

/// One button per movable piece, followed by resign.
pub fn piece_rows(pieces: &[MovablePiece]) -> Vec<ActionRow> {
    let capacity = MAX_ROWS * MAX_BUTTONS_PER_ROW - 1;
    if pieces.len() > capacity {
        tracing::debug!("Dropping {} piece buttons", pieces.len() - capacity);
    }

    let mut buttons: Vec<Button> = pieces
        .iter()
        .take(capacity)
        .map(|piece| Button {
            action: ButtonAction::SelectPiece(piece.square),
            label: format!("{} {}", piece.kind.glyph(piece.color), format_square(piece.square)),
            style: ButtonStyle::Secondary,
        })
        .collect();
    buttons.push(resign_button());

    into_rows(buttons)
}

/// Destination buttons for the piece on `from`, then cancel and resign.
pub fn move_rows(from: Square, destinations: &[Destination]) -> Vec<ActionRow> {
    let capacity = MAX_MOVE_ROWS * MAX_BUTTONS_PER_ROW;
    if destinations.len() > capacity {
        tracing::debug!("Dropping {} move buttons", destinations.len() - capacity);
    }

    let buttons: Vec<Button> = destinations
        .iter()
        .take(capacity)
        .map(|dest| Button {
            action: ButtonAction::Move {
                from,
                to: dest.to,
                promotion: dest.promotion,
            },
            label: move_label(dest),
            style: ButtonStyle::Primary,
        })
        .collect();

    let mut rows = into_rows(buttons);
    rows.push(ActionRow {
        actions: vec![
            Action::Button(Button {
                action: ButtonAction::Cancel,
                label: "Cancel".to_string(),
                style: ButtonStyle::Secondary,
            }),
            Action::Button(resign_button()),
        ],
    });
    rows
}

/// While the engine thinks only resigning is possible.
pub fn thinking_rows() -> Vec<ActionRow> {
    vec![ActionRow {
        actions: vec![Action::Button(resign_button())],
    }]
}

pub fn move_label(dest: &Destination) -> String {
    match dest.promotion {
        Some(piece) => format!("{}={}", format_square(dest.to), piece.to_char_upper()),
        None => format_square(dest.to),
    }
}

pub fn color_name(color: PieceColor) -> &'static str {
    match color {
        PieceColor::White => "White",
        PieceColor::Black => "Black",
    }
}

fn resign_button() -> Button {
    Button {
        action: ButtonAction::Resign,
        label: "Resign".to_string(),
        style: ButtonStyle::Danger,
    }
}

fn into_rows(buttons: Vec<Button>) -> Vec<ActionRow> {
    buttons
        .chunks(MAX_BUTTONS_PER_ROW)
        .map(|chunk| ActionRow {
            actions: chunk.iter().cloned().map(Action::Button).collect(),
        })
        .collect()
}
