//! Text board image with square highlights.

use chess::{parse_square, DisplayBoard, GameSession, PieceColor};
use cozy_chess::{File, Rank, Square};

/// Squares to mark on the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    pub selected: Option<Square>,
    pub targets: Vec<Square>,
    pub last_move: Option<(Square, Square)>,
    /// King of the side to move, when in check.
    pub check: Option<Square>,
}

/// Board payload of a render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardImage {
    pub fen: String,
    /// Side shown at the bottom.
    pub orientation: PieceColor,
    pub text: String,
}

pub struct BoardRenderer;

impl BoardRenderer {
    /// Draw the session's position from the player's side of the board.
    pub fn render(session: &GameSession, highlights: &Highlights) -> BoardImage {
        let fen = session.fen();
        let orientation = session.player_color().unwrap_or(PieceColor::White);
        let board = DisplayBoard::from_fen(&fen).unwrap_or_else(|e| {
            tracing::warn!("Cannot draw position {}: {}", fen, e);
            DisplayBoard::default()
        });

        let (ranks, files): (Vec<usize>, Vec<usize>) = match orientation {
            PieceColor::White => ((0..8).rev().collect(), (0..8).collect()),
            PieceColor::Black => ((0..8).collect(), (0..8).rev().collect()),
        };

        let mut text = String::new();
        for &rank in &ranks {
            text.push(char::from(b'1' + rank as u8));
            text.push(' ');
            for &file in &files {
                let square = Square::new(File::index(file), Rank::index(rank));
                text.push_str(&cell(&board, square, highlights));
            }
            text.push('\n');
        }
        text.push_str("  ");
        for &file in &files {
            text.push(' ');
            text.push(char::from(b'a' + file as u8));
            text.push(' ');
        }

        BoardImage {
            fen,
            orientation,
            text,
        }
    }

    /// Highlights for the current position, optionally with a selected piece.
    pub fn highlights(session: &GameSession, selected: Option<Square>) -> Highlights {
        let last_move = session.history().last().and_then(|entry| {
            let from = parse_square(entry.uci.get(0..2)?)?;
            let to = parse_square(entry.uci.get(2..4)?)?;
            Some((from, to))
        });

        let check = if session.in_check() {
            DisplayBoard::from_fen(&session.fen())
                .ok()
                .and_then(|board| board.king_square(session.side_to_move()))
        } else {
            None
        };

        let targets = selected
            .map(|square| {
                session
                    .legal_destinations(square)
                    .into_iter()
                    .map(|d| d.to)
                    .collect()
            })
            .unwrap_or_default();

        Highlights {
            selected,
            targets,
            last_move,
            check,
        }
    }
}

fn cell(board: &DisplayBoard, square: Square, highlights: &Highlights) -> String {
    let glyph = board
        .piece_on(square)
        .map(|(kind, color)| kind.glyph(color))
        .unwrap_or('·');

    let (open, close) = if highlights.selected == Some(square) {
        ('[', ']')
    } else if highlights.targets.contains(&square) {
        ('(', ')')
    } else if highlights.check == Some(square) {
        ('<', '>')
    } else if highlights
        .last_move
        .is_some_and(|(from, to)| from == square || to == square)
    {
        ('{', '}')
    } else {
        (' ', ' ')
    };
    format!("{}{}{}", open, glyph, close)
}
