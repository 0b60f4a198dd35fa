//! Piece placement read back from a FEN, for drawing boards.

use cozy_chess::{File, Rank, Square};

use crate::types::{PieceColor, PieceKind};

pub type Placed = (PieceKind, PieceColor);

/// Piece placement only; no side to move, castling or clocks.
#[derive(Debug, Clone)]
pub struct DisplayBoard {
    squares: [Option<Placed>; 64],
}

impl Default for DisplayBoard {
    fn default() -> Self {
        Self {
            squares: [None; 64],
        }
    }
}

impl DisplayBoard {
    /// Read the placement field of `fen`. The remaining fields are not checked.
    pub fn from_fen(fen: &str) -> Result<Self, DisplayBoardError> {
        let placement = fen
            .split_whitespace()
            .next()
            .ok_or(DisplayBoardError::InvalidFen)?;
        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != 8 {
            return Err(DisplayBoardError::InvalidFen);
        }

        let mut board = Self::default();
        // FEN lists the eighth rank first
        for (rank, row) in Rank::ALL.into_iter().rev().zip(rows) {
            let mut file = 0usize;
            for c in row.chars() {
                if let Some(gap) = c.to_digit(10) {
                    file += gap as usize;
                    continue;
                }
                if file >= 8 {
                    return Err(DisplayBoardError::InvalidFen);
                }
                let kind = PieceKind::from_char(c).ok_or(DisplayBoardError::InvalidPiece(c))?;
                let color = if c.is_ascii_uppercase() {
                    PieceColor::White
                } else {
                    PieceColor::Black
                };
                board.squares[Square::new(File::index(file), rank) as usize] = Some((kind, color));
                file += 1;
            }
            if file > 8 {
                return Err(DisplayBoardError::InvalidFen);
            }
        }
        Ok(board)
    }

    pub fn piece_on(&self, square: Square) -> Option<Placed> {
        self.squares[square as usize]
    }

    /// Occupied squares from a1 to h8.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Placed)> + '_ {
        Square::ALL
            .into_iter()
            .filter_map(|sq| self.piece_on(sq).map(|placed| (sq, placed)))
    }

    pub fn king_square(&self, color: PieceColor) -> Option<Square> {
        self.pieces()
            .find(|&(_, placed)| placed == (PieceKind::King, color))
            .map(|(sq, _)| sq)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayBoardError {
    #[error("Invalid FEN placement")]
    InvalidFen,
    #[error("Invalid piece character: {0}")]
    InvalidPiece(char),
}
