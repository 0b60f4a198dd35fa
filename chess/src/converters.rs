//! String conversions between cozy-chess values and algebraic text.

use cozy_chess::{File, Piece, Rank, Square};

/// Format a square in algebraic notation ("e4").
pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_to_char(sq.file()), rank_to_char(sq.rank()))
}

/// Parse an algebraic square ("e4"). Case-insensitive on the file.
pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = chars.next()?.to_ascii_lowercase();
    let rank = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    let file = match file {
        'a'..='h' => File::index(file as usize - 'a' as usize),
        _ => return None,
    };
    let rank = match rank {
        '1'..='8' => Rank::index(rank as usize - '1' as usize),
        _ => return None,
    };
    Some(Square::new(file, rank))
}

/// Lowercase piece letter as used in UCI promotions ("q", "n", ...).
pub fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

/// Uppercase piece letter as used in SAN ("Q", "N", ...).
pub fn format_piece_upper(piece: Piece) -> char {
    format_piece(piece).to_ascii_uppercase()
}

pub fn file_to_char(file: File) -> char {
    (b'a' + file as u8) as char
}

pub fn rank_to_char(rank: Rank) -> char {
    (b'1' + rank as u8) as char
}
