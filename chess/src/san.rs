//! Standard Algebraic Notation output.

use cozy_chess::{Board, Move, Piece, Square};

use crate::converters::{file_to_char, format_piece_upper, format_square, rank_to_char};
use crate::uci::{format_uci_move, is_castling};

/// Format a legal move as SAN, including check (`+`) and mate (`#`) suffixes.
///
/// `board` is the position before the move. Castling must be given in
/// cozy_chess encoding (king onto own rook).
pub fn format_san(board: &Board, mv: Move) -> String {
    let Some(piece) = board.piece_on(mv.from) else {
        return format_uci_move(mv);
    };

    let mut san = String::new();

    if is_castling(board, mv) {
        if mv.to.file() as u8 > mv.from.file() as u8 {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let is_en_passant = piece == Piece::Pawn
            && mv.from.file() != mv.to.file()
            && board.piece_on(mv.to).is_none();
        let is_capture = board.piece_on(mv.to).is_some() || is_en_passant;

        if piece == Piece::Pawn {
            if is_capture {
                san.push(file_to_char(mv.from.file()));
            }
        } else {
            san.push(format_piece_upper(piece));
            san.push_str(&disambiguation(board, mv, piece));
        }

        if is_capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(format_piece_upper(promo));
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if !after.checkers().is_empty() {
        san.push(if has_legal_moves(&after) { '+' } else { '#' });
    }

    san
}

pub(crate) fn has_legal_moves(board: &Board) -> bool {
    board.generate_moves(|mvs| !mvs.to.is_empty())
}

/// Minimal origin qualifier when several pieces of the same kind reach `mv.to`.
fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals: Vec<Square> = Vec::new();
    board.generate_moves(|mvs| {
        if mvs.piece == piece && mvs.from != mv.from && mvs.to.has(mv.to) {
            rivals.push(mvs.from);
        }
        false
    });

    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|sq| sq.file() != mv.from.file()) {
        return file_to_char(mv.from.file()).to_string();
    }
    if rivals.iter().all(|sq| sq.rank() != mv.from.rank()) {
        return rank_to_char(mv.from.rank()).to_string();
    }
    format_square(mv.from)
}
