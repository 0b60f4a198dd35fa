use cozy_chess::{Board, Color, Move, Piece, Square};

use crate::san::format_san;
use crate::uci::{format_uci_move, to_standard_castling};

/// Main game state wrapper around cozy-chess Board
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    history: Vec<HistoryEntry>,
    /// Zobrist hashes of every position reached, including the start.
    seen_positions: Vec<u64>,
    start_position: StartPosition,
}

/// Record of one applied move
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub mv: Move,
    pub from: Square,
    pub to: Square,
    pub piece: Piece,             // Piece that made the move
    pub piece_color: Color,       // Color of the piece that moved
    pub captured: Option<Piece>,  // Captured piece (en passant included)
    pub promotion: Option<Piece>, // Promotion piece if any
    pub san: String,              // Standard Algebraic Notation
    pub uci: String,              // Engine notation, castling as king landing square
    pub fen: String,              // FEN after this move
}

/// Starting position of the game
#[derive(Debug, Clone)]
pub enum StartPosition {
    Standard,
    Fen(String),
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self::from_board(Board::default(), StartPosition::Standard)
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position = crate::fen::parse_fen(fen)?;
        Ok(Self::from_board(position, StartPosition::Fen(fen.to_string())))
    }

    fn from_board(position: Board, start_position: StartPosition) -> Self {
        let seen_positions = vec![position.hash()];
        Self {
            position,
            history: Vec::new(),
            seen_positions,
            start_position,
        }
    }

    /// Get the current board position
    pub fn position(&self) -> &Board {
        &self.position
    }

    /// Get the move history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn start_position(&self) -> &StartPosition {
        &self.start_position
    }

    /// Make a move on the board
    pub fn make_move(&mut self, mv: Move) -> Result<HistoryEntry, GameError> {
        if !self.position.is_legal(mv) {
            return Err(GameError::IllegalMove);
        }

        let piece = self
            .position
            .piece_on(mv.from)
            .ok_or(GameError::IllegalMove)?;
        let piece_color = self
            .position
            .color_on(mv.from)
            .ok_or(GameError::IllegalMove)?;

        let captured = if crate::uci::is_castling(&self.position, mv) {
            None
        } else if piece == Piece::Pawn
            && mv.from.file() != mv.to.file()
            && self.position.piece_on(mv.to).is_none()
        {
            Some(Piece::Pawn)
        } else {
            self.position.piece_on(mv.to)
        };

        // Notation has to be computed against the position before the move
        let san = format_san(&self.position, mv);
        let uci = format_uci_move(to_standard_castling(&self.position, mv));

        self.position.play_unchecked(mv);
        self.seen_positions.push(self.position.hash());

        let entry = HistoryEntry {
            mv,
            from: mv.from,
            to: mv.to,
            piece,
            piece_color,
            captured,
            promotion: mv.promotion,
            san,
            uci,
            fen: self.to_fen(),
        };

        self.history.push(entry.clone());

        Ok(entry)
    }

    /// Get all legal moves for the current position
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Legal moves of the piece standing on `from`.
    pub fn legal_moves_from(&self, from: Square) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves_for(from.bitboard(), |mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    pub fn has_legal_moves(&self) -> bool {
        crate::san::has_legal_moves(&self.position)
    }

    pub fn in_check(&self) -> bool {
        !self.position.checkers().is_empty()
    }

    /// Get the side to move
    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    /// Number of times the current position has occurred.
    pub fn repetition_count(&self) -> usize {
        let current = self.position.hash();
        self.seen_positions
            .iter()
            .filter(|&&hash| hash == current)
            .count()
    }

    /// True when the fifty-move rule applies.
    pub fn fifty_move_rule(&self) -> bool {
        self.position.halfmove_clock() >= 100
    }

    /// True when neither side can possibly deliver mate.
    pub fn insufficient_material(&self) -> bool {
        let board = &self.position;
        let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
        if !heavy.is_empty() {
            return false;
        }

        let knights = board.pieces(Piece::Knight);
        let bishops = board.pieces(Piece::Bishop);
        let minors = knights.len() + bishops.len();

        if minors <= 1 {
            return true;
        }

        // Bishops only, all on the same square color
        if knights.is_empty() {
            let mut colors = bishops
                .into_iter()
                .map(|sq| (sq.file() as u8 + sq.rank() as u8) % 2);
            if let Some(first) = colors.next() {
                return colors.all(|c| c == first);
            }
        }

        false
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        crate::fen::format_fen(&self.position)
    }

    /// Rebuild a game by replaying `moves` from `start`.
    pub fn replay(start: StartPosition, moves: &[Move]) -> Result<Self, GameError> {
        let mut game = match start {
            StartPosition::Standard => Game::new(),
            StartPosition::Fen(ref fen) => Game::from_fen(fen)?,
        };
        for mv in moves {
            game.make_move(*mv)?;
        }
        Ok(game)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move")]
    IllegalMove,
    #[error("FEN parse error: {0}")]
    FenError(#[from] crate::fen::FenError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::parse_square;

    fn mv(from: &str, to: &str) -> Move {
        Move {
            from: parse_square(from).unwrap(),
            to: parse_square(to).unwrap(),
            promotion: None,
        }
    }

    #[test]
    fn test_make_move_records_history() {
        let mut game = Game::new();
        let entry = game.make_move(mv("e2", "e4")).unwrap();
        assert_eq!(entry.san, "e4");
        assert_eq!(entry.uci, "e2e4");
        assert_eq!(entry.piece, Piece::Pawn);
        assert_eq!(game.history().len(), 1);
        assert_eq!(game.side_to_move(), Color::Black);
    }

    #[test]
    fn test_illegal_move_leaves_state_untouched() {
        let mut game = Game::new();
        let before = game.to_fen();
        assert!(matches!(
            game.make_move(mv("e2", "e5")),
            Err(GameError::IllegalMove)
        ));
        assert_eq!(game.to_fen(), before);
        assert!(game.history().is_empty());
    }

    #[test]
    fn test_en_passant_records_capture() {
        let mut game =
            Game::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let entry = game.make_move(mv("e5", "f6")).unwrap();
        assert_eq!(entry.captured, Some(Piece::Pawn));
        assert_eq!(entry.san, "exf6");
    }

    #[test]
    fn test_castling_uci_uses_king_square() {
        let mut game = Game::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let entry = game.make_move(mv("e1", "h1")).unwrap();
        assert_eq!(entry.uci, "e1g1");
        assert_eq!(entry.captured, None);
    }

    #[test]
    fn test_repetition_count() {
        let mut game = Game::new();
        for _ in 0..2 {
            game.make_move(mv("g1", "f3")).unwrap();
            game.make_move(mv("g8", "f6")).unwrap();
            game.make_move(mv("f3", "g1")).unwrap();
            game.make_move(mv("f6", "g8")).unwrap();
        }
        assert_eq!(game.repetition_count(), 3);
    }

    #[test]
    fn test_insufficient_material() {
        let bare_kings = Game::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(bare_kings.insufficient_material());

        let knight = Game::from_fen("4k3/8/8/8/8/8/8/4KN2 w - - 0 1").unwrap();
        assert!(knight.insufficient_material());

        let rook = Game::from_fen("4k3/8/8/8/8/8/8/4KR2 w - - 0 1").unwrap();
        assert!(!rook.insufficient_material());

        let two_knights = Game::from_fen("4k3/8/8/8/8/8/8/3NKN2 w - - 0 1").unwrap();
        assert!(!two_knights.insufficient_material());
    }

    #[test]
    fn test_replay_matches_live_game() {
        let moves = [mv("e2", "e4"), mv("e7", "e5"), mv("g1", "f3")];
        let mut live = Game::new();
        for m in moves {
            live.make_move(m).unwrap();
        }
        let replayed = Game::replay(StartPosition::Standard, &moves).unwrap();
        assert_eq!(replayed.to_fen(), live.to_fen());
    }
}
