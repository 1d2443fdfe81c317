//! Position adapter over the [`chess`] board.
//!
//! `chess::Board` carries the piece placement, castling rights, en-passant
//! state and Zobrist hash, but not the half-move clock or move number the
//! search needs for draw rules and time management. `Position` bundles
//! those counters with the board and exposes exactly the surface the
//! search consumes.

use std::str::FromStr;

use chess::{BitBoard, Board, Color, MoveGen, Piece, EMPTY};

use crate::moves::Move;

/// Errors constructing a [`Position`].
#[derive(Debug, thiserror::Error)]
pub enum PositionError {
    /// The FEN string could not be parsed.
    #[error("invalid FEN: {fen}")]
    InvalidFen {
        /// The offending FEN string.
        fen: String,
    },
}

/// A chess position with draw-rule counters. Copyable; children are made
/// copy-on-move so search frames never share mutable board state.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    board: Board,
    halfmove_clock: u16,
    move_number: u16,
}

impl Position {
    /// The standard starting position.
    pub fn startpos() -> Self {
        Self {
            board: Board::default(),
            halfmove_clock: 0,
            move_number: 1,
        }
    }

    /// Parse a FEN string. The half-move clock and move number fields are
    /// optional and default to `0 1`.
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(PositionError::InvalidFen {
                fen: fen.to_string(),
            });
        }

        let normalized = format!(
            "{} {} {} {} 0 1",
            fields[0], fields[1], fields[2], fields[3]
        );
        let board = Board::from_str(&normalized).map_err(|_| PositionError::InvalidFen {
            fen: fen.to_string(),
        })?;

        let halfmove_clock = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        let move_number = fields.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);

        Ok(Self {
            board,
            halfmove_clock,
            move_number,
        })
    }

    /// The underlying board, for attack-table queries.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Zobrist hash of the position (side to move included).
    #[inline]
    pub fn hash(&self) -> u64 {
        self.board.get_hash()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Plies since the last capture or pawn move.
    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    /// Full-move number, starting at 1.
    #[inline]
    pub fn move_number(&self) -> u16 {
        self.move_number
    }

    /// Whether the side to move is in check.
    #[inline]
    pub fn is_in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    /// Total piece count, kings included.
    #[inline]
    pub fn num_pieces(&self) -> u32 {
        self.board.combined().popcnt()
    }

    /// Whether `side` still has a piece other than pawns and the king.
    /// Guards null-move pruning against zugzwang positions.
    #[inline]
    pub fn has_non_pawn_material(&self, side: Color) -> bool {
        let bb = *self.board.color_combined(side)
            & !*self.board.pieces(Piece::Pawn)
            & !*self.board.pieces(Piece::King);
        bb != EMPTY
    }

    /// Draw by insufficient material: bare kings, a lone minor, or
    /// same-colored bishops only.
    pub fn is_insufficient_material(&self) -> bool {
        let heavy = *self.board.pieces(Piece::Pawn)
            | *self.board.pieces(Piece::Rook)
            | *self.board.pieces(Piece::Queen);
        if heavy != EMPTY {
            return false;
        }

        let knights = *self.board.pieces(Piece::Knight);
        let bishops = *self.board.pieces(Piece::Bishop);
        let minors = (knights | bishops).popcnt();
        if minors <= 1 {
            return true;
        }

        if knights == EMPTY {
            // Bishops only: drawn when all stand on one square color.
            const LIGHT: BitBoard = BitBoard(0x55AA_55AA_55AA_55AA);
            return bishops & LIGHT == bishops || bishops & LIGHT == EMPTY;
        }

        false
    }

    /// Apply a legal move, producing the child position.
    pub fn do_move(&self, mv: Move) -> Position {
        let resets_clock = mv.is_capture() || mv.piece() == Piece::Pawn;
        Position {
            board: self.board.make_move_new(mv.to_chess()),
            halfmove_clock: if resets_clock {
                0
            } else {
                self.halfmove_clock + 1
            },
            move_number: self.move_number + (self.side_to_move() == Color::Black) as u16,
        }
    }

    /// Pass the move to the opponent. `None` when in check.
    pub fn do_null_move(&self) -> Option<Position> {
        self.board.null_move().map(|board| Position {
            board,
            halfmove_clock: self.halfmove_clock + 1,
            move_number: self.move_number + (self.side_to_move() == Color::Black) as u16,
        })
    }

    /// Whether `mv` is legal here. Used to validate TT and PV move hints.
    #[inline]
    pub fn is_move_legal(&self, mv: Move) -> bool {
        self.board.legal(mv.to_chess())
    }

    /// All legal moves with full move context attached.
    pub fn legal_moves(&self) -> Vec<Move> {
        MoveGen::new_legal(&self.board)
            .map(|cm| Move::from_chess(cm, &self.board))
            .collect()
    }

    /// Iterate legal moves without collecting.
    pub fn for_each_legal_move(&self, mut f: impl FnMut(Move)) {
        for cm in MoveGen::new_legal(&self.board) {
            f(Move::from_chess(cm, &self.board));
        }
    }

    /// Resolve a UCI move string (`e2e4`, `e7e8q`) against the legal moves.
    pub fn parse_uci_move(&self, s: &str) -> Option<Move> {
        let mut found = None;
        self.for_each_legal_move(|mv| {
            if mv.to_uci() == s {
                found = Some(mv);
            }
        });
        found
    }
}
