//! Mutable board state with explicit push/pop.
//!
//! The [`PositionTracker`] is owned by a single game traversal. Probing an
//! alternative move is done by pushing it, analysing, and popping it again;
//! every push keeps the previous position on an undo stack so that a pop
//! restores it exactly.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;

/// Errors raised when the push/pop protocol is violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The move is not legal in the tracker's current position.
    #[error("Illegal move {uci} in position {fen}")]
    IllegalMove { uci: String, fen: String },
    /// `pop` was called without a matching `push`.
    #[error("Cannot pop: no move has been pushed")]
    EmptyHistory,
}

/// Renders a move in UCI notation (standard castling, e.g. "e1g1").
pub fn move_to_uci(m: &Move) -> String {
    m.to_uci(CastlingMode::Standard).to_string()
}

/// Resolves a UCI move string against the legal moves of `position`.
pub fn parse_uci_move(position: &Chess, uci: &str) -> Option<Move> {
    position
        .legal_moves()
        .into_iter()
        .find(|m| move_to_uci(m) == uci)
}

/// Owned board state for one traversal.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    position: Chess,
    history: Vec<Chess>,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(Chess::default())
    }
}

impl PositionTracker {
    /// Creates a tracker positioned at `start`.
    pub fn new(start: Chess) -> Self {
        Self {
            position: start,
            history: Vec::new(),
        }
    }

    /// The current position.
    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// The side to move in the current position.
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Number of pushes not yet reverted.
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// Returns true if `m` is legal in the current position.
    pub fn is_legal(&self, m: &Move) -> bool {
        self.position.legal_moves().contains(m)
    }

    /// Applies `m` to the current position.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::IllegalMove`] if `m` is not legal here; the
    /// position is left untouched in that case.
    pub fn push(&mut self, m: &Move) -> Result<(), StateError> {
        self.ensure_legal(m)?;
        let previous = self.position.clone();
        self.position.play_unchecked(m.clone());
        self.history.push(previous);
        Ok(())
    }

    /// Reverts the most recent [`push`](Self::push).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::EmptyHistory`] if there is nothing to revert.
    pub fn pop(&mut self) -> Result<(), StateError> {
        self.position = self.history.pop().ok_or(StateError::EmptyHistory)?;
        Ok(())
    }

    /// The current position in FEN.
    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    /// Renders `m` in SAN (with `+`/`#` suffix) relative to the current position.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::IllegalMove`] if `m` is not legal here.
    pub fn san(&self, m: &Move) -> Result<String, StateError> {
        self.ensure_legal(m)?;
        let mut after = self.position.clone();
        Ok(SanPlus::from_move_and_play_unchecked(&mut after, m.clone()).to_string())
    }

    /// Resolves a UCI string to a legal move of the current position.
    pub fn parse_uci(&self, uci: &str) -> Option<Move> {
        parse_uci_move(&self.position, uci)
    }

    fn ensure_legal(&self, m: &Move) -> Result<(), StateError> {
        if self.is_legal(m) {
            Ok(())
        } else {
            Err(StateError::IllegalMove {
                uci: move_to_uci(m),
                fen: self.fen(),
            })
        }
    }
}
