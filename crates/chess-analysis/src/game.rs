//! Decoded games ready for review.

use shakmaty::{Chess, Color, Move};

use crate::decoder::{decode_pgn, find_tag, DecodeError};

/// A game to review: its moves plus which side is being evaluated.
///
/// Immutable once decoded; each traversal replays it on its own
/// [`PositionTracker`](crate::PositionTracker).
#[derive(Debug, Clone)]
pub struct Game {
    /// Source identifier, usually the archive URL.
    pub id: String,
    /// The color whose moves are evaluated.
    pub player: Color,
    /// Position before the first move.
    pub start: Chess,
    /// Mainline moves.
    pub moves: Vec<Move>,
    /// PGN tag pairs.
    pub tags: Vec<(String, String)>,
}

impl Game {
    /// Decodes a PGN record into a game evaluated for `player`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the record is malformed or contains an
    /// illegal move.
    pub fn from_pgn(id: impl Into<String>, player: Color, pgn: &str) -> Result<Self, DecodeError> {
        let decoded = decode_pgn(pgn)?;
        Ok(Self {
            id: id.into(),
            player,
            start: decoded.start,
            moves: decoded.moves,
            tags: decoded.tags,
        })
    }

    /// Returns the value of the first tag called `name`.
    pub fn tag(&self, name: &str) -> Option<&str> {
        find_tag(&self.tags, name)
    }

    /// Number of plies in the mainline.
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }
}

/// An undecoded game as supplied by an archive: PGN text plus the side to review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// Source identifier, usually the archive URL.
    pub id: String,
    /// The color whose moves are evaluated.
    pub player: Color,
    /// The PGN text of the game.
    pub pgn: String,
}

impl GameRecord {
    /// Decodes the record into a [`Game`].
    pub fn decode(&self) -> Result<Game, DecodeError> {
        Game::from_pgn(self.id.clone(), self.player, &self.pgn)
    }
}

/// Finds which color `username` played from the `White`/`Black` tags.
///
/// The comparison ignores ASCII case, matching how chess.com usernames are
/// looked up.
pub fn player_color(tags: &[(String, String)], username: &str) -> Option<Color> {
    let matches = |tag: &str| {
        find_tag(tags, tag).is_some_and(|name| name.eq_ignore_ascii_case(username))
    };
    if matches("White") {
        Some(Color::White)
    } else if matches("Black") {
        Some(Color::Black)
    } else {
        None
    }
}
