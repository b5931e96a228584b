//! PGN game record decoding.
//!
//! Turns the text of a single PGN game into its tag pairs, starting position
//! and mainline moves. Lexing is done by [`pgn_reader`]; the [`Visitor`] here
//! skips variations and resolves every mainline SAN against the position
//! reached by the moves before it.

use std::io;
use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move, Position};
use thiserror::Error;

/// Errors that can occur while decoding a game record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The record contains no game.
    #[error("Game record is empty")]
    Empty,
    /// The PGN reader gave up on the record.
    #[error("Unreadable game record: {0}")]
    Unreadable(String),
    /// The `FEN` tag does not describe a legal standard position.
    #[error("Invalid FEN tag {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },
    /// A SAN move is illegal or ambiguous in its position.
    #[error("Illegal move {token:?} at ply {ply}: {reason}")]
    IllegalMove {
        ply: usize,
        token: String,
        reason: String,
    },
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        DecodeError::Unreadable(err.to_string())
    }
}

/// The decoded content of one PGN game.
#[derive(Debug, Clone)]
pub struct DecodedPgn {
    /// Tag pairs in the order they appear.
    pub tags: Vec<(String, String)>,
    /// Position the moves start from.
    pub start: Chess,
    /// Mainline moves, each legal after the ones before it.
    pub moves: Vec<Move>,
}

impl DecodedPgn {
    /// Returns the value of the first tag called `name`.
    pub fn tag(&self, name: &str) -> Option<&str> {
        find_tag(&self.tags, name)
    }
}

pub(crate) fn find_tag<'a>(tags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Decodes one PGN game.
///
/// Only the first game of `pgn` is read.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the record holds no game, its `FEN` tag is
/// invalid, or any move is illegal against the position implied by its
/// predecessors.
pub fn decode_pgn(pgn: &str) -> Result<DecodedPgn, DecodeError> {
    let mut reader = Reader::new(pgn.as_bytes());
    match reader.read_game(&mut MainlineVisitor)? {
        Some(decoded) => decoded,
        None => Err(DecodeError::Empty),
    }
}

/// Moves of the mainline as they are replayed.
struct Mainline {
    tags: Vec<(String, String)>,
    start: Chess,
    position: Chess,
    moves: Vec<Move>,
}

struct MainlineVisitor;

impl Visitor for MainlineVisitor {
    type Tags = Vec<(String, String)>;
    type Movetext = Mainline;
    type Output = Result<DecodedPgn, DecodeError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(Vec::new())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let key = String::from_utf8_lossy(key).into_owned();
        let value = value.decode_utf8_lossy().into_owned();
        tags.push((key, value));
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let start = match find_tag(&tags, "FEN").map(parse_start) {
            Some(Ok(position)) => position,
            Some(Err(e)) => return ControlFlow::Break(Err(e)),
            None => Chess::default(),
        };
        ControlFlow::Continue(Mainline {
            tags,
            position: start.clone(),
            start,
            moves: Vec::new(),
        })
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, mainline: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        let ply = mainline.moves.len() + 1;
        match san.san.to_move(&mainline.position) {
            Ok(m) => {
                mainline.position.play_unchecked(m.clone());
                mainline.moves.push(m);
                ControlFlow::Continue(())
            }
            Err(e) => ControlFlow::Break(Err(DecodeError::IllegalMove {
                ply,
                token: san.to_string(),
                reason: e.to_string(),
            })),
        }
    }

    fn end_game(&mut self, mainline: Self::Movetext) -> Self::Output {
        Ok(DecodedPgn {
            tags: mainline.tags,
            start: mainline.start,
            moves: mainline.moves,
        })
    }
}

fn parse_start(fen: &str) -> Result<Chess, DecodeError> {
    let invalid = |reason: String| DecodeError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{e}")))
}
