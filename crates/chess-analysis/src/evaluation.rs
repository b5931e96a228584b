//! Chess position evaluation types.

use shakmaty::Color;

/// An engine's judgment of a position.
///
/// Every evaluation carries the color its number is relative to. UCI engines
/// report scores for the side to move, so the adapter tags each evaluation with
/// the side to move of the analysed position. Turning an evaluation into a
/// comparable integer goes through [`crate::score::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Centipawn score (positive = good for `pov`).
    Centipawns { cp: i32, pov: Color },
    /// Forced mate in `moves` (positive = `pov` mates, negative or zero =
    /// `pov` gets mated).
    Mate { moves: i32, pov: Color },
}

impl Evaluation {
    /// Builds an evaluation from the raw `score cp` / `score mate` fields of a
    /// UCI info line. A mate score wins if both are present.
    pub fn from_uci_score(cp: Option<i32>, mate: Option<i32>, pov: Color) -> Option<Self> {
        match (cp, mate) {
            (_, Some(moves)) => Some(Evaluation::Mate { moves, pov }),
            (Some(cp), None) => Some(Evaluation::Centipawns { cp, pov }),
            (None, None) => None,
        }
    }

    /// Returns true if the evaluation denotes a forced mate.
    pub fn is_mate(&self) -> bool {
        matches!(self, Evaluation::Mate { .. })
    }

    /// The color the raw score is relative to.
    pub fn pov(&self) -> Color {
        match *self {
            Evaluation::Centipawns { pov, .. } | Evaluation::Mate { pov, .. } => pov,
        }
    }
}
