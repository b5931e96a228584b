//! Score normalization.
//!
//! Engine scores come in two scales (centipawns and mate distance) and are
//! relative to whichever side was to move. [`normalize`] folds both into a
//! single signed integer seen from a caller-chosen perspective, so that a
//! higher number is always better for that side.

use shakmaty::Color;

use crate::Evaluation;

/// Default magnitude substituted for forced-mate scores.
pub const DEFAULT_MATE_SCORE: i32 = 1500;

/// Converts `evaluation` into a signed score from `perspective`.
///
/// Mate scores lose their distance: any mate for `perspective` becomes
/// `mate_score`, any mate against it becomes `-mate_score`. A mate distance of
/// zero means the evaluation's own side is already checkmated.
pub fn normalize(evaluation: Evaluation, perspective: Color, mate_score: i32) -> i32 {
    let (value, pov) = match evaluation {
        Evaluation::Centipawns { cp, pov } => (cp, pov),
        Evaluation::Mate { moves, pov } => {
            let value = if moves > 0 { mate_score } else { -mate_score };
            (value, pov)
        }
    };

    if pov == perspective {
        value
    } else {
        -value
    }
}
