//! Per-move records and move quality classification.

use serde::Serialize;

/// One evaluated move of the tracked player.
///
/// Field names are part of the output format and stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    /// Identifier of the game the move belongs to.
    pub game_id: String,
    /// 1-based count of the tracked player's moves (not the ply number).
    pub move_number: usize,
    /// Position before the move, in FEN.
    pub fen: String,
    /// The move played, in SAN.
    pub played_san: String,
    /// The move played, in UCI notation.
    pub played_uci: String,
    /// The engine's preferred move, in SAN.
    pub best_san: String,
    /// The engine's preferred move, in UCI notation.
    pub best_uci: String,
    /// Score after the played move, from the tracked player's side.
    pub played_score: i32,
    /// Score after the preferred move, from the tracked player's side.
    pub best_score: i32,
    /// `best_score - played_score`, never negative.
    pub gap: i32,
}

impl MoveRecord {
    /// Classifies this move by its gap.
    pub fn quality(&self) -> MoveQuality {
        MoveQuality::from_gap(self.gap)
    }
}

/// Classification of move quality based on the gap to the engine's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    /// No loss against the engine's preferred move
    Best,
    /// Up to 10 centipawns lost
    Excellent,
    /// Up to 49 centipawns lost
    Good,
    /// 50 to 99 centipawns lost
    Inaccuracy,
    /// 100 to 299 centipawns lost
    Mistake,
    /// 300 centipawns or more lost
    Blunder,
}

impl MoveQuality {
    /// Classifies a centipawn gap.
    pub fn from_gap(gap: i32) -> Self {
        match gap {
            i32::MIN..=0 => MoveQuality::Best,
            1..=10 => MoveQuality::Excellent,
            11..=49 => MoveQuality::Good,
            50..=99 => MoveQuality::Inaccuracy,
            100..=299 => MoveQuality::Mistake,
            _ => MoveQuality::Blunder,
        }
    }
}

/// Statistics for the tracked player's performance in a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerStats {
    /// Total moves analyzed
    pub total_moves: u32,
    /// Number of best moves
    pub best_moves: u32,
    /// Number of excellent moves
    pub excellent_moves: u32,
    /// Number of good moves
    pub good_moves: u32,
    /// Number of inaccuracies
    pub inaccuracies: u32,
    /// Number of mistakes
    pub mistakes: u32,
    /// Number of blunders
    pub blunders: u32,
    /// Average gap in centipawns
    pub avg_gap: f64,
    /// Share of moves rated good or better (0-100)
    pub accuracy_percent: f64,
}

impl PlayerStats {
    /// Summarizes a game's records.
    pub fn from_records(records: &[MoveRecord]) -> Self {
        let mut stats = PlayerStats::default();
        if records.is_empty() {
            return stats;
        }

        let mut total_gap: i64 = 0;
        for record in records {
            stats.total_moves += 1;
            total_gap += i64::from(record.gap);
            match record.quality() {
                MoveQuality::Best => stats.best_moves += 1,
                MoveQuality::Excellent => stats.excellent_moves += 1,
                MoveQuality::Good => stats.good_moves += 1,
                MoveQuality::Inaccuracy => stats.inaccuracies += 1,
                MoveQuality::Mistake => stats.mistakes += 1,
                MoveQuality::Blunder => stats.blunders += 1,
            }
        }

        let total = f64::from(stats.total_moves);
        let solid = stats.best_moves + stats.excellent_moves + stats.good_moves;
        stats.avg_gap = total_gap as f64 / total;
        stats.accuracy_percent = f64::from(solid) * 100.0 / total;
        stats
    }
}
