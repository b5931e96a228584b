//! Move-quality review of chess games against a UCI engine.
//!
//! Each move of a tracked player is compared with the engine's preferred move
//! in the same position. The difference between the two resulting scores is
//! the move's gap.
//!
//! # Overview
//!
//! - [`decode_pgn`] - Decodes a PGN record into a start position and moves
//! - [`PositionTracker`] - Push/pop position stack used for probing moves
//! - [`Evaluator`] / [`UciEngine`] - Engine sessions speaking UCI
//! - [`normalize`] - Scores from the tracked player's perspective
//! - [`analyze_game`] / [`review_games`] / [`review_each`] - The review pipeline
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{review_games, AnalysisConfig, EngineConfig, GameRecord, UciEngine};
//!
//! let engine = EngineConfig::default();
//! let outcomes = review_games(&records, |_| UciEngine::open(&engine), &AnalysisConfig::default());
//! for outcome in outcomes {
//!     if let Ok(review) = outcome.result {
//!         println!("{}: {:.1}% accurate", review.game_id, review.stats().accuracy_percent);
//!     }
//! }
//! ```

pub mod analyzer;
pub mod decoder;
pub mod engine;
pub mod evaluation;
pub mod game;
pub mod quality;
pub mod score;
pub mod tracker;

pub use analyzer::{
    analyze_game, review_each, review_games, AnalysisConfig, Finish, GameOutcome, GameReview,
    ReviewError, Traversal, TraversalState,
};
pub use decoder::{decode_pgn, DecodeError, DecodedPgn};
pub use engine::{EngineConfig, EngineError, Evaluator, PositionAnalysis, SearchLimit, UciEngine};
pub use evaluation::Evaluation;
pub use game::{player_color, Game, GameRecord};
pub use quality::{MoveQuality, MoveRecord, PlayerStats};
pub use score::{normalize, DEFAULT_MATE_SCORE};
pub use tracker::{move_to_uci, parse_uci_move, PositionTracker, StateError};
