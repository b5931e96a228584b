//! Move-quality review of complete games.
//!
//! A [`Traversal`] replays one game on its own [`PositionTracker`] and, for
//! every move of the tracked player, compares the score after the played move
//! with the score after the engine's preferred move:
//!
//! 1. analyse the position before the move to get the preferred move;
//! 2. push the played move, analyse, pop;
//! 3. push the preferred move, analyse, pop;
//! 4. push the played move again and continue.
//!
//! Every probe is popped before the real move is pushed, so the tracker never
//! drifts from the game's actual move sequence.

use std::convert::Infallible;

use shakmaty::{Color, Move};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decoder::DecodeError;
use crate::engine::{EngineError, Evaluator, PositionAnalysis, SearchLimit};
use crate::game::{Game, GameRecord};
use crate::quality::{MoveRecord, PlayerStats};
use crate::score::{normalize, DEFAULT_MATE_SCORE};
use crate::tracker::{move_to_uci, PositionTracker, StateError};

/// Errors that end the review of a single game.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// The game record could not be decoded.
    #[error("Cannot decode game: {0}")]
    Decode(#[from] DecodeError),
    /// No engine session could be opened for the game.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),
    /// The push/pop protocol was violated.
    #[error("Position tracking failed: {0}")]
    State(#[from] StateError),
    /// An engine request failed while scoring a move.
    #[error("Evaluation failed at ply {ply}: {source}")]
    Evaluation {
        ply: usize,
        #[source]
        source: EngineError,
    },
}

/// Configuration for game review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Search limit for every engine request.
    pub limit: SearchLimit,
    /// Maximum number of the tracked player's moves to score; `None` scores
    /// the whole game.
    pub max_moves: Option<usize>,
    /// Score substituted for forced mates.
    pub mate_score: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            limit: SearchLimit::default(),
            max_moves: Some(30),
            mate_score: DEFAULT_MATE_SCORE,
        }
    }
}

/// Why a traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// Every move of the game was replayed.
    Exhausted,
    /// The configured number of moves was scored.
    MoveLimit,
}

/// Where a traversal stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    /// Nothing replayed yet.
    Idle,
    /// Last step replayed an opponent move.
    Scanning,
    /// Last step scored a move of the tracked player.
    Scoring,
    /// Traversal ended normally.
    Done(Finish),
    /// Traversal hit an error and cannot continue.
    Failed,
}

impl TraversalState {
    /// Returns true once no further steps are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TraversalState::Done(_) | TraversalState::Failed)
    }
}

/// The result of reviewing one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameReview {
    /// Identifier of the reviewed game.
    pub game_id: String,
    /// The color that was evaluated.
    pub player: Color,
    /// One record per scored move, in game order.
    pub records: Vec<MoveRecord>,
    /// Why traversal stopped.
    pub finish: Finish,
}

impl GameReview {
    /// Summary statistics over the records.
    pub fn stats(&self) -> PlayerStats {
        PlayerStats::from_records(&self.records)
    }
}

/// Outcome of one game in a multi-game review.
#[derive(Debug)]
pub struct GameOutcome {
    /// Identifier of the game.
    pub game_id: String,
    /// The review, or the error that ended it. Partial records of a failed
    /// game are not kept.
    pub result: Result<GameReview, ReviewError>,
}

/// Step-wise replay of one game against an evaluator.
pub struct Traversal<'a, E: Evaluator + ?Sized> {
    game: &'a Game,
    engine: &'a mut E,
    config: &'a AnalysisConfig,
    tracker: PositionTracker,
    next_ply: usize,
    records: Vec<MoveRecord>,
    state: TraversalState,
}

impl<'a, E: Evaluator + ?Sized> Traversal<'a, E> {
    /// Prepares a traversal of `game` at its starting position.
    pub fn new(game: &'a Game, engine: &'a mut E, config: &'a AnalysisConfig) -> Self {
        Self {
            game,
            engine,
            config,
            tracker: PositionTracker::new(game.start.clone()),
            next_ply: 0,
            records: Vec::new(),
            state: TraversalState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Records emitted so far.
    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    /// FEN of the replayed position.
    pub fn fen(&self) -> String {
        self.tracker.fen()
    }

    /// Replays one ply, scoring it if the tracked player made it.
    ///
    /// Returns the new state. Terminal states are sticky: stepping a finished
    /// or failed traversal returns its state again.
    ///
    /// # Errors
    ///
    /// Any tracker or engine failure moves the traversal to
    /// [`TraversalState::Failed`] and is returned.
    pub fn step(&mut self) -> Result<TraversalState, ReviewError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        match self.advance() {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(e) => {
                self.state = TraversalState::Failed;
                Err(e)
            }
        }
    }

    /// Consumes a finished traversal into its review.
    ///
    /// Returns `None` unless the traversal is [`TraversalState::Done`].
    pub fn into_review(self) -> Option<GameReview> {
        match self.state {
            TraversalState::Done(finish) => Some(self.finish_review(finish)),
            _ => None,
        }
    }

    fn finish_review(self, finish: Finish) -> GameReview {
        GameReview {
            game_id: self.game.id.clone(),
            player: self.game.player,
            records: self.records,
            finish,
        }
    }

    fn advance(&mut self) -> Result<TraversalState, ReviewError> {
        let game = self.game;
        let Some(played) = game.moves.get(self.next_ply) else {
            return Ok(TraversalState::Done(Finish::Exhausted));
        };

        if self.tracker.turn() != game.player {
            self.tracker.push(played)?;
            self.next_ply += 1;
            return Ok(TraversalState::Scanning);
        }

        if self
            .config
            .max_moves
            .is_some_and(|max| self.records.len() >= max)
        {
            return Ok(TraversalState::Done(Finish::MoveLimit));
        }

        let record = self.score_move(self.next_ply + 1, played)?;
        self.records.push(record);
        self.next_ply += 1;
        Ok(TraversalState::Scoring)
    }

    fn score_move(&mut self, ply: usize, played: &Move) -> Result<MoveRecord, ReviewError> {
        let player = self.game.player;
        let mate_score = self.config.mate_score;

        let before = self.analyse(ply)?;
        let best = before.best_move.ok_or_else(|| ReviewError::Evaluation {
            ply,
            source: EngineError::InvalidResponse(
                "no preferred move for a position with legal moves".to_string(),
            ),
        })?;

        let fen = self.tracker.fen();
        let played_san = self.tracker.san(played)?;
        let best_san = self.tracker.san(&best)?;

        self.tracker.push(played)?;
        let after_played = self.analyse(ply)?;
        self.tracker.pop()?;
        let played_score = normalize(after_played.evaluation, player, mate_score);

        let best_score = if best == *played {
            played_score
        } else {
            self.tracker.push(&best)?;
            let after_best = self.analyse(ply)?;
            self.tracker.pop()?;
            normalize(after_best.evaluation, player, mate_score)
        };

        self.tracker.push(played)?;

        let record = MoveRecord {
            game_id: self.game.id.clone(),
            move_number: self.records.len() + 1,
            fen,
            played_san,
            played_uci: move_to_uci(played),
            best_san,
            best_uci: move_to_uci(&best),
            played_score,
            best_score,
            gap: best_score.saturating_sub(played_score).max(0),
        };
        debug!(
            game = %record.game_id,
            move_number = record.move_number,
            played = %record.played_san,
            best = %record.best_san,
            played_score,
            best_score,
            gap = record.gap,
            "Move scored"
        );
        Ok(record)
    }

    fn analyse(&mut self, ply: usize) -> Result<PositionAnalysis, ReviewError> {
        self.engine
            .analyse(self.tracker.position(), self.config.limit)
            .map_err(|source| ReviewError::Evaluation { ply, source })
    }
}

/// Reviews one game with an already opened evaluator session.
///
/// # Errors
///
/// Returns the first tracker or engine error; records gathered before it are
/// discarded.
pub fn analyze_game<E: Evaluator + ?Sized>(
    engine: &mut E,
    game: &Game,
    config: &AnalysisConfig,
) -> Result<GameReview, ReviewError> {
    let mut traversal = Traversal::new(game, engine, config);
    let finish = loop {
        if let TraversalState::Done(finish) = traversal.step()? {
            break finish;
        }
    };

    let review = traversal.finish_review(finish);
    info!(
        game = %review.game_id,
        moves = review.records.len(),
        finish = ?review.finish,
        "Game reviewed"
    );
    Ok(review)
}

/// Reviews a batch of games, one evaluator session per game.
///
/// For each record the game is decoded, a session is obtained from `open`,
/// the game is reviewed, and the session is dropped before the next game
/// starts. A failing game yields an error outcome and does not affect the
/// others.
pub fn review_games<E, F>(
    records: &[GameRecord],
    open: F,
    config: &AnalysisConfig,
) -> Vec<GameOutcome>
where
    E: Evaluator,
    F: FnMut(&Game) -> Result<E, EngineError>,
{
    let mut outcomes = Vec::with_capacity(records.len());
    let collected = review_each(records, open, config, |outcome| {
        outcomes.push(outcome);
        Ok::<(), Infallible>(())
    });
    match collected {
        Ok(()) => outcomes,
        Err(never) => match never {},
    }
}

/// Like [`review_games`], but hands every outcome to `on_outcome` as soon as
/// its game is finished and its session released.
///
/// # Errors
///
/// Stops at the first error returned by `on_outcome` and returns it; games
/// after it are not reviewed.
pub fn review_each<E, F, G, X>(
    records: &[GameRecord],
    mut open: F,
    config: &AnalysisConfig,
    mut on_outcome: G,
) -> Result<(), X>
where
    E: Evaluator,
    F: FnMut(&Game) -> Result<E, EngineError>,
    G: FnMut(GameOutcome) -> Result<(), X>,
{
    for record in records {
        let result = review_one(record, &mut open, config);
        if let Err(e) = &result {
            warn!(game = %record.id, error = %e, "Game review failed");
        }
        on_outcome(GameOutcome {
            game_id: record.id.clone(),
            result,
        })?;
    }
    Ok(())
}

fn review_one<E, F>(
    record: &GameRecord,
    open: &mut F,
    config: &AnalysisConfig,
) -> Result<GameReview, ReviewError>
where
    E: Evaluator,
    F: FnMut(&Game) -> Result<E, EngineError>,
{
    let game = record.decode()?;
    let mut session = open(&game).map_err(ReviewError::EngineUnavailable)?;
    let result = analyze_game(&mut session, &game, config);
    drop(session);
    result
}
