//! Review pipeline tests against a scripted evaluator.
//!
//! The scripted evaluator answers from a table keyed by FEN, so each test
//! controls exactly which move the "engine" prefers and how it scores.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chess_analysis::{
    analyze_game, parse_uci_move, review_each, review_games, AnalysisConfig, EngineError, Evaluation,
    Evaluator, Finish, Game, GameRecord, PositionAnalysis, PositionTracker, ReviewError,
    SearchLimit, Traversal, TraversalState,
};
use proptest::prelude::*;
use shakmaty::{Chess, Color, Position};

/// A scripted score.
#[derive(Clone, Copy)]
enum Score {
    /// Centipawns from White's side.
    WhiteCp(i32),
    /// Mate distance from the side to move: positive when it mates, negative
    /// when it gets mated, zero when it is already checkmated.
    Mate(i32),
}

/// Answers for one position: preferred move and score.
#[derive(Clone, Copy)]
struct Answer {
    best: Option<&'static str>,
    score: Score,
}

#[derive(Default)]
struct ScriptedEvaluator {
    answers: HashMap<String, Answer>,
    calls: Vec<String>,
    fail_on_call: Option<usize>,
    release: Option<ReleaseCounter>,
}

/// Counts how many sessions have been released.
struct ReleaseCounter(Rc<Cell<usize>>);

impl Drop for ReleaseCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

impl ScriptedEvaluator {
    fn answer(self, moves: &[&str], best: Option<&'static str>, white_cp: i32) -> Self {
        self.scripted(moves, best, Score::WhiteCp(white_cp))
    }

    fn mate(self, moves: &[&str], best: Option<&'static str>, mate_in: i32) -> Self {
        self.scripted(moves, best, Score::Mate(mate_in))
    }

    fn scripted(mut self, moves: &[&str], best: Option<&'static str>, score: Score) -> Self {
        self.answers.insert(fen_after(moves), Answer { best, score });
        self
    }
}

impl Evaluator for ScriptedEvaluator {
    fn analyse(
        &mut self,
        position: &Chess,
        _limit: SearchLimit,
    ) -> Result<PositionAnalysis, EngineError> {
        let fen = PositionTracker::new(position.clone()).fen();
        self.calls.push(fen.clone());
        if self.fail_on_call == Some(self.calls.len()) {
            return Err(EngineError::InvalidResponse(
                "Engine closed unexpectedly".to_string(),
            ));
        }

        let answer = self.answers.get(&fen).copied().unwrap_or(Answer {
            best: None,
            score: Score::WhiteCp(0),
        });
        let best_move = match answer.best {
            Some(uci) => parse_uci_move(position, uci),
            None => position.legal_moves().first().cloned(),
        };
        let turn = position.turn();
        let evaluation = match answer.score {
            Score::WhiteCp(cp) if turn == Color::White => Evaluation::Centipawns { cp, pov: turn },
            Score::WhiteCp(cp) => Evaluation::Centipawns { cp: -cp, pov: turn },
            Score::Mate(moves) => Evaluation::Mate { moves, pov: turn },
        };

        Ok(PositionAnalysis {
            evaluation,
            best_move,
            depth: 1,
            nodes: 1,
            pv: Vec::new(),
        })
    }
}

fn fen_after(moves: &[&str]) -> String {
    let mut tracker = PositionTracker::default();
    for uci in moves {
        let m = tracker.parse_uci(uci).expect("legal test move");
        tracker.push(&m).expect("legal test move");
    }
    tracker.fen()
}

fn unlimited() -> AnalysisConfig {
    AnalysisConfig {
        max_moves: None,
        ..AnalysisConfig::default()
    }
}

const BLUNDER_GAME: &str = "1. e4 f6 2. d4 g5 3. Qh5# 1-0";

#[test]
fn test_white_best_move_has_zero_gap() {
    let game = Game::from_pgn("g1", Color::White, "1. e4 e5 *").unwrap();
    let mut engine = ScriptedEvaluator::default()
        .answer(&[], Some("e2e4"), 30)
        .answer(&["e2e4"], Some("e7e5"), 30);

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

    assert_eq!(review.finish, Finish::Exhausted);
    assert_eq!(review.records.len(), 1);
    let record = &review.records[0];
    assert_eq!(record.move_number, 1);
    assert_eq!(record.played_san, "e4");
    assert_eq!(record.best_san, "e4");
    assert_eq!(record.played_uci, "e2e4");
    assert_eq!(record.played_score, 30);
    assert_eq!(record.best_score, 30);
    assert_eq!(record.gap, 0);
    // Before-move probe plus one probe; the preferred move is not probed twice.
    assert_eq!(engine.calls.len(), 2);
}

#[test]
fn test_black_blunder_is_scored_from_black_side() {
    let game = Game::from_pgn("g2", Color::Black, BLUNDER_GAME).unwrap();
    let mut engine = ScriptedEvaluator::default()
        .answer(&["e2e4"], Some("e7e5"), 30)
        .answer(&["e2e4", "f7f6"], None, 400)
        .answer(&["e2e4", "e7e5"], None, 30);

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

    assert_eq!(review.player, Color::Black);
    assert_eq!(review.finish, Finish::Exhausted);
    assert_eq!(review.records.len(), 2);

    let first = &review.records[0];
    assert_eq!(first.move_number, 1);
    assert_eq!(first.fen, fen_after(&["e2e4"]));
    assert_eq!(first.played_san, "f6");
    assert_eq!(first.best_san, "e5");
    assert_eq!(first.played_score, -400);
    assert_eq!(first.best_score, -30);
    assert_eq!(first.gap, 370);

    assert_eq!(review.records[1].move_number, 2);
    assert_eq!(review.records[1].played_san, "g5");
}

#[test]
fn test_black_allowing_mate_scores_minus_mate_score() {
    let game = Game::from_pgn("mated", Color::Black, BLUNDER_GAME).unwrap();
    let mut engine = ScriptedEvaluator::default()
        .answer(&["e2e4"], Some("e7e5"), 30)
        .mate(&["e2e4", "f7f6"], None, 2)
        .answer(&["e2e4", "e7e5"], None, 30)
        .mate(&["e2e4", "f7f6", "d2d4", "g7g5"], Some("d1h5"), 1);

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

    let first = &review.records[0];
    assert_eq!(first.played_san, "f6");
    assert_eq!(first.played_score, -1500);
    assert_eq!(first.best_score, -30);
    assert_eq!(first.gap, 1470);
    assert_eq!(review.records[1].played_san, "g5");
    assert_eq!(review.records[1].played_score, -1500);
}

#[test]
fn test_white_delivering_mate_scores_mate_score() {
    let game = Game::from_pgn("mating", Color::White, BLUNDER_GAME).unwrap();
    let before_mate = ["e2e4", "f7f6", "d2d4", "g7g5"];
    let mut engine = ScriptedEvaluator::default()
        .mate(&before_mate, Some("d1h5"), 1)
        .mate(&["e2e4", "f7f6", "d2d4", "g7g5", "d1h5"], None, 0);

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

    assert_eq!(review.records.len(), 3);
    let mate = &review.records[2];
    assert_eq!(mate.fen, fen_after(&before_mate));
    assert_eq!(mate.played_san, "Qh5#");
    assert_eq!(mate.best_san, "Qh5#");
    assert_eq!(mate.played_score, 1500);
    assert_eq!(mate.best_score, 1500);
    assert_eq!(mate.gap, 0);
}

#[test]
fn test_huge_mate_score_does_not_overflow_gap() {
    let game = Game::from_pgn("huge", Color::White, "1. d4 d5 *").unwrap();
    let mut engine = ScriptedEvaluator::default()
        .answer(&[], Some("e2e4"), 0)
        .mate(&["d2d4"], None, 3)
        .mate(&["e2e4"], None, -2);
    let config = AnalysisConfig {
        max_moves: None,
        mate_score: 2_000_000_000,
        ..AnalysisConfig::default()
    };

    let review = analyze_game(&mut engine, &game, &config).unwrap();

    let record = &review.records[0];
    assert_eq!(record.played_score, -2_000_000_000);
    assert_eq!(record.best_score, 2_000_000_000);
    assert!(record.gap >= 0);
    assert_eq!(record.gap, i32::MAX);
}

#[test]
fn test_records_follow_actual_game_positions() {
    let game = Game::from_pgn("g3", Color::White, BLUNDER_GAME).unwrap();
    let mut engine = ScriptedEvaluator::default();

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

    let fens: Vec<&str> = review.records.iter().map(|r| r.fen.as_str()).collect();
    assert_eq!(
        fens,
        vec![
            fen_after(&[]),
            fen_after(&["e2e4", "f7f6"]),
            fen_after(&["e2e4", "f7f6", "d2d4", "g7g5"]),
        ]
    );
    assert_eq!(review.records[2].played_san, "Qh5#");
}

#[test]
fn test_move_limit_stops_early() {
    let game = Game::from_pgn("g4", Color::Black, BLUNDER_GAME).unwrap();
    let mut engine = ScriptedEvaluator::default();
    let config = AnalysisConfig {
        max_moves: Some(1),
        ..AnalysisConfig::default()
    };

    let review = analyze_game(&mut engine, &game, &config).unwrap();

    assert_eq!(review.finish, Finish::MoveLimit);
    assert_eq!(review.records.len(), 1);
}

#[test]
fn test_move_limit_not_reached_is_exhausted() {
    let game = Game::from_pgn("g5", Color::White, "1. d4 d5 *").unwrap();
    let mut engine = ScriptedEvaluator::default();

    let review = analyze_game(&mut engine, &game, &AnalysisConfig::default()).unwrap();

    assert_eq!(review.finish, Finish::Exhausted);
    assert_eq!(review.records.len(), 1);
}

#[test]
fn test_black_to_move_start_position() {
    let pgn = r#"[FEN "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"]
[SetUp "1"]

1... e5 2. Nf3 *"#;
    let game = Game::from_pgn("g6", Color::Black, pgn).unwrap();
    let mut engine = ScriptedEvaluator::default();

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

    assert_eq!(review.records.len(), 1);
    assert_eq!(review.records[0].played_san, "e5");
}

#[test]
fn test_traversal_steps_through_states() {
    let game = Game::from_pgn("g7", Color::Black, "1. e4 e5 *").unwrap();
    let mut engine = ScriptedEvaluator::default();
    let config = unlimited();
    let mut traversal = Traversal::new(&game, &mut engine, &config);

    assert_eq!(traversal.state(), TraversalState::Idle);
    assert_eq!(traversal.step().unwrap(), TraversalState::Scanning);
    assert_eq!(traversal.fen(), fen_after(&["e2e4"]));
    assert_eq!(traversal.step().unwrap(), TraversalState::Scoring);
    assert_eq!(traversal.records().len(), 1);
    assert_eq!(traversal.fen(), fen_after(&["e2e4", "e7e5"]));
    assert_eq!(
        traversal.step().unwrap(),
        TraversalState::Done(Finish::Exhausted)
    );
    // Terminal states are sticky.
    assert_eq!(
        traversal.step().unwrap(),
        TraversalState::Done(Finish::Exhausted)
    );
    assert!(traversal.into_review().is_some());
}

#[test]
fn test_evaluation_failure_fails_traversal() {
    let game = Game::from_pgn("g8", Color::White, "1. e4 e5 2. Nf3 *").unwrap();
    let mut engine = ScriptedEvaluator {
        fail_on_call: Some(4),
        ..ScriptedEvaluator::default()
    }
    .answer(&[], Some("d2d4"), 0);
    let config = unlimited();
    let mut traversal = Traversal::new(&game, &mut engine, &config);

    let result = loop {
        match traversal.step() {
            Ok(state) if state.is_terminal() => break Ok(state),
            Ok(_) => continue,
            Err(e) => break Err(e),
        }
    };

    assert!(matches!(result, Err(ReviewError::Evaluation { ply: 3, .. })));
    assert_eq!(traversal.state(), TraversalState::Failed);
    assert!(traversal.into_review().is_none());
}

#[test]
fn test_review_games_isolates_failures() {
    let records = vec![
        GameRecord {
            id: "unavailable".to_string(),
            player: Color::White,
            pgn: "1. e4 e5 *".to_string(),
        },
        GameRecord {
            id: "malformed".to_string(),
            player: Color::White,
            pgn: "1. e4 e4 *".to_string(),
        },
        GameRecord {
            id: "fine".to_string(),
            player: Color::Black,
            pgn: "1. e4 e5 *".to_string(),
        },
        GameRecord {
            id: "broken-engine".to_string(),
            player: Color::White,
            pgn: "1. e4 e5 *".to_string(),
        },
    ];
    let drops = Rc::new(Cell::new(0));
    let mut opened = Vec::new();

    let outcomes = review_games(
        &records,
        |game: &Game| {
            opened.push(game.id.clone());
            match game.id.as_str() {
                "unavailable" => Err(EngineError::Unavailable("no binary".to_string())),
                "broken-engine" => Ok(ScriptedEvaluator {
                    fail_on_call: Some(1),
                    release: Some(ReleaseCounter(Rc::clone(&drops))),
                    ..ScriptedEvaluator::default()
                }),
                _ => Ok(ScriptedEvaluator {
                    release: Some(ReleaseCounter(Rc::clone(&drops))),
                    ..ScriptedEvaluator::default()
                }),
            }
        },
        &unlimited(),
    );

    assert_eq!(outcomes.len(), 4);
    assert!(matches!(
        outcomes[0].result,
        Err(ReviewError::EngineUnavailable(_))
    ));
    assert!(matches!(outcomes[1].result, Err(ReviewError::Decode(_))));
    let review = outcomes[2].result.as_ref().unwrap();
    assert_eq!(review.game_id, "fine");
    assert_eq!(review.records.len(), 1);
    assert!(matches!(
        outcomes[3].result,
        Err(ReviewError::Evaluation { ply: 1, .. })
    ));

    // The malformed game never asks for a session.
    assert_eq!(opened, vec!["unavailable", "fine", "broken-engine"]);
    // Every opened session is released exactly once, including the failed one.
    assert_eq!(drops.get(), 2);
}

#[test]
fn test_review_each_hands_over_each_game_before_the_next_opens() {
    let records: Vec<GameRecord> = ["first", "second"]
        .iter()
        .map(|id| GameRecord {
            id: id.to_string(),
            player: Color::White,
            pgn: "1. e4 e5 *".to_string(),
        })
        .collect();
    let events = RefCell::new(Vec::new());

    let result: Result<(), String> = review_each(
        &records,
        |game: &Game| {
            events.borrow_mut().push(format!("open {}", game.id));
            Ok(ScriptedEvaluator::default())
        },
        &unlimited(),
        |outcome| {
            let moves = outcome.result.map_err(|e| e.to_string())?.records.len();
            events
                .borrow_mut()
                .push(format!("done {} ({moves})", outcome.game_id));
            Ok(())
        },
    );

    assert!(result.is_ok());
    assert_eq!(
        events.into_inner(),
        vec!["open first", "done first (1)", "open second", "done second (1)"]
    );
}

#[test]
fn test_review_each_stops_when_the_handler_fails() {
    let records = vec![
        GameRecord {
            id: "a".to_string(),
            player: Color::White,
            pgn: "1. e4 e5 *".to_string(),
        },
        GameRecord {
            id: "b".to_string(),
            player: Color::White,
            pgn: "1. d4 d5 *".to_string(),
        },
    ];
    let mut opened = Vec::new();

    let result = review_each(
        &records,
        |game: &Game| {
            opened.push(game.id.clone());
            Ok(ScriptedEvaluator::default())
        },
        &unlimited(),
        |outcome| Err(format!("cannot write {}", outcome.game_id)),
    );

    assert_eq!(result, Err("cannot write a".to_string()));
    assert_eq!(opened, vec!["a"]);
}

#[test]
fn test_review_stats_summarize_records() {
    let game = Game::from_pgn("g9", Color::Black, BLUNDER_GAME).unwrap();
    let mut engine = ScriptedEvaluator::default()
        .answer(&["e2e4"], Some("e7e5"), 30)
        .answer(&["e2e4", "f7f6"], None, 400)
        .answer(&["e2e4", "e7e5"], None, 30);

    let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();
    let stats = review.stats();

    assert_eq!(stats.total_moves, 2);
    assert_eq!(stats.blunders, 1);
}

proptest! {
    #[test]
    fn prop_gap_is_never_negative(
        scores in proptest::collection::vec(-2000i32..2000, 6),
        white in any::<bool>(),
    ) {
        let player = if white { Color::White } else { Color::Black };
        let game = Game::from_pgn("prop", player, "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 *").unwrap();
        let plies = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"];
        let mut engine = ScriptedEvaluator::default();
        for (i, cp) in scores.iter().enumerate() {
            engine = engine.answer(&plies[..=i], None, *cp);
        }

        let review = analyze_game(&mut engine, &game, &unlimited()).unwrap();

        prop_assert_eq!(review.records.len(), 3);
        for record in &review.records {
            prop_assert!(record.gap >= 0);
            prop_assert_eq!(record.gap, (record.best_score - record.played_score).max(0));
        }
    }
}
