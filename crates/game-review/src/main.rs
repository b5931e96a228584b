//! Game Review - scores a player's moves against a UCI engine.
//!
//! Reads games from a saved chess.com archive or a single PGN file, reviews
//! them one engine session per game, and prints one JSON line per scored move
//! to stdout (or `--output`). Logs go to stderr.

mod archive;
mod config;
mod output;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use archive::Archive;
use chess_analysis::{
    decode_pgn, player_color, review_each, AnalysisConfig, EngineError, Evaluator, Game,
    GameOutcome, GameRecord, UciEngine,
};
use clap::{Parser, Subcommand, ValueEnum};
use config::{Overrides, ReviewConfig};
use output::RecordWriter;
use shakmaty::Color;
use tracing::{debug, info, warn, Level};

/// Reviews chess games move by move against a UCI engine.
#[derive(Parser)]
#[command(name = "game-review")]
#[command(about = "Scores a player's moves against a UCI engine")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Engine executable (overrides the config file)
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Engine threads (overrides the config file)
    #[arg(long, global = true)]
    threads: Option<u32>,

    /// Search depth per position
    #[arg(short, long, global = true, conflicts_with = "movetime")]
    depth: Option<u32>,

    /// Search time per position in milliseconds
    #[arg(long, global = true)]
    movetime: Option<u64>,

    /// Moves of the player to score per game (0 for all)
    #[arg(short, long, global = true)]
    max_moves: Option<usize>,

    /// Write records to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a user's games from a saved chess.com monthly archive
    Archive {
        /// Archive JSON file
        file: PathBuf,
        /// Chess.com username (defaults to the config file)
        #[arg(short, long)]
        username: Option<String>,
        /// Only review games with this time control, e.g. "600"
        #[arg(short, long)]
        time_control: Option<String>,
        /// Review at most this many games
        #[arg(short, long)]
        games: Option<usize>,
    },
    /// Review a single PGN file
    Pgn {
        /// PGN file
        file: PathBuf,
        /// Side to review
        #[arg(long, value_enum)]
        color: Option<Side>,
        /// Pick the side from the White/Black tags instead
        #[arg(short, long, conflicts_with = "color")]
        username: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(ReviewConfig::config_path);
    let config = ReviewConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
        .with_overrides(&cli.overrides());
    let engine = config.engine_config();
    let analysis = config.analysis_config()?;
    debug!(?engine, ?analysis, "Configuration loaded");

    let records = match &cli.command {
        Commands::Archive {
            file,
            username,
            time_control,
            games,
        } => {
            let Some(username) = username.as_deref().or(config.username.as_deref()) else {
                bail!("No username given; pass --username or set it in {}", config_path.display());
            };
            let archive = Archive::load(file)
                .with_context(|| format!("Failed to load archive {}", file.display()))?;
            let time_control = time_control.as_deref().or(config.time_control.as_deref());
            archive.select(username, time_control, *games)
        }
        Commands::Pgn {
            file,
            color,
            username,
        } => vec![pgn_record(file, *color, username.as_deref())?],
    };

    if records.is_empty() {
        warn!("No games to review");
        return Ok(());
    }

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = RecordWriter::new(out);

    let summary = run_review(
        &records,
        |_: &Game| UciEngine::open(&engine),
        &analysis,
        &mut writer,
    )?;

    info!(
        games = summary.games,
        failed = summary.failed,
        records = writer.written(),
        "Review finished"
    );
    if summary.failed == summary.games {
        bail!("All {} games failed", summary.failed);
    }
    Ok(())
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            engine: self.engine.clone(),
            threads: self.threads,
            depth: self.depth,
            movetime_ms: self.movetime,
            max_moves: self.max_moves,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Builds the record for a single PGN file.
fn pgn_record(
    file: &Path,
    color: Option<Side>,
    username: Option<&str>,
) -> anyhow::Result<GameRecord> {
    let pgn = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let player = match (color, username) {
        (Some(side), _) => Color::from(side),
        (None, Some(username)) => {
            let decoded = decode_pgn(&pgn)
                .with_context(|| format!("Failed to decode {}", file.display()))?;
            player_color(&decoded.tags, username).with_context(|| {
                format!("{} did not play in {}", username, file.display())
            })?
        }
        (None, None) => bail!("Pass --color or --username to choose the side to review"),
    };

    Ok(GameRecord {
        id: file.display().to_string(),
        player,
        pgn,
    })
}

/// Games handed to the engine and how many of them failed.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    games: usize,
    failed: usize,
}

/// Reviews `records` one session at a time, writing each game's records
/// before the next game's session is opened.
fn run_review<E, F, W>(
    records: &[GameRecord],
    mut open: F,
    analysis: &AnalysisConfig,
    writer: &mut RecordWriter<W>,
) -> anyhow::Result<Summary>
where
    E: Evaluator,
    F: FnMut(&Game) -> Result<E, EngineError>,
    W: Write,
{
    let total = records.len();
    let mut index = 0;
    let mut summary = Summary::default();

    review_each(
        records,
        |game: &Game| {
            index += 1;
            info!(
                game = %game.id,
                player = ?game.player,
                plies = game.ply_count(),
                "Reviewing game {}/{}",
                index,
                total
            );
            open(game)
        },
        analysis,
        |outcome| {
            summary.games += 1;
            if !report(&outcome, writer)? {
                summary.failed += 1;
            }
            Ok::<(), anyhow::Error>(())
        },
    )?;

    Ok(summary)
}

/// Writes a successful review and logs its statistics, or logs the failure.
///
/// Returns whether the game was reviewed.
fn report<W: Write>(outcome: &GameOutcome, writer: &mut RecordWriter<W>) -> anyhow::Result<bool> {
    match &outcome.result {
        Ok(review) => {
            writer
                .write_review(review)
                .context("Failed to write move records")?;
            let stats = review.stats();
            info!(
                game = %review.game_id,
                moves = stats.total_moves,
                avg_gap = stats.avg_gap,
                accuracy = stats.accuracy_percent,
                inaccuracies = stats.inaccuracies,
                mistakes = stats.mistakes,
                blunders = stats.blunders,
                "Game summary"
            );
            Ok(true)
        }
        Err(e) => {
            warn!(game = %outcome.game_id, error = %e, "Skipped game");
            Ok(false)
        }
    }
}
