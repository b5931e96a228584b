//! Configuration file loading for game review.
//!
//! Settings live in `review.toml`. A missing file means defaults; command-line
//! flags are applied on top through [`Overrides`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chess_analysis::{AnalysisConfig, EngineConfig, SearchLimit, DEFAULT_MATE_SCORE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// The configuration parsed but its values do not make sense.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How to start the engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EngineSection {
    /// Path to the engine executable. Defaults to "stockfish" (assumes it is in PATH).
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    /// Extra command-line arguments for the engine.
    #[serde(default)]
    pub args: Vec<String>,
    /// UCI `Threads` option. Defaults to 1.
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// UCI `Hash` option in MB; engine default when unset.
    #[serde(default)]
    pub hash_mb: Option<u32>,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}

fn default_threads() -> u32 {
    1
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            args: Vec::new(),
            threads: default_threads(),
            hash_mb: None,
        }
    }
}

/// How deep to look at each position.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AnalysisSection {
    /// Fixed search depth. Mutually exclusive with `movetime_ms`.
    #[serde(default)]
    pub depth: Option<u32>,
    /// Fixed search time per position in milliseconds.
    #[serde(default)]
    pub movetime_ms: Option<u64>,
    /// Moves of the tracked player to score per game; 0 scores every move.
    #[serde(default = "default_max_moves")]
    pub max_moves: usize,
    /// Score substituted for forced mates.
    #[serde(default = "default_mate_score")]
    pub mate_score: i32,
}

fn default_max_moves() -> usize {
    30
}

/// Largest accepted `mate_score`.
pub const MAX_MATE_SCORE: i32 = 100_000;

fn default_mate_score() -> i32 {
    DEFAULT_MATE_SCORE
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            depth: None,
            movetime_ms: None,
            max_moves: default_max_moves(),
            mate_score: default_mate_score(),
        }
    }
}

/// Main review configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ReviewConfig {
    /// Chess.com username whose games are reviewed.
    #[serde(default)]
    pub username: Option<String>,
    /// Only archive games with this exact time control are reviewed.
    #[serde(default)]
    pub time_control: Option<String>,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
}

/// Values given on the command line, each replacing its file counterpart.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub engine: Option<PathBuf>,
    pub threads: Option<u32>,
    pub depth: Option<u32>,
    pub movetime_ms: Option<u64>,
    pub max_moves: Option<usize>,
}

impl ReviewConfig {
    /// Loads the configuration from `path`.
    ///
    /// Returns the default configuration if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default path of the configuration file.
    pub fn config_path() -> PathBuf {
        PathBuf::from("review.toml")
    }

    /// Applies command-line overrides.
    ///
    /// A depth on the command line replaces a file movetime and vice versa.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(path) = &overrides.engine {
            self.engine.path = path.clone();
        }
        if let Some(threads) = overrides.threads {
            self.engine.threads = threads;
        }
        if let Some(depth) = overrides.depth {
            self.analysis.depth = Some(depth);
            self.analysis.movetime_ms = None;
        }
        if let Some(movetime) = overrides.movetime_ms {
            self.analysis.movetime_ms = Some(movetime);
            self.analysis.depth = None;
        }
        if let Some(max_moves) = overrides.max_moves {
            self.analysis.max_moves = max_moves;
        }
        self
    }

    /// Settings for opening engine sessions.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            path: self.engine.path.clone(),
            args: self.engine.args.clone(),
            threads: self.engine.threads,
            hash_mb: self.engine.hash_mb,
        }
    }

    /// Settings for the review pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when both `depth` and `movetime_ms`
    /// are set, when either is zero, or when `mate_score` is
    /// outside `1..=MAX_MATE_SCORE`.
    pub fn analysis_config(&self) -> Result<AnalysisConfig, ConfigError> {
        let analysis = &self.analysis;
        let limit = match (analysis.depth, analysis.movetime_ms) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "set either analysis.depth or analysis.movetime_ms, not both".to_string(),
                ))
            }
            (Some(0), None) | (None, Some(0)) => {
                return Err(ConfigError::Invalid(
                    "search limit must be greater than zero".to_string(),
                ))
            }
            (Some(depth), None) => SearchLimit::Depth(depth),
            (None, Some(ms)) => SearchLimit::Time(Duration::from_millis(ms)),
            (None, None) => SearchLimit::default(),
        };

        if !(1..=MAX_MATE_SCORE).contains(&analysis.mate_score) {
            return Err(ConfigError::Invalid(format!(
                "mate_score must be between 1 and {}, got {}",
                MAX_MATE_SCORE, analysis.mate_score
            )));
        }

        Ok(AnalysisConfig {
            limit,
            max_moves: (analysis.max_moves > 0).then_some(analysis.max_moves),
            mate_score: analysis.mate_score,
        })
    }
}
