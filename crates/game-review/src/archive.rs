//! Chess.com monthly game archives.
//!
//! An archive is the JSON document served by
//! `https://api.chess.com/pub/player/{user}/games/{yyyy}/{mm}`, saved to disk.
//! Only the fields the review needs are read; unknown fields are ignored.

use std::path::Path;

use chess_analysis::GameRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shakmaty::Color;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Failed to read the archive file from disk.
    #[error("Failed to read archive: {0}")]
    ReadError(#[from] std::io::Error),
    /// The file is not a valid archive document.
    #[error("Failed to parse archive: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A monthly archive.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Archive {
    #[serde(default)]
    pub games: Vec<ArchivedGame>,
}

/// One side of an archived game.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PlayerInfo {
    pub username: String,
    #[serde(default)]
    pub rating: Option<u32>,
    /// Chess.com result code such as "win", "resigned" or "agreed".
    #[serde(default)]
    pub result: String,
}

/// One archived game.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedGame {
    pub url: String,
    #[serde(default)]
    pub pgn: String,
    /// Base time in seconds, optionally with `+increment`, e.g. "600" or "180+2".
    #[serde(default)]
    pub time_control: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rated: bool,
    /// "bullet", "blitz", "rapid" or "daily".
    #[serde(default)]
    pub time_class: String,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
}

impl Archive {
    /// Loads an archive saved at `path`.
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses an archive document.
    pub fn from_json(json: &str) -> Result<Self, ArchiveError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Picks the games `username` played and turns them into review records.
    ///
    /// Games the user did not play are skipped, as are games whose time control
    /// differs from `time_control` when one is given. At most `limit` records
    /// are returned, in archive order.
    pub fn select(
        &self,
        username: &str,
        time_control: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<GameRecord> {
        let mut records = Vec::new();

        for game in &self.games {
            if limit.is_some_and(|max| records.len() >= max) {
                break;
            }
            let Some(color) = game.player_color(username) else {
                debug!(game = %game.url, "Skipping game not played by {}", username);
                continue;
            };
            if time_control.is_some_and(|tc| tc != game.time_control) {
                debug!(
                    game = %game.url,
                    time_control = %game.time_control,
                    "Skipping game with other time control"
                );
                continue;
            }
            debug!(
                game = %game.url,
                color = ?color,
                opponent = %game.player(!color).username,
                ended = ?game.end_time.map(|t| t.to_rfc3339()),
                "Selected game"
            );
            records.push(game.to_record(color));
        }

        info!(
            selected = records.len(),
            archived = self.games.len(),
            "Archive games selected for {}",
            username
        );
        records
    }
}

impl ArchivedGame {
    /// Which color `username` played, ignoring ASCII case.
    pub fn player_color(&self, username: &str) -> Option<Color> {
        if self.white.username.eq_ignore_ascii_case(username) {
            Some(Color::White)
        } else if self.black.username.eq_ignore_ascii_case(username) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// The player of `color`.
    pub fn player(&self, color: Color) -> &PlayerInfo {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// A review record for the side `color`.
    pub fn to_record(&self, color: Color) -> GameRecord {
        GameRecord {
            id: self.url.clone(),
            player: color,
            pgn: self.pgn.clone(),
        }
    }
}
