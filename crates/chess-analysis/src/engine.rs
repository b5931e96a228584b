//! UCI engine adapter for position analysis.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use shakmaty::fen::Fen;
use shakmaty::{Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::tracker::parse_uci_move;
use crate::Evaluation;

/// Maximum number of lines to read before giving up on a handshake response.
pub const MAX_UCI_LINES: usize = 1000;

/// Errors that can occur when working with chess engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine could not be started or failed the UCI handshake.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
    /// Reading from or writing to the engine failed.
    #[error("Engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Engine returned an invalid or unexpected response.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

/// How long the engine may think about one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Search to a fixed depth in plies.
    Depth(u32),
    /// Search for a fixed wall-clock time.
    Time(Duration),
}

impl Default for SearchLimit {
    fn default() -> Self {
        SearchLimit::Depth(15)
    }
}

impl SearchLimit {
    /// The UCI `go` command for this limit.
    pub fn go_command(&self) -> String {
        match self {
            SearchLimit::Depth(depth) => format!("go depth {}", depth),
            SearchLimit::Time(time) => format!("go movetime {}", time.as_millis().max(1)),
        }
    }
}

/// Settings used when opening an engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Extra command-line arguments for the engine.
    pub args: Vec<String>,
    /// Worker thread hint, sent as the UCI `Threads` option.
    pub threads: u32,
    /// Hash table size in MB, sent as the UCI `Hash` option when set.
    pub hash_mb: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockfish"),
            args: Vec::new(),
            threads: 1,
            hash_mb: None,
        }
    }
}

/// Result of analyzing a chess position.
#[derive(Debug, Clone)]
pub struct PositionAnalysis {
    /// The position evaluation, relative to the side to move.
    pub evaluation: Evaluation,
    /// The engine's preferred move; `None` when the position has no legal moves.
    pub best_move: Option<Move>,
    /// The search depth reached.
    pub depth: u32,
    /// The number of nodes searched.
    pub nodes: u64,
    /// The principal variation in UCI notation.
    pub pv: Vec<String>,
}

/// Something that can evaluate chess positions.
///
/// Implementors are single-owner sessions: `analyse` takes `&mut self`, so at
/// most one request is in flight per session.
pub trait Evaluator {
    /// Evaluates `position` within `limit`. Blocks until the engine answers.
    fn analyse(
        &mut self,
        position: &Chess,
        limit: SearchLimit,
    ) -> Result<PositionAnalysis, EngineError>;
}

/// One parsed `info` line carrying an exact score.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InfoLine {
    pub depth: u32,
    pub evaluation: Evaluation,
    pub nodes: u64,
    pub pv: Vec<String>,
}

/// A session with a UCI-compatible engine such as Stockfish.
///
/// The engine process lives exactly as long as this value: it is shut down by
/// [`close`](Self::close) or, failing that, when the session is dropped.
pub struct UciEngine {
    /// The engine process handle.
    process: Child,
    /// Writer for sending commands to the engine.
    stdin: ChildStdin,
    /// Reader for receiving responses from the engine.
    stdout: BufReader<ChildStdout>,
    /// The engine's name (reported via UCI id).
    name: String,
    /// Set once `quit` has been sent and the process reaped.
    closed: bool,
}

impl UciEngine {
    /// Opens an engine session.
    ///
    /// Spawns the engine, performs the UCI handshake, applies the `Threads`
    /// and `Hash` options and waits until the engine reports ready.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] if the executable cannot be
    /// started or the handshake fails. A half-started process is shut down
    /// before the error is returned.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut process = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!("cannot start {}: {}", config.path.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (process.stdin.take(), process.stdout.take()) else {
            let _ = process.kill();
            let _ = process.wait();
            return Err(EngineError::Unavailable(
                "engine pipes were not captured".to_string(),
            ));
        };

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            name: String::new(),
            closed: false,
        };

        engine
            .handshake(config)
            .map_err(|e| EngineError::Unavailable(format!("UCI handshake failed: {}", e)))?;

        info!(engine = %engine.name, threads = config.threads, "Engine session opened");
        Ok(engine)
    }

    fn handshake(&mut self, config: &EngineConfig) -> Result<(), EngineError> {
        self.send("uci")?;
        let mut name = String::new();
        self.read_until(|line| {
            if let Some(id) = line.strip_prefix("id name ") {
                name = id.to_string();
            }
            line == "uciok"
        })?;
        self.name = if name.is_empty() {
            "Unknown Engine".to_string()
        } else {
            name
        };

        self.send(&format!("setoption name Threads value {}", config.threads))?;
        if let Some(hash) = config.hash_mb {
            self.send(&format!("setoption name Hash value {}", hash))?;
        }
        self.send("ucinewgame")?;
        self.send("isready")?;
        self.read_until(|line| line == "readyok")
    }

    /// Returns the engine's name as reported via UCI protocol.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shuts the engine down.
    ///
    /// Dropping the session has the same effect; `close` only reports
    /// shutdown errors instead of logging them.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let sent = self.send("quit");
        if sent.is_err() {
            let _ = self.process.kill();
        }
        self.process.wait()?;
        debug!(engine = %self.name, "Engine session closed");
        sent
    }

    /// Reads lines until `done` accepts one, within [`MAX_UCI_LINES`].
    fn read_until(&mut self, mut done: impl FnMut(&str) -> bool) -> Result<(), EngineError> {
        for _ in 0..MAX_UCI_LINES {
            let line = self.read_line()?;
            if done(&line) {
                return Ok(());
            }
        }
        Err(EngineError::InvalidResponse(format!(
            "no answer within {} lines",
            MAX_UCI_LINES
        )))
    }

    /// Send a command to the engine.
    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Read a line from the engine's output.
    fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let bytes = self.stdout.read_line(&mut line)?;
        if bytes == 0 {
            return Err(EngineError::InvalidResponse(
                "Engine closed unexpectedly".to_string(),
            ));
        }
        Ok(line.trim().to_string())
    }

    /// Parse a UCI info line carrying an exact principal-variation score.
    ///
    /// Format: "info depth X [multipv N] score cp|mate Y [bound] nodes Z pv move1 move2 ..."
    ///
    /// Returns `None` for lines without depth or score, for bound scores and
    /// for secondary principal variations.
    pub(crate) fn parse_info_line(line: &str, pov: Color) -> Option<InfoLine> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"info") {
            return None;
        }

        let mut depth: Option<u32> = None;
        let mut cp: Option<i32> = None;
        let mut mate: Option<i32> = None;
        let mut nodes: u64 = 0;
        let mut pv: Vec<String> = Vec::new();

        let mut i = 1;
        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    depth = parts.get(i + 1).and_then(|s| s.parse().ok());
                    i += 1;
                }
                "multipv" => {
                    if parts.get(i + 1).is_some_and(|s| *s != "1") {
                        return None;
                    }
                    i += 1;
                }
                "score" => match parts.get(i + 1) {
                    Some(&"cp") => {
                        cp = parts.get(i + 2).and_then(|s| s.parse().ok());
                        i += 2;
                    }
                    Some(&"mate") => {
                        mate = parts.get(i + 2).and_then(|s| s.parse().ok());
                        i += 2;
                    }
                    _ => {}
                },
                "lowerbound" | "upperbound" => return None,
                "nodes" => {
                    nodes = parts.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(0);
                    i += 1;
                }
                "string" => break,
                "pv" => {
                    pv = parts[i + 1..].iter().map(|s| (*s).to_string()).collect();
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Some(InfoLine {
            depth: depth?,
            evaluation: Evaluation::from_uci_score(cp, mate, pov)?,
            nodes,
            pv,
        })
    }
}

impl Evaluator for UciEngine {
    fn analyse(
        &mut self,
        position: &Chess,
        limit: SearchLimit,
    ) -> Result<PositionAnalysis, EngineError> {
        let fen = Fen::from_position(position, EnPassantMode::Legal).to_string();
        self.send(&format!("position fen {}", fen))?;
        self.send(&limit.go_command())?;

        let pov = position.turn();
        let mut latest: Option<InfoLine> = None;
        let bestmove = loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                break rest.split_whitespace().next().map(str::to_string);
            }
            if let Some(info) = Self::parse_info_line(&line, pov) {
                latest = Some(info);
            }
        };

        let info = latest.ok_or_else(|| {
            EngineError::InvalidResponse(format!("no score reported for {}", fen))
        })?;

        let suggestion = info
            .pv
            .first()
            .cloned()
            .or(bestmove)
            .filter(|uci| uci != "(none)" && uci != "0000");
        let best_move = match suggestion {
            Some(uci) => Some(parse_uci_move(position, &uci).ok_or_else(|| {
                EngineError::InvalidResponse(format!("illegal best move {} for {}", uci, fen))
            })?),
            None => None,
        };

        debug!(
            depth = info.depth,
            nodes = info.nodes,
            evaluation = ?info.evaluation,
            "Position analysed"
        );

        Ok(PositionAnalysis {
            evaluation: info.evaluation,
            best_move,
            depth: info.depth,
            nodes: info.nodes,
            pv: info.pv,
        })
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(engine = %self.name, error = %e, "Engine did not shut down cleanly");
        }
    }
}
