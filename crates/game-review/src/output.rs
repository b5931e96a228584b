//! JSON-lines output of move records.
//!
//! Every [`MoveRecord`] becomes one JSON object on its own line, so the output
//! can be streamed into `jq`, a dataframe loader or another file as games
//! finish.

use std::io::{self, Write};

use chess_analysis::{GameReview, MoveRecord};

/// Writes move records as JSON lines.
pub struct RecordWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Writes a single record followed by a newline.
    pub fn write_record(&mut self, record: &MoveRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Writes all records of a review and flushes, so finished games are
    /// visible even if a later game takes long.
    pub fn write_review(&mut self, review: &GameReview) -> io::Result<()> {
        for record in &review.records {
            self.write_record(record)?;
        }
        self.out.flush()
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
