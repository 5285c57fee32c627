//! High score leaderboard and the score reporting seam
//!
//! The game loop reports one (score, timestamp) pair per game over through
//! [`ScoreSink`]. Where the entries end up on disk is the embedder's concern.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Receives the final score of each finished game
pub trait ScoreSink: Send {
    /// Called exactly once per game over
    fn report(&mut self, score: u64, timestamp_ms: u64);
}

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Player's score
    pub score: u64,
    /// Unix timestamp (ms) when achieved
    pub timestamp_ms: u64,
}

/// High score leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Slot a finished game would take, if it places at all. Ties go to
    /// the earlier game.
    fn slot_for(&self, score: u64) -> Option<usize> {
        if score == 0 {
            return None;
        }
        let slot = self.entries.partition_point(|e| e.score >= score);
        (slot < MAX_HIGH_SCORES).then_some(slot)
    }

    /// Record a finished game. Returns its 1-based rank when it placed.
    pub fn record(&mut self, score: u64, timestamp_ms: u64) -> Option<usize> {
        let slot = self.slot_for(score)?;
        self.entries.insert(slot, HighScoreEntry { score, timestamp_ms });
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(slot + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::InvalidConfig(e.to_string()))
    }

    /// Parse a leaderboard; entries are re-sorted and trimmed
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut scores: HighScores =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        scores.entries.sort_by(|a, b| b.score.cmp(&a.score));
        scores.entries.truncate(MAX_HIGH_SCORES);
        Ok(scores)
    }
}

impl ScoreSink for HighScores {
    fn report(&mut self, score: u64, timestamp_ms: u64) {
        match self.record(score, timestamp_ms) {
            Some(rank) => log::info!("New high score {} (rank {})", score, rank),
            None => log::info!("Final score {} did not place", score),
        }
    }
}

/// Shared leaderboard handle, for embedders that read scores from another thread
impl ScoreSink for std::sync::Arc<parking_lot::Mutex<HighScores>> {
    fn report(&mut self, score: u64, timestamp_ms: u64) {
        self.lock().report(score, timestamp_ms);
    }
}
