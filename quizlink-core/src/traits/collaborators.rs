use crate::domain::{GameMode, Question};
use std::collections::HashSet;

/// Supplies the host's question set before `StartGame`.
pub trait QuestionSource: Send {
    /// Load `n` questions in session order.
    fn load_random_questions(&mut self, n: usize) -> Result<Vec<Question>, QuestionSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QuestionSourceError {
    #[error("not enough questions available: wanted {wanted}, have {available}")]
    NotEnough { wanted: usize, available: usize },

    #[error("question store failed: {0}")]
    Store(String),
}

/// Records the final result, called exactly once per session.
pub trait ResultSink: Send {
    fn record_result(&mut self, score: u32, mode: GameMode, won: bool);
}

/// Exposes the locally owned emote set; consulted before a local emote is
/// allowed.
pub trait EmoteInventory: Send {
    fn owned_emote_ids(&self) -> HashSet<String>;

    fn owns(&self, emote_id: &str) -> bool {
        self.owned_emote_ids().contains(emote_id)
    }
}

/// No-op sink for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct NullResultSink;

impl ResultSink for NullResultSink {
    fn record_result(&mut self, _score: u32, _mode: GameMode, _won: bool) {}
}
