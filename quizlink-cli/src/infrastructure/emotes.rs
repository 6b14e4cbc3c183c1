use quizlink_core::domain::normalize_emote_id;
use quizlink_core::traits::EmoteInventory;
use std::collections::HashSet;

/// Emotes every player starts with
const DEFAULT_EMOTES: [&str; 3] = ["laugh", "cry", "wave"];

/// The locally owned emote set.
///
/// Ids are normalized on the way in, so `emote_laugh.mp4` and `laugh`
/// describe the same entry.
#[derive(Debug, Clone)]
pub struct OwnedEmotes {
    owned: HashSet<String>,
}

impl Default for OwnedEmotes {
    fn default() -> Self {
        Self {
            owned: DEFAULT_EMOTES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl OwnedEmotes {
    pub fn with_extra(mut self, extra: &[String]) -> Self {
        for id in extra {
            self.owned.insert(normalize_emote_id(id));
        }
        self
    }
}

impl EmoteInventory for OwnedEmotes {
    fn owned_emote_ids(&self) -> HashSet<String> {
        self.owned.clone()
    }
}
