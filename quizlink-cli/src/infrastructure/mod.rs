mod emotes;
mod observability;
mod question_bank;
mod stats;

pub use emotes::OwnedEmotes;
pub use observability::LogConfig;
pub use question_bank::QuestionBank;
pub use stats::{PlayerStats, StatsFile};
