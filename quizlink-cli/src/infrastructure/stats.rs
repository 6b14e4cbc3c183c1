use quizlink_core::traits::ResultSink;
use quizlink_core::GameMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted per-player statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub single_games: u32,
    #[serde(default)]
    pub single_wins: u32,
    #[serde(default)]
    pub versus_games: u32,
    #[serde(default)]
    pub versus_wins: u32,
    #[serde(default)]
    pub best_score: u32,
    #[serde(default)]
    pub total_score: u64,
}

/// JSON-file result sink; one record call per finished session.
pub struct StatsFile {
    path: PathBuf,
    stats: PlayerStats,
}

impl StatsFile {
    /// Open the stats file, starting fresh if it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stats = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "stats file unreadable, starting fresh");
                PlayerStats::default()
            }),
            Err(_) => PlayerStats::default(),
        };
        Self { path, stats }
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) {
        let result = serde_json::to_string_pretty(&self.stats)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(&self.path, json));
        if let Err(err) = result {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to persist stats");
        }
    }
}

impl ResultSink for StatsFile {
    fn record_result(&mut self, score: u32, mode: GameMode, won: bool) {
        match mode {
            GameMode::Single => {
                self.stats.single_games += 1;
                if won {
                    self.stats.single_wins += 1;
                }
            }
            GameMode::Versus => {
                self.stats.versus_games += 1;
                if won {
                    self.stats.versus_wins += 1;
                }
            }
        }
        self.stats.best_score = self.stats.best_score.max(score);
        self.stats.total_score += u64::from(score);
        self.save();
    }
}
