use crate::domain::{GameMode, Message, PlayerAnswer, Question};

/// Effects emitted by the session state machine.
///
/// The machine never performs IO itself: sends, timer control and
/// presentation updates are described here and executed by the runtime
/// that owns the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Transmit a message to the peer (peer mode only)
    Send(Message),

    /// Arm the answer countdown for the local side
    TimerStart,

    /// Disarm the answer countdown
    TimerStop,

    /// Present this question as the active one; the local answer window
    /// is open
    PresentQuestion { index: usize, question: Question },

    /// The local side has no open answer window; show the waiting state
    ShowWaiting,

    /// A local answer was accepted and scored
    LocalAnswerRecorded(PlayerAnswer),

    /// The opponent's answer was accepted and scored
    RemoteAnswerRecorded(PlayerAnswer),

    /// Display a locally selected emote
    LocalEmote(String),

    /// Display an emote received from the opponent
    OpponentEmote(String),

    /// The opponent announced its display name
    OpponentNamed(String),

    /// The session reached its terminal state
    Finished(SessionOutcome),
}

impl SessionEffect {
    /// Whether this effect is consumed by the runtime rather than forwarded
    /// to the presentation layer.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SessionEffect::Send(_) | SessionEffect::TimerStart | SessionEffect::TimerStop
        )
    }
}

/// Final result of a session, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionOutcome {
    pub mode: GameMode,
    pub verdict: Verdict,
    pub local_score: u32,
    /// Absent in single-player mode (there is no opponent)
    pub remote_score: Option<u32>,
}

/// How the session ended for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Verdict {
    Win,
    Draw,
    Loss,
}

impl Verdict {
    /// Compare two final scores from the local player's point of view
    pub fn from_scores(local: u32, remote: u32) -> Self {
        match local.cmp(&remote) {
            std::cmp::Ordering::Greater => Verdict::Win,
            std::cmp::Ordering::Equal => Verdict::Draw,
            std::cmp::Ordering::Less => Verdict::Loss,
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Verdict::Win)
    }
}
