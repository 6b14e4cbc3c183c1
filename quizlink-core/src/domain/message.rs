use crate::domain::Question;
use serde::{Deserialize, Serialize};

/// Literal payload a peer sends to ask for the opponent's display name
pub const NAME_REQUEST: &str = "REQUEST_PLAYER_NAME";

/// Prefix of the bare-string payload carrying a display name
pub const NAME_PREFIX: &str = "PLAYER_NAME:";

/// A player's answer to one question, as reported to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAnswer {
    /// Index of the question this answer belongs to
    pub question_index: usize,

    /// Selected option (0 = timeout/none, 1..4 = option)
    pub selected_option: u8,

    /// Whether the selection matched the question's correct option
    pub is_correct: bool,
}

/// Game payloads exchanged over the wire (tagged union).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GamePayload {
    /// Sent once, host to client: the full ordered question set
    StartGame { questions: Vec<Question> },

    /// A side's answer for one question index
    AnswerSubmitted(PlayerAnswer),

    /// Fire-and-forget emote display
    EmoteUsed { emote_id: String },

    /// End-of-game sentinel, no payload
    GameOver,
}

/// A wire message: either a tagged game payload or a bare string.
///
/// Bare strings carry the best-effort display-name sub-protocol and are
/// distinguished from the tagged union by payload shape alone (JSON string
/// vs JSON object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Game(GamePayload),
    Text(String),
}

/// A decoded name sub-protocol payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameExchange<'a> {
    /// Peer asks for our display name
    Request,
    /// Peer announces its display name
    Announce(&'a str),
}

impl Message {
    pub fn name_request() -> Self {
        Message::Text(NAME_REQUEST.to_string())
    }

    pub fn name_announce(name: &str) -> Self {
        Message::Text(format!("{NAME_PREFIX}{name}"))
    }

    /// Interpret this message as a name sub-protocol payload, if it is one.
    pub fn as_name_exchange(&self) -> Option<NameExchange<'_>> {
        let Message::Text(text) = self else {
            return None;
        };

        if text == NAME_REQUEST {
            return Some(NameExchange::Request);
        }
        text.strip_prefix(NAME_PREFIX)
            .map(|name| NameExchange::Announce(name.trim()))
    }
}

impl From<GamePayload> for Message {
    fn from(payload: GamePayload) -> Self {
        Message::Game(payload)
    }
}
