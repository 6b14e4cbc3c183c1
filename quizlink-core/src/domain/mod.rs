mod emote;
mod events;
mod message;
pub mod question;
mod session;

pub use emote::normalize_emote_id;
pub use events::{SessionEffect, SessionOutcome, Verdict};
pub use message::{
    GamePayload, Message, NameExchange, PlayerAnswer, NAME_PREFIX, NAME_REQUEST,
};
pub use question::{Question, QuestionError, OPTION_COUNT};
pub use session::{
    GameMode, Phase, Role, Session, SessionError, SessionSnapshot, ANSWER_WINDOW,
    DEFAULT_OPPONENT_NAME, DISCONNECT_BONUS, SINGLE_PLAYER_AWARD, TOTAL_QUESTIONS, VERSUS_AWARD,
};
