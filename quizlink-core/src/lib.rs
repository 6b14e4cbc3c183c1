// Domain layer (message model, questions, session state machine)
pub mod domain;

// Application layer (event queue + single-consumer loop)
pub mod application;

// Collaborator boundaries (question source, result sink, emote ownership)
pub mod traits;

// Re-exports for convenience
pub use application::{EventQueue, QueueError, SessionEvent, SessionLoop};
pub use domain::{
    GameMode, GamePayload, Message, Phase, PlayerAnswer, Question, QuestionError, Role, Session,
    SessionEffect, SessionError, SessionOutcome, SessionSnapshot, Verdict, ANSWER_WINDOW,
    TOTAL_QUESTIONS,
};
pub use traits::{EmoteInventory, QuestionSource, QuestionSourceError, ResultSink};
