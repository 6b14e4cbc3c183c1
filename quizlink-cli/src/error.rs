#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] quizlink_p2p::TransportError),

    #[error("session error: {0}")]
    Session(#[from] quizlink_core::SessionError),

    #[error("question source error: {0}")]
    Questions(#[from] quizlink_core::QuestionSourceError),

    #[error("connection setup failed: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
