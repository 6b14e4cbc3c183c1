/// Transport infrastructure errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying link technology is administratively disabled
    #[error("link is not enabled")]
    NotEnabled,

    /// OS-level authorization is missing
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Link negotiation failed; terminal per attempt
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The link dropped after being established
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Malformed or unexpected payload; the connection survives this
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel closed")]
    ChannelClosed,
}

impl TransportError {
    /// Map a socket-setup error into the transport taxonomy
    pub fn from_setup_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                TransportError::PermissionDenied(err.to_string())
            }
            _ => TransportError::ConnectFailed(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
