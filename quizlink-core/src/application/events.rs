use crate::domain::Message;

/// Inputs to the session state machine.
///
/// Local UI triggers, decoded wire messages and transport notifications all
/// arrive through this one type so a single consumer can apply them in
/// order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Local selection (0 = none, 1..4 = option)
    LocalAnswer(u8),

    /// The answer countdown elapsed
    TimerExpired,

    /// Local explicit quit
    QuitRequested,

    /// Local emote selection (already checked against the owned set)
    EmoteSelected(String),

    /// A decoded message from the peer
    MessageReceived(Message),

    /// The link dropped after being established
    PeerDisconnected(String),

    /// The transport failed in a way that is not a clean drop
    TransportFailed(String),
}
