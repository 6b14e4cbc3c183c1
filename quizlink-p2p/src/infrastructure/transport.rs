use crate::domain::{LinkKind, PeerRef};
use crate::error::Result;
use async_trait::async_trait;
use quizlink_core::Message;
use std::time::Duration;

/// Backoff before restarting a failed accept listener
pub const ACCEPT_RETRY_BACKOFF: Duration = Duration::from_millis(1500);

/// Outbound dial timeout
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Events a transport delivers to its single listener channel.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Discovery surfaced a reachable peer
    DeviceFound(PeerRef),

    /// A previously found peer stopped answering scans
    DeviceLost(String),

    /// A connection is open; the local role is resolved exactly once here
    Connected {
        peer_name: String,
        kind: LinkKind,
        is_host: bool,
    },

    /// Outbound establishment failed; terminal for this attempt
    ConnectionFailed(String),

    /// An established connection dropped
    Disconnected(String),

    /// A decoded message from the peer
    Message(Message),
}

/// One uniform connection+messaging contract over two very different
/// link-establishment procedures.
///
/// Establishment differs per implementation; once a stream exists, both
/// funnel into the same framed reader/writer loop
/// (`infrastructure::connection`). All results and failures after the
/// initial call are delivered on the event channel handed to the
/// constructor; the session side never touches sockets.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> LinkKind;

    /// Surface known peers, then scan actively. Finite per invocation and
    /// restartable. Fails fast when the link is disabled or the OS refuses
    /// the scanning socket.
    async fn start_discovery(&mut self) -> Result<()>;

    async fn stop_discovery(&mut self);

    /// Initiate outbound establishment; the result arrives as a
    /// `Connected` or `ConnectionFailed` event. No automatic retry.
    async fn connect(&mut self, peer: &PeerRef) -> Result<()>;

    /// Accept inbound links; the accepting side becomes host. Idempotent.
    /// A failed accept restarts after `ACCEPT_RETRY_BACKOFF`, and the
    /// listener resumes after a dropped connection.
    async fn listen(&mut self) -> Result<()>;

    /// Queue a message on the open connection. Failures surface as
    /// `ConnectionFailed`/`Disconnected` events, never as an error here.
    async fn send(&mut self, message: Message);

    /// Tear down sockets and background tasks. Safe to call repeatedly.
    async fn stop(&mut self);

    /// Full teardown; by default the same as `stop`.
    async fn cleanup(&mut self) {
        self.stop().await;
    }
}
