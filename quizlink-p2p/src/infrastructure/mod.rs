mod beacon;
mod connection;
mod group;
pub mod transport;
pub mod wire;

pub use beacon::{BeaconConfig, BeaconTransport};
pub use connection::Connection;
pub(crate) use connection::SEND_QUEUE_DEPTH;
pub use group::{GroupConfig, GroupTransport};
pub use transport::{Transport, TransportEvent, ACCEPT_RETRY_BACKOFF, DIAL_TIMEOUT};
