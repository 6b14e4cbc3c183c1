// Domain layer (peer references, link kinds)
pub mod domain;

// Application layer (session runtime actor)
pub mod application;

// Infrastructure layer (wire framing, connections, transports)
pub mod infrastructure;

pub mod error;
pub mod link;

// Re-exports for convenience
pub use application::{RuntimeHandle, SessionRuntime, UiTrigger};
pub use domain::{LinkKind, PeerRef};
pub use error::{Result, TransportError};
pub use infrastructure::{
    BeaconConfig, BeaconTransport, GroupConfig, GroupTransport, Transport, TransportEvent,
};
pub use link::EstablishedLink;
