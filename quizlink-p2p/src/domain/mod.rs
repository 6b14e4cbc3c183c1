mod peer;

pub use peer::{LinkKind, PeerRef};
