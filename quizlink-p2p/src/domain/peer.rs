use serde::{Deserialize, Serialize};
use std::fmt;

/// Which link technology carries the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// Service-advertisement + accept establishment
    Beacon,
    /// Owner-negotiation + fixed-port establishment
    Group,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Beacon => write!(f, "beacon"),
            LinkKind::Group => write!(f, "group"),
        }
    }
}

/// A peer found during discovery, addressable for a connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub name: String,
    /// Opaque dial address; its meaning depends on the link kind
    pub address: String,
}

impl PeerRef {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
