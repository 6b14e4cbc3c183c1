use crate::domain::LinkKind;
use crate::infrastructure::transport::TransportEvent;
use quizlink_core::Role;

/// Result of a completed connection setup, passed by ownership into the
/// session runtime.
///
/// The role is resolved exactly once, when the `Connected` event fires;
/// nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishedLink {
    pub peer_name: String,
    pub kind: LinkKind,
    pub role: Role,
}

impl EstablishedLink {
    /// Build the link from the transport's `Connected` event.
    pub fn from_event(event: &TransportEvent) -> Option<Self> {
        match event {
            TransportEvent::Connected {
                peer_name,
                kind,
                is_host,
            } => Some(EstablishedLink {
                peer_name: peer_name.clone(),
                kind: *kind,
                role: if *is_host { Role::Host } else { Role::Client },
            }),
            _ => None,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}
