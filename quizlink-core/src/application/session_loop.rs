use crate::application::event_queue::{EventQueue, QueueError};
use crate::application::SessionEvent;
use crate::domain::{Session, SessionEffect};

/// Session event loop: applies queued events strictly one at a time.
///
/// Whoever owns this value is the session's single serialization point;
/// no other call site mutates the underlying `Session`.
pub struct SessionLoop {
    session: Session,

    /// Inbound event queue
    inbound: EventQueue,

    /// Max events to process per poll
    batch_size: usize,
}

impl SessionLoop {
    pub fn new(session: Session) -> Self {
        Self::with_limits(session, 32, 256)
    }

    pub fn with_limits(session: Session, batch_size: usize, max_queue_size: usize) -> Self {
        Self {
            session,
            inbound: EventQueue::new(max_queue_size),
            batch_size,
        }
    }

    /// Open the session and return the initial effects.
    pub fn begin(&mut self) -> Vec<SessionEffect> {
        self.session.begin()
    }

    /// Submit an event (non-blocking)
    pub fn submit(&mut self, event: SessionEvent) -> Result<(), QueueError> {
        self.inbound.push(event)
    }

    /// Process up to `batch_size` queued events, returning their effects in
    /// application order.
    pub fn poll(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        let mut processed = 0;

        while processed < self.batch_size {
            let Some(event) = self.inbound.pop() else {
                break;
            };
            effects.extend(self.apply(event));
            processed += 1;
        }

        effects
    }

    fn apply(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        match event {
            SessionEvent::LocalAnswer(option) => self.session.local_answer(option),
            SessionEvent::TimerExpired => self.session.timer_expired(),
            SessionEvent::QuitRequested => self.session.quit(),
            SessionEvent::EmoteSelected(id) => self.session.emote(&id),
            SessionEvent::MessageReceived(message) => self.session.receive_message(message),
            SessionEvent::PeerDisconnected(reason) => self.session.peer_disconnected(&reason),
            SessionEvent::TransportFailed(reason) => self.session.transport_failed(&reason),
        }
    }

    /// Read access for queries and snapshots
    pub fn session(&self) -> &Session {
        &self.session
    }
}
