mod event_queue;
mod events;
mod session_loop;

pub use event_queue::{EventQueue, QueueError};
pub use events::SessionEvent;
pub use session_loop::SessionLoop;
