use crate::application::SessionEvent;
use std::collections::VecDeque;

/// Synchronous bounded queue for session events
#[derive(Debug)]
pub struct EventQueue {
    queue: VecDeque<SessionEvent>,
    max_size: usize,
}

impl EventQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push an event (returns error if full)
    pub fn push(&mut self, event: SessionEvent) -> Result<(), QueueError> {
        if self.queue.len() >= self.max_size {
            return Err(QueueError::Full { max: self.max_size });
        }
        self.queue.push_back(event);
        Ok(())
    }

    /// Pop next event
    pub fn pop(&mut self) -> Option<SessionEvent> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueueError {
    #[error("Queue is full (max size: {max})")]
    Full { max: usize },
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(100)
    }
}
