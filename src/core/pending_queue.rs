//! FIFO buffer of messages not yet accepted by the broker transport
//!
//! Messages enter at the tail and leave from the head once the transport
//! accepts them, so the remaining entries never change relative order.
//! Without a capacity the queue grows for as long as the broker stays
//! unreachable; see [`OverflowPolicy`] for the bounded alternative.

use super::error::Result;
use super::overflow_policy::OverflowPolicy;
use std::collections::VecDeque;
use std::fmt;

/// Completion callback for a single published message
///
/// Invoked exactly once: `Ok(())` once the transport accepted the message,
/// `Err` if the message was dropped or the transport was discarded first.
pub type PublishCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// A serialized message waiting to be published
pub struct PendingMessage {
    payload: String,
    callback: Option<PublishCallback>,
}

impl PendingMessage {
    pub fn new(payload: String, callback: Option<PublishCallback>) -> Self {
        Self { payload, callback }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Consume the message and notify its owner
    pub fn complete(self, result: Result<()>) {
        if let Some(callback) = self.callback {
            callback(result);
        }
    }
}

impl fmt::Debug for PendingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingMessage")
            .field("payload", &self.payload)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Result of offering a message to the queue
#[derive(Debug)]
pub enum Admission {
    /// Appended at the tail
    Queued,
    /// Queue full, the offered message was not added
    Rejected(PendingMessage),
    /// Appended after evicting the returned head entry
    Evicted(PendingMessage),
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<PendingMessage>,
    capacity: Option<usize>,
    policy: OverflowPolicy,
}

impl PendingQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding at most `capacity` messages
    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
            policy,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a message at the tail, applying the overflow policy when full
    pub fn push(&mut self, message: PendingMessage) -> Admission {
        match self.capacity {
            Some(capacity) if self.entries.len() >= capacity => match self.policy {
                OverflowPolicy::DropOldest => match self.entries.pop_front() {
                    Some(evicted) => {
                        self.entries.push_back(message);
                        Admission::Evicted(evicted)
                    }
                    // capacity of zero is rejected by config validation
                    None => Admission::Rejected(message),
                },
                OverflowPolicy::DropNewest | OverflowPolicy::AlertAndDrop => {
                    Admission::Rejected(message)
                }
            },
            _ => {
                self.entries.push_back(message);
                Admission::Queued
            }
        }
    }

    /// Oldest message, the next one to publish
    pub fn front(&self) -> Option<&PendingMessage> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<PendingMessage> {
        self.entries.pop_front()
    }

    /// Remove every message, oldest first
    pub fn take_all(&mut self) -> Vec<PendingMessage> {
        self.entries.drain(..).collect()
    }

    /// Iterate over payloads, oldest first
    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(PendingMessage::payload)
    }
}
