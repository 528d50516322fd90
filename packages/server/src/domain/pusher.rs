//! Status delivery trait
//!
//! The chat actor reports statuses to sessions through this trait. Each
//! session owns a single-slot mailbox ([`StatusSlot`]); the actor only ever
//! holds the sending side.

use std::time::Duration;

use tokio::{sync::mpsc, time::Instant};

use super::{SessionId, Status};

/// Status travelling through a session mailbox, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEnvelope {
    pub status: Status,
    pub expires_at: Instant,
}

impl StatusEnvelope {
    /// Wrap a status that stays deliverable for `window`.
    pub fn new(status: Status, window: Duration) -> Self {
        Self::with_deadline(status, Instant::now() + window)
    }

    pub fn with_deadline(status: Status, expires_at: Instant) -> Self {
        Self { status, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Sending side of a session mailbox.
pub type StatusSender = mpsc::Sender<StatusEnvelope>;

/// Receiving side of a session mailbox.
pub type StatusSlot = mpsc::Receiver<StatusEnvelope>;

/// Create a session mailbox that holds at most one status.
pub fn status_slot() -> (StatusSender, StatusSlot) {
    mpsc::channel(1)
}

/// Delivers statuses to session mailboxes.
///
/// Implementations must never block the caller: the chat actor calls
/// [`StatusPusher::push`] from its single-consumer loop.
#[cfg_attr(test, mockall::automock)]
pub trait StatusPusher: Send + 'static {
    /// Register the mailbox of a newly connected session.
    fn register(&mut self, session: SessionId, sender: StatusSender);

    /// Forget the mailbox of a disconnected session.
    fn unregister(&mut self, session: SessionId);

    /// Hand `status` to the mailbox of `to`.
    fn push(&self, to: SessionId, status: Status);
}
