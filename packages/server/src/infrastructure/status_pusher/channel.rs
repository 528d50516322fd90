//! StatusPusher backed by per-session tokio mailboxes
//!
//! ## Delivery
//!
//! Each session mailbox holds one status. A push first tries a non-blocking
//! hand-off. If the mailbox is occupied, the status is parked in the
//! session's overflow cell, replacing whatever was parked before, and a
//! forwarder task moves it into the mailbox once there is room. A session has
//! at most one forwarder, and a parked status is dropped when its delivery
//! window ends. The chat actor is therefore never blocked by a slow or
//! vanished session.
//!
//! Every status is stamped with the end of its window, so a session that
//! only reads it later can tell it is stale.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::mpsc::error::TrySendError, time::timeout_at};

use crate::domain::{SessionId, Status, StatusEnvelope, StatusPusher, StatusSender};

/// Status waiting for room in a full mailbox.
#[derive(Debug, Default)]
struct Overflow {
    pending: Option<StatusEnvelope>,
    forwarding: bool,
}

type SharedOverflow = Arc<Mutex<Overflow>>;

fn lock(overflow: &SharedOverflow) -> MutexGuard<'_, Overflow> {
    overflow.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Mailbox {
    sender: StatusSender,
    overflow: SharedOverflow,
}

pub struct ChannelStatusPusher {
    /// Key: session ID, Value: the session mailbox and its overflow cell
    mailboxes: HashMap<SessionId, Mailbox>,
    window: Duration,
}

impl ChannelStatusPusher {
    /// Create a pusher whose deliveries stay valid for `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            mailboxes: HashMap::new(),
            window,
        }
    }

    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }

    /// Number of sessions with a forwarder currently running.
    pub fn pending_deliveries(&self) -> usize {
        self.mailboxes
            .values()
            .filter(|mailbox| lock(&mailbox.overflow).forwarding)
            .count()
    }
}

impl StatusPusher for ChannelStatusPusher {
    fn register(&mut self, session: SessionId, sender: StatusSender) {
        let mailbox = Mailbox {
            sender,
            overflow: SharedOverflow::default(),
        };
        self.mailboxes.insert(session, mailbox);
        tracing::debug!("Session {} registered to StatusPusher", session);
    }

    fn unregister(&mut self, session: SessionId) {
        if let Some(mailbox) = self.mailboxes.remove(&session) {
            lock(&mailbox.overflow).pending = None;
        }
        tracing::debug!("Session {} unregistered from StatusPusher", session);
    }

    fn push(&self, to: SessionId, status: Status) {
        let Some(mailbox) = self.mailboxes.get(&to) else {
            tracing::debug!("Session {} not found, dropping status", to);
            return;
        };

        match mailbox
            .sender
            .try_send(StatusEnvelope::new(status, self.window))
        {
            Ok(()) => tracing::debug!("Pushed status to session {}", to),
            Err(TrySendError::Full(envelope)) => {
                let mut overflow = lock(&mailbox.overflow);
                if overflow.pending.replace(envelope).is_some() {
                    tracing::debug!("Replaced an undelivered status of session {}", to);
                }
                if !overflow.forwarding {
                    overflow.forwarding = true;
                    tokio::spawn(forward_overflow(
                        to,
                        mailbox.sender.clone(),
                        Arc::clone(&mailbox.overflow),
                    ));
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Mailbox of session {} is closed, dropping status", to);
            }
        }
    }
}

/// Move parked statuses into the mailbox until the overflow cell is empty.
async fn forward_overflow(to: SessionId, sender: StatusSender, overflow: SharedOverflow) {
    loop {
        let envelope = {
            let mut cell = lock(&overflow);
            match cell.pending.take() {
                Some(envelope) => envelope,
                None => {
                    cell.forwarding = false;
                    return;
                }
            }
        };

        match timeout_at(envelope.expires_at, sender.reserve()).await {
            Ok(Ok(permit)) => {
                permit.send(envelope);
                tracing::debug!("Pushed delayed status to session {}", to);
            }
            Ok(Err(_)) => {
                let mut cell = lock(&overflow);
                cell.pending = None;
                cell.forwarding = false;
                tracing::debug!("Mailbox of session {} is closed, dropping status", to);
                return;
            }
            Err(_) => tracing::warn!("Status delivery to session {} timed out", to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status_slot;

    // ========================================
    // 何をテストするか
    // - 登録済みセッションへの即時配信
    // - 未登録・切断済みセッションへの配信が失敗しても panic しない
    // - メールボックスが埋まっている場合の遅延配信と、その期限切れ
    // - 読まれないメールボックスへの配信が溜まり続けない
    // ========================================

    const WINDOW: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_push_to_registered_session() {
        // テスト項目: 登録済みセッションのメールボックスにステータスが届く
        // given (前提条件):
        let mut pusher = ChannelStatusPusher::new(WINDOW);
        let (tx, mut rx) = status_slot();
        let alice = SessionId::new();
        pusher.register(alice, tx);

        // when (操作):
        pusher.push(alice, Status::success("hello"));

        // then (期待する結果):
        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.status, Status::success("hello"));
        assert!(!envelope.is_expired());
    }

    #[tokio::test]
    async fn test_push_to_unknown_or_unregistered_session_is_dropped() {
        // テスト項目: 未登録や登録解除済みのセッションへの配信は破棄される
        // given (前提条件):
        let mut pusher = ChannelStatusPusher::new(WINDOW);
        let (tx, mut rx) = status_slot();
        let alice = SessionId::new();
        pusher.register(alice, tx);
        pusher.unregister(alice);

        // when (操作):
        pusher.push(alice, Status::success("late"));
        pusher.push(SessionId::new(), Status::success("nobody"));

        // then (期待する結果):
        assert!(pusher.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_push_to_closed_mailbox_does_not_panic() {
        // テスト項目: 受信側が閉じたメールボックスへの配信は破棄される
        // given (前提条件):
        let mut pusher = ChannelStatusPusher::new(WINDOW);
        let (tx, rx) = status_slot();
        let alice = SessionId::new();
        pusher.register(alice, tx);
        drop(rx);

        // when (操作):
        pusher.push(alice, Status::success("gone"));

        // then (期待する結果):
        assert_eq!(pusher.len(), 1);
    }

    #[tokio::test]
    async fn test_push_to_full_mailbox_is_delivered_once_read() {
        // テスト項目: メールボックスが埋まっていても、読み出された後に遅延配信される
        // given (前提条件):
        let mut pusher = ChannelStatusPusher::new(WINDOW);
        let (tx, mut rx) = status_slot();
        let alice = SessionId::new();
        pusher.register(alice, tx);
        pusher.push(alice, Status::success("first"));

        // when (操作):
        pusher.push(alice, Status::success("second"));

        // then (期待する結果):
        assert_eq!(rx.recv().await.unwrap().status, Status::success("first"));
        let second = tokio::time::timeout(WINDOW, rx.recv()).await.unwrap();
        assert_eq!(second.unwrap().status, Status::success("second"));
    }

    #[tokio::test]
    async fn test_pending_delivery_gives_up_after_window() {
        // テスト項目: 配信期限内に読み出されなかったステータスは破棄され、期限切れと判定される
        // given (前提条件):
        let mut pusher = ChannelStatusPusher::new(Duration::from_millis(50));
        let (tx, mut rx) = status_slot();
        let alice = SessionId::new();
        pusher.register(alice, tx);
        pusher.push(alice, Status::success("first"));
        pusher.push(alice, Status::success("second"));

        // when (操作):
        tokio::time::sleep(Duration::from_millis(150)).await;

        // then (期待する結果):
        let first = rx.recv().await.unwrap();
        assert!(first.is_expired());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_idle_session_keeps_a_single_pending_delivery() {
        // テスト項目: 読まれないセッションに大量に配信しても、保留中の配信は 1 件に保たれ最新のものが届く
        // given (前提条件):
        let mut pusher = ChannelStatusPusher::new(WINDOW);
        let (tx, mut rx) = status_slot();
        let alice = SessionId::new();
        pusher.register(alice, tx);
        pusher.push(alice, Status::success("first"));

        // when (操作):
        for n in 0..10_000 {
            pusher.push(alice, Status::success(n.to_string()));
        }

        // then (期待する結果):
        assert_eq!(pusher.pending_deliveries(), 1);
        assert_eq!(rx.recv().await.unwrap().status, Status::success("first"));
        let latest = tokio::time::timeout(WINDOW, rx.recv()).await.unwrap();
        assert_eq!(latest.unwrap().status, Status::success("9999"));
        tokio::task::yield_now().await;
        assert_eq!(pusher.pending_deliveries(), 0);
        assert!(rx.try_recv().is_err());
    }
}
