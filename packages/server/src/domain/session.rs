//! Session identity and the per-session data the two halves of the chat see.

use std::{fmt, net::SocketAddr};

use uuid::Uuid;

use super::{LobbyId, Origin};

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the chat actor keeps about a connected session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub addr: SocketAddr,
    /// Unix timestamp when connected (milliseconds)
    pub connected_at: i64,
    pub lobby: Option<LobbyId>,
}

impl SessionRecord {
    pub fn new(addr: SocketAddr, connected_at: i64) -> Self {
        Self {
            addr,
            connected_at,
            lobby: None,
        }
    }
}

/// Session-side view used by the local request handlers.
///
/// `name` is owned by the session (login is purely local). `lobby` mirrors the
/// membership the chat actor last published for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub id: SessionId,
    pub addr: SocketAddr,
    pub name: String,
    pub lobby: Option<LobbyId>,
}

impl SessionContext {
    pub fn new(id: SessionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            name: String::new(),
            lobby: None,
        }
    }

    pub fn origin(&self) -> Origin {
        Origin {
            id: self.id,
            name: self.name.clone(),
        }
    }
}
