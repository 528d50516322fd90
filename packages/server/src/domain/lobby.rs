//! Lobby: a named set of member sessions.

use std::{collections::HashSet, fmt};

use super::SessionId;

/// Name of the lobby created when the chat starts.
pub const MAIN_LOBBY: &str = "main";

/// Stable handle of a lobby.
///
/// Lobby names are not unique, so lobbies are addressed by their insertion
/// index. Lobbies are never removed, which keeps the index stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LobbyId(usize);

impl LobbyId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Lobby {
    id: LobbyId,
    name: String,
    members: HashSet<SessionId>,
}

impl Lobby {
    pub fn new(id: LobbyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: HashSet::new(),
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.members.contains(&session)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(super) fn insert(&mut self, session: SessionId) -> bool {
        self.members.insert(session)
    }

    pub(super) fn remove(&mut self, session: SessionId) -> bool {
        self.members.remove(&session)
    }
}
