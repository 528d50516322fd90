//! Chat state: every lobby and every connected session.
//!
//! This is the only entity that needs serialized mutation. The chat actor
//! owns the single instance; nothing else holds a reference to it.

use std::collections::HashMap;

use super::{Lobby, LobbyId, MAIN_LOBBY, SessionId, SessionRecord, StateError, Status};

/// Status addressed to one session, produced by a state mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: SessionId,
    pub status: Status,
}

impl Delivery {
    pub fn new(to: SessionId, status: Status) -> Self {
        Self { to, status }
    }
}

#[derive(Debug, Clone)]
pub struct ChatState {
    /// Insertion-ordered; `LobbyId` is the index into this vector.
    lobbies: Vec<Lobby>,
    sessions: HashMap<SessionId, SessionRecord>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    /// Create the state with the `main` lobby already in place.
    pub fn new() -> Self {
        let mut state = Self {
            lobbies: Vec::new(),
            sessions: HashMap::new(),
        };
        state.add_lobby(MAIN_LOBBY);
        state
    }

    pub fn add_session(&mut self, id: SessionId, record: SessionRecord) {
        self.sessions.insert(id, record);
    }

    /// Remove a session from the active set, dropping any membership it still has.
    pub fn remove_session(&mut self, id: SessionId) -> Option<SessionRecord> {
        self.leave_lobby(id);
        self.sessions.remove(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Insert a new lobby. Names are not checked for uniqueness.
    pub fn add_lobby(&mut self, name: impl Into<String>) -> LobbyId {
        let id = LobbyId::new(self.lobbies.len());
        self.lobbies.push(Lobby::new(id, name));
        id
    }

    /// First lobby, in insertion order, whose name matches exactly.
    pub fn find_lobby(&self, name: &str) -> Option<LobbyId> {
        self.lobbies
            .iter()
            .find(|lobby| lobby.name() == name)
            .map(Lobby::id)
    }

    pub fn lobby(&self, id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(id.index())
    }

    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.iter()
    }

    pub fn lobby_of(&self, session: SessionId) -> Option<LobbyId> {
        self.sessions.get(&session).and_then(|record| record.lobby)
    }

    /// Move `session` into `target`, leaving its current lobby first.
    pub fn join_lobby(&mut self, session: SessionId, target: LobbyId) -> Result<(), StateError> {
        if target.index() >= self.lobbies.len() {
            return Err(StateError::UnknownLobby(target));
        }
        if !self.sessions.contains_key(&session) {
            return Err(StateError::UnknownSession(session));
        }

        self.leave_lobby(session);
        self.lobbies[target.index()].insert(session);
        if let Some(record) = self.sessions.get_mut(&session) {
            record.lobby = Some(target);
        }
        Ok(())
    }

    /// Clear the membership of `session`, returning the lobby it was in.
    ///
    /// A session that is in no lobby, or not registered at all, is left as is.
    pub fn leave_lobby(&mut self, session: SessionId) -> Option<LobbyId> {
        let previous = self.sessions.get_mut(&session)?.lobby.take()?;
        if let Some(lobby) = self.lobbies.get_mut(previous.index()) {
            lobby.remove(session);
        }
        Some(previous)
    }

    /// Members of `lobby`, sorted by session ID.
    pub fn members_of(&self, lobby: LobbyId) -> Vec<SessionId> {
        let mut members: Vec<SessionId> = self
            .lobby(lobby)
            .map(|lobby| lobby.members().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}
