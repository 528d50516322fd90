//! Domain errors.

use std::net::SocketAddr;

use thiserror::Error;

use super::{LobbyId, SessionId};

/// Request rejected inside the session, before anything reaches the chat actor.
///
/// The `Display` text is what the client receives as the response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalError {
    #[error("on authorizing a user")]
    InvalidUsername,

    #[error("on creating a lobby")]
    InvalidLobbyName,

    #[error("on leaving from an unknown lobby")]
    NotInLobby,

    #[error("on unknown command from {0}")]
    UnknownCommand(SocketAddr),
}

/// Membership change that cannot be applied to the chat state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("session {0} is not registered")]
    UnknownSession(SessionId),

    #[error("lobby {0} does not exist")]
    UnknownLobby(LobbyId),
}
