//! Actions of the line protocol and the commands forwarded to the chat actor.

use super::SessionId;

/// Action recognised by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    Broadcast,
    AddLobby,
    JoinLobby,
    LeaveLobby,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Login,
        Action::Broadcast,
        Action::AddLobby,
        Action::JoinLobby,
        Action::LeaveLobby,
    ];

    /// Name used in the `actionName` field of a request.
    pub fn name(self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::Broadcast => "broadcast",
            Action::AddLobby => "addlobby",
            Action::JoinLobby => "joinlobby",
            Action::LeaveLobby => "leavelobby",
        }
    }

    /// Exact, case-sensitive lookup by action name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Session a command was issued by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub id: SessionId,
    /// Display name at the time the command was issued (empty before login).
    pub name: String,
}

/// Request to mutate shared state, consumed once by the chat actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub param: String,
    pub origin: Origin,
}

impl Command {
    pub fn new(action: Action, param: impl Into<String>, origin: Origin) -> Self {
        Self {
            action,
            param: param.into(),
            origin,
        }
    }
}
