//! Command registry
//!
//! Every protocol action maps to a pair of handlers:
//!
//! - a **local handler**, run inside the session. It validates or rewrites
//!   the parameter and decides whether the chat actor is involved at all;
//! - a **mutator**, run inside the chat actor. It applies the command to
//!   [`ChatState`] and returns the statuses to deliver.
//!
//! Adding an action means adding a variant to [`Action`] and one arm to
//! [`handlers`] with both halves consistent.

use std::ops::RangeInclusive;

use crate::domain::{
    Action, ChatState, Delivery, LocalError, Origin, SessionContext, Status,
};

/// Accepted byte length for display names and lobby names.
pub const NAME_LEN: RangeInclusive<usize> = 3..=32;

const NO_SUCH_LOBBY: &str = "there's no such lobby on the server";
const NO_LOBBY_TO_BROADCAST: &str = "on broadcasting to an undefined lobby";

/// Decision of a local handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOutcome {
    /// Answered without a round trip to the chat actor.
    Resolved(Status),
    /// Forward a command with this parameter and wait for its status.
    Forward(String),
}

pub type LocalHandler = fn(&mut SessionContext, &str) -> Result<LocalOutcome, LocalError>;

pub type Mutator = fn(&mut ChatState, &Origin, &str) -> Vec<Delivery>;

/// Handler pair of one action. Either half may be absent.
#[derive(Clone, Copy)]
pub struct ActionHandlers {
    pub local: Option<LocalHandler>,
    pub mutator: Option<Mutator>,
}

pub fn handlers(action: Action) -> ActionHandlers {
    match action {
        Action::Login => ActionHandlers {
            local: Some(login),
            mutator: None,
        },
        Action::Broadcast => ActionHandlers {
            local: Some(prepare_broadcast),
            mutator: Some(broadcast),
        },
        Action::AddLobby => ActionHandlers {
            local: Some(validate_lobby_name),
            mutator: Some(add_lobby),
        },
        Action::JoinLobby => ActionHandlers {
            local: Some(forward_unchanged),
            mutator: Some(join_lobby),
        },
        Action::LeaveLobby => ActionHandlers {
            local: Some(check_membership),
            mutator: Some(leave_lobby),
        },
    }
}

fn is_valid_name(name: &str) -> bool {
    NAME_LEN.contains(&name.len())
}

// ---- session side -------------------------------------------------------

fn login(ctx: &mut SessionContext, username: &str) -> Result<LocalOutcome, LocalError> {
    if !is_valid_name(username) {
        return Err(LocalError::InvalidUsername);
    }
    ctx.name = username.to_string();
    Ok(LocalOutcome::Resolved(Status::success("")))
}

fn prepare_broadcast(ctx: &mut SessionContext, message: &str) -> Result<LocalOutcome, LocalError> {
    Ok(LocalOutcome::Forward(format!(
        "{}: {}",
        ctx.name,
        message.trim()
    )))
}

fn validate_lobby_name(_ctx: &mut SessionContext, name: &str) -> Result<LocalOutcome, LocalError> {
    if !is_valid_name(name) {
        return Err(LocalError::InvalidLobbyName);
    }
    Ok(LocalOutcome::Forward(name.to_string()))
}

fn forward_unchanged(_ctx: &mut SessionContext, param: &str) -> Result<LocalOutcome, LocalError> {
    Ok(LocalOutcome::Forward(param.to_string()))
}

fn check_membership(ctx: &mut SessionContext, _param: &str) -> Result<LocalOutcome, LocalError> {
    if ctx.lobby.is_none() {
        return Err(LocalError::NotInLobby);
    }
    Ok(LocalOutcome::Forward(String::new()))
}

// ---- actor side ---------------------------------------------------------

fn add_lobby(state: &mut ChatState, origin: &Origin, name: &str) -> Vec<Delivery> {
    let id = state.add_lobby(name);
    tracing::info!("Lobby '{}' ({}) created by {}", name, id, origin.id);
    vec![Delivery::new(origin.id, Status::success(""))]
}

fn join_lobby(state: &mut ChatState, origin: &Origin, name: &str) -> Vec<Delivery> {
    let Some(target) = state.find_lobby(name) else {
        return vec![Delivery::new(origin.id, Status::error(NO_SUCH_LOBBY))];
    };
    if let Err(e) = state.join_lobby(origin.id, target) {
        tracing::warn!("Session {} could not join '{}': {}", origin.id, name, e);
        return vec![Delivery::new(origin.id, Status::error(e.to_string()))];
    }
    tracing::debug!("Session {} joined lobby '{}' ({})", origin.id, name, target);
    announce(
        state,
        origin,
        format!("{} has joined to the chat.", origin.name),
    )
}

fn leave_lobby(state: &mut ChatState, origin: &Origin, _param: &str) -> Vec<Delivery> {
    if let Some(previous) = state.leave_lobby(origin.id) {
        tracing::debug!("Session {} left lobby {}", origin.id, previous);
    }
    vec![Delivery::new(origin.id, Status::success(""))]
}

fn broadcast(state: &mut ChatState, origin: &Origin, message: &str) -> Vec<Delivery> {
    announce(state, origin, message.to_string())
}

/// Success with `message` for every member of the origin's lobby, origin included.
fn announce(state: &ChatState, origin: &Origin, message: String) -> Vec<Delivery> {
    let Some(lobby) = state.lobby_of(origin.id) else {
        return vec![Delivery::new(origin.id, Status::error(NO_LOBBY_TO_BROADCAST))];
    };
    state
        .members_of(lobby)
        .into_iter()
        .map(|member| Delivery::new(member, Status::success(message.clone())))
        .collect()
}
