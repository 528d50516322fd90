//! UseCase layer: the command registry and the chat actor.

pub mod chat_actor;
mod error;
pub mod registry;

pub use chat_actor::{ChatActor, ChatHandle, Disconnect, Inbound, SessionChannels, SessionLink};
pub use error::ChatError;
