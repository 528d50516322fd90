//! Domain layer: lobby membership, sessions, statuses and commands.
//!
//! Everything in here is plain data plus pure state transitions. The only
//! writer of [`ChatState`] at runtime is the chat actor in the usecase layer.

mod command;
mod error;
mod lobby;
mod pusher;
mod session;
mod state;
mod status;
mod transport;

pub use command::{Action, Command, Origin};
pub use error::{LocalError, StateError};
pub use lobby::{Lobby, LobbyId, MAIN_LOBBY};
#[cfg(test)]
pub use pusher::MockStatusPusher;
pub use pusher::{StatusEnvelope, StatusPusher, StatusSender, StatusSlot, status_slot};
pub use session::{SessionContext, SessionId, SessionRecord};
pub use state::{ChatState, Delivery};
pub use status::{Status, StatusCode, TIMEOUT_DETAILS};
pub use transport::{BoxedTransport, Transport};
