//! Errors reported to, or raised by, the chat actor.

use std::{io, net::SocketAddr};

use thiserror::Error;

use crate::domain::LocalError;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A request rejected by a session-side handler.
    #[error(transparent)]
    Local(#[from] LocalError),

    #[error("on parsing a command from '{addr}': {source}")]
    MalformedRequest {
        addr: SocketAddr,
        #[source]
        source: serde_json::Error,
    },

    #[error("on parsing a command from '{addr}': line longer than {limit} bytes")]
    OversizedRequest { addr: SocketAddr, limit: usize },

    #[error("on writing a response to '{addr}': {source}")]
    Write {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A command reached the actor with no state mutator registered for it.
    #[error("on handling an unknown action '{0}' from a client")]
    UnregisteredAction(&'static str),

    /// The actor's intake queue did not accept a command in time.
    #[error("chat is busy")]
    Busy,

    /// The actor is gone.
    #[error("chat is unavailable")]
    Unavailable,
}
