use std::io;

use thiserror::Error;

use crate::usecase::ChatError;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("on binding to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("chat failed: {0}")]
    Chat(#[from] ChatError),

    #[error("chat stopped unexpectedly")]
    ChatStopped,

    #[error("chat task failed: {0}")]
    ChatTask(#[from] tokio::task::JoinError),
}
