//! TCP front end: listener, per-connection sessions, shutdown signal.

mod error;
mod handler;
mod server;
mod signal;

pub use error::ServerError;
pub use handler::{Session, spawn_session};
pub use server::Server;
pub use signal::shutdown_signal;
