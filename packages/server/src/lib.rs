//! Lobby chat server library.
//!
//! Clients connect over TCP and exchange one JSON object per line. They pick
//! a display name, create and join named lobbies, and broadcast text to the
//! other members of their lobby. All shared state is owned by a single chat
//! actor; each connection runs its own session task.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;

pub use config::{ChatConfig, ServerConfig};
pub use ui::{Server, ServerError};
