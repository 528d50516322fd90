//! Utilities shared by the lobbychat crates.

pub mod logger;
pub mod time;
