//! Data Transfer Objects for the line protocol.
//!
//! Each request and response is one JSON object on its own line.

pub mod conversion;
pub mod wire;

pub use wire::{Request, Response};
