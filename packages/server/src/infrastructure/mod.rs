//! Infrastructure layer: wire DTOs and status delivery.

pub mod dto;
pub mod status_pusher;
