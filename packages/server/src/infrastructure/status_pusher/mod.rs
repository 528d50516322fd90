//! Status delivery implementations
//!
//! - `channel`: delivery into per-session tokio mailboxes

pub mod channel;

pub use channel::ChannelStatusPusher;
