//! Server and chat configuration.

use std::time::Duration;

/// How long a session waits for a status, and how long the actor keeps
/// trying to deliver one.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// Capacity of each chat actor intake queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Chat actor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub status_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub chat: ChatConfig,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            chat: ChatConfig::default(),
        }
    }

    pub fn with_chat(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
