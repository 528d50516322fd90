//! Server execution logic.

use std::{future::Future, net::SocketAddr};

use tokio::net::{TcpListener, TcpStream};

use crate::{
    config::{ChatConfig, ServerConfig},
    infrastructure::status_pusher::ChannelStatusPusher,
    usecase::{ChatHandle, chat_actor},
};

use super::{ServerError, handler::spawn_session, signal::shutdown_signal};

/// TCP lobby chat server
///
/// Owns the listener. The chat actor is created when the server starts
/// running and lives as long as the accept loop.
///
/// # Example
///
/// ```ignore
/// let server = Server::bind(&ServerConfig::new("127.0.0.1", 3030)).await?;
/// server.run().await?;
/// ```
pub struct Server {
    listener: TcpListener,
    chat: ChatConfig,
}

impl Server {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            chat: config.chat.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Shutdown only stops accepting; sessions already running end when
    /// their peers close.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat actor stops while the server is running.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server { listener, chat } = self;
        let pusher = ChannelStatusPusher::new(chat.status_timeout);
        let (handle, actor) = chat_actor::channel(pusher, &chat);
        let mut actor_task = tokio::spawn(actor.run());
        tokio::pin!(shutdown);

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Server shutdown complete");
                    return Ok(());
                }
                finished = &mut actor_task => {
                    return match finished {
                        Ok(Ok(())) => Err(ServerError::ChatStopped),
                        Ok(Err(e)) => Err(ServerError::Chat(e)),
                        Err(e) => Err(ServerError::ChatTask(e)),
                    };
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => accept(&handle, stream, addr).await,
                    Err(e) => tracing::warn!("on accepting a connection: {}", e),
                },
            }
        }
    }
}

async fn accept(chat: &ChatHandle, stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::error!("on setting up a connection from {}: {}", addr, e);
        chat.close_connection(stream).await;
        return;
    }
    if let Err(e) = spawn_session(chat, stream, addr).await {
        tracing::error!("on starting a session for {}: {}", addr, e);
    }
}
