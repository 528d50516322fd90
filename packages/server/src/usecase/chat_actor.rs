//! Chat actor
//!
//! Single owner of [`ChatState`]. Sessions talk to it through three intake
//! queues held by a [`ChatHandle`]:
//!
//! - `commands`: session registration and forwarded [`Command`]s
//! - `disconnects`: transports to close, optionally with the session they belonged to
//! - `errors`: anything a session wants logged
//!
//! The loop handles one event at a time, so every mutation of lobby and
//! session membership is applied in a single global order without locks.
//! Statuses go out through a [`StatusPusher`], which never blocks the loop.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use lobbychat_shared::time::{elapsed_millis, millis_to_rfc3339, now_millis};
use tokio::{
    io::AsyncWriteExt,
    sync::{
        mpsc::{self, error::SendTimeoutError},
        watch,
    },
};

use crate::{
    config::ChatConfig,
    domain::{
        BoxedTransport, ChatState, Command, LobbyId, MAIN_LOBBY, SessionId, SessionRecord,
        StatusPusher, StatusSender, StatusSlot, Transport, status_slot,
    },
};

use super::{ChatError, registry};

/// Commands the actor handles in a row before looking at the other queues.
pub const COMMAND_BATCH: usize = 32;

/// Everything the actor needs to serve a newly accepted session.
#[derive(Debug)]
pub struct SessionLink {
    pub id: SessionId,
    pub addr: SocketAddr,
    /// Unix timestamp when connected (milliseconds)
    pub connected_at: i64,
    pub status: StatusSender,
    /// Publishes the session's current lobby back to the session.
    pub lobby: watch::Sender<Option<LobbyId>>,
}

/// Event on the command queue.
#[derive(Debug)]
pub enum Inbound {
    Connect(SessionLink),
    Command(Command),
}

/// Event on the disconnect queue.
pub enum Disconnect {
    /// A session ended; forget it and close its transport.
    Session {
        id: SessionId,
        transport: BoxedTransport,
    },
    /// A transport that never became a session.
    Transport(BoxedTransport),
}

impl std::fmt::Debug for Disconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disconnect::Session { id, .. } => f.debug_struct("Session").field("id", id).finish(),
            Disconnect::Transport(_) => f.write_str("Transport"),
        }
    }
}

/// Session-side ends of the channels created by [`ChatHandle::connect`].
#[derive(Debug)]
pub struct SessionChannels {
    pub id: SessionId,
    pub status: StatusSlot,
    pub lobby: watch::Receiver<Option<LobbyId>>,
}

/// Cloneable sending side of the chat actor's intake queues.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<Inbound>,
    disconnects: mpsc::Sender<Disconnect>,
    errors: mpsc::Sender<ChatError>,
    status_timeout: Duration,
}

impl ChatHandle {
    /// Build a handle from raw queue senders.
    pub fn from_senders(
        commands: mpsc::Sender<Inbound>,
        disconnects: mpsc::Sender<Disconnect>,
        errors: mpsc::Sender<ChatError>,
        status_timeout: Duration,
    ) -> Self {
        Self {
            commands,
            disconnects,
            errors,
            status_timeout,
        }
    }

    /// How long a session waits for a status.
    pub fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    /// Register a new session with the actor.
    ///
    /// The registration is queued ahead of any command the session sends
    /// afterwards, on the same queue.
    pub async fn connect(&self, addr: SocketAddr) -> Result<SessionChannels, ChatError> {
        let id = SessionId::new();
        let (status_tx, status_rx) = status_slot();
        let (lobby_tx, lobby_rx) = watch::channel(None);
        let link = SessionLink {
            id,
            addr,
            connected_at: now_millis(),
            status: status_tx,
            lobby: lobby_tx,
        };
        self.commands
            .send(Inbound::Connect(link))
            .await
            .map_err(|_| ChatError::Unavailable)?;
        Ok(SessionChannels {
            id,
            status: status_rx,
            lobby: lobby_rx,
        })
    }

    /// Queue a command, waiting at most the status timeout for room in the queue.
    pub async fn submit(&self, command: Command) -> Result<(), ChatError> {
        match self
            .commands
            .send_timeout(Inbound::Command(command), self.status_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(ChatError::Busy),
            Err(SendTimeoutError::Closed(_)) => Err(ChatError::Unavailable),
        }
    }

    /// Hand a finished session's transport to the actor.
    pub async fn disconnect_session(&self, id: SessionId, transport: BoxedTransport) {
        let event = Disconnect::Session { id, transport };
        if self.disconnects.send(event).await.is_err() {
            tracing::warn!("Chat is gone; dropping transport of session {}", id);
        }
    }

    /// Ask the actor to close a transport that has no session.
    pub async fn close_connection<T: Transport>(&self, transport: T) {
        let event = Disconnect::Transport(Box::new(transport));
        if self.disconnects.send(event).await.is_err() {
            tracing::warn!("Chat is gone; dropping unattached transport");
        }
    }

    /// Send an error to the actor's log.
    pub async fn report(&self, error: ChatError) {
        if let Err(e) = self.errors.send(error).await {
            tracing::error!("{}", e.0);
        }
    }
}

/// Create a chat actor together with its handle.
///
/// The actor does nothing until [`ChatActor::run`] is polled, typically via
/// `tokio::spawn(actor.run())`.
pub fn channel<P: StatusPusher>(pusher: P, config: &ChatConfig) -> (ChatHandle, ChatActor<P>) {
    let capacity = config.queue_capacity.max(1);
    let (commands_tx, commands_rx) = mpsc::channel(capacity);
    let (disconnects_tx, disconnects_rx) = mpsc::channel(capacity);
    let (errors_tx, errors_rx) = mpsc::channel(capacity);

    let handle = ChatHandle::from_senders(
        commands_tx,
        disconnects_tx,
        errors_tx,
        config.status_timeout,
    );
    let actor = ChatActor {
        state: ChatState::new(),
        pusher,
        lobby_links: HashMap::new(),
        commands: commands_rx,
        disconnects: disconnects_rx,
        errors: errors_rx,
    };
    (handle, actor)
}

pub struct ChatActor<P> {
    state: ChatState,
    pusher: P,
    lobby_links: HashMap<SessionId, watch::Sender<Option<LobbyId>>>,
    commands: mpsc::Receiver<Inbound>,
    disconnects: mpsc::Receiver<Disconnect>,
    errors: mpsc::Receiver<ChatError>,
}

impl<P: StatusPusher> ChatActor<P> {
    /// Run the event loop until every [`ChatHandle`] is dropped.
    ///
    /// The command queue is preferred over the disconnect queue, so a
    /// session's final leave-lobby command is normally applied before its
    /// disconnect. After [`COMMAND_BATCH`] commands in a row, whatever is
    /// already waiting on the other queues is handled first.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnregisteredAction`] if a command arrives for an
    /// action without a mutator. The loop stops at that point.
    pub async fn run(mut self) -> Result<(), ChatError> {
        tracing::info!("Chat started with lobby '{}'", MAIN_LOBBY);
        let mut handled = 0;
        loop {
            if handled >= COMMAND_BATCH {
                handled = 0;
                self.drain_side_queues();
            }
            tokio::select! {
                biased;
                Some(inbound) = self.commands.recv() => {
                    handled += 1;
                    self.handle_inbound(inbound)?;
                }
                Some(disconnect) = self.disconnects.recv() => {
                    handled = 0;
                    self.handle_disconnect(disconnect);
                }
                Some(error) = self.errors.recv() => {
                    handled = 0;
                    tracing::error!("{}", error);
                }
                else => break,
            }
        }
        tracing::info!("Chat stopped");
        Ok(())
    }

    /// Handle what is already queued for disconnects and errors, without waiting.
    fn drain_side_queues(&mut self) {
        for _ in 0..COMMAND_BATCH {
            match self.disconnects.try_recv() {
                Ok(disconnect) => self.handle_disconnect(disconnect),
                Err(_) => break,
            }
        }
        for _ in 0..COMMAND_BATCH {
            match self.errors.try_recv() {
                Ok(error) => tracing::error!("{}", error),
                Err(_) => break,
            }
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) -> Result<(), ChatError> {
        match inbound {
            Inbound::Connect(link) => {
                self.register(link);
                Ok(())
            }
            Inbound::Command(command) => self.dispatch(command),
        }
    }

    fn register(&mut self, link: SessionLink) {
        tracing::info!(
            "Session {} connected from {} at {}",
            link.id,
            link.addr,
            millis_to_rfc3339(link.connected_at)
        );
        self.state
            .add_session(link.id, SessionRecord::new(link.addr, link.connected_at));
        self.pusher.register(link.id, link.status);
        self.lobby_links.insert(link.id, link.lobby);
    }

    fn dispatch(&mut self, command: Command) -> Result<(), ChatError> {
        let Some(mutator) = registry::handlers(command.action).mutator else {
            tracing::error!(
                "on handling an unknown action '{}' from a client",
                command.action.name()
            );
            return Err(ChatError::UnregisteredAction(command.action.name()));
        };

        tracing::debug!(
            "Applying '{}' from session {}",
            command.action.name(),
            command.origin.id
        );
        let deliveries = mutator(&mut self.state, &command.origin, &command.param);
        self.publish_lobby(command.origin.id);
        for delivery in deliveries {
            self.pusher.push(delivery.to, delivery.status);
        }
        Ok(())
    }

    /// Let the session see the lobby the state now records for it.
    fn publish_lobby(&self, id: SessionId) {
        if let Some(link) = self.lobby_links.get(&id) {
            link.send_replace(self.state.lobby_of(id));
        }
    }

    fn handle_disconnect(&mut self, disconnect: Disconnect) {
        let transport = match disconnect {
            Disconnect::Session { id, transport } => {
                match self.state.remove_session(id) {
                    Some(record) => tracing::info!(
                        "Session {} ({}) disconnected after {} ms",
                        id,
                        record.addr,
                        elapsed_millis(record.connected_at)
                    ),
                    None => tracing::warn!("Disconnect for unknown session {}", id),
                }
                self.pusher.unregister(id);
                self.lobby_links.remove(&id);
                transport
            }
            Disconnect::Transport(transport) => transport,
        };
        tokio::spawn(close_transport(transport));
    }
}

async fn close_transport(mut transport: BoxedTransport) {
    if let Err(e) = transport.shutdown().await {
        tracing::error!("on attempt to close a connection: {}", e);
    }
}
