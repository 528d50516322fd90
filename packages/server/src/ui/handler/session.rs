//! Session loop: one task per accepted connection.
//!
//! Reads one JSON request per line, runs the action's local handler, forwards
//! a command to the chat actor when needed and writes exactly one response per
//! processed request. Malformed lines, and lines longer than
//! [`MAX_LINE_LEN`], are reported and skipped without a response.

use std::{io, net::SocketAddr};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    sync::watch,
    task::JoinHandle,
    time::{Instant, timeout_at},
};

use crate::{
    domain::{
        Action, Command, LobbyId, LocalError, SessionContext, Status, StatusSlot, Transport,
    },
    infrastructure::dto::{Request, Response},
    usecase::{
        ChatError, ChatHandle, SessionChannels,
        registry::{self, LocalOutcome},
    },
};

/// Longest accepted request line in bytes, newline included.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Register a new session with the chat and spawn its loop.
///
/// # Errors
///
/// Returns [`ChatError::Unavailable`] if the chat actor is gone; the
/// transport is dropped in that case.
pub async fn spawn_session<T: Transport>(
    chat: &ChatHandle,
    transport: T,
    addr: SocketAddr,
) -> Result<JoinHandle<()>, ChatError> {
    let channels = chat.connect(addr).await?;
    let session = Session::new(chat.clone(), channels, transport, addr);
    Ok(tokio::spawn(session.run()))
}

enum ReadOutcome {
    Request(Request),
    Malformed(serde_json::Error),
    TooLong,
    Closed,
}

pub struct Session<T> {
    ctx: SessionContext,
    reader: BufReader<ReadHalf<T>>,
    writer: WriteHalf<T>,
    status: StatusSlot,
    lobby: watch::Receiver<Option<LobbyId>>,
    chat: ChatHandle,
}

impl<T: Transport> Session<T> {
    pub fn new(chat: ChatHandle, channels: SessionChannels, transport: T, addr: SocketAddr) -> Self {
        let (reader, writer) = tokio::io::split(transport);
        Self {
            ctx: SessionContext::new(channels.id, addr),
            reader: BufReader::new(reader),
            writer,
            status: channels.status,
            lobby: channels.lobby,
            chat,
        }
    }

    /// Serve requests until the peer closes the stream or it fails, then
    /// leave the lobby and hand the transport back to the chat.
    pub async fn run(mut self) {
        tracing::debug!("Session {} started for {}", self.ctx.id, self.ctx.addr);
        let mut line = Vec::new();
        loop {
            let request = match self.read_request(&mut line).await {
                Ok(ReadOutcome::Request(request)) => request,
                Ok(ReadOutcome::Malformed(source)) => {
                    let addr = self.ctx.addr;
                    self.chat
                        .report(ChatError::MalformedRequest { addr, source })
                        .await;
                    continue;
                }
                Ok(ReadOutcome::TooLong) => {
                    let addr = self.ctx.addr;
                    let limit = MAX_LINE_LEN;
                    self.chat
                        .report(ChatError::OversizedRequest { addr, limit })
                        .await;
                    continue;
                }
                Ok(ReadOutcome::Closed) => {
                    tracing::debug!("Session {} closed by peer", self.ctx.id);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Session {} read error: {}", self.ctx.id, e);
                    break;
                }
            };

            let status = self.handle_request(&request).await;
            if let Err(source) = self.write_response(&Response::from(status)).await {
                let addr = self.ctx.addr;
                self.chat.report(ChatError::Write { addr, source }).await;
            }
        }
        self.teardown().await;
    }

    /// Read one line. An unterminated fragment at end of stream counts as
    /// closed. The rest of an oversized line is skipped without buffering it.
    async fn read_request(&mut self, line: &mut Vec<u8>) -> io::Result<ReadOutcome> {
        line.clear();
        let mut oversized = false;
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(ReadOutcome::Closed);
            }
            let (used, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(newline) => (newline + 1, true),
                None => (available.len(), false),
            };
            if !oversized {
                if line.len() + used > MAX_LINE_LEN {
                    oversized = true;
                    line.clear();
                } else {
                    line.extend_from_slice(&available[..used]);
                }
            }
            self.reader.consume(used);
            if complete {
                break;
            }
        }
        if oversized {
            return Ok(ReadOutcome::TooLong);
        }
        Ok(match Request::from_line(line) {
            Ok(request) => ReadOutcome::Request(request),
            Err(e) => ReadOutcome::Malformed(e),
        })
    }

    async fn handle_request(&mut self, request: &Request) -> Status {
        let Some(action) = Action::from_name(&request.action_name) else {
            return self.reject(LocalError::UnknownCommand(self.ctx.addr)).await;
        };
        tracing::debug!("Session {} requested '{}'", self.ctx.id, action.name());

        self.ctx.lobby = *self.lobby.borrow();
        let param = match registry::handlers(action).local {
            Some(local) => match local(&mut self.ctx, &request.param) {
                Ok(LocalOutcome::Resolved(status)) => return status,
                Ok(LocalOutcome::Forward(param)) => param,
                Err(e) => return self.reject(e).await,
            },
            None => request.param.clone(),
        };
        self.forward(action, param).await
    }

    async fn reject(&mut self, error: LocalError) -> Status {
        let status = Status::error(error.to_string());
        self.chat.report(error.into()).await;
        status
    }

    async fn forward(&mut self, action: Action, param: String) -> Status {
        let command = Command::new(action, param, self.ctx.origin());
        match self.chat.submit(command).await {
            Ok(()) => self.await_status().await,
            Err(ChatError::Busy) => Status::timeout(),
            Err(e) => Status::error(e.to_string()),
        }
    }

    /// Wait for the next status that is still within its delivery window.
    async fn await_status(&mut self) -> Status {
        let deadline = Instant::now() + self.chat.status_timeout();
        loop {
            match timeout_at(deadline, self.status.recv()).await {
                Ok(Some(envelope)) if envelope.is_expired() => {
                    tracing::debug!("Session {} discarded a stale status", self.ctx.id);
                }
                Ok(Some(envelope)) => return envelope.status,
                Ok(None) => return Status::error(ChatError::Unavailable.to_string()),
                Err(_) => {
                    tracing::debug!("Session {} timed out waiting for a status", self.ctx.id);
                    return Status::timeout();
                }
            }
        }
    }

    async fn write_response(&mut self, response: &Response) -> io::Result<()> {
        let line = response.to_line()?;
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }

    async fn teardown(self) {
        let Session {
            ctx,
            reader,
            writer,
            chat,
            ..
        } = self;

        // no membership guard here: always try to leave
        let leave = Command::new(Action::LeaveLobby, "", ctx.origin());
        if let Err(e) = chat.submit(leave).await {
            tracing::warn!("Session {} could not leave its lobby: {}", ctx.id, e);
        }

        let transport = reader.into_inner().unsplit(writer);
        chat.disconnect_session(ctx.id, Box::new(transport)).await;
        tracing::debug!("Session {} ({}) finished", ctx.id, ctx.addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{StatusEnvelope, TIMEOUT_DETAILS},
        usecase::{Disconnect, Inbound, SessionLink},
    };
    use std::time::Duration;
    use tokio::{io::DuplexStream, sync::mpsc, time::timeout};

    // ========================================
    // 何をテストするか
    // - セッション側のローカル処理（検証・即時応答）
    // - アクターへの転送とステータス待ち（タイムアウト・古いステータスの破棄）
    // - 切断時の後処理（leavelobby → disconnect の順）
    //
    // アクターの代わりに、キューを直接読む FakeChat を使う
    // ========================================

    const WAIT: Duration = Duration::from_secs(2);

    struct FakeChat {
        commands: mpsc::Receiver<Inbound>,
        disconnects: mpsc::Receiver<Disconnect>,
        errors: mpsc::Receiver<ChatError>,
    }

    impl FakeChat {
        async fn next_inbound(&mut self) -> Inbound {
            timeout(WAIT, self.commands.recv())
                .await
                .expect("inbound in time")
                .expect("queue open")
        }

        async fn accept_connect(&mut self) -> SessionLink {
            match self.next_inbound().await {
                Inbound::Connect(link) => link,
                other => panic!("expected Connect, got {:?}", other),
            }
        }

        async fn next_command(&mut self) -> Command {
            match self.next_inbound().await {
                Inbound::Command(command) => command,
                other => panic!("expected Command, got {:?}", other),
            }
        }

        async fn next_error(&mut self) -> ChatError {
            timeout(WAIT, self.errors.recv())
                .await
                .expect("error in time")
                .expect("queue open")
        }
    }

    struct TestClient {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl TestClient {
        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> String {
            let mut line = String::new();
            timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .expect("response in time")
                .unwrap();
            line.trim_end().to_string()
        }
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:47000".parse().unwrap()
    }

    async fn start_session(
        status_timeout: Duration,
    ) -> (TestClient, FakeChat, SessionLink, JoinHandle<()>) {
        let (commands_tx, commands) = mpsc::channel(16);
        let (disconnects_tx, disconnects) = mpsc::channel(16);
        let (errors_tx, errors) = mpsc::channel(16);
        let chat = ChatHandle::from_senders(commands_tx, disconnects_tx, errors_tx, status_timeout);
        let mut fake = FakeChat {
            commands,
            disconnects,
            errors,
        };

        let (client_io, server_io) = tokio::io::duplex(4096);
        let task = spawn_session(&chat, server_io, test_addr()).await.unwrap();
        let link = fake.accept_connect().await;

        let (reader, writer) = tokio::io::split(client_io);
        let client = TestClient {
            reader: BufReader::new(reader),
            writer,
        };
        (client, fake, link, task)
    }

    fn reply(link: &SessionLink, status: Status) {
        link.status
            .try_send(StatusEnvelope::new(status, WAIT))
            .expect("mailbox has room");
    }

    #[tokio::test]
    async fn test_login_is_answered_without_the_chat() {
        // テスト項目: login はアクターを経由せずに即座に成功が返る
        // given (前提条件):
        let (mut client, mut fake, _link, _task) = start_session(WAIT).await;

        // when (操作):
        client.send(r#"{"actionName":"login","param":"medion"}"#).await;

        // then (期待する結果):
        assert_eq!(client.recv().await, r#"{"ok":true,"body":""}"#);
        assert!(fake.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_login_is_rejected_locally() {
        // テスト項目: 不正な名前のログインはローカルでエラーになり、エラーキューに報告される
        // given (前提条件):
        let (mut client, mut fake, _link, _task) = start_session(WAIT).await;

        // when (操作):
        client.send(r#"{"actionName":"login","param":"me"}"#).await;

        // then (期待する結果):
        assert_eq!(
            client.recv().await,
            r#"{"ok":false,"body":"on authorizing a user"}"#
        );
        assert!(matches!(
            fake.next_error().await,
            ChatError::Local(LocalError::InvalidUsername)
        ));
        assert!(fake.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forwarded_command_returns_chat_status() {
        // テスト項目: 転送したコマンドに対するアクターのステータスがレスポンスになる
        // given (前提条件):
        let (mut client, mut fake, link, _task) = start_session(WAIT).await;
        client.send(r#"{"actionName":"login","param":"medion"}"#).await;
        client.recv().await;

        // when (操作):
        client.send(r#"{"actionName":"joinlobby","param":"main"}"#).await;
        let command = fake.next_command().await;
        reply(&link, Status::success("medion has joined to the chat."));

        // then (期待する結果):
        assert_eq!(command.action, Action::JoinLobby);
        assert_eq!(command.param, "main");
        assert_eq!(command.origin.id, link.id);
        assert_eq!(command.origin.name, "medion");
        assert_eq!(
            client.recv().await,
            r#"{"ok":true,"body":"medion has joined to the chat."}"#
        );
    }

    #[tokio::test]
    async fn test_broadcast_is_prefixed_before_forwarding() {
        // テスト項目: broadcast のメッセージはセッション側で名前を前置され、空白が除去される
        // given (前提条件):
        let (mut client, mut fake, link, _task) = start_session(WAIT).await;
        client.send(r#"{"actionName":"login","param":"medion"}"#).await;
        client.recv().await;

        // when (操作):
        client
            .send(r#"{"actionName":"broadcast","param":"  Hello, World!  "}"#)
            .await;
        let command = fake.next_command().await;
        reply(&link, Status::error("on broadcasting to an undefined lobby"));

        // then (期待する結果):
        assert_eq!(command.param, "medion: Hello, World!");
        assert_eq!(
            client.recv().await,
            r#"{"ok":false,"body":"on broadcasting to an undefined lobby"}"#
        );
    }

    #[tokio::test]
    async fn test_missing_status_times_out() {
        // テスト項目: 期限内にステータスが届かなければタイムアウトのレスポンスになる
        // given (前提条件):
        let (mut client, mut fake, _link, _task) =
            start_session(Duration::from_millis(100)).await;

        // when (操作):
        client.send(r#"{"actionName":"joinlobby","param":"main"}"#).await;
        let _ignored = fake.next_command().await;

        // then (期待する結果):
        let expected = format!(r#"{{"ok":false,"body":"{}"}}"#, TIMEOUT_DETAILS);
        assert_eq!(client.recv().await, expected);
    }

    #[tokio::test]
    async fn test_stale_status_is_discarded() {
        // テスト項目: 配信期限が切れた古いステータスは破棄され、新しいステータスが使われる
        // given (前提条件):
        let (mut client, mut fake, link, _task) = start_session(WAIT).await;
        link.status
            .try_send(StatusEnvelope::with_deadline(
                Status::success("stale"),
                Instant::now(),
            ))
            .unwrap();

        // when (操作):
        client.send(r#"{"actionName":"joinlobby","param":"main"}"#).await;
        fake.next_command().await;
        link.status
            .send(StatusEnvelope::new(Status::success("fresh"), WAIT))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(client.recv().await, r#"{"ok":true,"body":"fresh"}"#);
    }

    #[tokio::test]
    async fn test_leavelobby_uses_published_membership() {
        // テスト項目: leavelobby はアクターが公開したロビー情報で検証される
        // given (前提条件):
        let (mut client, mut fake, link, _task) = start_session(WAIT).await;
        client.send(r#"{"actionName":"leavelobby","param":""}"#).await;
        let outside = client.recv().await;

        // when (操作):
        link.lobby.send_replace(Some(LobbyId::new(0)));
        client.send(r#"{"actionName":"leavelobby","param":"x"}"#).await;
        let command = fake.next_command().await;
        reply(&link, Status::success(""));

        // then (期待する結果):
        assert_eq!(
            outside,
            r#"{"ok":false,"body":"on leaving from an unknown lobby"}"#
        );
        assert_eq!(command.action, Action::LeaveLobby);
        assert_eq!(command.param, "");
        assert_eq!(client.recv().await, r#"{"ok":true,"body":""}"#);
    }

    #[tokio::test]
    async fn test_malformed_line_is_reported_and_skipped() {
        // テスト項目: 不正な行はエラーキューに報告され、次の行の処理は継続される
        // given (前提条件):
        let (mut client, mut fake, _link, _task) = start_session(WAIT).await;

        // when (操作):
        client.send("this is not json").await;
        client.send(r#"{"actionName":"login","param":"medion"}"#).await;

        // then (期待する結果):
        assert_eq!(client.recv().await, r#"{"ok":true,"body":""}"#);
        assert!(matches!(
            fake.next_error().await,
            ChatError::MalformedRequest { .. }
        ));
    }

    #[tokio::test]
    async fn test_oversized_line_is_reported_and_skipped() {
        // テスト項目: 上限を超える長さの行は破棄・報告され、次の行の処理は継続される
        // given (前提条件):
        let (mut client, mut fake, _link, _task) = start_session(WAIT).await;
        let long_line = format!(
            r#"{{"actionName":"broadcast","param":"{}"}}"#,
            "x".repeat(MAX_LINE_LEN)
        );

        // when (操作):
        client.send(&long_line).await;
        client.send(r#"{"actionName":"login","param":"medion"}"#).await;

        // then (期待する結果):
        assert_eq!(client.recv().await, r#"{"ok":true,"body":""}"#);
        assert!(matches!(
            fake.next_error().await,
            ChatError::OversizedRequest { limit: MAX_LINE_LEN, .. }
        ));
        assert!(fake.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected() {
        // テスト項目: 未知のアクションはクライアントのアドレスを含むエラーになる
        // given (前提条件):
        let (mut client, _fake, _link, _task) = start_session(WAIT).await;

        // when (操作):
        client.send(r#"{"actionName":"shout","param":"hi"}"#).await;

        // then (期待する結果):
        assert_eq!(
            client.recv().await,
            format!(
                r#"{{"ok":false,"body":"on unknown command from {}"}}"#,
                test_addr()
            )
        );
    }

    #[tokio::test]
    async fn test_end_of_stream_leaves_lobby_then_disconnects() {
        // テスト項目: 接続が閉じられると leavelobby が送られ、その後に切断イベントが送られる
        // given (前提条件):
        let (client, mut fake, link, task) = start_session(WAIT).await;

        // when (操作):
        drop(client);
        let command = fake.next_command().await;
        let disconnect = timeout(WAIT, fake.disconnects.recv()).await.unwrap();

        // then (期待する結果):
        assert_eq!(command.action, Action::LeaveLobby);
        assert_eq!(command.origin.id, link.id);
        assert!(matches!(
            disconnect,
            Some(Disconnect::Session { id, .. }) if id == link.id
        ));
        assert!(timeout(WAIT, task).await.is_ok());
    }
}
