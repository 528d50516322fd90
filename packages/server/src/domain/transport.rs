//! Byte-stream transport a session is bound to.

use tokio::io::{AsyncRead, AsyncWrite};

/// Bidirectional byte stream, e.g. an accepted `TcpStream`.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Type-erased transport handed to the chat actor for closing.
pub type BoxedTransport = Box<dyn Transport>;
