//! Per-connection session loop.
//!
//! After the handshake, a session owns its connection and processes one
//! command per received chunk:
//!
//! 1. Receive up to [`RECV_CHUNK`] bytes and trim surrounding whitespace.
//!    An empty result ends the session.
//! 2. Acknowledge with `ok\0`, before and regardless of parsing.
//! 3. Strip the trailing null terminator and tokenize.
//! 4. Dispatch recognized command names to the protocol's [`Reactions`].
//!    Anything else is ignored.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::command::Command;

/// Acknowledgement sent for every received chunk.
pub const ACK: &[u8] = b"ok\0";

/// Maximum bytes read per session receive.
pub const RECV_CHUNK: usize = 2048;

/// Commands a session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `dspyRender`
    Render,
    /// `dspyIPR`
    RenderInteractive,
    /// `stopRender`
    StopRender,
    /// `SelectObject`
    SelectObject,
    /// `SelectSurface`
    SelectSurface,
}

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dspyRender" => Some(Self::Render),
            "dspyIPR" => Some(Self::RenderInteractive),
            "stopRender" => Some(Self::StopRender),
            "SelectObject" => Some(Self::SelectObject),
            "SelectSurface" => Some(Self::SelectSurface),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Render => "dspyRender",
            Self::RenderInteractive => "dspyIPR",
            Self::StopRender => "stopRender",
            Self::SelectObject => "SelectObject",
            Self::SelectSurface => "SelectSurface",
        }
    }
}

/// Reactions a protocol supplies for each recognized command.
///
/// Every hook defaults to doing nothing. Hooks run on the connection's task
/// and should hand long-running driver work off rather than block.
pub trait Reactions: Send {
    fn render(&mut self, _command: &Command) {}

    fn render_interactive(&mut self, _command: &Command) {}

    fn stop_render(&mut self, _command: &Command) {}

    fn select_object(&mut self, _command: &Command) {}

    fn select_surface(&mut self, _command: &Command) {}

    /// Route a command to its hook.
    fn react(&mut self, kind: CommandKind, command: &Command) {
        match kind {
            CommandKind::Render => self.render(command),
            CommandKind::RenderInteractive => self.render_interactive(command),
            CommandKind::StopRender => self.stop_render(command),
            CommandKind::SelectObject => self.select_object(command),
            CommandKind::SelectSurface => self.select_surface(command),
        }
    }
}

/// A running session bound to one connection.
pub struct Session<S> {
    stream: S,
    reactions: Box<dyn Reactions>,
    buffer: BytesMut,
    /// Most recently parsed command.
    command: Option<Command>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, reactions: Box<dyn Reactions>) -> Self {
        Self {
            stream,
            reactions,
            buffer: BytesMut::with_capacity(RECV_CHUNK),
            command: None,
        }
    }

    /// Run until the peer closes the connection or sends an empty chunk.
    ///
    /// Transport errors end the session and are returned to the caller.
    pub async fn run(mut self) -> std::io::Result<()> {
        loop {
            let line = recv_chunk(&mut self.stream, &mut self.buffer, RECV_CHUNK)
                .await?
                .unwrap_or_default();
            if line.is_empty() {
                trace!("Session closed by peer");
                return Ok(());
            }

            self.stream.write_all(ACK).await?;

            let line = line.strip_suffix(b"\0").unwrap_or(line);
            let command = self.command.insert(Command::parse(line));
            trace!(command = command.name(), flags = ?command.flags(), "Received command");

            if let Some(kind) = CommandKind::from_name(command.name()) {
                trace!(reaction = kind.name(), "Dispatching command");
                self.reactions.react(kind, command);
            }
        }
    }
}

/// Receive one chunk of at most `limit` bytes, trimmed of ASCII whitespace.
///
/// Returns `None` when the peer closed the connection. A chunk of nothing
/// but whitespace comes back as an empty slice.
pub(crate) async fn recv_chunk<'a, R>(
    reader: &mut R,
    buffer: &'a mut BytesMut,
    limit: usize,
) -> std::io::Result<Option<&'a [u8]>>
where
    R: AsyncRead + Unpin,
{
    buffer.clear();
    buffer.resize(limit, 0);
    let n = reader.read(&mut buffer[..]).await?;
    buffer.truncate(n);

    if n == 0 {
        return Ok(None);
    }
    Ok(Some(buffer.trim_ascii()))
}
