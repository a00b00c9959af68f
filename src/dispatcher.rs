//! Connection handshake and protocol selection.
//!
//! The first chunk on every connection must be the handshake:
//!
//! ```text
//! UtTcpOpen -proto <id> [<other flags>] [;]
//! ```
//!
//! It is acknowledged with `ok\0` like every other chunk. If the line is a
//! valid handshake naming a registered protocol, the connection becomes a
//! [`Session`] and runs on the caller's task until the peer goes away.
//! Otherwise the error is returned and the caller drops the connection.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::command::Command;
use crate::error::DispatchError;
use crate::protocols::Registry;
use crate::session::{self, Session, ACK};

/// Command name every connection must open with.
pub const HANDSHAKE: &str = "UtTcpOpen";

/// Maximum bytes read for the handshake.
pub const HANDSHAKE_CHUNK: usize = 1024;

/// Perform the handshake and run the selected protocol's session.
pub async fn dispatch<S>(mut stream: S, registry: &Registry) -> Result<(), DispatchError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buffer = BytesMut::with_capacity(HANDSHAKE_CHUNK);
    let Some(line) = session::recv_chunk(&mut stream, &mut buffer, HANDSHAKE_CHUNK).await? else {
        trace!("Connection closed before handshake");
        return Ok(());
    };

    // A blank first chunk is still acknowledged, then fails the name check.
    stream.write_all(ACK).await?;

    let line = line.strip_suffix(b"\0").unwrap_or(line);
    let handshake = Command::parse(line);
    if handshake.name() != HANDSHAKE {
        return Err(DispatchError::HandshakeFailed {
            command: handshake.name().to_string(),
        });
    }

    let proto = handshake.opt("proto").ok_or(DispatchError::MissingProtocol)?;
    let factory = registry.resolve(proto)?;
    debug!(proto, "Handshake complete");

    let reactions = factory(&handshake);
    Session::new(stream, reactions).run().await?;
    Ok(())
}
