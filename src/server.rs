//! TCP listener for control-channel connections.
//!
//! Accepts incoming connections and runs each one through the handshake
//! and its session on a dedicated task. A failure on one connection ends
//! that task only. Connections beyond the configured limit are closed as
//! soon as they are accepted, so a full server never stalls the accept loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatcher;
use crate::error::DispatchError;
use crate::protocols::Registry;

/// Server instance
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    connection_limit: Arc<Semaphore>,
    drain_timeout: Duration,
}

impl Server {
    /// Bind the listening socket. Port 0 picks an ephemeral port; see
    /// [`Server::local_addr`].
    pub fn bind(config: &Config, registry: Registry) -> io::Result<Self> {
        let listener = create_listener(config.listen, config.backlog)?;
        let listener = TcpListener::from_std(listener)?;

        Ok(Server {
            listener,
            registry: Arc::new(registry),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            drain_timeout: Duration::from_secs(config.drain_timeout),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process exits.
    #[allow(dead_code)]
    pub async fn run(self) -> io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// In-flight sessions then get the configured drain timeout to finish
    /// before they are aborted.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr()?, protocols = ?self.registry.ids(), "Server listening");

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Connection task panicked");
                        }
                    }
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let Ok(permit) = Arc::clone(&self.connection_limit).try_acquire_owned() else {
                            warn!(peer = %addr, "Connection limit reached, dropping connection");
                            drop(stream);
                            continue;
                        };
                        debug!(peer = %addr, "New connection");
                        let registry = Arc::clone(&self.registry);
                        sessions.spawn(async move {
                            handle_connection(stream, addr, &registry).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        info!(active = sessions.len(), "Stopped accepting connections");
        drain(sessions, self.drain_timeout).await;
        Ok(())
    }
}

/// Run one connection to completion, logging how it ended.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, registry: &Registry) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %addr, error = %e, "Failed to set TCP_NODELAY");
    }

    match dispatcher::dispatch(stream, registry).await {
        Ok(()) => debug!(peer = %addr, "Connection closed"),
        Err(DispatchError::Io(e)) => debug!(peer = %addr, error = %e, "Connection error"),
        Err(e) => warn!(peer = %addr, kind = e.kind(), error = %e, "Connection rejected"),
    }
}

/// Give remaining sessions `timeout` to finish, then abort them.
async fn drain(mut sessions: JoinSet<()>, timeout: Duration) {
    if sessions.is_empty() {
        return;
    }

    let finished = tokio::time::timeout(timeout, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;

    if finished.is_err() {
        warn!(aborted = sessions.len(), "Drain timeout elapsed, aborting sessions");
        sessions.shutdown().await;
    }
}

fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
