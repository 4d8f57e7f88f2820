//! TCP listener for accepting client sessions.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use rds_tuner::TunerSource;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{error, info, info_span, warn, Instrument};

use crate::connection::{Session, SessionConfig, SessionSummary};
use crate::error::SessionError;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8750;

/// Pending connection backlog
const LISTEN_BACKLOG: u32 = 128;

/// Server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
    /// Settings applied to every session.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            session: SessionConfig::default(),
        }
    }
}

/// Accepts connections and runs one independent session per client.
pub struct Server<S> {
    config: ServerConfig,
    source: Arc<S>,
}

impl<S: TunerSource> Server<S> {
    /// Create a new server opening devices through `source`.
    pub fn new(config: ServerConfig, source: S) -> Self {
        Self {
            config,
            source: Arc::new(source),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address with address reuse enabled.
    pub fn bind(&self) -> std::io::Result<TcpListener> {
        let addr = self.config.listen_addr;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(LISTEN_BACKLOG)
    }

    /// Bind and serve until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind()?;
        self.serve(listener, shutdown).await
    }

    /// Serve an already bound listener until `shutdown` completes.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Server listening on {} ({})",
            listener.local_addr()?,
            self.source.describe()
        );

        tokio::pin!(shutdown);
        let mut session_count = 0u64;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }

                accepted = listener.accept() => match accepted {
                    Ok((socket, addr)) => {
                        session_count += 1;
                        let span = info_span!("session", id = session_count, peer = %addr);
                        let source = Arc::clone(&self.source);
                        let config = self.config.session;

                        tokio::spawn(
                            async move {
                                info!("Connected");
                                match handle_connection(source.as_ref(), socket, config).await {
                                    Ok(summary) => info!("Disconnected ({})", summary.reason),
                                    Err(SessionError::Tuner(e)) => warn!("Disconnected on tuner error: {}", e),
                                    Err(e) => warn!("Disconnected on error: {}", e),
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
            }
        }
    }
}

/// Open a device instance for one client and run its session.
pub async fn handle_connection<S: TunerSource>(
    source: &S,
    socket: TcpStream,
    config: SessionConfig,
) -> Result<SessionSummary, SessionError> {
    socket.set_nodelay(true)?;
    let (device, tuner) = source.open()?;
    Session::new(device, socket, tuner, config).run().await
}
