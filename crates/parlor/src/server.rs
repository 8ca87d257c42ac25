//! `Server` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room. One
//! [`ServerState`] holds the registries and is handed to every connection
//! task; there are no process-wide singletons.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::OpenTransfers;
use parlor_room::RoomDirectory;
use parlor_session::{AccountValidator, SessionRegistry};
use parlor_transport::{Connection, Transport, WebSocketTransport};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;

use crate::dispatcher::handle_connection;
use crate::{EventSink, ServerError, ServerEvent};

/// Tunables for a running server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Items per page for paged list transfers.
    pub page_size: NonZeroUsize,
    /// Admission cap: connections beyond this are closed at accept time.
    /// `None` means unbounded.
    pub max_connections: Option<usize>,
    /// Whether a room message is echoed back to its sender. The sender is
    /// a member, so the default is to include it; disabling selects the
    /// exclude-sender variant.
    pub echo_room_messages: bool,
    /// How long connections get to finish a close handshake at shutdown
    /// before being aborted.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            page_size: NonZeroUsize::new(32).expect("32 is non-zero"),
            max_connections: None,
            echo_room_messages: true,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<V> {
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) rooms: RoomDirectory,
    pub(crate) transfers: Mutex<OpenTransfers>,
    pub(crate) validator: V,
    pub(crate) events: EventSink,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::builder()
///     .bind("0.0.0.0:8080")
///     .build(my_validator)
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    config: ServerConfig,
    events: EventSink,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
            events: EventSink::disabled(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the page size for paged list transfers.
    pub fn page_size(mut self, size: NonZeroUsize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Caps the number of simultaneously connected clients.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = Some(max);
        self
    }

    /// Selects whether room messages echo back to their sender.
    pub fn echo_room_messages(mut self, echo: bool) -> Self {
        self.config.echo_room_messages = echo;
        self
    }

    /// Sets the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Installs a receiver for [`ServerEvent`]s.
    pub fn events(
        mut self,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Binds the transport and assembles the server.
    pub async fn build<V: AccountValidator>(
        self,
        validator: V,
    ) -> Result<Server<V>, ServerError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionRegistry::new()),
            rooms: RoomDirectory::new(),
            transfers: Mutex::new(OpenTransfers::new()),
            validator,
            events: self.events,
            config: self.config,
        });

        Ok(Server {
            transport,
            state,
            shutdown_tx,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Triggers a graceful stop of a running [`Server`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Signals the server to stop accepting and wind down connections.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// A running Parlor server.
pub struct Server<V> {
    transport: WebSocketTransport,
    state: Arc<ServerState<V>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<V: AccountValidator> Server<V> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that can stop this server from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Runs the accept loop until shut down.
    ///
    /// Each accepted connection gets its own read task. On shutdown, read
    /// tasks are signalled, given the configured grace period to finish
    /// their close handshake, then aborted.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!("Parlor server running");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.transport.accept() => {
                    // Reap finished handlers so the admission check counts
                    // live connections only.
                    while tasks.try_join_next().is_some() {}

                    match accepted {
                        Ok(conn) => {
                            if let Some(max) = self.state.config.max_connections {
                                if tasks.len() >= max {
                                    tracing::warn!(
                                        conn = %conn.id(),
                                        "admission cap reached, refusing connection"
                                    );
                                    let _ = conn.close("server full").await;
                                    continue;
                                }
                            }

                            let state = Arc::clone(&self.state);
                            let shutdown = self.shutdown_tx.subscribe();
                            tasks.spawn(async move {
                                handle_connection(conn, state, shutdown).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown signalled");
                    break;
                }
            }
        }

        // Grace period for close handshakes, then abort stragglers.
        let grace = self.state.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                "grace period elapsed, aborting connections"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        tracing::info!("Parlor server stopped");
        Ok(())
    }
}
