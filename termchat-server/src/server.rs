use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use termchat_core::ChatState;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::session::serve_connection;

pub type SharedState = Arc<RwLock<ChatState>>;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct ChatServer {
    config: ServerConfig,
    state: SharedState,
    active_connections: Arc<AtomicUsize>,
}

impl ChatServer {
    pub fn new(config: ServerConfig) -> Self {
        let state = Arc::new(RwLock::new(ChatState::new(config.log_capacity)));
        Self {
            config,
            state,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        self.config.validate()?;
        let (host, port) = self.config.bind_address();
        TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to bind socket to {}:{}", host, port))
    }

    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(CancellationToken::new()).await
    }

    pub async fn run_with_shutdown(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections until `shutdown` fires, then waits for every session to
    /// close.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        log::info!(
            "listening on {}, message log capacity {}",
            listener.local_addr()?,
            self.config.log_capacity
        );

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("server shutdown requested");
                    break;
                }
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            log::warn!("failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                            continue;
                        }
                    };

                    log::info!("new connection from {}", peer);
                    let guard = ConnectionGuard::new(self.active_connections.clone());
                    log::debug!("active connections: {}", guard.current());

                    let shared = self.state.clone();
                    let session_shutdown = shutdown.child_token();
                    sessions.spawn(async move {
                        serve_connection(stream, peer, shared, session_shutdown).await;
                        drop(guard);
                    });
                }
            }
        }

        drop(listener);
        while sessions.join_next().await.is_some() {}
        Ok(())
    }
}

/// Counts a connection as active for as long as it is alive.
struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }

    fn current(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::SeqCst) - 1;
        log::debug!("active connections: {}", remaining);
    }
}
