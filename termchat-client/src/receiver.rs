use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use termchat_protocol::{FrameError, FrameReader};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::pending::PendingRequests;

/// State shared between a client's callers and its receive loop.
pub(crate) struct ConnectionState {
    pending: Mutex<PendingRequests>,
    pub(crate) disconnect: CancellationToken,
    pub(crate) authenticated: AtomicBool,
}

impl ConnectionState {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(PendingRequests::new()),
            disconnect: CancellationToken::new(),
            authenticated: AtomicBool::new(false),
        }
    }

    pub(crate) fn pending(&self) -> MutexGuard<'_, PendingRequests> {
        // The table stays consistent even if a holder panicked.
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_connected(&self) -> bool {
        !self.disconnect.is_cancelled()
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Wakes every waiter and forgets the authentication. Idempotent.
    pub(crate) fn mark_disconnected(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        let abandoned = self.pending().close();
        self.disconnect.cancel();
        if abandoned > 0 {
            log::debug!("abandoned {} requests still waiting for a response", abandoned);
        }
    }
}

/// Routes every response on the connection to the request that is waiting for it.
///
/// Runs until the server goes away, sends something invalid, or the connection's
/// token is cancelled.
pub(crate) async fn receive_loop<R>(reader: R, connection: Arc<ConnectionState>)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameReader::new(reader);
    log::info!("listening for new messages");

    loop {
        let read = tokio::select! {
            _ = connection.disconnect.cancelled() => break,
            read = frames.read_envelope() => read,
        };

        let envelope = match read {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                log::error!("server closed its socket");
                break;
            },
            Err(FrameError::Protocol(e)) => {
                log::error!("invalid data received, closing connection: {}", e);
                break;
            },
            Err(e) => {
                log::error!("connection to server lost: {}", e);
                break;
            },
        };

        if let Err(e) = envelope.validate_response() {
            log::error!(
                "received {} in invalid format, closing connection: {}",
                envelope.kind,
                e
            );
            break;
        }

        log::debug!(
            "received {} with content '{}'",
            envelope.kind,
            envelope.content
        );

        let id = envelope.id;
        if !connection.pending().complete(envelope) {
            log::warn!("dropping response {}, no request is waiting for it", id);
        }
    }

    connection.mark_disconnected();
}
