use std::io;
use std::net::SocketAddr;

use termchat_core::RegisterOutcome;
use termchat_protocol::{
    write_frame, Envelope, FrameError, FrameReader, MessageType, ProtocolError, Request, Response,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::server::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// Why a session ended early. Every variant is fatal to its own connection only.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("{0} sent before authentication")]
    Unauthorized(MessageType),
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("session already closed")]
    Closed,
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Protocol(e) => SessionError::Protocol(e),
            FrameError::Io(e) => SessionError::Transport(e),
            FrameError::Truncated(buffered) => SessionError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("peer closed mid-frame with {} bytes buffered", buffered),
            )),
        }
    }
}

/// Server side of one client connection.
pub struct SessionHandler {
    peer: SocketAddr,
    state: SessionState,
    shared: SharedState,
}

impl SessionHandler {
    pub fn new(peer: SocketAddr, shared: SharedState) -> Self {
        Self {
            peer,
            state: SessionState::Unauthenticated,
            shared,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Validates and executes one request, returning the response to send back.
    ///
    /// Any error moves the session to `Closed`; the caller is expected to drop the
    /// connection.
    pub async fn handle(&mut self, envelope: Envelope) -> Result<Envelope, SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        let result = self.dispatch(envelope).await;
        if result.is_err() {
            self.state = SessionState::Closed;
        }
        result
    }

    async fn dispatch(&mut self, envelope: Envelope) -> Result<Envelope, SessionError> {
        let request = Request::from_envelope(&envelope)?;
        let kind = request.kind();
        if kind.requires_auth() && self.state != SessionState::Authenticated {
            return Err(SessionError::Unauthorized(kind));
        }

        let response = match request {
            Request::Connect { nickname } => {
                let outcome = self.shared.write().await.connect(self.peer, &nickname);
                let accepted = outcome == RegisterOutcome::Accepted;
                if accepted {
                    self.state = SessionState::Authenticated;
                }
                Response::Connect { accepted }
            },
            Request::Post { content } => {
                self.shared
                    .write()
                    .await
                    .post(self.peer, &content)
                    .map_err(|_| SessionError::Unauthorized(kind))?;
                Response::Post
            },
            Request::Update { cursor } => {
                let hit = self.shared.read().await.update(cursor);
                match hit {
                    Some(hit) => {
                        log::debug!(
                            "{} updating its message list, progress {}/{}",
                            self.peer,
                            hit.position + 1,
                            hit.total
                        );
                        Response::Update(Some(hit.message))
                    },
                    None => {
                        log::debug!("{} is up to date with the message list", self.peer);
                        Response::Update(None)
                    },
                }
            },
        };

        Ok(response.into_envelope(envelope.id))
    }

    /// Reads requests and writes responses until the peer leaves, a request is
    /// rejected, or `shutdown` fires. The session is closed on every exit path.
    pub async fn run<R, W>(
        &mut self,
        reader: R,
        mut writer: W,
        shutdown: CancellationToken,
    ) -> Result<(), SessionError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::new(reader);

        let result = loop {
            let envelope = tokio::select! {
                _ = shutdown.cancelled() => {
                    log::debug!("shutdown requested, dropping {}", self.peer);
                    break Ok(());
                }
                read = frames.read_envelope() => match read {
                    Ok(Some(envelope)) => envelope,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(SessionError::from(e)),
                }
            };

            log::debug!(
                "from {} received {} with content '{}'",
                self.peer,
                envelope.kind,
                envelope.content
            );

            let response = match self.handle(envelope).await {
                Ok(response) => response,
                Err(e) => break Err(e),
            };
            // A peer that stops reading must not hold up shutdown.
            let written = tokio::select! {
                _ = shutdown.cancelled() => {
                    log::debug!("shutdown requested while writing to {}", self.peer);
                    break Ok(());
                }
                written = write_frame(&mut writer, &response) => written,
            };
            if let Err(e) = written {
                break Err(e.into());
            }
        };

        self.close().await;
        if let Err(e) = writer.shutdown().await {
            log::trace!("shutdown of {} failed: {}", self.peer, e);
        }
        result
    }

    /// Releases the session's nickname. Idempotent.
    pub async fn close(&mut self) {
        self.state = SessionState::Closed;
        if let Some(nickname) = self.shared.write().await.disconnect(self.peer) {
            log::debug!("{} ('{}') removed from users list", self.peer, nickname);
        }
    }
}

/// Runs a session over an accepted TCP stream and logs how it ended.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: SharedState,
    shutdown: CancellationToken,
) {
    let (reader, writer) = stream.into_split();
    let mut handler = SessionHandler::new(peer, shared);

    match handler.run(reader, writer, shutdown).await {
        Ok(()) => log::info!("closing connection with {}", peer),
        Err(SessionError::Unauthorized(kind)) => log::warn!(
            "closing connection with {}: {} attempted before authentication",
            peer,
            kind
        ),
        Err(SessionError::Protocol(e)) => {
            log::error!("closing connection with {} due to invalid data: {}", peer, e)
        },
        Err(e) => log::info!("connection with {} lost: {}", peer, e),
    }
}
