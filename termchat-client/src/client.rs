use std::sync::atomic::Ordering;
use std::sync::Arc;

use termchat_protocol::{
    write_frame, Envelope, Message, MessageType, Request, Response, Timestamp, CONNECT_ACCEPTED,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::receiver::{receive_loop, ConnectionState};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct ChatClient {
    writer: Mutex<BoxedWriter>,
    connection: Arc<ConnectionState>,
    messages: Mutex<Vec<Message>>,
    receiver: JoinHandle<()>,
}

impl ChatClient {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        log::info!("connected to {}:{}", config.host, config.port);
        let (reader, writer) = stream.into_split();
        Ok(Self::with_transport(reader, writer))
    }

    /// Builds a client over an already established byte stream and starts its
    /// receive loop. Must be called inside a tokio runtime.
    pub fn with_transport<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let connection = Arc::new(ConnectionState::new());
        let receiver = tokio::spawn(receive_loop(reader, connection.clone()));
        Self {
            writer: Mutex::new(Box::new(writer)),
            connection,
            messages: Mutex::new(Vec::new()),
            receiver,
        }
    }

    /// Sends one request and waits for the response carrying the same id.
    ///
    /// There is no timeout: the call returns when the response arrives or the
    /// connection is lost.
    pub async fn send_and_wait(
        &self,
        kind: MessageType,
        content: &str,
    ) -> Result<Envelope, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::Disconnected);
        }
        let request = Request::parse(kind, content)?;
        let (id, completion) = self.connection.pending().register()?;
        let envelope = request.into_envelope(id);

        log::debug!(
            "sending {} with content '{}'",
            envelope.kind,
            envelope.content
        );
        let written = {
            let mut writer = self.writer.lock().await;
            tokio::select! {
                _ = self.connection.disconnect.cancelled() => {
                    self.connection.pending().cancel(id);
                    return Err(ClientError::Disconnected);
                }
                written = write_frame(&mut *writer, &envelope) => written,
            }
        };
        if let Err(e) = written {
            log::error!("connection to server lost: {}", e);
            self.connection.pending().cancel(id);
            self.connection.mark_disconnected();
            return Err(e.into());
        }

        let response = tokio::select! {
            biased;
            response = completion => response.map_err(|_| ClientError::Disconnected)?,
            _ = self.connection.disconnect.cancelled() => {
                self.connection.pending().cancel(id);
                return Err(ClientError::Disconnected);
            }
        };

        match kind.response_type() {
            Some(expected) if expected != response.kind => Err(ClientError::UnexpectedResponse {
                expected,
                actual: response.kind,
            }),
            _ => Ok(response),
        }
    }

    /// Asks the server for `nickname`. True iff it was accepted.
    pub async fn connect_as(&self, nickname: &str) -> bool {
        if self.is_authenticated() {
            log::warn!("already authenticated, refusing to authenticate again");
            return false;
        }

        log::debug!("attempting to authenticate as '{}'", nickname);
        match self.send_and_wait(MessageType::ConnectReq, nickname).await {
            Ok(response) if response.content == CONNECT_ACCEPTED => {
                self.connection.authenticated.store(true, Ordering::SeqCst);
                log::info!("authenticated as '{}'", nickname);
                true
            },
            Ok(_) => {
                log::warn!("nickname '{}' rejected by the server", nickname);
                false
            },
            Err(e) => {
                log::warn!("authentication failed: {}", e);
                false
            },
        }
    }

    pub async fn post(&self, content: &str) -> bool {
        if !self.is_authenticated() {
            log::warn!("cannot post, client is not authenticated");
            return false;
        }

        log::debug!("attempting to post '{}'", content);
        match self.send_and_wait(MessageType::PostReq, content).await {
            Ok(_) => {
                log::debug!("message posted");
                true
            },
            Err(e) => {
                log::warn!("failed to post message: {}", e);
                false
            },
        }
    }

    /// Pulls every message newer than the last one held locally, one request at a
    /// time. True once the server reports nothing newer.
    pub async fn sync(&self) -> bool {
        if !self.is_authenticated() {
            log::warn!("cannot sync, client is not authenticated");
            return false;
        }

        let mut messages = self.messages.lock().await;
        let mut received = 0usize;
        log::debug!("attempting to update message list");

        loop {
            let cursor = messages
                .last()
                .map(Message::timestamp)
                .unwrap_or_else(Timestamp::min);

            let response = match self
                .send_and_wait(MessageType::UpdateReq, &cursor.to_iso())
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    log::debug!("failed to update message list: {}", e);
                    return false;
                },
            };

            match Response::from_envelope(&response) {
                Ok(Response::Update(Some(message))) => {
                    messages.push(message);
                    received += 1;
                },
                Ok(Response::Update(None)) => {
                    log::debug!("message list fully updated, {} new messages", received);
                    return true;
                },
                Ok(other) => {
                    log::error!("unexpected response to an update request: {:?}", other);
                    return false;
                },
                Err(e) => {
                    log::error!("invalid update response: {}", e);
                    return false;
                },
            }
        }
    }

    /// Snapshot of the locally held messages, oldest first.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.connection.is_authenticated()
    }

    /// Stops the receive loop, fails every pending request and closes the write side.
    pub async fn close(&self) {
        self.connection.mark_disconnected();
        if let Err(e) = self.writer.lock().await.shutdown().await {
            log::trace!("shutdown of the connection failed: {}", e);
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.connection.disconnect.cancel();
        self.receiver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termchat_protocol::FrameReader;
    use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

    /// Scripted server end of an in-memory connection.
    struct FakeServer {
        frames: FrameReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeServer {
        async fn next_request(&mut self) -> Envelope {
            self.frames.read_envelope().await.unwrap().unwrap()
        }

        async fn reply(&mut self, id: i64, kind: MessageType, content: &str) {
            write_frame(&mut self.writer, &Envelope::new(id, kind, content))
                .await
                .unwrap();
        }
    }

    fn make_pair() -> (ChatClient, FakeServer) {
        let (client, server) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);
        let chat = ChatClient::with_transport(client_read, client_write);
        let fake = FakeServer {
            frames: FrameReader::new(server_read),
            writer: server_write,
        };
        (chat, fake)
    }

    async fn authenticate(chat: &ChatClient, fake: &mut FakeServer) {
        let (accepted, _) = tokio::join!(chat.connect_as("alice"), async {
            let request = fake.next_request().await;
            fake.reply(request.id, MessageType::ConnectResp, "accepted").await;
        });
        assert!(accepted);
    }

    #[tokio::test]
    async fn test_connect_as_accepted() {
        let (chat, mut fake) = make_pair();

        let (accepted, request) = tokio::join!(chat.connect_as("alice"), async {
            let request = fake.next_request().await;
            fake.reply(request.id, MessageType::ConnectResp, "accepted").await;
            request
        });

        assert!(accepted);
        assert!(chat.is_authenticated());
        assert_eq!(request.kind, MessageType::ConnectReq);
        assert_eq!(request.content, "alice");
        assert_eq!(request.id, 1);
    }

    #[tokio::test]
    async fn test_connect_as_rejected() {
        let (chat, mut fake) = make_pair();

        let (accepted, _) = tokio::join!(chat.connect_as("alice"), async {
            let request = fake.next_request().await;
            fake.reply(request.id, MessageType::ConnectResp, "rejected").await;
        });

        assert!(!accepted);
        assert!(!chat.is_authenticated());
        assert!(chat.is_connected());
    }

    #[tokio::test]
    async fn test_connect_as_refused_when_authenticated() {
        let (chat, mut fake) = make_pair();
        authenticate(&chat, &mut fake).await;

        assert!(!chat.connect_as("bob").await);
        assert!(chat.is_authenticated());
    }

    #[tokio::test]
    async fn test_post_and_sync_refused_when_unauthenticated() {
        let (chat, _fake) = make_pair();
        assert!(!chat.post("hello").await);
        assert!(!chat.sync().await);
    }

    #[tokio::test]
    async fn test_post_with_delimiter_refused_locally() {
        let (chat, mut fake) = make_pair();
        authenticate(&chat, &mut fake).await;

        assert!(!chat.post("a#b").await);
        assert!(chat.is_connected());
    }

    #[tokio::test]
    async fn test_sync_collects_until_empty() {
        let (chat, mut fake) = make_pair();
        authenticate(&chat, &mut fake).await;

        let (synced, cursors) = tokio::join!(chat.sync(), async {
            let mut cursors = Vec::new();
            let replies = [
                "bob#2022-10-06T10:00:00.000001#hi",
                "carol#2022-10-06T10:00:01#yo",
                "",
            ];
            for content in replies {
                let request = fake.next_request().await;
                assert_eq!(request.kind, MessageType::UpdateReq);
                cursors.push(request.content.clone());
                fake.reply(request.id, MessageType::UpdateResp, content).await;
            }
            cursors
        });

        assert!(synced);
        assert_eq!(
            cursors,
            vec![
                "0001-01-01T00:00:00.000000",
                "2022-10-06T10:00:00.000001",
                "2022-10-06T10:00:01.000000",
            ]
        );
        let messages = chat.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender(), "bob");
        assert_eq!(messages[1].content(), "yo");
    }

    #[tokio::test]
    async fn test_concurrent_requests_correlated_by_id() {
        let (chat, mut fake) = make_pair();

        let ((first, second), _) = tokio::join!(
            async {
                tokio::join!(
                    chat.send_and_wait(MessageType::ConnectReq, "alice"),
                    chat.send_and_wait(MessageType::ConnectReq, "bob"),
                )
            },
            async {
                let a = fake.next_request().await;
                let b = fake.next_request().await;
                // Answer in reverse order; each caller must still get its own reply.
                fake.reply(b.id, MessageType::ConnectResp, &format!("reply-{}", b.content))
                    .await;
                fake.reply(a.id, MessageType::ConnectResp, &format!("reply-{}", a.content))
                    .await;
            }
        );

        assert_eq!(first.unwrap().content, "reply-alice");
        assert_eq!(second.unwrap().content, "reply-bob");
    }

    #[tokio::test]
    async fn test_unknown_id_dropped() {
        let (chat, mut fake) = make_pair();

        let (response, _) = tokio::join!(
            chat.send_and_wait(MessageType::ConnectReq, "alice"),
            async {
                let request = fake.next_request().await;
                fake.reply(request.id + 500, MessageType::ConnectResp, "stray").await;
                fake.reply(request.id, MessageType::ConnectResp, "accepted").await;
            }
        );

        assert_eq!(response.unwrap().content, "accepted");
        assert!(chat.is_connected());
    }

    #[tokio::test]
    async fn test_unexpected_response_type() {
        let (chat, mut fake) = make_pair();

        let (response, _) = tokio::join!(
            chat.send_and_wait(MessageType::ConnectReq, "alice"),
            async {
                let request = fake.next_request().await;
                fake.reply(request.id, MessageType::PostResp, "").await;
            }
        );

        assert!(matches!(
            response,
            Err(ClientError::UnexpectedResponse {
                expected: MessageType::ConnectResp,
                actual: MessageType::PostResp,
            })
        ));
    }

    #[tokio::test]
    async fn test_response_type_refused_as_request() {
        let (chat, _fake) = make_pair();
        let result = chat.send_and_wait(MessageType::PostResp, "").await;
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_server_close_fails_waiters() {
        let (chat, mut fake) = make_pair();
        authenticate(&chat, &mut fake).await;

        let (response, _) = tokio::join!(
            chat.send_and_wait(MessageType::PostReq, "hello"),
            async move {
                fake.next_request().await;
                drop(fake);
            }
        );

        assert!(matches!(response, Err(ClientError::Disconnected)));
        assert!(!chat.is_connected());
        assert!(!chat.is_authenticated());
        assert!(!chat.post("again").await);
        assert!(matches!(
            chat.send_and_wait(MessageType::ConnectReq, "x").await,
            Err(ClientError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_invalid_response_disconnects() {
        let (chat, mut fake) = make_pair();

        let (response, _) = tokio::join!(
            chat.send_and_wait(MessageType::UpdateReq, "0001-01-01T00:00:00"),
            async {
                let request = fake.next_request().await;
                fake.reply(request.id, MessageType::UpdateResp, "no delimiters here").await;
            }
        );

        assert!(matches!(response, Err(ClientError::Disconnected)));
        assert!(!chat.is_connected());
    }

    #[tokio::test]
    async fn test_close_while_server_not_reading() {
        let (client, server) = duplex(64);
        let (client_read, client_write) = tokio::io::split(client);
        let chat = ChatClient::with_transport(client_read, client_write);

        let content = "x".repeat(1024);
        let (response, _) = tokio::join!(
            chat.send_and_wait(MessageType::ConnectReq, &content),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                tokio::time::timeout(std::time::Duration::from_secs(2), chat.close())
                    .await
                    .expect("close must not wait for a stalled write");
            }
        );

        assert!(matches!(response, Err(ClientError::Disconnected)));
        assert!(!chat.is_connected());
        drop(server);
    }

    #[tokio::test]
    async fn test_close_unblocks_waiter() {
        let (chat, mut fake) = make_pair();

        let (response, _) = tokio::join!(
            chat.send_and_wait(MessageType::ConnectReq, "alice"),
            async {
                fake.next_request().await;
                chat.close().await;
            }
        );

        assert!(matches!(response, Err(ClientError::Disconnected)));
        assert!(!chat.is_connected());
        // The write side was shut down, so the server sees a clean close.
        assert!(fake.frames.read_envelope().await.unwrap().is_none());
    }
}
