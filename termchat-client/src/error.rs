use std::io;

use termchat_protocol::{FrameError, MessageType, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("not connected to the server")]
    Disconnected,
    #[error("too many requests in flight (limit {0})")]
    TooManyInFlight(usize),
    #[error("expected {expected} in response, got {actual}")]
    UnexpectedResponse {
        expected: MessageType,
        actual: MessageType,
    },
}
