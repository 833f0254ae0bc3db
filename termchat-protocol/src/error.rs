use std::io;

use thiserror::Error;

use crate::envelope::MessageType;

/// A record that cannot be accepted. Always fatal to the connection that sent it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected message type {0}")]
    UnexpectedType(MessageType),
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("invalid update content '{0}'")]
    InvalidUpdateContent(String),
    #[error("'#' is not allowed in posted content")]
    ForbiddenDelimiter,
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
    #[error("invalid varint in frame header")]
    InvalidFrameHeader,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed mid-frame ({0} bytes buffered)")]
    Truncated(usize),
}
