//! Wire protocol shared by the termchat server and client.
//!
//! Every exchange is a three-field [`Envelope`] (`id`, `type`, `content`) encoded as a
//! UTF-8 JSON object and carried in a varint length-prefixed frame.

pub mod envelope;
pub mod error;
pub mod framing;
pub mod message;
pub mod timestamp;


pub use envelope::{decode_request, decode_response, Envelope, MessageType, Request, Response};
pub use error::{FrameError, ProtocolError};
pub use framing::{decode_frame, encode_frame, write_frame, DecodeResult, FrameReader};
pub use message::Message;
pub use timestamp::Timestamp;

/// Separator between sender, timestamp and content in an `UPDATE_RESP` body.
pub const FIELD_DELIMITER: char = '#';
pub const CONNECT_ACCEPTED: &str = "accepted";
pub const CONNECT_REJECTED: &str = "rejected";
pub const MAX_FRAME_SIZE: usize = 1_048_576; // 1 MB

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 65432;
