use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::message::Message;
use crate::timestamp::Timestamp;
use crate::{CONNECT_ACCEPTED, CONNECT_REJECTED, FIELD_DELIMITER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    ConnectReq,
    ConnectResp,
    PostReq,
    PostResp,
    UpdateReq,
    UpdateResp,
}

impl MessageType {
    pub fn is_request(self) -> bool {
        matches!(self, Self::ConnectReq | Self::PostReq | Self::UpdateReq)
    }

    /// Request types that are only served to authenticated sessions.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::PostReq | Self::UpdateReq)
    }

    /// The response type a request is answered with, `None` for response types.
    pub fn response_type(self) -> Option<MessageType> {
        match self {
            Self::ConnectReq => Some(Self::ConnectResp),
            Self::PostReq => Some(Self::PostResp),
            Self::UpdateReq => Some(Self::UpdateResp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectReq => "CONNECT_REQ",
            Self::ConnectResp => "CONNECT_RESP",
            Self::PostReq => "POST_REQ",
            Self::PostResp => "POST_RESP",
            Self::UpdateReq => "UPDATE_REQ",
            Self::UpdateResp => "UPDATE_RESP",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire unit. Exactly three fields; `id` is chosen by the requester and echoed in
/// the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
}

impl Envelope {
    pub fn new(id: i64, kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            content: content.into(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Shape-only decode: field set and field types, no role or content checks.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn validate_request(&self) -> Result<(), ProtocolError> {
        Request::from_envelope(self).map(|_| ())
    }

    pub fn validate_response(&self) -> Result<(), ProtocolError> {
        Response::from_envelope(self).map(|_| ())
    }
}

pub fn decode_request(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
    let envelope = Envelope::from_json(bytes)?;
    envelope.validate_request()?;
    Ok(envelope)
}

pub fn decode_response(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
    let envelope = Envelope::from_json(bytes)?;
    envelope.validate_response()?;
    Ok(envelope)
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Connect { nickname: String },
    Post { content: String },
    Update { cursor: Timestamp },
}

impl Request {
    pub fn parse(kind: MessageType, content: &str) -> Result<Self, ProtocolError> {
        match kind {
            MessageType::ConnectReq => Ok(Self::Connect {
                nickname: content.to_string(),
            }),
            MessageType::PostReq => {
                if content.contains(FIELD_DELIMITER) {
                    return Err(ProtocolError::ForbiddenDelimiter);
                }
                Ok(Self::Post {
                    content: content.to_string(),
                })
            },
            MessageType::UpdateReq => Ok(Self::Update {
                cursor: Timestamp::parse(content)?,
            }),
            other => Err(ProtocolError::UnexpectedType(other)),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        Self::parse(envelope.kind, &envelope.content)
    }

    pub fn kind(&self) -> MessageType {
        match self {
            Self::Connect { .. } => MessageType::ConnectReq,
            Self::Post { .. } => MessageType::PostReq,
            Self::Update { .. } => MessageType::UpdateReq,
        }
    }

    pub fn into_envelope(self, id: i64) -> Envelope {
        let kind = self.kind();
        let content = match self {
            Self::Connect { nickname } => nickname,
            Self::Post { content } => content,
            Self::Update { cursor } => cursor.to_iso(),
        };
        Envelope::new(id, kind, content)
    }
}

/// A validated server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Connect { accepted: bool },
    Post,
    /// `None` when the requester is up to date.
    Update(Option<Message>),
}

impl Response {
    pub fn parse(kind: MessageType, content: &str) -> Result<Self, ProtocolError> {
        match kind {
            MessageType::ConnectResp => Ok(Self::Connect {
                accepted: content == CONNECT_ACCEPTED,
            }),
            MessageType::PostResp => Ok(Self::Post),
            MessageType::UpdateResp if content.is_empty() => Ok(Self::Update(None)),
            MessageType::UpdateResp => Ok(Self::Update(Some(Message::from_update_content(
                content,
            )?))),
            other => Err(ProtocolError::UnexpectedType(other)),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        Self::parse(envelope.kind, &envelope.content)
    }

    pub fn kind(&self) -> MessageType {
        match self {
            Self::Connect { .. } => MessageType::ConnectResp,
            Self::Post => MessageType::PostResp,
            Self::Update(_) => MessageType::UpdateResp,
        }
    }

    pub fn into_envelope(self, id: i64) -> Envelope {
        let kind = self.kind();
        let content = match self {
            Self::Connect { accepted: true } => CONNECT_ACCEPTED.to_string(),
            Self::Connect { accepted: false } => CONNECT_REJECTED.to_string(),
            Self::Post => String::new(),
            Self::Update(Some(message)) => message.to_update_content(),
            Self::Update(None) => String::new(),
        };
        Envelope::new(id, kind, content)
    }
}
