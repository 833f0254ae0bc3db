use crate::error::ProtocolError;
use crate::timestamp::Timestamp;
use crate::FIELD_DELIMITER;

/// A posted chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: String,
    timestamp: Timestamp,
    content: String,
}

impl Message {
    pub fn new(sender: impl Into<String>, timestamp: Timestamp, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            timestamp,
            content: content.into(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Body of an `UPDATE_RESP`: `<sender>#<timestamp>#<content>`.
    pub fn to_update_content(&self) -> String {
        format!(
            "{}{d}{}{d}{}",
            self.sender,
            self.timestamp.to_iso(),
            self.content,
            d = FIELD_DELIMITER
        )
    }

    /// Parses an `UPDATE_RESP` body.
    ///
    /// Neither the timestamp nor posted content may contain the delimiter, so the body
    /// is split from the right and anything left over belongs to the sender.
    pub fn from_update_content(body: &str) -> Result<Self, ProtocolError> {
        let mut fields = body.rsplitn(3, FIELD_DELIMITER);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(content), Some(timestamp), Some(sender)) => {
                let timestamp = Timestamp::parse(timestamp)?;
                Ok(Self::new(sender, timestamp, content))
            },
            _ => Err(ProtocolError::InvalidUpdateContent(body.to_string())),
        }
    }
}
