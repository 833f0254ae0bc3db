use termchat_protocol::{Message, Timestamp};

use crate::message_log::MessageLog;
use crate::registry::{RegisterOutcome, SessionId, SessionRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    NotAuthenticated,
}

/// Answer to an update query: the first message newer than the cursor, plus where it
/// sits in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHit {
    pub message: Message,
    pub position: usize,
    pub total: usize,
}

/// Everything the server shares between sessions. Callers serialize access to it.
pub struct ChatState {
    log: MessageLog,
    registry: SessionRegistry,
}

impl ChatState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            log: MessageLog::new(log_capacity),
            registry: SessionRegistry::new(),
        }
    }

    pub fn connect(&mut self, session: SessionId, nickname: &str) -> RegisterOutcome {
        let outcome = self.registry.register(session, nickname);
        match outcome {
            RegisterOutcome::Accepted => {
                log::info!("{} registered as '{}'", session, nickname);
            },
            RegisterOutcome::Rejected => {
                log::debug!("{} refused nickname '{}', already in use", session, nickname);
            },
        }
        outcome
    }

    /// Appends a message from `session`'s nickname, stamped with the current time.
    pub fn post(&mut self, session: SessionId, content: &str) -> Result<Message, PostError> {
        self.post_at(session, content, Timestamp::now())
    }

    pub fn post_at(
        &mut self,
        session: SessionId,
        content: &str,
        now: Timestamp,
    ) -> Result<Message, PostError> {
        let sender = self
            .registry
            .nickname(session)
            .ok_or(PostError::NotAuthenticated)?
            .to_string();
        let (message, evicted) = self.log.post(&sender, content, now);
        if let Some(evicted) = evicted {
            log::debug!(
                "log full ({}), evicted message from {} at {}",
                self.log.capacity(),
                evicted.sender(),
                evicted.timestamp()
            );
        }
        log::debug!(
            "message from {} appended, log size {}",
            session,
            self.log.len()
        );
        Ok(message)
    }

    pub fn update(&self, cursor: Timestamp) -> Option<UpdateHit> {
        self.log
            .position_after(cursor)
            .map(|(position, message)| UpdateHit {
                message: message.clone(),
                position,
                total: self.log.len(),
            })
    }

    /// Drops the session's registration. Safe to call for sessions that never
    /// authenticated.
    pub fn disconnect(&mut self, session: SessionId) -> Option<String> {
        self.registry.unregister(session)
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            log: MessageLog::default(),
            registry: SessionRegistry::default(),
        }
    }
}
