use std::collections::HashMap;
use std::net::SocketAddr;

/// A session is identified by the peer address of its connection.
pub type SessionId = SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Accepted,
    Rejected,
}

/// Maps sessions to the nicknames they authenticated with.
///
/// A session is authenticated exactly when it has an entry here. Nicknames are unique
/// among the entries currently present.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    nicknames: HashMap<SessionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts iff no session currently holds `nickname`. On acceptance an existing
    /// entry for `session` is replaced.
    pub fn register(&mut self, session: SessionId, nickname: &str) -> RegisterOutcome {
        if self.is_nickname_taken(nickname) {
            return RegisterOutcome::Rejected;
        }
        self.nicknames.insert(session, nickname.to_string());
        RegisterOutcome::Accepted
    }

    /// Removes the session's entry, if any, and returns the nickname it held.
    pub fn unregister(&mut self, session: SessionId) -> Option<String> {
        self.nicknames.remove(&session)
    }

    pub fn is_authenticated(&self, session: SessionId) -> bool {
        self.nicknames.contains_key(&session)
    }

    pub fn nickname(&self, session: SessionId) -> Option<&str> {
        self.nicknames.get(&session).map(String::as_str)
    }

    pub fn is_nickname_taken(&self, nickname: &str) -> bool {
        self.nicknames.values().any(|taken| taken == nickname)
    }

    pub fn len(&self) -> usize {
        self.nicknames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nicknames.is_empty()
    }
}
