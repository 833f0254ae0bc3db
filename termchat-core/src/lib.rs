pub mod chat_state;
pub mod message_log;
pub mod registry;

#[cfg(test)]
mod tests;

pub use chat_state::{ChatState, PostError, UpdateHit};
pub use message_log::{MessageLog, DEFAULT_LOG_CAPACITY};
pub use registry::{RegisterOutcome, SessionId, SessionRegistry};
