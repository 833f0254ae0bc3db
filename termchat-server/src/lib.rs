pub mod config;
pub mod server;
pub mod session;

pub use config::{ConfigError, ServerConfig};
pub use server::{ChatServer, SharedState};
pub use session::{serve_connection, SessionError, SessionHandler, SessionState};
