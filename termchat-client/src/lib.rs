//! Client side of the termchat protocol.
//!
//! A [`ChatClient`] owns one connection. Requests may be issued concurrently; each one
//! carries its own id and is matched to its response by a background receive loop.

pub mod client;
pub mod config;
pub mod error;
pub mod pending;
mod receiver;

pub use client::ChatClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use pending::{PendingRequests, MAX_IN_FLIGHT, MAX_REQUEST_ID};
