use std::collections::HashMap;

use termchat_protocol::Envelope;
use tokio::sync::oneshot;

use crate::error::ClientError;

/// Request ids run 1..=MAX_REQUEST_ID and then wrap around.
pub const MAX_REQUEST_ID: i64 = 1000;
/// One id is always left free so allocation can never spin.
pub const MAX_IN_FLIGHT: usize = (MAX_REQUEST_ID - 1) as usize;

/// Requests that have been sent and are waiting for their response, keyed by id.
#[derive(Debug)]
pub struct PendingRequests {
    next_id: i64,
    waiters: HashMap<i64, oneshot::Sender<Envelope>>,
    closed: bool,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            waiters: HashMap::new(),
            closed: false,
        }
    }

    /// Allocates an id that is not in flight and returns it with the receiving end of
    /// its completion.
    pub fn register(&mut self) -> Result<(i64, oneshot::Receiver<Envelope>), ClientError> {
        if self.closed {
            return Err(ClientError::Disconnected);
        }
        if self.waiters.len() >= MAX_IN_FLIGHT {
            return Err(ClientError::TooManyInFlight(MAX_IN_FLIGHT));
        }

        let id = loop {
            let candidate = self.next_id;
            self.next_id = if candidate >= MAX_REQUEST_ID {
                1
            } else {
                candidate + 1
            };
            if !self.waiters.contains_key(&candidate) {
                break candidate;
            }
        };

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        Ok((id, rx))
    }

    /// Hands `envelope` to whoever is waiting on its id. Returns false if nobody is.
    pub fn complete(&mut self, envelope: Envelope) -> bool {
        match self.waiters.remove(&envelope.id) {
            Some(waiter) => waiter.send(envelope).is_ok(),
            None => false,
        }
    }

    pub fn cancel(&mut self, id: i64) -> bool {
        self.waiters.remove(&id).is_some()
    }

    /// Drops every waiter, waking each with a closed channel, and refuses new
    /// registrations. Returns how many requests were abandoned.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        let abandoned = self.waiters.len();
        self.waiters.clear();
        abandoned
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
