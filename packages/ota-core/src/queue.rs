use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Live request registered under a tag.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    tag: String,
    id: u64,
    token: CancellationToken,
}

impl RequestTicket {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Tracks at most one live cancellation token per tag.
#[derive(Default)]
pub struct RequestQueue {
    live: Mutex<HashMap<String, (u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<String, (u64, CancellationToken)>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new request under `tag`, cancelling the one it replaces.
    pub fn register(&self, tag: &str) -> RequestTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self
            .live()
            .insert(tag.to_string(), (id, token.clone()))
        {
            previous.cancel();
        }
        RequestTicket {
            tag: tag.to_string(),
            id,
            token,
        }
    }

    /// Forget a completed request. A newer request under the same tag stays live.
    pub fn finish(&self, ticket: &RequestTicket) {
        let mut live = self.live();
        if live.get(&ticket.tag).is_some_and(|(id, _)| *id == ticket.id) {
            live.remove(&ticket.tag);
        }
    }

    /// Cancel the live request under `tag`, returns whether there was one.
    pub fn cancel_all(&self, tag: &str) -> bool {
        match self.live().remove(tag) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self, tag: &str) -> bool {
        self.live().contains_key(tag)
    }
}
