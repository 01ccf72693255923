//! Process-local queue with visibility-timeout redelivery.
//!
//! Stands in for the managed queue in local runs and tests. Semantics follow
//! the managed service closely enough for redelivery scenarios: a received
//! message is hidden until acknowledged or until its visibility timeout
//! lapses, and a message received more than `max_receives` times is moved to
//! the dead-letter list instead of being handed out again.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::adapters::queue::{MessageSource, ReceivedMessage, WorkQueue};
use crate::adapters::AdapterError;

#[derive(Debug)]
struct Entry {
    id: u64,
    body: String,
    visible_at: Instant,
    receive_count: u32,
    receipt: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    entries: Vec<Entry>,
    dead_letters: Vec<String>,
}

#[derive(Debug)]
pub struct InMemoryQueue {
    visibility_timeout: Duration,
    max_receives: u32,
    state: Mutex<State>,
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration, max_receives: u32) -> Self {
        Self {
            visibility_timeout,
            max_receives,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, AdapterError> {
        self.state
            .lock()
            .map_err(|_| AdapterError::new("in-memory queue state is poisoned"))
    }

    /// Messages not yet acknowledged, visible or not.
    pub fn pending_bodies(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.entries.iter().map(|e| e.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn dead_letters(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.dead_letters.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn push(&self, body: String) -> Result<(), AdapterError> {
        let mut state = self.lock()?;
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(Entry {
            id,
            body,
            visible_at: Instant::now(),
            receive_count: 0,
            receipt: None,
        });
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryQueue {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, AdapterError> {
        let now = Instant::now();
        let mut state = self.lock()?;

        let max_receives = self.max_receives;
        let (exhausted, live): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut state.entries)
            .into_iter()
            .partition(|entry| entry.visible_at <= now && entry.receive_count >= max_receives);
        state.entries = live;
        state
            .dead_letters
            .extend(exhausted.into_iter().map(|entry| entry.body));

        let mut received = Vec::new();
        for entry in state
            .entries
            .iter_mut()
            .filter(|entry| entry.visible_at <= now)
            .take(max_messages)
        {
            entry.receive_count += 1;
            entry.visible_at = now + self.visibility_timeout;
            let receipt = format!("{}-{}", entry.id, entry.receive_count);
            entry.receipt = Some(receipt.clone());
            received.push(ReceivedMessage {
                receipt,
                body: entry.body.clone(),
            });
        }

        Ok(received)
    }

    async fn acknowledge(&self, receipt: &str) -> Result<(), AdapterError> {
        let mut state = self.lock()?;
        let position = state
            .entries
            .iter()
            .position(|entry| entry.receipt.as_deref() == Some(receipt))
            .ok_or_else(|| AdapterError::new(format!("receipt '{receipt}' is no longer valid")))?;
        state.entries.remove(position);
        Ok(())
    }
}
