use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{MessageQueue, QueueError, QueueMessage};

// ============================================================================
// In-Memory Queue
// ============================================================================
//
// Single-partition queue for tests and demos. Records every commit and every
// publish so callers can assert on them, and can be told to fail publishes or
// the next few fetches.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl PublishedMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueMessage>,
    committed: Vec<QueueMessage>,
    published: Vec<PublishedMessage>,
    next_offset: i64,
    closed: bool,
    fail_publish: bool,
    failing_fetches: u32,
}

pub struct InMemoryQueue {
    topic: String,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a payload; returns its offset.
    pub fn push(&self, key: Option<&[u8]>, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = {
            let mut state = self.state();
            let offset = state.next_offset;
            state.next_offset += 1;
            state.pending.push_back(QueueMessage {
                topic: self.topic.clone(),
                partition: 0,
                offset,
                key: key.map(<[u8]>::to_vec),
                payload: payload.into(),
                headers: Vec::new(),
            });
            offset
        };
        self.notify.notify_one();
        offset
    }

    /// Wake the fetcher; once drained, fetch returns `QueueError::Closed`.
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_one();
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.state().fail_publish = fail;
    }

    pub fn fail_next_fetches(&self, count: u32) {
        self.state().failing_fetches = count;
        self.notify.notify_one();
    }

    pub fn committed(&self) -> Vec<QueueMessage> {
        self.state().committed.clone()
    }

    pub fn committed_offsets(&self) -> Vec<i64> {
        self.state().committed.iter().map(|m| m.offset).collect()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn fetch(&self) -> Result<QueueMessage, QueueError> {
        loop {
            {
                let mut state = self.state();
                if state.failing_fetches > 0 {
                    state.failing_fetches -= 1;
                    return Err(QueueError::Transport("injected fetch failure".to_string()));
                }
                if let Some(message) = state.pending.pop_front() {
                    return Ok(message);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn commit(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.state().committed.push(message.clone());
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        message: &QueueMessage,
        headers: Vec<(String, String)>,
    ) -> Result<(), QueueError> {
        let mut state = self.state();
        if state.fail_publish {
            return Err(QueueError::Transport(format!("publish to {} refused", topic)));
        }
        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            key: message.key.clone(),
            payload: message.payload.clone(),
            headers,
        });
        Ok(())
    }
}
