//! In-memory message queue with visibility timeouts.
//!
//! Mirrors the receive/delete contract of SQS closely enough for tests:
//! received messages become invisible until they are deleted or their
//! visibility timeout elapses, at which point they are redelivered with a
//! fresh receipt handle. Deleting with a stale or unknown handle succeeds
//! without deleting anything.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{MessageQueue, QueueMessage, ReceiveOptions};

struct Message {
    id: String,
    body: Bytes,
}

struct InFlight {
    message: Message,
    visible_at: Instant,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Message>,
    /// receipt handle → message hidden until `visible_at`.
    in_flight: HashMap<String, InFlight>,
    next_message: u64,
    next_receipt: u64,
}

impl QueueState {
    /// Move every in-flight message whose visibility timeout has elapsed back
    /// to the ready list, oldest message first.
    fn requeue_expired(&mut self, now: Instant) {
        let mut expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        if expired.is_empty() {
            return;
        }

        expired.sort_by_key(|h| self.in_flight[h].message.id.clone());
        for handle in expired {
            if let Some(f) = self.in_flight.remove(&handle) {
                debug!(message_id = %f.message.id, "visibility timeout elapsed, redelivering");
                self.ready.push_back(f.message);
            }
        }
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.visible_at).min()
    }
}

/// In-memory queue backed by a `Mutex<VecDeque>`.
pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    /// Messages waiting to be received (not counting in-flight ones).
    pub fn ready_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").ready.len()
    }

    /// Messages received but not yet deleted.
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").in_flight.len()
    }

    /// Take up to `opts.max_messages` ready messages, marking them in flight.
    fn take_batch(&self, opts: &ReceiveOptions) -> (Vec<QueueMessage>, Option<Instant>) {
        let mut state = self.state.lock().expect("lock poisoned");
        let now = Instant::now();
        state.requeue_expired(now);

        let mut batch = Vec::new();
        while batch.len() < opts.max_messages {
            let Some(message) = state.ready.pop_front() else {
                break;
            };
            state.next_receipt += 1;
            let receipt_handle = format!("{}#{}", message.id, state.next_receipt);

            batch.push(QueueMessage {
                message_id: message.id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: message.body.clone(),
            });
            state.in_flight.insert(
                receipt_handle,
                InFlight {
                    message,
                    visible_at: now + opts.visibility_timeout,
                },
            );
        }

        (batch, state.next_expiry())
    }
}

#[async_trait::async_trait]
impl MessageQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self, opts: ReceiveOptions) -> Result<Vec<QueueMessage>, StoreError> {
        let deadline = Instant::now() + opts.wait;

        loop {
            // Register for wakeups before checking so a send between the
            // check and the wait is not missed.
            let arrived = self.arrivals.notified();

            let (batch, next_expiry) = self.take_batch(&opts);
            if !batch.is_empty() {
                debug!(queue = %self.name, count = batch.len(), "received messages");
                return Ok(batch);
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_expiry.map_or(deadline, |e| e.min(deadline));
            tokio::select! {
                _ = arrived => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("lock poisoned");
        match state.in_flight.remove(receipt_handle) {
            Some(f) => debug!(queue = %self.name, message_id = %f.message.id, "deleted message"),
            None => debug!(queue = %self.name, receipt_handle, "stale receipt handle, nothing deleted"),
        }
        Ok(())
    }

    async fn send(&self, body: Bytes) -> Result<String, StoreError> {
        let id = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.next_message += 1;
            let id = format!("msg-{:08}", state.next_message);
            state.ready.push_back(Message {
                id: id.clone(),
                body,
            });
            id
        };
        self.arrivals.notify_waiters();
        Ok(id)
    }
}
