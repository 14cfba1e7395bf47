//! Core traits and types for backend access.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

use crate::error::StoreError;

/// Attribute that holds the partition key of a [`WideColumnTable`] item.
pub const TABLE_KEY_ATTRIBUTE: &str = "widget_id";

/// A flat wide-column item: attribute name → string value.
pub type Item = BTreeMap<String, String>;

/// A message handed out by [`MessageQueue::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Backend-assigned message identifier.
    pub message_id: String,
    /// Token that must be passed to [`MessageQueue::delete`]. A new handle is
    /// issued every time the message is received.
    pub receipt_handle: String,
    /// Raw message body.
    pub body: Bytes,
}

/// Parameters for a batched receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Upper bound on the batch size.
    pub max_messages: usize,
    /// How long to long-poll when the queue is empty.
    pub wait: Duration,
    /// How long received messages stay hidden from other receivers.
    pub visibility_timeout: Duration,
}

/// A flat key space of byte objects.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait ObjectBucket: Send + Sync {
    /// Bucket name, for logging.
    fn name(&self) -> &str;

    /// List up to `max_keys` keys, in whatever order the backend returns.
    async fn list(&self, max_keys: usize) -> Result<Vec<String>, StoreError>;

    /// Read an object. Returns `None` if not found.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write an object, replacing any previous content.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// A message queue with receive-then-delete semantics.
#[async_trait::async_trait]
pub trait MessageQueue: Send + Sync {
    /// Queue name or URL, for logging.
    fn name(&self) -> &str;

    /// Receive up to `opts.max_messages` messages, waiting at most
    /// `opts.wait` for the first one. An empty batch means nothing arrived
    /// in time.
    async fn receive(&self, opts: ReceiveOptions) -> Result<Vec<QueueMessage>, StoreError>;

    /// Acknowledge a received message so it is never delivered again.
    async fn delete(&self, receipt_handle: &str) -> Result<(), StoreError>;

    /// Enqueue a message. Returns the new message ID.
    async fn send(&self, body: Bytes) -> Result<String, StoreError>;
}

/// A wide-column table keyed by [`TABLE_KEY_ATTRIBUTE`].
#[async_trait::async_trait]
pub trait WideColumnTable: Send + Sync {
    /// Table name, for logging.
    fn name(&self) -> &str;

    /// Insert or replace an item. The item must carry [`TABLE_KEY_ATTRIBUTE`].
    async fn put_item(&self, item: Item) -> Result<(), StoreError>;

    /// Fetch an item by key. Returns `None` if not found.
    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError>;

    /// Delete an item by key. Deleting a missing key is not an error.
    async fn delete_item(&self, key: &str) -> Result<(), StoreError>;
}
