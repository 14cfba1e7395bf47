//! Request retrieval over a listing-backed bucket or a message queue.
//!
//! Both variants share one contract: [`RequestSource::try_receive`] returns
//! at most one request, never blocks longer than the configured wait, and
//! only returns a request after it has been deleted from its backend. The
//! caller must not retry retrieval when processing fails; the request is
//! gone and only the producer can resend it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};
use widget_store::{MessageQueue, ObjectBucket, QueueMessage, ReceiveOptions};

use crate::error::EngineError;

/// Upper bound on a single queue receive.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Backend-specific token identifying where a request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckToken {
    /// Key of the object the request was read from.
    ObjectKey(String),
    /// Receipt handle the request was deleted with.
    ReceiptHandle(String),
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectKey(key) => write!(f, "object:{key}"),
            Self::ReceiptHandle(handle) => write!(f, "receipt:{handle}"),
        }
    }
}

/// A request body that has been retrieved and acknowledged at its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Raw request body.
    pub body: Bytes,
    /// Where it came from.
    pub ack: AckToken,
}

// -----------------------------------------------------------------------
// Listing-backed source
// -----------------------------------------------------------------------

/// Reads requests one object at a time from a bucket.
///
/// Order is whatever the bucket's listing returns; no sort key is requested.
pub struct BucketSource {
    bucket: Arc<dyn ObjectBucket>,
}

impl BucketSource {
    /// Read requests from the given bucket.
    pub fn new(bucket: Arc<dyn ObjectBucket>) -> Self {
        Self { bucket }
    }

    /// Whether the bucket currently lists no objects.
    pub async fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.bucket.list(1).await?.is_empty())
    }

    /// Take the first listed object: read it, delete it, return its body.
    ///
    /// Returns `None` when the bucket is empty, or when the listed object
    /// disappeared before it could be read.
    pub async fn next(&self) -> Result<Option<PendingRequest>, EngineError> {
        let Some(key) = self.bucket.list(1).await?.into_iter().next() else {
            return Ok(None);
        };

        let Some(body) = self.bucket.get(&key).await? else {
            debug!(bucket = %self.bucket.name(), %key, "listed request vanished before read");
            return Ok(None);
        };

        self.bucket.delete(&key).await?;
        info!(bucket = %self.bucket.name(), %key, size = body.len(), "took request from bucket");

        Ok(Some(PendingRequest {
            body,
            ack: AckToken::ObjectKey(key),
        }))
    }
}

// -----------------------------------------------------------------------
// Queue-backed source
// -----------------------------------------------------------------------

/// Reads requests from a message queue, buffering each received batch
/// locally and deleting messages one at a time as they are handed out.
pub struct QueueSource {
    queue: Arc<dyn MessageQueue>,
    buffer: VecDeque<QueueMessage>,
    receive: ReceiveOptions,
}

impl QueueSource {
    /// Read requests from `queue`, long-polling up to `wait` per receive.
    pub fn new(queue: Arc<dyn MessageQueue>, wait: Duration, visibility_timeout: Duration) -> Self {
        Self {
            queue,
            buffer: VecDeque::new(),
            receive: ReceiveOptions {
                max_messages: MAX_RECEIVE_BATCH,
                wait,
                visibility_timeout,
            },
        }
    }

    /// Messages received but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Hand out the next message, receiving a new batch if the local buffer
    /// is empty. Returns `None` if the receive came back empty.
    pub async fn next(&mut self) -> Result<Option<PendingRequest>, EngineError> {
        if self.buffer.is_empty() {
            let batch = self.queue.receive(self.receive).await?;
            if batch.is_empty() {
                return Ok(None);
            }
            debug!(queue = %self.queue.name(), count = batch.len(), "buffered received batch");
            self.buffer.extend(batch);
        }

        let Some(message) = self.buffer.pop_front() else {
            return Ok(None);
        };

        self.queue.delete(&message.receipt_handle).await?;
        info!(
            queue = %self.queue.name(),
            message_id = %message.message_id,
            buffered = self.buffer.len(),
            "took request from queue"
        );

        Ok(Some(PendingRequest {
            body: message.body,
            ack: AckToken::ReceiptHandle(message.receipt_handle),
        }))
    }
}

// -----------------------------------------------------------------------
// Source selection
// -----------------------------------------------------------------------

/// The configured request source. Chosen once at startup.
pub enum RequestSource {
    /// Poll a bucket listing.
    Bucket(BucketSource),
    /// Receive from a message queue.
    Queue(QueueSource),
}

impl RequestSource {
    /// Retrieve and acknowledge at most one request.
    pub async fn try_receive(&mut self) -> Result<Option<PendingRequest>, EngineError> {
        match self {
            Self::Bucket(source) => source.next().await,
            Self::Queue(source) => source.next().await,
        }
    }

    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Bucket(source) => format!("bucket {}", source.bucket.name()),
            Self::Queue(source) => format!("queue {}", source.queue.name()),
        }
    }
}

impl From<BucketSource> for RequestSource {
    fn from(source: BucketSource) -> Self {
        Self::Bucket(source)
    }
}

impl From<QueueSource> for RequestSource {
    fn from(source: QueueSource) -> Self {
        Self::Queue(source)
    }
}
