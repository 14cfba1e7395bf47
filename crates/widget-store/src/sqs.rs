//! SQS queue adapter.

use aws_config::SdkConfig;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::{MessageQueue, QueueMessage, ReceiveOptions};

/// SQS caps a single receive at 10 messages.
const MAX_BATCH: usize = 10;

/// SQS caps long polling at 20 seconds.
const MAX_WAIT_SECS: u64 = 20;

/// A [`MessageQueue`] backed by Amazon SQS.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    /// Resolve the queue and build a client.
    ///
    /// `queue` may be a full queue URL or a bare queue name, which is
    /// resolved with `GetQueueUrl`.
    pub async fn connect(config: &SdkConfig, queue: &str) -> Result<Self, StoreError> {
        let client = Client::new(config);

        let queue_url = if queue.starts_with("https://") || queue.starts_with("http://") {
            queue.to_string()
        } else {
            let out = client
                .get_queue_url()
                .queue_name(queue)
                .send()
                .await
                .map_err(|e| StoreError::backend("sqs", DisplayErrorContext(e)))?;
            out.queue_url()
                .map(str::to_string)
                .ok_or_else(|| StoreError::backend("sqs", format!("no url for queue {queue}")))?
        };

        debug!(%queue_url, "resolved request queue");
        Ok(Self { client, queue_url })
    }
}

#[async_trait::async_trait]
impl MessageQueue for SqsQueue {
    fn name(&self) -> &str {
        &self.queue_url
    }

    async fn receive(&self, opts: ReceiveOptions) -> Result<Vec<QueueMessage>, StoreError> {
        let max = opts.max_messages.clamp(1, MAX_BATCH) as i32;
        let wait = opts.wait.as_secs().min(MAX_WAIT_SECS) as i32;
        let visibility = opts.visibility_timeout.as_secs().min(i32::MAX as u64) as i32;

        let out = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait)
            .visibility_timeout(visibility)
            .send()
            .await
            .map_err(|e| StoreError::backend("sqs", DisplayErrorContext(e)))?;

        let mut batch = Vec::new();
        for message in out.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                warn!(message_id = ?message.message_id(), "message without receipt handle, skipping");
                continue;
            };
            batch.push(QueueMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
                body: Bytes::from(message.body().unwrap_or_default().to_string()),
            });
        }

        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), StoreError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| StoreError::backend("sqs", DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn send(&self, body: Bytes) -> Result<String, StoreError> {
        let out = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(String::from_utf8_lossy(&body))
            .send()
            .await
            .map_err(|e| StoreError::backend("sqs", DisplayErrorContext(e)))?;
        Ok(out.message_id().unwrap_or_default().to_string())
    }
}
