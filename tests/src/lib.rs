//! Shared test harness for widget consumer integration tests.
//!
//! Provides [`Harness`]: one request source and one widget sink, both
//! in-memory, wired into a [`Consumer`] the same way the binary wires the
//! real backends. The document sink sits behind [`OutageBucket`] so tests
//! can take it down mid-run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use widget_engine::{
    BucketSource, Consumer, ConsumerConfig, ConsumerStats, DocumentSink, EngineError,
    QueueSource, RequestSource, StopReason, TableSink, WidgetSink,
};
use widget_store::{
    MemoryBucket, MemoryQueue, MemoryTable, MessageQueue, ObjectBucket, StoreError,
    WideColumnTable,
};
use widget_types::{DEFAULT_KEY_PREFIX, Widget};

/// Receive wait and idle wait used by every harness consumer.
pub const WAIT: Duration = Duration::from_secs(10);

/// Visibility timeout for queue receives.
const VISIBILITY: Duration = Duration::from_secs(30);

// =========================================================================
// Failure injection
// =========================================================================

/// A bucket that fails every call while marked down.
pub struct OutageBucket {
    inner: Arc<MemoryBucket>,
    down: AtomicBool,
}

impl OutageBucket {
    pub fn new(inner: Arc<MemoryBucket>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::backend("s3", "service unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectBucket for OutageBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list(&self, max_keys: usize) -> Result<Vec<String>, StoreError> {
        self.check()?;
        self.inner.list(max_keys).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(key).await
    }
}

// =========================================================================
// Harness
// =========================================================================

/// Which request source the harness consumer reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Bucket,
    Queue,
}

/// Which widget sink the harness consumer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Document,
    Table,
}

/// Every source/sink pairing.
pub const ALL_PAIRINGS: [(SourceKind, SinkKind); 4] = [
    (SourceKind::Bucket, SinkKind::Document),
    (SourceKind::Bucket, SinkKind::Table),
    (SourceKind::Queue, SinkKind::Document),
    (SourceKind::Queue, SinkKind::Table),
];

/// In-memory backends plus the wiring to build consumers over them.
pub struct Harness {
    source_kind: SourceKind,
    sink_kind: SinkKind,
    request_bucket: Arc<MemoryBucket>,
    request_queue: Arc<MemoryQueue>,
    widget_bucket: Arc<MemoryBucket>,
    widget_outage: Arc<OutageBucket>,
    widget_table: Arc<MemoryTable>,
    submitted: AtomicUsize,
}

impl Harness {
    pub fn new(source_kind: SourceKind, sink_kind: SinkKind) -> Self {
        let widget_bucket = Arc::new(MemoryBucket::new("widgets"));
        Self {
            source_kind,
            sink_kind,
            request_bucket: Arc::new(MemoryBucket::new("requests")),
            request_queue: Arc::new(MemoryQueue::new("requests")),
            widget_outage: Arc::new(OutageBucket::new(widget_bucket.clone())),
            widget_bucket,
            widget_table: Arc::new(MemoryTable::new("widgets")),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Add a request to the source. Bucket keys sort in submission order.
    pub async fn submit(&self, body: Bytes) {
        match self.source_kind {
            SourceKind::Bucket => {
                let n = self.submitted.fetch_add(1, Ordering::SeqCst);
                self.request_bucket
                    .put(&format!("incoming/{n:06}.json"), body)
                    .await
                    .unwrap();
            }
            SourceKind::Queue => {
                self.request_queue.send(body).await.unwrap();
            }
        }
    }

    /// Requests still waiting in the source, visible or not.
    pub fn pending(&self) -> usize {
        match self.source_kind {
            SourceKind::Bucket => self.request_bucket.len(),
            SourceKind::Queue => {
                self.request_queue.ready_len() + self.request_queue.in_flight_len()
            }
        }
    }

    /// Build a fresh consumer over the harness backends.
    pub fn consumer(&self, max_runtime: Option<Duration>) -> Consumer {
        Consumer::new(
            self.source(),
            self.sink(),
            ConsumerConfig {
                idle_wait: WAIT,
                max_runtime,
            },
        )
    }

    /// Run a consumer to completion.
    pub async fn run(&self) -> Result<(StopReason, ConsumerStats), EngineError> {
        let mut consumer = self.consumer(None);
        let reason = consumer.run().await?;
        Ok((reason, consumer.stats().clone()))
    }

    /// Read a widget back through the sink.
    pub async fn stored(&self, owner: &str, widget_id: &str) -> Option<Widget> {
        self.sink().read(owner, widget_id).await.unwrap()
    }

    /// Number of stored widgets.
    pub fn widget_count(&self) -> usize {
        match self.sink_kind {
            SinkKind::Document => self.widget_bucket.len(),
            SinkKind::Table => self.widget_table.len(),
        }
    }

    /// Keys in the widget bucket. Empty for the table sink.
    pub fn document_keys(&self) -> Vec<String> {
        self.widget_bucket.keys()
    }

    /// Take the document sink down or bring it back.
    pub fn set_sink_down(&self, down: bool) {
        self.widget_outage.set_down(down);
    }

    fn source(&self) -> RequestSource {
        match self.source_kind {
            SourceKind::Bucket => {
                let bucket: Arc<dyn ObjectBucket> = self.request_bucket.clone();
                BucketSource::new(bucket).into()
            }
            SourceKind::Queue => {
                let queue: Arc<dyn MessageQueue> = self.request_queue.clone();
                QueueSource::new(queue, WAIT, VISIBILITY).into()
            }
        }
    }

    fn sink(&self) -> WidgetSink {
        match self.sink_kind {
            SinkKind::Document => {
                let bucket: Arc<dyn ObjectBucket> = self.widget_outage.clone();
                DocumentSink::new(bucket, DEFAULT_KEY_PREFIX).into()
            }
            SinkKind::Table => {
                let table: Arc<dyn WideColumnTable> = self.widget_table.clone();
                TableSink::new(table).into()
            }
        }
    }
}

/// A request body as a producer would send it.
pub fn request(kind: &str, widget_id: &str, owner: &str, label: Option<&str>) -> Bytes {
    let mut value = serde_json::json!({
        "type": kind,
        "requestId": format!("{kind}-{widget_id}"),
        "widgetId": widget_id,
        "owner": owner,
    });
    if let Some(label) = label {
        value["label"] = serde_json::Value::from(label);
    }
    Bytes::from(serde_json::to_vec(&value).unwrap())
}
