//! Widget persistence over a document bucket or a wide-column table.
//!
//! Create and update are the same upsert; delete removes whatever lives at
//! the key derived from the delete request itself. No prior state is looked
//! up, so a request carrying a different owner than the one used at creation
//! addresses a different document.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use widget_store::{Item, ObjectBucket, TABLE_KEY_ATTRIBUTE, WideColumnTable};
use widget_types::{Attribute, RequestKind, Widget, WidgetRequest, document_key};

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Document sink
// -----------------------------------------------------------------------

/// Stores each widget as a JSON document at
/// `{prefix}{normalized-owner}-{widget_id}.json`.
pub struct DocumentSink {
    bucket: Arc<dyn ObjectBucket>,
    key_prefix: String,
}

impl DocumentSink {
    /// Store widgets in `bucket` under `key_prefix`.
    pub fn new(bucket: Arc<dyn ObjectBucket>, key_prefix: impl Into<String>) -> Self {
        Self {
            bucket,
            key_prefix: key_prefix.into(),
        }
    }

    /// Document key for a widget.
    pub fn key_for(&self, owner: &str, widget_id: &str) -> String {
        document_key(&self.key_prefix, owner, widget_id)
    }

    async fn upsert(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        let key = req.document_key(&self.key_prefix);
        let body = serde_json::to_vec(&Widget::from(req))?;
        self.bucket.put(&key, Bytes::from(body)).await?;
        info!(bucket = %self.bucket.name(), %key, request_id = %req.request_id, "stored widget document");
        Ok(())
    }

    async fn remove(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        let key = req.document_key(&self.key_prefix);
        self.bucket.delete(&key).await?;
        info!(bucket = %self.bucket.name(), %key, request_id = %req.request_id, "deleted widget document");
        Ok(())
    }

    async fn read(&self, owner: &str, widget_id: &str) -> Result<Option<Widget>, EngineError> {
        let key = self.key_for(owner, widget_id);
        let Some(body) = self.bucket.get(&key).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| EngineError::CorruptRecord {
                key,
                reason: e.to_string(),
            })
    }
}

// -----------------------------------------------------------------------
// Table sink
// -----------------------------------------------------------------------

/// Stores each widget as a table item keyed by its widget ID. The attribute
/// list is embedded as a JSON string.
pub struct TableSink {
    table: Arc<dyn WideColumnTable>,
}

/// Item attribute holding the JSON-encoded attribute list.
pub const OTHER_ATTRIBUTES: &str = "other_attributes";

impl TableSink {
    /// Store widgets in `table`.
    pub fn new(table: Arc<dyn WideColumnTable>) -> Self {
        Self { table }
    }

    /// Flatten a widget into a table item.
    pub fn to_item(widget: &Widget) -> Result<Item, EngineError> {
        Ok(Item::from([
            (TABLE_KEY_ATTRIBUTE.to_string(), widget.widget_id.clone()),
            ("owner".to_string(), widget.owner.clone()),
            ("label".to_string(), widget.label.clone()),
            ("description".to_string(), widget.description.clone()),
            (
                OTHER_ATTRIBUTES.to_string(),
                serde_json::to_string(&widget.other_attributes)?,
            ),
        ]))
    }

    /// Rebuild a widget from a table item. Missing text attributes default
    /// to empty.
    pub fn from_item(item: &Item) -> Result<Widget, EngineError> {
        let key = item.get(TABLE_KEY_ATTRIBUTE).cloned().unwrap_or_default();
        let text = |name: &str| item.get(name).cloned().unwrap_or_default();

        let other_attributes: Vec<Attribute> = match item.get(OTHER_ATTRIBUTES) {
            Some(blob) => serde_json::from_str(blob).map_err(|e| EngineError::CorruptRecord {
                key: key.clone(),
                reason: format!("{OTHER_ATTRIBUTES}: {e}"),
            })?,
            None => Vec::new(),
        };

        Ok(Widget {
            widget_id: key,
            owner: text("owner"),
            label: text("label"),
            description: text("description"),
            other_attributes,
        })
    }

    async fn upsert(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        let item = Self::to_item(&Widget::from(req))?;
        self.table.put_item(item).await?;
        info!(table = %self.table.name(), widget_id = %req.widget_id, request_id = %req.request_id, "stored widget item");
        Ok(())
    }

    async fn remove(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        self.table.delete_item(&req.widget_id).await?;
        info!(table = %self.table.name(), widget_id = %req.widget_id, request_id = %req.request_id, "deleted widget item");
        Ok(())
    }

    async fn read(&self, widget_id: &str) -> Result<Option<Widget>, EngineError> {
        match self.table.get_item(widget_id).await? {
            Some(item) => Ok(Some(Self::from_item(&item)?)),
            None => Ok(None),
        }
    }
}

// -----------------------------------------------------------------------
// Sink selection
// -----------------------------------------------------------------------

/// The configured widget sink. Chosen once at startup.
pub enum WidgetSink {
    /// JSON documents in a bucket.
    Document(DocumentSink),
    /// Items in a wide-column table.
    Table(TableSink),
}

impl WidgetSink {
    /// Upsert the widget described by `req`.
    pub async fn create(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        match self {
            Self::Document(sink) => sink.upsert(req).await,
            Self::Table(sink) => sink.upsert(req).await,
        }
    }

    /// Same effect as [`create`](Self::create); no existence check.
    pub async fn update(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        self.create(req).await
    }

    /// Remove the widget at the key derived from `req`. A no-op if absent.
    pub async fn delete(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        match self {
            Self::Document(sink) => sink.remove(req).await,
            Self::Table(sink) => sink.remove(req).await,
        }
    }

    /// Dispatch on the request kind.
    pub async fn apply(&self, req: &WidgetRequest) -> Result<(), EngineError> {
        match req.kind {
            RequestKind::Create => self.create(req).await,
            RequestKind::Update => self.update(req).await,
            RequestKind::Delete => self.delete(req).await,
        }
    }

    /// Fetch the stored widget. The table sink ignores `owner`.
    pub async fn read(&self, owner: &str, widget_id: &str) -> Result<Option<Widget>, EngineError> {
        match self {
            Self::Document(sink) => sink.read(owner, widget_id).await,
            Self::Table(sink) => sink.read(widget_id).await,
        }
    }

    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Document(sink) => format!(
                "bucket {} (prefix {:?})",
                sink.bucket.name(),
                sink.key_prefix
            ),
            Self::Table(sink) => format!("table {}", sink.table.name()),
        }
    }
}

impl From<DocumentSink> for WidgetSink {
    fn from(sink: DocumentSink) -> Self {
        Self::Document(sink)
    }
}

impl From<TableSink> for WidgetSink {
    fn from(sink: TableSink) -> Self {
        Self::Table(sink)
    }
}
