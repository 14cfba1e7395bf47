//! `widget-consumer` drains widget requests into a widget store.
//!
//! Requests are taken one at a time from a bucket listing or a message
//! queue and applied to a document bucket or a wide-column table. The
//! process exits once the source has stayed empty across a full idle wait.
//!
//! # Usage
//!
//! ```text
//! widget-consumer --request-bucket reqs --widget-bucket widgets
//! widget-consumer --request-queue reqs --dynamodb-widget-table widgets -r eu-west-1
//! widget-consumer -c consumer.toml --max-runtime 60000
//! widget-consumer --memory --request-queue q --widget-bucket w   # dry run
//! ```

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use widget_engine::{
    BucketSource, Consumer, DocumentSink, QueueSource, RequestSource, TableSink, WidgetSink,
};
use widget_store::{
    DynamoTable, MemoryBucket, MemoryQueue, MemoryTable, MessageQueue, ObjectBucket, S3Bucket,
    SqsQueue, WideColumnTable,
};

use config::{CliConfig, Overrides, SinkTarget, SourceTarget};

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "widget-consumer",
    version,
    about = "Apply widget create/update/delete requests to a widget store"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Region for the backend clients.
    #[arg(short, long)]
    region: Option<String>,

    /// Read requests from the objects in this bucket.
    #[arg(long, conflicts_with = "request_queue")]
    request_bucket: Option<String>,

    /// Read requests from this queue (name or URL).
    #[arg(long)]
    request_queue: Option<String>,

    /// Store widgets as JSON documents in this bucket.
    #[arg(long, conflicts_with = "dynamodb_widget_table")]
    widget_bucket: Option<String>,

    /// Store widgets as items in this table.
    #[arg(long)]
    dynamodb_widget_table: Option<String>,

    /// Prefix for widget document keys.
    #[arg(long)]
    widget_key_prefix: Option<String>,

    /// Seconds to wait for requests per poll, and between the two empty
    /// polls that end the run.
    #[arg(long)]
    queue_wait_timeout: Option<u64>,

    /// Seconds received queue messages stay hidden.
    #[arg(long)]
    queue_visibility_timeout: Option<u64>,

    /// Stop after this many milliseconds (0 = no limit).
    #[arg(long)]
    max_runtime: Option<u64>,

    /// Use in-memory backends (dry run).
    #[arg(short, long)]
    memory: bool,

    /// Log level filter. `RUST_LOG` wins when set.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            region: self.region.clone(),
            request_bucket: self.request_bucket.clone(),
            request_queue: self.request_queue.clone(),
            widget_bucket: self.widget_bucket.clone(),
            dynamodb_widget_table: self.dynamodb_widget_table.clone(),
            widget_key_prefix: self.widget_key_prefix.clone(),
            queue_wait_timeout: self.queue_wait_timeout,
            queue_visibility_timeout: self.queue_visibility_timeout,
            max_runtime_ms: self.max_runtime,
            log_level: self.log_level.clone(),
        }
    }
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;
    config.apply(cli.overrides());

    let _log_guard = telemetry::init(&config.log).context("failed to set up logging")?;

    let source_target = config.source_target()?;
    let sink_target = config.sink_target()?;
    info!(
        region = %config.aws.region,
        source = ?source_target,
        sink = ?sink_target,
        wait_secs = config.source.queue_wait_timeout,
        visibility_secs = config.source.queue_visibility_timeout,
        max_runtime_ms = config.consumer.max_runtime_ms,
        memory = cli.memory,
        "starting widget-consumer"
    );

    let (source, sink) = if cli.memory {
        memory_backends(&config, source_target, sink_target)
    } else {
        aws_backends(&config, source_target, sink_target).await?
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping after the current request");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt"),
        }
    });

    let mut consumer =
        Consumer::new(source, sink, config.consumer_config()).with_shutdown(shutdown_rx);
    let reason = consumer.run().await.context("consumer stopped on a backend error")?;

    info!(?reason, "widget-consumer exiting");
    Ok(())
}

// -----------------------------------------------------------------------
// Backend construction
// -----------------------------------------------------------------------

/// Real backends, all sharing one region.
async fn aws_backends(
    config: &CliConfig,
    source: SourceTarget,
    sink: SinkTarget,
) -> Result<(RequestSource, WidgetSink)> {
    let region = config.aws.region.clone();
    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.clone()))
        .load()
        .await;

    let source: RequestSource = match source {
        SourceTarget::Bucket(name) => {
            let bucket: Arc<dyn ObjectBucket> = Arc::new(
                S3Bucket::connect(&name, &region)
                    .with_context(|| format!("failed to open request bucket {name}"))?,
            );
            BucketSource::new(bucket).into()
        }
        SourceTarget::Queue(name) => {
            let queue: Arc<dyn MessageQueue> = Arc::new(
                SqsQueue::connect(&sdk, &name)
                    .await
                    .with_context(|| format!("failed to resolve request queue {name}"))?,
            );
            QueueSource::new(queue, config.queue_wait(), config.visibility_timeout()).into()
        }
    };

    let sink: WidgetSink = match sink {
        SinkTarget::Bucket { name, prefix } => {
            let bucket: Arc<dyn ObjectBucket> = Arc::new(
                S3Bucket::connect(&name, &region)
                    .with_context(|| format!("failed to open widget bucket {name}"))?,
            );
            DocumentSink::new(bucket, prefix).into()
        }
        SinkTarget::Table(name) => {
            let table: Arc<dyn WideColumnTable> = Arc::new(DynamoTable::new(&sdk, name));
            TableSink::new(table).into()
        }
    };

    Ok((source, sink))
}

/// Empty in-memory backends with the configured names.
fn memory_backends(
    config: &CliConfig,
    source: SourceTarget,
    sink: SinkTarget,
) -> (RequestSource, WidgetSink) {
    let source: RequestSource = match source {
        SourceTarget::Bucket(name) => BucketSource::new(Arc::new(MemoryBucket::new(name))).into(),
        SourceTarget::Queue(name) => QueueSource::new(
            Arc::new(MemoryQueue::new(name)),
            config.queue_wait(),
            config.visibility_timeout(),
        )
        .into(),
    };

    let sink: WidgetSink = match sink {
        SinkTarget::Bucket { name, prefix } => {
            DocumentSink::new(Arc::new(MemoryBucket::new(name)), prefix).into()
        }
        SinkTarget::Table(name) => TableSink::new(Arc::new(MemoryTable::new(name))).into(),
    };

    (source, sink)
}
