//! TOML configuration for the widget consumer.
//!
//! Every key can also be given on the command line; see [`Overrides`].
//! Exactly one request source and exactly one widget sink must be named.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use serde::Deserialize;
use widget_engine::ConsumerConfig;
use widget_types::DEFAULT_KEY_PREFIX;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Backend client settings.
    pub aws: AwsSection,
    /// Where requests are read from.
    pub source: SourceSection,
    /// Where widgets are written to.
    pub sink: SinkSection,
    /// Loop limits.
    pub consumer: ConsumerSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[aws]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AwsSection {
    /// Region the backend clients talk to.
    pub region: String,
}

impl Default for AwsSection {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
        }
    }
}

/// `[source]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Bucket whose objects are requests.
    pub request_bucket: Option<String>,
    /// Queue name or URL whose messages are requests.
    pub request_queue: Option<String>,
    /// Seconds a single receive may block. Also the idle wait.
    pub queue_wait_timeout: u64,
    /// Seconds a received message stays hidden from other consumers.
    pub queue_visibility_timeout: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            request_bucket: None,
            request_queue: None,
            queue_wait_timeout: 10,
            queue_visibility_timeout: 2,
        }
    }
}

/// `[sink]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SinkSection {
    /// Bucket widgets are stored in as JSON documents.
    pub widget_bucket: Option<String>,
    /// Table widgets are stored in as items.
    pub dynamodb_widget_table: Option<String>,
    /// Prefix of every document key.
    pub widget_key_prefix: String,
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            widget_bucket: None,
            dynamodb_widget_table: None,
            widget_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// `[consumer]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConsumerSection {
    /// Stop after this many milliseconds. 0 means no limit.
    pub max_runtime_ms: u64,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Values given on the command line. Set fields replace file values.
#[derive(Debug, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub request_bucket: Option<String>,
    pub request_queue: Option<String>,
    pub widget_bucket: Option<String>,
    pub dynamodb_widget_table: Option<String>,
    pub widget_key_prefix: Option<String>,
    pub queue_wait_timeout: Option<u64>,
    pub queue_visibility_timeout: Option<u64>,
    pub max_runtime_ms: Option<u64>,
    pub log_level: Option<String>,
}

/// The selected request source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget {
    /// Poll this bucket's listing.
    Bucket(String),
    /// Receive from this queue (name or URL).
    Queue(String),
}

/// The selected widget sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// Write documents to this bucket under `prefix`.
    Bucket { name: String, prefix: String },
    /// Write items to this table.
    Table(String),
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply command-line values on top of the file.
    pub fn apply(&mut self, o: Overrides) {
        if let Some(region) = o.region {
            self.aws.region = region;
        }
        if let Some(bucket) = o.request_bucket {
            self.source.request_bucket = Some(bucket);
        }
        if let Some(queue) = o.request_queue {
            self.source.request_queue = Some(queue);
        }
        if let Some(bucket) = o.widget_bucket {
            self.sink.widget_bucket = Some(bucket);
        }
        if let Some(table) = o.dynamodb_widget_table {
            self.sink.dynamodb_widget_table = Some(table);
        }
        if let Some(prefix) = o.widget_key_prefix {
            self.sink.widget_key_prefix = prefix;
        }
        if let Some(secs) = o.queue_wait_timeout {
            self.source.queue_wait_timeout = secs;
        }
        if let Some(secs) = o.queue_visibility_timeout {
            self.source.queue_visibility_timeout = secs;
        }
        if let Some(ms) = o.max_runtime_ms {
            self.consumer.max_runtime_ms = ms;
        }
        if let Some(level) = o.log_level {
            self.log.level = level;
        }
    }

    /// The one configured request source.
    pub fn source_target(&self) -> anyhow::Result<SourceTarget> {
        match (&self.source.request_bucket, &self.source.request_queue) {
            (Some(bucket), None) => Ok(SourceTarget::Bucket(bucket.clone())),
            (None, Some(queue)) => Ok(SourceTarget::Queue(queue.clone())),
            (Some(_), Some(_)) => {
                bail!("request-bucket and request-queue are mutually exclusive, set only one")
            }
            (None, None) => bail!("no request source configured, set request-bucket or request-queue"),
        }
    }

    /// The one configured widget sink.
    pub fn sink_target(&self) -> anyhow::Result<SinkTarget> {
        match (&self.sink.widget_bucket, &self.sink.dynamodb_widget_table) {
            (Some(bucket), None) => Ok(SinkTarget::Bucket {
                name: bucket.clone(),
                prefix: self.sink.widget_key_prefix.clone(),
            }),
            (None, Some(table)) => Ok(SinkTarget::Table(table.clone())),
            (Some(_), Some(_)) => bail!(
                "widget-bucket and dynamodb-widget-table are mutually exclusive, set only one"
            ),
            (None, None) => {
                bail!("no widget sink configured, set widget-bucket or dynamodb-widget-table")
            }
        }
    }

    /// How long one receive may block.
    pub fn queue_wait(&self) -> Duration {
        Duration::from_secs(self.source.queue_wait_timeout)
    }

    /// How long received messages stay hidden.
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.source.queue_visibility_timeout)
    }

    /// Loop settings. The idle wait equals the receive wait.
    pub fn consumer_config(&self) -> ConsumerConfig {
        let max_runtime = match self.consumer.max_runtime_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ConsumerConfig {
            idle_wait: self.queue_wait(),
            max_runtime,
        }
    }
}
