//! The consumption loop.
//!
//! One request at a time: retrieve, parse, apply, repeat. The loop moves
//! between two states:
//!
//! - **Draining**: the last poll returned a request.
//! - **Idle**: the last poll came back empty and the loop slept the idle
//!   wait.
//!
//! An empty poll while Draining moves to Idle and sleeps. An empty poll
//! while Idle ends the loop: emptiness has persisted across one full wait.
//! The loop also stops on a shutdown signal or when the optional maximum
//! runtime has elapsed.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};
use widget_types::{RequestKind, WidgetRequest};

use crate::error::EngineError;
use crate::sink::WidgetSink;
use crate::source::{PendingRequest, RequestSource};

/// Loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Sleep between an empty poll and the confirming repoll.
    pub idle_wait: Duration,
    /// Stop once this much time has passed. `None` runs until drained.
    pub max_runtime: Option<Duration>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_secs(10),
            max_runtime: None,
        }
    }
}

/// Where the loop is in its Draining/Idle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The most recent poll produced a request.
    Draining,
    /// The most recent poll was empty.
    Idle,
}

/// Why [`Consumer::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Two consecutive empty polls, one idle wait apart.
    Drained,
    /// The shutdown signal fired.
    Shutdown,
    /// The maximum runtime elapsed.
    MaxRuntime,
}

/// What happened to a single retrieved request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Parsed and written to the sink.
    Applied(RequestKind),
    /// Unparseable or of unknown type; logged and discarded.
    Dropped,
}

/// Running counters, updated as the loop progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Calls to the source.
    pub polls: u64,
    /// Requests the source handed out.
    pub received: u64,
    /// Create requests applied.
    pub created: u64,
    /// Update requests applied.
    pub updated: u64,
    /// Delete requests applied.
    pub deleted: u64,
    /// Requests discarded without reaching the sink.
    pub dropped: u64,
}

/// Drives requests from a [`RequestSource`] into a [`WidgetSink`].
pub struct Consumer {
    source: RequestSource,
    sink: WidgetSink,
    config: ConsumerConfig,
    shutdown: Option<watch::Receiver<bool>>,
    state: LoopState,
    stats: ConsumerStats,
}

impl Consumer {
    /// Create a consumer in the Draining state.
    pub fn new(source: RequestSource, sink: WidgetSink, config: ConsumerConfig) -> Self {
        Self {
            source,
            sink,
            config,
            shutdown: None,
            state: LoopState::Draining,
            stats: ConsumerStats::default(),
        }
    }

    /// Stop the loop when the channel flips to `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    /// The sink requests are applied to.
    pub fn sink(&self) -> &WidgetSink {
        &self.sink
    }

    /// Run until drained, shut down, or out of time.
    ///
    /// Backend failures end the loop with an error. The request being
    /// processed at that point has already been removed from the source.
    pub async fn run(&mut self) -> Result<StopReason, EngineError> {
        let deadline = self.config.max_runtime.map(|max| Instant::now() + max);
        info!(
            source = %self.source.describe(),
            sink = %self.sink.describe(),
            idle_wait_secs = self.config.idle_wait.as_secs(),
            "consumer started"
        );

        let reason = loop {
            if self.shutdown_requested() {
                break StopReason::Shutdown;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::MaxRuntime;
            }

            if self.poll_once().await? {
                continue;
            }

            match self.state {
                LoopState::Draining => {
                    self.state = LoopState::Idle;
                    info!(
                        wait_secs = self.config.idle_wait.as_secs(),
                        "no pending requests, waiting"
                    );
                    self.idle_wait(deadline).await;
                }
                LoopState::Idle => {
                    info!("still no pending requests after idle wait");
                    break StopReason::Drained;
                }
            }
        };

        let stats = &self.stats;
        info!(
            ?reason,
            received = stats.received,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            dropped = stats.dropped,
            "consumer stopped"
        );
        Ok(reason)
    }

    /// Poll the source once and process whatever it returns.
    ///
    /// Returns `true` if a request was retrieved. A retrieved request puts
    /// the loop back into the Draining state.
    pub async fn poll_once(&mut self) -> Result<bool, EngineError> {
        self.stats.polls += 1;

        let Some(request) = self.source.try_receive().await? else {
            return Ok(false);
        };

        self.state = LoopState::Draining;
        self.stats.received += 1;
        self.process(request).await?;
        Ok(true)
    }

    /// Parse a retrieved request and apply it to the sink.
    ///
    /// Unparseable bodies and unknown request types are logged and dropped.
    /// Sink failures are returned.
    pub async fn process(&mut self, request: PendingRequest) -> Result<Outcome, EngineError> {
        let req = match WidgetRequest::parse(&request.body) {
            Ok(req) => req,
            Err(e) => {
                warn!(ack = %request.ack, error = %e, "dropping request");
                self.stats.dropped += 1;
                return Ok(Outcome::Dropped);
            }
        };

        info!(
            request_id = %req.request_id,
            widget_id = %req.widget_id,
            kind = %req.kind,
            "processing request"
        );

        if let Err(e) = self.sink.apply(&req).await {
            error!(
                request_id = %req.request_id,
                ack = %request.ack,
                error = %e,
                "failed to apply request, it is no longer in the source"
            );
            return Err(e);
        }

        match req.kind {
            RequestKind::Create => self.stats.created += 1,
            RequestKind::Update => self.stats.updated += 1,
            RequestKind::Delete => self.stats.deleted += 1,
        }
        Ok(Outcome::Applied(req.kind))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep the idle wait, cut short by shutdown or the runtime deadline.
    async fn idle_wait(&mut self, deadline: Option<Instant>) {
        let mut wake = Instant::now() + self.config.idle_wait;
        if let Some(d) = deadline {
            wake = wake.min(d);
        }

        let Some(rx) = self.shutdown.as_mut() else {
            tokio::time::sleep_until(wake).await;
            return;
        };

        let sender_gone = tokio::select! {
            _ = tokio::time::sleep_until(wake) => false,
            stopped = rx.wait_for(|stop| *stop) => stopped.is_err(),
        };

        // Nobody can ask us to stop any more; finish the wait.
        if sender_gone {
            tokio::time::sleep_until(wake).await;
        }
    }
}
