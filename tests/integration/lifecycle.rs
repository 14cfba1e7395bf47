//! Integration test: when the consumer loop starts, idles and stops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use widget_engine::StopReason;
use widget_integration_tests::{Harness, SinkKind, SourceKind, WAIT, request};

/// Nothing to do: one receive wait, one idle wait, one more receive wait.
#[tokio::test(start_paused = true)]
async fn test_empty_queue_exits_after_confirming_poll() {
    let h = Harness::new(SourceKind::Queue, SinkKind::Document);

    let start = Instant::now();
    let (reason, stats) = h.run().await.unwrap();
    assert_eq!(reason, StopReason::Drained);
    assert_eq!(stats.polls, 2);
    assert_eq!(start.elapsed(), WAIT * 3);
}

/// A message sent while a receive is blocked is picked up at once.
#[tokio::test(start_paused = true)]
async fn test_long_poll_picks_up_new_request() {
    let h = Arc::new(Harness::new(SourceKind::Queue, SinkKind::Table));

    let producer = h.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        producer
            .submit(request("create", "w1", "ann", Some("late")))
            .await;
    });

    let start = Instant::now();
    let (reason, stats) = h.run().await.unwrap();
    assert_eq!(reason, StopReason::Drained);
    assert_eq!(stats.created, 1);
    // Picked up at 5s, then receive, idle wait, receive.
    assert_eq!(start.elapsed(), Duration::from_secs(5) + WAIT * 3);
    assert_eq!(h.stored("ann", "w1").await.unwrap().label, "late");
}

/// A request arriving during the idle wait keeps the consumer running.
#[tokio::test(start_paused = true)]
async fn test_request_during_idle_wait_is_consumed() {
    let h = Arc::new(Harness::new(SourceKind::Bucket, SinkKind::Document));

    let producer = h.clone();
    tokio::spawn(async move {
        tokio::time::sleep(WAIT / 2).await;
        producer.submit(request("create", "w1", "ann", None)).await;
    });

    let (reason, stats) = h.run().await.unwrap();
    assert_eq!(reason, StopReason::Drained);
    assert_eq!(stats.polls, 4);
    assert_eq!(stats.created, 1);
    assert_eq!(h.document_keys(), vec!["widgets/ann-w1.json"]);
}

/// Shutdown during the idle wait stops the loop without waiting it out.
#[tokio::test(start_paused = true)]
async fn test_shutdown_signal() {
    let h = Harness::new(SourceKind::Bucket, SinkKind::Table);
    h.submit(request("create", "w1", "ann", None)).await;

    let (tx, rx) = watch::channel(false);
    let mut consumer = h.consumer(None).with_shutdown(rx);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
    });

    let start = Instant::now();
    assert_eq!(consumer.run().await.unwrap(), StopReason::Shutdown);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(consumer.stats().created, 1);
}

/// The runtime limit ends a run that would otherwise keep going.
#[tokio::test(start_paused = true)]
async fn test_max_runtime() {
    let h = Harness::new(SourceKind::Queue, SinkKind::Document);
    let mut consumer = h.consumer(Some(Duration::from_secs(15)));

    let start = Instant::now();
    assert_eq!(consumer.run().await.unwrap(), StopReason::MaxRuntime);
    // First receive waits 10s, the idle wait is cut at 15s.
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert_eq!(consumer.stats().polls, 1);
}
