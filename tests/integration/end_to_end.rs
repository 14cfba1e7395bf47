//! Integration test: requests flow from every source into every sink.

use bytes::Bytes;
use widget_engine::{EngineError, StopReason};
use widget_integration_tests::{ALL_PAIRINGS, Harness, SinkKind, SourceKind, request};

/// A create for "John Jones" lands under the normalized owner key.
#[tokio::test(start_paused = true)]
async fn test_create_is_stored() {
    for (source, sink) in ALL_PAIRINGS {
        let h = Harness::new(source, sink);
        h.submit(request("create", "w1", "John Jones", Some("L")))
            .await;

        let (reason, stats) = h.run().await.unwrap();
        assert_eq!(reason, StopReason::Drained, "{source:?} -> {sink:?}");
        assert_eq!(stats.created, 1);
        assert_eq!(h.pending(), 0, "request should be consumed");

        let widget = h.stored("John Jones", "w1").await.unwrap();
        assert_eq!(widget.label, "L");
        assert_eq!(widget.owner, "John Jones");
        if sink == SinkKind::Document {
            assert_eq!(h.document_keys(), vec!["widgets/john-jones-w1.json"]);
        }
    }
}

/// Create then delete with the same owner leaves nothing behind.
#[tokio::test(start_paused = true)]
async fn test_create_then_delete() {
    for (source, sink) in ALL_PAIRINGS {
        let h = Harness::new(source, sink);
        h.submit(request("create", "w1", "John Jones", Some("L")))
            .await;
        h.submit(request("delete", "w1", "John Jones", None)).await;

        let (_, stats) = h.run().await.unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.deleted, 1);
        assert!(
            h.stored("John Jones", "w1").await.is_none(),
            "{source:?} -> {sink:?}"
        );
        assert_eq!(h.widget_count(), 0);
    }
}

/// Create then update under the same owner rewrites one record.
#[tokio::test(start_paused = true)]
async fn test_create_then_update() {
    for (source, sink) in ALL_PAIRINGS {
        let h = Harness::new(source, sink);
        h.submit(request("create", "w1", "A B", Some("first"))).await;
        h.submit(request("update", "w1", "A B", Some("X"))).await;

        let (_, stats) = h.run().await.unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(h.widget_count(), 1, "{source:?} -> {sink:?}");
        assert_eq!(h.stored("A B", "w1").await.unwrap().label, "X");
        if sink == SinkKind::Document {
            assert_eq!(h.document_keys(), vec!["widgets/a-b-w1.json"]);
        }
    }
}

/// Bad requests in the stream are skipped; the rest still apply.
#[tokio::test(start_paused = true)]
async fn test_bad_requests_do_not_stop_the_stream() {
    for (source, sink) in ALL_PAIRINGS {
        let h = Harness::new(source, sink);
        h.submit(Bytes::from_static(b"<widget/>")).await;
        h.submit(request("create", "w1", "ann", Some("ok"))).await;
        h.submit(request("rename", "w1", "ann", None)).await;
        h.submit(request("create", "w2", "ann", None)).await;

        let (reason, stats) = h.run().await.unwrap();
        assert_eq!(reason, StopReason::Drained);
        assert_eq!(stats.received, 4, "{source:?} -> {sink:?}");
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.created, 2);
        assert_eq!(h.pending(), 0);
        assert_eq!(h.widget_count(), 2);
    }
}

/// Queue order is preserved across a multi-batch backlog.
#[tokio::test(start_paused = true)]
async fn test_large_queue_backlog_applies_in_order() {
    let h = Harness::new(SourceKind::Queue, SinkKind::Table);
    for i in 0..25 {
        h.submit(request("update", "w1", "ann", Some(&format!("v{i}"))))
            .await;
    }

    let (_, stats) = h.run().await.unwrap();
    assert_eq!(stats.updated, 25);
    assert_eq!(h.stored("ann", "w1").await.unwrap().label, "v24");
}

/// A sink outage stops the run and loses the in-flight request; a later
/// run picks up the remainder.
#[tokio::test(start_paused = true)]
async fn test_sink_outage_stops_run() {
    let h = Harness::new(SourceKind::Bucket, SinkKind::Document);
    h.submit(request("create", "w1", "ann", None)).await;
    h.submit(request("create", "w2", "ann", None)).await;
    h.submit(request("create", "w3", "ann", None)).await;

    h.set_sink_down(true);
    let err = h.run().await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(h.pending(), 2);

    h.set_sink_down(false);
    let (reason, stats) = h.run().await.unwrap();
    assert_eq!(reason, StopReason::Drained);
    assert_eq!(stats.created, 2);
    assert_eq!(
        h.document_keys(),
        vec!["widgets/ann-w2.json", "widgets/ann-w3.json"]
    );
}
