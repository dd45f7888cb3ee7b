//! End-to-end behaviour of the increment, append and publish sequence.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;

use common::{wait_until, Harness, CHANNEL, SOURCE};
use inventory_service::backends::{AppendError, CounterError, PublishError};
use inventory_service::http::propagation::extract_parent;
use inventory_service::observability::{LogLevel, NO_TRACE};
use inventory_service::orchestrator::{PublishFailed, Step};
use inventory_service::{OrchestrationError, RequestScope};

#[tokio::test]
async fn test_happy_path_counts_logs_and_publishes() {
    let harness = Harness::new();

    let hits = harness.orchestrator.handle(harness.scope()).await.unwrap();

    assert_eq!(hits, 1);
    assert_eq!(harness.counter_value(), 1);
    assert_eq!(harness.appended(), 1);

    let published = harness.publisher.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].channel, CHANNEL);
    let body: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(body, serde_json::json!({ "source": SOURCE, "hits": 1 }));

    let records = harness.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, LogLevel::Info);
    assert_eq!(records[0].msg, "Processed data");
    assert_eq!(records[0].fields["hits"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_see_distinct_consecutive_values() {
    let harness = Harness::new();
    let n = 100u64;

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let orchestrator = harness.orchestrator.clone();
            let scope = harness.scope();
            tokio::spawn(async move { orchestrator.handle(scope).await })
        })
        .collect();

    let mut values = BTreeSet::new();
    for handle in handles {
        values.insert(handle.await.unwrap().unwrap());
    }

    assert_eq!(values, (1..=n).collect::<BTreeSet<_>>());
    assert_eq!(harness.appended() as u64, n);

    let published: BTreeSet<_> = harness.published_hits().into_iter().collect();
    assert_eq!(published, values);
}

#[tokio::test]
async fn test_counter_failure_has_no_side_effects() {
    let harness = Harness::new();
    harness
        .counter
        .script
        .fail_with(CounterError::BackendUnavailable("connection refused".into()));

    let err = harness.orchestrator.handle(harness.scope()).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::CounterUnavailable(_)));
    assert!(!err.counter_advanced());
    assert_eq!(harness.append_log.script.calls(), 0);
    assert_eq!(harness.publisher.script.calls(), 0);

    let records = harness.json_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "error");
    assert_eq!(records[0]["kind"], "counter_unavailable");
    assert_eq!(records[0]["counter_advanced"], false);
    assert!(records[0].get("hits").is_none());
}

#[tokio::test]
async fn test_append_failure_skips_publish_and_reports_counter_value() {
    let harness = Harness::new();
    harness
        .append_log
        .script
        .fail_with(AppendError::ConnectionFailure("server closed the connection".into()));

    let err = harness.orchestrator.handle(harness.scope()).await.unwrap_err();

    assert_eq!(
        err,
        OrchestrationError::LogAppendFailed {
            counter_value: 1,
            source: AppendError::ConnectionFailure("server closed the connection".into()),
        }
    );
    assert_eq!(harness.counter_value(), 1);
    assert_eq!(harness.publisher.script.calls(), 0);

    let records = harness.json_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "error");
    assert_eq!(records[0]["step"], "append");
    assert_eq!(records[0]["hits"], 1);
    assert_eq!(records[0]["counter_advanced"], true);
    assert_eq!(records[0]["error_kind"], "connection_failure");
}

#[tokio::test]
async fn test_counter_is_not_rolled_back_after_append_failure() {
    let harness = Harness::new();
    harness
        .append_log
        .script
        .fail_with(AppendError::ConstraintViolation("null value".into()));
    assert!(harness.orchestrator.handle(harness.scope()).await.is_err());

    harness.append_log.script.recover();
    let hits = harness.orchestrator.handle(harness.scope()).await.unwrap();

    // The failed request consumed value 1.
    assert_eq!(hits, 2);
    assert_eq!(harness.appended(), 1);
    assert_eq!(harness.published_hits(), vec![2]);
}

#[tokio::test]
async fn test_publish_failure_still_succeeds_with_one_warning() {
    let harness = Harness::new();
    for _ in 0..4 {
        harness.orchestrator.handle(harness.scope()).await.unwrap();
    }
    let before = harness.records().len();

    harness
        .publisher
        .script
        .fail_with(PublishError::ChannelUnavailable("queue does not exist".into()));
    let outcome = harness.orchestrator.handle_with_outcome(harness.scope()).await;

    assert_eq!(outcome.result, Ok(5));
    assert!(matches!(
        outcome.publish_failure,
        Some(PublishFailed::Backend(PublishError::ChannelUnavailable(_)))
    ));
    assert_eq!(harness.appended(), 5);

    let records = &harness.json_records()[before..];
    let warnings: Vec<_> = records.iter().filter(|r| r["level"] == "warn").collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["step"], "publish");
    assert_eq!(warnings[0]["kind"], "publish_failed");
    assert_eq!(warnings[0]["error_kind"], "channel_unavailable");
    assert_eq!(warnings[0]["hits"], 5);

    let info: Vec<_> = records.iter().filter(|r| r["level"] == "info").collect();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0]["hits"], 5);

    let trace_id = outcome.trace_id.to_string();
    assert!(records.iter().all(|r| r["trace_id"] == trace_id.as_str()));
}

#[tokio::test]
async fn test_log_records_carry_the_request_trace_id() {
    let harness = Harness::new();

    let first = harness.orchestrator.handle_with_outcome(harness.scope()).await;
    let second = harness.orchestrator.handle_with_outcome(harness.scope()).await;

    assert!(first.trace_id.is_traced());
    assert_ne!(first.trace_id, second.trace_id);

    let records = harness.records();
    assert_eq!(records[0].trace_id, first.trace_id.to_string());
    assert_eq!(records[1].trace_id, second.trace_id.to_string());
    assert!(records.iter().all(|r| r.trace_id != NO_TRACE));
}

#[tokio::test]
async fn test_inbound_traceparent_is_continued() {
    let harness = Harness::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        "traceparent",
        HeaderValue::from_static("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
    );
    let scope = harness.scope().with_parent(extract_parent(&headers));

    let outcome = harness.orchestrator.handle_with_outcome(scope).await;

    assert_eq!(outcome.trace_id.to_string(), "0af7651916cd43dd8448eb211c80319c");
    assert_eq!(harness.records()[0].trace_id, "0af7651916cd43dd8448eb211c80319c");
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .orchestrator
        .handle(RequestScope::new(cancel, Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        OrchestrationError::RequestCancelled {
            step: Step::Increment,
            counter_value: None,
        }
    );
    assert_eq!(harness.counter.script.calls(), 0);
    assert_eq!(harness.counter_value(), 0);
    assert_eq!(harness.appended(), 0);
    assert!(harness.publisher.publisher.published().is_empty());

    let records = harness.json_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "warn");
    assert_eq!(records[0]["kind"], "request_cancelled");
}

#[tokio::test]
async fn test_cancellation_after_increment_is_reported() {
    let harness = Harness::new();
    harness.append_log.script.hang();

    let cancel = CancellationToken::new();
    let scope = RequestScope::new(cancel.clone(), Duration::from_secs(5));
    let orchestrator = harness.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.handle(scope).await });

    let append_log = harness.append_log.clone();
    wait_until(|| append_log.script.calls() == 1).await;
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::RequestCancelled {
            step: Step::Append,
            counter_value: Some(1),
        }
    );
    assert_eq!(harness.counter_value(), 1);
    assert_eq!(harness.publisher.script.calls(), 0);

    let records = harness.json_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "error");
    assert_eq!(records[0]["step"], "append");
    assert_eq!(records[0]["counter_advanced"], true);
    assert_eq!(records[0]["hits"], 1);
}

#[tokio::test]
async fn test_cancellation_during_publish_keeps_the_result() {
    let harness = Harness::new();
    harness.publisher.script.hang();

    let cancel = CancellationToken::new();
    let scope = RequestScope::new(cancel.clone(), Duration::from_secs(5));
    let orchestrator = harness.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.handle_with_outcome(scope).await });

    let publisher = harness.publisher.clone();
    wait_until(|| publisher.script.calls() == 1).await;
    cancel.cancel();

    let outcome = task.await.unwrap();
    assert_eq!(outcome.result, Ok(1));
    assert_eq!(outcome.publish_failure, Some(PublishFailed::Cancelled));
    assert_eq!(harness.appended(), 1);
}

#[tokio::test]
async fn test_deadline_during_append_is_an_append_timeout() {
    let harness = Harness::new();
    harness.append_log.script.hang();

    let scope = RequestScope::new(CancellationToken::new(), Duration::from_millis(50));
    let err = harness.orchestrator.handle(scope).await.unwrap_err();

    assert_eq!(
        err,
        OrchestrationError::LogAppendFailed {
            counter_value: 1,
            source: AppendError::Timeout,
        }
    );
}

#[tokio::test]
async fn test_deadline_during_increment_is_counter_unavailable() {
    let harness = Harness::new();
    harness.counter.script.hang();

    let scope = RequestScope::new(CancellationToken::new(), Duration::from_millis(50));
    let err = harness.orchestrator.handle(scope).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::CounterUnavailable(_)));
    assert_eq!(harness.append_log.script.calls(), 0);
}

#[tokio::test]
async fn test_orchestrator_is_shareable_across_tasks() {
    let harness = Harness::new();
    let orchestrator = Arc::clone(&harness.orchestrator);

    let hits = tokio::spawn(async move {
        orchestrator
            .handle(RequestScope::new(CancellationToken::new(), Duration::from_secs(1)))
            .await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(hits, 1);
}
