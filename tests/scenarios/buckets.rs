//! Test: bucket splitting and bucket refreshes

use crate::helpers::*;
use adtag::core::StateSnapshot;
use adtag::tag::RefreshOutcome;
use std::sync::Arc;

const BUCKETS: &str = r#"
buckets:
  enabled: true
  timeout: 1000
  bucket:
    one: { timeout: 500 }
    two: { timeout: 800 }
slots:
  - domId: "A"
    adUnitPath: "/1/a"
    behaviour: { bucket: "one" }
  - domId: "B"
    adUnitPath: "/1/b"
    behaviour: { bucket: "two" }
  - domId: "C"
    adUnitPath: "/1/c"
    behaviour: { bucket: "one" }
  - domId: "D"
    adUnitPath: "/1/d"
    behaviour: { loaded: backfill, bucket: "one" }
"#;

#[tokio::test]
async fn test_cycle_runs_once_per_bucket() {
    let t = TestTag::new("https://example.com/");
    t.tag.configure(config(BUCKETS)).await.unwrap();

    t.tag.request_ads().await.unwrap();

    let runs = t.recorder.runs();
    assert_eq!(runs.len(), 2);

    assert_eq!(runs[0].bucket.as_deref(), Some("one"));
    assert_eq!(runs[0].slots, ids(&["A", "C"]));
    assert_eq!(runs[1].bucket.as_deref(), Some("two"));
    assert_eq!(runs[1].slots, ids(&["B"]));

    // bucket runs belong to the same cycle but are separate engine runs
    assert_eq!(runs[0].request_ads_calls, runs[1].request_ads_calls);
    assert_eq!(runs[0].request_id + 1, runs[1].request_id);
    assert_eq!(t.recorder.count("init"), 1);
}

#[tokio::test]
async fn test_refresh_bucket_runs_its_slots() {
    let t = TestTag::new("https://example.com/");
    t.tag.configure(config(BUCKETS)).await.unwrap();
    t.tag.request_ads().await.unwrap();
    let before = t.recorder.runs().len();

    let outcome = t.tag.refresh_bucket("one").await;

    assert!(matches!(outcome, RefreshOutcome::Refreshed));
    let runs = t.recorder.runs();
    assert_eq!(runs.len(), before + 1);
    let last = runs.last().unwrap();
    assert_eq!(last.bucket.as_deref(), Some("one"));
    // backfill slots are never part of a bucket refresh
    assert_eq!(last.slots, ids(&["A", "C"]));
    assert_eq!(last.request_ads_calls, 1);
}

#[tokio::test]
async fn test_refresh_unknown_bucket_is_skipped() {
    let t = TestTag::new("https://example.com/");
    t.tag.configure(config(BUCKETS)).await.unwrap();
    t.tag.request_ads().await.unwrap();
    let before = t.recorder.runs().len();

    let outcome = t.tag.refresh_bucket("missing").await;

    assert!(matches!(outcome, RefreshOutcome::Skipped));
    assert_eq!(t.recorder.runs().len(), before);
    assert_eq!(t.tag.get_state().await, StateSnapshot::Finished);
}

#[tokio::test]
async fn test_disabled_buckets_use_a_single_run() {
    let t = TestTag::new("https://example.com/");
    let mut config = config(BUCKETS);
    config.buckets.enabled = false;
    t.tag.configure(config).await.unwrap();

    t.tag.request_ads().await.unwrap();

    let runs = t.recorder.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].bucket, None);
    assert_eq!(runs[0].slots, ids(&["A", "B", "C"]));
}

#[tokio::test]
async fn test_bucket_refresh_before_first_cycle_is_queued() {
    let t = TestTag::new("https://example.com/");
    t.tag
        .configure(config(
            r#"
buckets:
  enabled: true
slots:
  - domId: "A"
    adUnitPath: "/1/a"
  - domId: "M"
    adUnitPath: "/1/m"
    behaviour: { loaded: manual, bucket: "lazy" }
"#,
        ))
        .await
        .unwrap();

    let outcome = t.tag.refresh_bucket("lazy").await;
    assert!(outcome.is_queued());

    t.tag.request_ads().await.unwrap();

    let runs = t.recorder.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].bucket.as_deref(), Some("default"));
    assert_eq!(runs[0].slots, ids(&["A"]));
    assert_eq!(runs[1].bucket.as_deref(), Some("lazy"));
    assert_eq!(runs[1].slots, ids(&["M"]));
}

#[tokio::test]
async fn test_consecutive_bucketed_cycles() {
    let t = TestTag::new("https://example.com/");
    let module = TestModule::new("consent", &t.recorder).with_configure_per_cycle("consent");
    t.tag.register_module(Arc::new(module)).await;
    t.tag.configure(config(BUCKETS)).await.unwrap();

    t.tag.request_ads().await.unwrap();
    t.tag.request_ads().await.unwrap();

    let runs = t.recorder.runs();
    let request_ids: Vec<u64> = runs.iter().map(|run| run.request_id).collect();
    let calls: Vec<u64> = runs.iter().map(|run| run.request_ads_calls).collect();
    assert_eq!(request_ids, vec![1, 2, 3, 4]);
    assert_eq!(calls, vec![1, 1, 2, 2]);

    // two bucket runs per cycle, one trigger per cycle
    assert_eq!(t.recorder.count("cycle:consent"), 2);
    assert_eq!(t.recorder.count("init"), 1);
}
