//! Test: phase ordering, prepareRequestAds priorities and concurrent bids

use crate::helpers::*;
use adtag::core::StateSnapshot;
use std::sync::Arc;

const CONFIG: &str = r#"
slots:
  - domId: "top"
    adUnitPath: "/1/top"
  - domId: "sidebar"
    adUnitPath: "/1/sidebar"
"#;

#[tokio::test]
async fn test_phases_run_in_order() {
    let t = TestTag::new("https://example.com/");
    let module = TestModule::new("analytics", &t.recorder)
        .with_prepare("targeting", 1, 0)
        .with_bids("prebid", 0);
    t.tag.register_module(Arc::new(module)).await;
    t.tag.configure(config(CONFIG)).await.unwrap();

    t.tag.request_ads().await.unwrap();

    assert_eq!(
        t.recorder.events(),
        vec![
            "init",
            "configure",
            "defineSlots",
            "prepare:targeting",
            "bids:prebid",
            "requestAds"
        ]
    );
    assert_eq!(t.recorder.requested_slots(), vec![ids(&["top", "sidebar"])]);
}

#[tokio::test]
async fn test_prepare_steps_follow_priority_not_duration() {
    let t = TestTag::new("https://example.com/");
    // registered lowest priority first; the fastest step has the middle priority
    let module = TestModule::new("prepare", &t.recorder)
        .with_prepare("p1", 1, 10)
        .with_prepare("p3", 3, 20)
        .with_prepare("p2", 2, 5);
    t.tag.register_module(Arc::new(module)).await;
    t.tag.configure(config(CONFIG)).await.unwrap();

    t.tag.request_ads().await.unwrap();

    assert_eq!(
        t.recorder.events_with_prefix("prepare:"),
        vec!["prepare:p3", "prepare:p2", "prepare:p1"]
    );
}

#[tokio::test]
async fn test_bids_run_concurrently() {
    let t = TestTag::new("https://example.com/");
    let module = TestModule::new("bidders", &t.recorder)
        .with_bids("slow", 40)
        .with_bids("fast", 5);
    t.tag.register_module(Arc::new(module)).await;
    t.tag.configure(config(CONFIG)).await.unwrap();

    t.tag.request_ads().await.unwrap();

    // the fast bidder isn't blocked by the slow one registered before it
    assert_eq!(
        t.recorder.events_with_prefix("bids:"),
        vec!["bids:fast", "bids:slow"]
    );
    // and requestAds waits for both
    let events = t.recorder.events();
    assert_eq!(events.last().map(String::as_str), Some("requestAds"));
}

#[tokio::test]
async fn test_failing_bidder_fails_the_cycle() {
    let t = TestTag::new("https://example.com/");
    let module = TestModule::new("bidders", &t.recorder)
        .with_bids("ok", 0)
        .with_failing_bids("broken", 5);
    t.tag.register_module(Arc::new(module)).await;
    t.tag.configure(config(CONFIG)).await.unwrap();

    let state = t.tag.request_ads().await.unwrap();

    match state {
        StateSnapshot::Error { reason } => {
            assert!(reason.contains("requestBids"), "unexpected reason: {}", reason);
            assert!(reason.contains("broken"));
            assert!(reason.contains("bidder timed out"));
        }
        other => panic!("expected error state, got {:?}", other),
    }
    assert_eq!(t.recorder.count("requestAds"), 0);
}

#[tokio::test]
async fn test_cycle_without_slots_only_initialises() {
    let t = TestTag::new("https://example.com/");
    t.tag
        .configure(config(
            r#"
slots:
  - domId: "sticky"
    adUnitPath: "/1/sticky"
    behaviour: { loaded: manual }
"#,
        ))
        .await
        .unwrap();

    let state = t.tag.request_ads().await.unwrap();

    assert_eq!(state, StateSnapshot::Finished);
    assert_eq!(t.recorder.events(), vec!["init"]);
}
