//! Test: tag lifecycle from configurable to finished and error recovery

use crate::helpers::*;
use adtag::core::{StateSnapshot, TargetingValue};
use adtag::execution::PipelineEvent;
use adtag::tag::{RefreshOptions, RefreshOutcome};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONFIG: &str = r#"
slots:
  - domId: "top"
    adUnitPath: "/1/top"
  - domId: "sticky"
    adUnitPath: "/1/sticky"
    behaviour: { loaded: manual }
targeting:
  keyValues:
    site: "example"
"#;

#[tokio::test]
async fn test_request_ads_before_configure_is_recorded() {
    let t = TestTag::new("https://example.com/");

    let state = t.tag.request_ads().await.unwrap();
    assert_eq!(state, StateSnapshot::Configurable { initialize: true });
    assert!(t.recorder.events().is_empty());

    // the recorded intent doesn't start a cycle on its own
    let state = t.tag.configure(config(CONFIG)).await.unwrap();
    assert_eq!(state, StateSnapshot::Configured);
    assert!(t.recorder.runs().is_empty());

    let state = t.tag.request_ads().await.unwrap();
    assert_eq!(state, StateSnapshot::Finished);
    assert_eq!(t.recorder.requested_slots(), vec![ids(&["top"])]);
}

#[tokio::test]
async fn test_repeated_cycles_share_one_engine() {
    let t = TestTag::new("https://example.com/");
    t.tag.configure(config(CONFIG)).await.unwrap();

    t.tag.request_ads().await.unwrap();
    t.tag.request_ads().await.unwrap();

    let runs = t.recorder.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!((runs[0].request_id, runs[0].request_ads_calls), (1, 1));
    assert_eq!((runs[1].request_id, runs[1].request_ads_calls), (2, 2));
    assert_eq!(t.tag.request_ads_calls(), 2);

    // init only runs with the first run of the engine
    assert_eq!(t.recorder.count("init"), 1);
    assert_eq!(t.recorder.count("configure"), 2);
}

#[tokio::test]
async fn test_failed_cycle_enters_error_and_recovers() {
    let t = TestTag::new("https://example.com/");
    t.tag.configure(config(CONFIG)).await.unwrap();
    t.adapter.fail_request_ads(true);

    let state = t.tag.request_ads().await.unwrap();
    match &state {
        StateSnapshot::Error { reason } => {
            assert!(reason.contains("requestAds"), "unexpected reason: {}", reason);
            assert!(reason.contains("ad server unavailable"));
        }
        other => panic!("expected error state, got {:?}", other),
    }
    assert_eq!(t.tag.get_state().await, state);

    t.adapter.fail_request_ads(false);
    let state = t.tag.request_ads().await.unwrap();
    assert_eq!(state, StateSnapshot::Finished);
    assert_eq!(t.recorder.runs().len(), 1);
    assert_eq!(t.recorder.count("init"), 1);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let t = TestTag::new("https://example.com/");
    let mut invalid = config(CONFIG);
    let duplicate = invalid.slots[0].clone();
    invalid.slots.push(duplicate);

    let state = t.tag.configure(invalid).await.unwrap();

    assert_eq!(state, StateSnapshot::Configurable { initialize: false });
    assert!(t.tag.get_config().await.is_none());
}

#[tokio::test]
async fn test_configure_replaces_config_until_first_cycle() {
    let t = TestTag::new("https://example.com/");
    t.tag.configure(config(CONFIG)).await.unwrap();
    t.tag
        .configure(config("slots: [{ domId: \"other\", adUnitPath: \"/1/other\" }]"))
        .await
        .unwrap();

    t.tag.request_ads().await.unwrap();
    assert_eq!(t.recorder.requested_slots(), vec![ids(&["other"])]);

    // ignored once finished
    let state = t.tag.configure(config(CONFIG)).await.unwrap();
    assert_eq!(state, StateSnapshot::Finished);
    let current = t.tag.get_config().await.unwrap();
    assert_eq!(current.slots.len(), 1);
    assert_eq!(current.slots[0].dom_id, "other");
}

#[tokio::test]
async fn test_calls_during_cycle_are_buffered() {
    let recorder = Recorder::default();
    let adapter =
        RecordingAdapter::new(recorder.clone()).with_request_ads_delay(Duration::from_millis(50));
    let t = TestTag::with_adapter("https://example.com/", adapter, recorder);
    t.tag.configure(config(CONFIG)).await.unwrap();

    let (state, ticket) = tokio::join!(t.tag.request_ads(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(t.tag.get_state().await, StateSnapshot::RequestAds);

        // a second requestAds() is ignored while one is in flight
        assert_eq!(t.tag.request_ads().await.unwrap(), StateSnapshot::RequestAds);

        t.tag.set_targeting("section", "sports").await;
        let outcome = t.tag.refresh_ad_slot("sticky", RefreshOptions::default()).await;
        assert!(outcome.is_queued());
        outcome
    });

    assert_eq!(state.unwrap(), StateSnapshot::Finished);
    match ticket {
        RefreshOutcome::Queued(ticket) => {
            assert_eq!(ticket.settled().await, Some(StateSnapshot::Finished));
        }
        other => panic!("expected a queued refresh, got {:?}", other),
    }

    assert_eq!(
        t.recorder.requested_slots(),
        vec![ids(&["top"]), ids(&["sticky"])]
    );
    assert_eq!(t.tag.request_ads_calls(), 1);

    let targeting = t.tag.get_page_targeting().await;
    assert_eq!(targeting.get("section"), Some(&TargetingValue::from("sports")));
    assert_eq!(targeting.get("site"), Some(&TargetingValue::from("example")));
}

#[tokio::test]
async fn test_event_handler_observes_runs() {
    let t = TestTag::new("https://example.com/");
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    t.tag
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    t.tag.configure(config(CONFIG)).await.unwrap();
    t.tag.request_ads().await.unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::RunStarted { request_id: 1, request_ads_calls: 1, slots: 1, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::RunCompleted { request_id: 1, .. })
    ));
}
