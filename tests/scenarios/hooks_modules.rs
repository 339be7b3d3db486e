//! Test: lifecycle hooks, publisher modules and custom loggers

use crate::helpers::*;
use adtag::core::{StateSnapshot, TagConfig};
use std::sync::{Arc, Mutex};

const CONFIG: &str = r#"
slots:
  - domId: "top"
    adUnitPath: "/1/top"
"#;

#[tokio::test]
async fn test_hooks_wrap_every_cycle() {
    let t = TestTag::new("https://example.com/");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let before = seen.clone();
    t.tag
        .before_request_ads(move |config: &TagConfig| {
            before
                .lock()
                .unwrap()
                .push(format!("before:{}", config.slots.len()));
            Ok(())
        })
        .await;
    let after = seen.clone();
    t.tag
        .after_request_ads(move |state: &StateSnapshot| {
            after.lock().unwrap().push(format!("after:{}", state.name()));
            Ok(())
        })
        .await;

    t.tag.configure(config(CONFIG)).await.unwrap();
    t.tag.request_ads().await.unwrap();
    t.tag.request_ads().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["before:1", "after:finished", "before:1", "after:finished"]
    );
}

#[tokio::test]
async fn test_failing_hooks_do_not_stop_the_cycle() {
    let t = TestTag::new("https://example.com/");
    let logger = CapturingLogger::default();
    t.tag.set_logger(Arc::new(logger.clone()));

    t.tag
        .before_request_ads(|_: &TagConfig| anyhow::bail!("hook exploded"))
        .await;
    t.tag
        .after_request_ads(|_: &StateSnapshot| -> anyhow::Result<()> { panic!("hook panicked") })
        .await;

    t.tag.configure(config(CONFIG)).await.unwrap();
    let state = t.tag.request_ads().await.unwrap();

    assert_eq!(state, StateSnapshot::Finished);
    assert_eq!(t.recorder.count("requestAds"), 1);

    let messages = logger.messages();
    assert!(messages
        .iter()
        .any(|m| m.starts_with("error:") && m.contains("hook exploded")));
    assert!(messages
        .iter()
        .any(|m| m.starts_with("error:") && m.contains("hook panicked")));
}

#[tokio::test]
async fn test_hooks_after_first_cycle_are_ignored() {
    let t = TestTag::new("https://example.com/");
    let calls = Arc::new(Mutex::new(0));
    t.tag.configure(config(CONFIG)).await.unwrap();
    t.tag.request_ads().await.unwrap();

    let counter = calls.clone();
    t.tag
        .before_request_ads(move |_: &TagConfig| {
            *counter.lock().unwrap() += 1;
            Ok(())
        })
        .await;
    t.tag.request_ads().await.unwrap();

    assert_eq!(*calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_module_steps_join_the_pipeline() {
    let t = TestTag::new("https://example.com/");
    let module = TestModule::new("prebid", &t.recorder).with_bids("prebid", 0);
    t.tag.register_module(Arc::new(module.clone())).await;

    t.tag.configure(config(CONFIG)).await.unwrap();
    assert!(module.was_configured());

    t.tag.request_ads().await.unwrap();
    assert_eq!(t.recorder.count("bids:prebid"), 1);
}

#[tokio::test]
async fn test_module_failing_configure_is_disabled() {
    let t = TestTag::new("https://example.com/");
    let broken = TestModule::new("broken", &t.recorder)
        .with_bids("broken", 0)
        .with_failing_configure();
    let working = TestModule::new("working", &t.recorder).with_bids("working", 0);
    t.tag.register_module(Arc::new(broken)).await;
    t.tag.register_module(Arc::new(working)).await;

    t.tag.configure(config(CONFIG)).await.unwrap();
    let state = t.tag.request_ads().await.unwrap();

    assert_eq!(state, StateSnapshot::Finished);
    assert_eq!(t.recorder.events_with_prefix("bids:"), vec!["bids:working"]);
}

#[tokio::test]
async fn test_module_registered_late_is_rejected() {
    let t = TestTag::new("https://example.com/");
    let logger = CapturingLogger::default();
    t.tag.set_logger(Arc::new(logger.clone()));
    t.tag.configure(config(CONFIG)).await.unwrap();
    t.tag.request_ads().await.unwrap();

    let late = TestModule::new("late", &t.recorder).with_bids("late", 0);
    t.tag.register_module(Arc::new(late.clone())).await;
    t.tag.request_ads().await.unwrap();

    assert!(!late.was_configured());
    assert_eq!(t.recorder.count("bids:late"), 0);
    assert!(logger
        .messages()
        .iter()
        .any(|m| m.starts_with("error:") && m.contains("registerModule('late')")));
}

#[tokio::test]
async fn test_logger_receives_lifecycle_misuse() {
    let t = TestTag::new("https://example.com/");
    let logger = CapturingLogger::default();
    t.tag.set_logger(Arc::new(logger.clone()));

    t.tag.configure(config(CONFIG)).await.unwrap();
    t.tag.request_ads().await.unwrap();
    t.tag.configure(config(CONFIG)).await.unwrap();

    assert!(logger
        .messages()
        .iter()
        .any(|m| m == "error: configure() is not allowed in state 'finished'"));
}

#[tokio::test]
async fn test_resolve_ad_unit_path_uses_runtime_variables() {
    let t = TestTag::new("https://www.example.com/article");
    t.tag
        .configure(config(
            r#"
targeting:
  adUnitPathVariables:
    section: "news"
slots: []
"#,
        ))
        .await
        .unwrap();

    assert_eq!(
        t.tag.resolve_ad_unit_path("/1/{domain}/{section}").await.unwrap(),
        "/1/www.example.com/news"
    );

    t.tag
        .set_ad_unit_path_variables([("section".to_string(), "sports".to_string())].into())
        .await;
    assert_eq!(
        t.tag.resolve_ad_unit_path("/1/{section}").await.unwrap(),
        "/1/sports"
    );

    let err = t.tag.resolve_ad_unit_path("/1/{device}").await.unwrap_err();
    assert!(err.to_string().contains("device"));
}
