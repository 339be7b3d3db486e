//! Test utility functions for adtag scenarios

use adtag::core::{
    config::{AdSlotConfig, TagConfig, TargetingValue},
    services::{AdNetworkAdapter, PipelineServices, StaticHost, TagLogger, TagModule},
    slot::{SlotDefinition, StaticAdSlot},
    step::{
        mk_configure_step, mk_configure_step_once_per_request_ads_cycle, mk_define_slots_step,
        mk_init_step, mk_prepare_request_ads_step, mk_request_ads_step, mk_request_bids_step,
        ConfigureStep, PipelineConfiguration, PrepareRequestAdsStep, RequestBidsStep,
    },
};
use adtag::tag::TagController;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded call of the requestAds phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub request_id: u64,
    pub request_ads_calls: u64,
    pub bucket: Option<String>,
    pub slots: Vec<String>,
    /// Page targeting the run was started with
    pub key_values: HashMap<String, TargetingValue>,
}

/// Shared log of everything the steps did
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    runs: Arc<Mutex<Vec<RecordedRun>>>,
}

impl Recorder {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events starting with `prefix`, in order
    pub fn events_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.starts_with(prefix))
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }

    /// Dom ids of every requestAds call
    pub fn requested_slots(&self) -> Vec<Vec<String>> {
        self.runs().into_iter().map(|run| run.slots).collect()
    }

    fn push_run(&self, run: RecordedRun) {
        self.runs.lock().unwrap().push(run);
    }
}

/// Ad network adapter that records every phase
#[derive(Clone, Default)]
pub struct RecordingAdapter {
    recorder: Recorder,
    fail_request_ads: Arc<AtomicBool>,
    request_ads_delay: Option<Duration>,
}

impl RecordingAdapter {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            ..Default::default()
        }
    }

    /// Delay the requestAds phase to keep a cycle in flight
    pub fn with_request_ads_delay(mut self, delay: Duration) -> Self {
        self.request_ads_delay = Some(delay);
        self
    }

    pub fn fail_request_ads(&self, fail: bool) {
        self.fail_request_ads.store(fail, Ordering::SeqCst);
    }
}

impl AdNetworkAdapter for RecordingAdapter {
    fn pipeline_configuration(&self, _config: &TagConfig) -> PipelineConfiguration {
        let recorder = self.recorder.clone();
        let define = mk_define_slots_step("define", move |_, slots: Arc<[AdSlotConfig]>| {
            recorder.record("defineSlots");
            let definitions: Vec<SlotDefinition> = slots
                .iter()
                .map(|slot| {
                    SlotDefinition::new(
                        slot.clone(),
                        Arc::new(StaticAdSlot::new(slot.dom_id.clone(), slot.ad_unit_path.clone())),
                    )
                })
                .collect();
            async move { anyhow::Ok(definitions) }
        });

        let recorder = self.recorder.clone();
        let fail = self.fail_request_ads.clone();
        let delay = self.request_ads_delay;
        let request = mk_request_ads_step("request", move |ctx, slots: Arc<[SlotDefinition]>| {
            let recorder = recorder.clone();
            let fail = fail.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fail.load(Ordering::SeqCst) {
                    anyhow::bail!("ad server unavailable");
                }
                recorder.record("requestAds");
                recorder.push_run(RecordedRun {
                    request_id: ctx.request_id,
                    request_ads_calls: ctx.request_ads_calls,
                    bucket: ctx.bucket.as_ref().map(|bucket| bucket.name.clone()),
                    slots: slots.iter().map(|s| s.dom_id().to_string()).collect(),
                    key_values: ctx.runtime_config.page_targeting(Some(ctx.config.as_ref())),
                });
                Ok(())
            }
        });

        let mut configuration = PipelineConfiguration::new(define, request);

        let recorder = self.recorder.clone();
        configuration.init.push(mk_init_step("load-library", move |_| {
            recorder.record("init");
            async { anyhow::Ok(()) }
        }));

        let recorder = self.recorder.clone();
        configuration.configure.push(mk_configure_step("configure", move |_, _| {
            recorder.record("configure");
            async { anyhow::Ok(()) }
        }));

        configuration
    }
}

/// Module contributing timed prepareRequestAds and requestBids steps
#[derive(Clone, Default)]
pub struct TestModule {
    name: String,
    recorder: Recorder,
    prepare: Vec<(String, i32, u64)>,
    bids: Vec<(String, u64, bool)>,
    per_cycle: Vec<String>,
    fail_configure: bool,
    configured: Arc<AtomicBool>,
}

impl TestModule {
    pub fn new(name: &str, recorder: &Recorder) -> Self {
        Self {
            name: name.to_string(),
            recorder: recorder.clone(),
            ..Default::default()
        }
    }

    /// prepareRequestAds step recording `prepare:<name>` after `delay_ms`
    pub fn with_prepare(mut self, name: &str, priority: i32, delay_ms: u64) -> Self {
        self.prepare.push((name.to_string(), priority, delay_ms));
        self
    }

    /// requestBids step recording `bids:<name>` after `delay_ms`
    pub fn with_bids(mut self, name: &str, delay_ms: u64) -> Self {
        self.bids.push((name.to_string(), delay_ms, false));
        self
    }

    /// configure step recording `cycle:<name>` once per requestAds() cycle
    pub fn with_configure_per_cycle(mut self, name: &str) -> Self {
        self.per_cycle.push(name.to_string());
        self
    }

    pub fn with_failing_bids(mut self, name: &str, delay_ms: u64) -> Self {
        self.bids.push((name.to_string(), delay_ms, true));
        self
    }

    pub fn with_failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn was_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }
}

impl TagModule for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, _config: &TagConfig) -> anyhow::Result<()> {
        if self.fail_configure {
            anyhow::bail!("missing module settings");
        }
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn configure_steps(&self) -> Vec<ConfigureStep> {
        self.per_cycle
            .iter()
            .map(|name| {
                let recorder = self.recorder.clone();
                let event = format!("cycle:{}", name);
                mk_configure_step_once_per_request_ads_cycle(name.clone(), move |_, _| {
                    recorder.record(event.clone());
                    async { anyhow::Ok(()) }
                })
            })
            .collect()
    }

    fn prepare_request_ads_steps(&self) -> Vec<PrepareRequestAdsStep> {
        self.prepare
            .iter()
            .cloned()
            .map(|(name, priority, delay_ms)| {
                let recorder = self.recorder.clone();
                let event = format!("prepare:{}", name);
                mk_prepare_request_ads_step(name, priority, move |_, _| {
                    let recorder = recorder.clone();
                    let event = event.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        recorder.record(event);
                        anyhow::Ok(())
                    }
                })
            })
            .collect()
    }

    fn request_bids_steps(&self) -> Vec<RequestBidsStep> {
        self.bids
            .iter()
            .cloned()
            .map(|(name, delay_ms, fail)| {
                let recorder = self.recorder.clone();
                let event = format!("bids:{}", name);
                mk_request_bids_step(name, move |_, _| {
                    let recorder = recorder.clone();
                    let event = event.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        if fail {
                            anyhow::bail!("bidder timed out");
                        }
                        recorder.record(event);
                        anyhow::Ok(())
                    }
                })
            })
            .collect()
    }
}

/// Logger keeping every message as `level: message`
#[derive(Debug, Clone, Default)]
pub struct CapturingLogger {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CapturingLogger {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    fn push(&self, level: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("{}: {}", level, message));
    }
}

impl TagLogger for CapturingLogger {
    fn debug(&self, _source: &str, message: &str) {
        self.push("debug", message);
    }

    fn info(&self, _source: &str, message: &str) {
        self.push("info", message);
    }

    fn warn(&self, _source: &str, message: &str) {
        self.push("warn", message);
    }

    fn error(&self, _source: &str, message: &str) {
        self.push("error", message);
    }
}

/// Controller wired to a recording adapter and an in-memory page
pub struct TestTag {
    pub tag: TagController,
    pub host: Arc<StaticHost>,
    pub adapter: RecordingAdapter,
    pub recorder: Recorder,
}

impl TestTag {
    pub fn new(href: &str) -> Self {
        let recorder = Recorder::default();
        Self::with_adapter(href, RecordingAdapter::new(recorder.clone()), recorder)
    }

    pub fn with_adapter(href: &str, adapter: RecordingAdapter, recorder: Recorder) -> Self {
        let host = Arc::new(StaticHost::new(href));
        let services = PipelineServices::default().with_host(host.clone());
        let tag = TagController::with_services(Arc::new(adapter.clone()), services);
        Self {
            tag,
            host,
            adapter,
            recorder,
        }
    }
}

/// Parse a configuration, panicking on invalid YAML
pub fn config(yaml: &str) -> TagConfig {
    TagConfig::from_yaml(yaml).unwrap()
}

pub fn ids(slots: &[&str]) -> Vec<String> {
    slots.iter().map(|s| s.to_string()).collect()
}
