//! Tag controller - the public lifecycle of the ad tag on one page
//!
//! One controller is constructed on page load and lives until navigation. It
//! owns the single [`TagState`] value: every operation locks it, decides the
//! transition and replaces the whole value. The lock is never held while a
//! pipeline run is awaited; calls arriving during a `requestAds()` cycle are
//! buffered in the in-progress state and replayed once the cycle finished.

use crate::core::{
    ad_unit_path::resolve_ad_unit_path,
    config::{AdSlotConfig, TagConfig, TargetingValue},
    environment::resolve_environment,
    error::{PipelineError, TagError},
    runtime::RuntimeConfig,
    services::{AdNetworkAdapter, LoggerHandle, PipelineServices, TagLogger, TagModule},
    state::StateSnapshot,
};
use crate::execution::engine::{AdPipeline, EventHandler, PipelineEvent};
use crate::tag::{
    buckets::split_into_buckets,
    hooks::Hooks,
    navigation::{validate_location, PageLocation},
    refresh::{
        append_slot, bucket_slots, clone_infinite_slot, is_refreshable, ticket, PendingRefreshes,
        RefreshOptions, RefreshOutcome, RefreshRequest, Settle,
    },
    state::{
        BufferedCall, ConfiguredState, ErrorState, FinishedState, InProgressState, NextCycle,
        ResumeContext, SpaFinishedState, TagState, TargetingUpdate,
    },
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SOURCE: &str = "TagController";

/// Inputs of one `requestAds()` cycle, taken out of the state
struct Cycle {
    config: Arc<TagConfig>,
    runtime_config: RuntimeConfig,
    modules: Vec<Arc<dyn TagModule>>,
    hooks: Hooks,
    engine: Option<Arc<AdPipeline>>,
    pending: PendingRefreshes,
}

/// Incremental run triggered by a refresh call
struct ImmediateRun {
    engine: Arc<AdPipeline>,
    config: Arc<TagConfig>,
    runtime_config: Arc<RuntimeConfig>,
    slots: Vec<AdSlotConfig>,
}

enum Dispatch {
    Queued,
    Refreshed,
    Skipped,
    Failed(String),
}

/// The ad tag of one page
pub struct TagController {
    state: Mutex<TagState>,
    adapter: Arc<dyn AdNetworkAdapter>,
    services: PipelineServices,
    request_ads_calls: AtomicU64,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl TagController {
    pub fn new(adapter: Arc<dyn AdNetworkAdapter>) -> Self {
        Self::with_services(adapter, PipelineServices::default())
    }

    pub fn with_services(adapter: Arc<dyn AdNetworkAdapter>, services: PipelineServices) -> Self {
        Self {
            state: Mutex::new(TagState::default()),
            adapter,
            services,
            request_ads_calls: AtomicU64::new(0),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    fn logger(&self) -> &LoggerHandle {
        &self.services.logger
    }

    /// Number of `requestAds()` cycles started so far
    pub fn request_ads_calls(&self) -> u64 {
        self.request_ads_calls.load(Ordering::SeqCst)
    }

    /// Observe the pipeline runs of this controller
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Replace the logger used for every later message
    pub fn set_logger(&self, logger: Arc<dyn TagLogger>) {
        self.services.logger.set(logger);
    }

    /// Apply the publisher configuration
    ///
    /// Resolves with the state of the immediately following `requestAds()`
    /// cycle when `config.request_ads` is set.
    pub async fn configure(&self, config: TagConfig) -> Result<StateSnapshot, TagError> {
        if let Err(e) = config.validate() {
            self.logger()
                .error(SOURCE, &format!("configure() rejected the configuration: {:#}", e));
            return Ok(self.get_state().await);
        }
        let request_ads = config.request_ads;

        {
            let mut state = self.state.lock().await;
            let next = match std::mem::take(&mut *state) {
                TagState::Configurable(configurable) => {
                    let environment = resolve_environment(self.services.host.as_ref(), config.environment);
                    let modules = self.configure_modules(configurable.modules, &config);
                    info!(slots = config.slots.len(), %environment, "Tag configured");
                    TagState::Configured(ConfiguredState {
                        config: Arc::new(config),
                        runtime_config: RuntimeConfig::new(environment, configurable.targeting),
                        modules,
                        hooks: configurable.hooks,
                        pending: configurable.pending,
                    })
                }
                TagState::Configured(configured) => {
                    self.logger()
                        .debug(SOURCE, "configure() called again, replacing the configuration");
                    let environment = resolve_environment(self.services.host.as_ref(), config.environment);
                    let modules = self.configure_modules(configured.modules, &config);
                    TagState::Configured(ConfiguredState {
                        config: Arc::new(config),
                        runtime_config: RuntimeConfig::new(environment, configured.runtime_config.targeting),
                        modules,
                        hooks: configured.hooks,
                        pending: configured.pending,
                    })
                }
                other => {
                    let snapshot = other.snapshot();
                    self.logger().error(
                        SOURCE,
                        &format!("configure() is not allowed in state '{}'", snapshot.name()),
                    );
                    *state = other;
                    return Ok(snapshot);
                }
            };
            *state = next;
        }

        if request_ads {
            return self.request_ads().await;
        }
        Ok(StateSnapshot::Configured)
    }

    fn configure_modules(
        &self,
        modules: Vec<Arc<dyn TagModule>>,
        config: &TagConfig,
    ) -> Vec<Arc<dyn TagModule>> {
        modules
            .into_iter()
            .filter(|module| match module.configure(config) {
                Ok(()) => true,
                Err(e) => {
                    self.logger().error(
                        SOURCE,
                        &format!("module '{}' failed to configure and is disabled: {:#}", module.name(), e),
                    );
                    false
                }
            })
            .collect()
    }

    /// Start a `requestAds()` cycle
    ///
    /// Pipeline failures resolve with the error state. The call only fails
    /// when single page application mode detects that the page didn't change.
    pub async fn request_ads(&self) -> Result<StateSnapshot, TagError> {
        let cycle = {
            let mut state = self.state.lock().await;
            let cycle = match std::mem::take(&mut *state) {
                TagState::Configurable(mut configurable) => {
                    self.logger().debug(
                        SOURCE,
                        "requestAds() called before configure(), recording the request",
                    );
                    configurable.initialize = true;
                    *state = TagState::Configurable(configurable);
                    return Ok(state.snapshot());
                }
                TagState::Configured(configured) => Cycle {
                    config: configured.config,
                    runtime_config: configured.runtime_config,
                    modules: configured.modules,
                    hooks: configured.hooks,
                    engine: None,
                    pending: configured.pending,
                },
                TagState::RequestAdsInProgress(in_progress) => {
                    self.logger()
                        .warn(SOURCE, "requestAds() called while a cycle is in progress, ignoring");
                    *state = TagState::RequestAdsInProgress(in_progress);
                    return Ok(StateSnapshot::RequestAds);
                }
                TagState::Finished(finished) => Cycle {
                    config: finished.config,
                    runtime_config: finished.runtime_config,
                    modules: finished.modules,
                    hooks: finished.hooks,
                    engine: Some(finished.engine),
                    pending: PendingRefreshes::default(),
                },
                TagState::SpaFinished(spa) => {
                    let current = PageLocation::current(self.services.host.as_ref());
                    let mode = spa.config.spa.validate_location;
                    if let Err(e) = validate_location(&current, &spa.last_location, mode) {
                        self.logger().error(SOURCE, &e.to_string());
                        *state = TagState::SpaFinished(spa);
                        return Err(e);
                    }
                    debug!(from = %spa.last_location.href, to = %current.href, "Navigation detected");
                    Cycle {
                        config: spa.config,
                        runtime_config: RuntimeConfig::new(spa.runtime_config.environment, spa.next.targeting),
                        modules: spa.modules,
                        hooks: spa.hooks,
                        engine: Some(spa.engine),
                        pending: spa.next.refreshes,
                    }
                }
                TagState::Error(error) => {
                    self.logger()
                        .info(SOURCE, &format!("recovering from error: {}", error.reason));
                    let resume = error.resume;
                    Cycle {
                        config: resume.config,
                        runtime_config: resume.runtime_config,
                        modules: resume.modules,
                        hooks: resume.hooks,
                        engine: Some(resume.engine),
                        pending: resume.pending,
                    }
                }
            };

            *state = TagState::RequestAdsInProgress(InProgressState {
                config: cycle.config.clone(),
                runtime_config: cycle.runtime_config.clone(),
                buffered: Vec::new(),
            });
            cycle
        };

        Ok(self.run_cycle(cycle).await)
    }

    async fn run_cycle(&self, cycle: Cycle) -> StateSnapshot {
        let Cycle {
            mut config,
            runtime_config,
            modules,
            hooks,
            engine,
            pending,
        } = cycle;
        let request_ads_calls = self.request_ads_calls.fetch_add(1, Ordering::SeqCst) + 1;
        info!(request_ads_calls, queued = pending.len(), "requestAds cycle started");

        hooks.run_before(&config, self.logger());

        let engine = engine.unwrap_or_else(|| self.build_engine(&config, &modules));

        let infinite_dom_ids = if pending.has_infinite() {
            pending.materialize_infinite_slots(Arc::make_mut(&mut config), self.logger())
        } else {
            Vec::new()
        };
        let slots = pending.cycle_slots(&config, &infinite_dom_ids);

        let result = self
            .run_slots(
                &engine,
                &slots,
                &config,
                Arc::new(runtime_config.clone()),
                request_ads_calls,
            )
            .await;

        let next = match result {
            Ok(()) if config.spa.enabled => TagState::SpaFinished(SpaFinishedState {
                last_location: PageLocation::current(self.services.host.as_ref()),
                config,
                runtime_config,
                next: NextCycle::default(),
                modules,
                hooks: hooks.clone(),
                engine,
            }),
            Ok(()) => TagState::Finished(FinishedState {
                config,
                runtime_config,
                modules,
                hooks: hooks.clone(),
                engine,
            }),
            Err(e) => {
                self.logger()
                    .error(SOURCE, &format!("requestAds() failed: {}", e));
                TagState::Error(ErrorState {
                    reason: e.to_string(),
                    resume: ResumeContext {
                        config,
                        runtime_config,
                        modules,
                        hooks: hooks.clone(),
                        engine,
                        pending: PendingRefreshes::default(),
                    },
                })
            }
        };
        let snapshot = next.snapshot();

        let buffered = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, next) {
                TagState::RequestAdsInProgress(in_progress) => in_progress.buffered,
                _ => Vec::new(),
            }
        };
        info!(state = snapshot.name(), "requestAds cycle finished");

        hooks.run_after(&snapshot, self.logger());
        pending.settle_all(&snapshot);

        if !buffered.is_empty() {
            debug!(calls = buffered.len(), "Replaying calls buffered during the cycle");
        }
        for call in buffered {
            match call {
                BufferedCall::Targeting(update) => self.update_targeting(update).await,
                BufferedCall::Refresh(request, settle) => {
                    self.dispatch_refresh(request, settle).await;
                }
                BufferedCall::RefreshFailed(reason) => {
                    self.enter_error(reason).await;
                }
            }
        }

        snapshot
    }

    /// One run per bucket group when buckets are enabled, else a single run
    async fn run_slots(
        &self,
        engine: &AdPipeline,
        slots: &[AdSlotConfig],
        config: &Arc<TagConfig>,
        runtime_config: Arc<RuntimeConfig>,
        request_ads_calls: u64,
    ) -> Result<(), PipelineError> {
        if !config.buckets.enabled || slots.is_empty() {
            engine
                .run(slots, config.clone(), runtime_config, request_ads_calls, None)
                .await?;
            return Ok(());
        }

        for group in split_into_buckets(slots, &config.buckets) {
            debug!(
                bucket = %group.name,
                timeout_ms = group.timeout.as_millis() as u64,
                slots = group.slots.len(),
                "Running bucket"
            );
            engine
                .run(
                    &group.slots,
                    config.clone(),
                    runtime_config.clone(),
                    request_ads_calls,
                    Some(&group.name),
                )
                .await?;
        }
        Ok(())
    }

    fn build_engine(&self, config: &TagConfig, modules: &[Arc<dyn TagModule>]) -> Arc<AdPipeline> {
        let mut configuration = self.adapter.pipeline_configuration(config);
        for module in modules {
            configuration.extend_with(module.as_ref());
        }
        debug!(modules = modules.len(), "Pipeline engine built");
        Arc::new(
            AdPipeline::new(configuration, self.services.clone())
                .with_event_handlers(self.event_handlers.clone()),
        )
    }

    /// Refresh a single slot
    pub async fn refresh_ad_slot(&self, dom_id: impl Into<String>, options: RefreshOptions) -> RefreshOutcome {
        self.refresh(RefreshRequest::Slot {
            dom_id: dom_id.into(),
            options,
        })
        .await
    }

    /// Refresh every non-backfill slot of a bucket
    pub async fn refresh_bucket(&self, name: impl Into<String>) -> RefreshOutcome {
        self.refresh(RefreshRequest::Bucket { name: name.into() }).await
    }

    /// Clone the infinite slot `configured_dom_id` as `dom_id` and refresh it
    pub async fn refresh_infinite_ad_slot(
        &self,
        dom_id: impl Into<String>,
        configured_dom_id: impl Into<String>,
    ) -> RefreshOutcome {
        self.refresh(RefreshRequest::Infinite {
            dom_id: dom_id.into(),
            configured_dom_id: configured_dom_id.into(),
        })
        .await
    }

    async fn refresh(&self, request: RefreshRequest) -> RefreshOutcome {
        let (settle, ticket) = ticket();
        match self.dispatch_refresh(request, settle).await {
            Dispatch::Queued => RefreshOutcome::Queued(ticket),
            Dispatch::Refreshed => RefreshOutcome::Refreshed,
            Dispatch::Skipped => RefreshOutcome::Skipped,
            Dispatch::Failed(reason) => RefreshOutcome::Failed(reason),
        }
    }

    async fn dispatch_refresh(&self, request: RefreshRequest, settle: Settle) -> Dispatch {
        let run = {
            let mut state = self.state.lock().await;
            let prepared = match &mut *state {
                TagState::Configurable(configurable) => {
                    configurable.pending.push(request, settle);
                    return Dispatch::Queued;
                }
                TagState::Configured(configured) => {
                    configured.pending.push(request, settle);
                    return Dispatch::Queued;
                }
                TagState::RequestAdsInProgress(in_progress) => {
                    in_progress.buffered.push(BufferedCall::Refresh(request, settle));
                    return Dispatch::Queued;
                }
                TagState::Error(error) => {
                    error.resume.pending.push(request, settle);
                    return Dispatch::Queued;
                }
                TagState::Finished(finished) => prepare_immediate_run(
                    &mut finished.config,
                    &finished.runtime_config,
                    &finished.engine,
                    &request,
                    self.logger(),
                ),
                TagState::SpaFinished(spa) => {
                    let current = PageLocation::current(self.services.host.as_ref());
                    if current.is_same_page(&spa.last_location, spa.config.spa.validate_location) {
                        self.logger().debug(
                            SOURCE,
                            "refresh on the same page, deferring it to the next requestAds()",
                        );
                        spa.next.refreshes.push(request, settle);
                        return Dispatch::Queued;
                    }
                    // the page changed, so the refresh belongs to the next page
                    let next_page = RuntimeConfig::new(
                        spa.runtime_config.environment,
                        spa.next.targeting.clone(),
                    );
                    prepare_immediate_run(
                        &mut spa.config,
                        &next_page,
                        &spa.engine,
                        &request,
                        self.logger(),
                    )
                }
            };

            match prepared {
                Some(run) => run,
                None => {
                    let snapshot = state.snapshot();
                    drop(state);
                    settle.settle(&snapshot);
                    return Dispatch::Skipped;
                }
            }
        };

        let ImmediateRun {
            engine,
            config,
            runtime_config,
            slots,
        } = run;
        let request_ads_calls = self.request_ads_calls.load(Ordering::SeqCst);
        debug!(slots = slots.len(), "Running incremental refresh");

        match self
            .run_slots(&engine, &slots, &config, runtime_config, request_ads_calls)
            .await
        {
            Ok(()) => {
                settle.settle(&self.get_state().await);
                Dispatch::Refreshed
            }
            Err(e) => {
                let reason = e.to_string();
                self.logger().error(SOURCE, &format!("refresh failed: {}", reason));
                let snapshot = self.enter_error(reason.clone()).await;
                settle.settle(&snapshot);
                Dispatch::Failed(reason)
            }
        }
    }

    /// Move a finished controller into the error state
    ///
    /// A failure landing while a cycle runs is applied to the state that
    /// cycle ends in.
    async fn enter_error(&self, reason: String) -> StateSnapshot {
        let mut state = self.state.lock().await;
        let next = match std::mem::take(&mut *state) {
            TagState::Finished(finished) => TagState::Error(ErrorState {
                reason,
                resume: ResumeContext {
                    config: finished.config,
                    runtime_config: finished.runtime_config,
                    modules: finished.modules,
                    hooks: finished.hooks,
                    engine: finished.engine,
                    pending: PendingRefreshes::default(),
                },
            }),
            TagState::SpaFinished(spa) => TagState::Error(ErrorState {
                reason,
                resume: ResumeContext {
                    config: spa.config,
                    runtime_config: RuntimeConfig::new(spa.runtime_config.environment, spa.next.targeting),
                    modules: spa.modules,
                    hooks: spa.hooks,
                    engine: spa.engine,
                    pending: spa.next.refreshes,
                },
            }),
            TagState::RequestAdsInProgress(mut in_progress) => {
                debug!("Refresh failed during a requestAds cycle, deferring the error");
                in_progress.buffered.push(BufferedCall::RefreshFailed(reason));
                TagState::RequestAdsInProgress(in_progress)
            }
            other => {
                warn!(state = other.snapshot().name(), "Refresh failed after the state moved on");
                other
            }
        };
        *state = next;
        state.snapshot()
    }

    pub async fn set_targeting(&self, key: impl Into<String>, value: impl Into<TargetingValue>) {
        self.update_targeting(TargetingUpdate::KeyValue(key.into(), value.into()))
            .await;
    }

    pub async fn add_label(&self, label: impl Into<String>) {
        self.update_targeting(TargetingUpdate::Label(label.into())).await;
    }

    pub async fn set_ad_unit_path_variables(&self, variables: HashMap<String, String>) {
        self.update_targeting(TargetingUpdate::AdUnitPathVariables(variables))
            .await;
    }

    async fn update_targeting(&self, update: TargetingUpdate) {
        let mut state = self.state.lock().await;
        match &mut *state {
            TagState::Configurable(configurable) => update.apply(&mut configurable.targeting),
            TagState::Configured(configured) => update.apply(&mut configured.runtime_config.targeting),
            TagState::RequestAdsInProgress(in_progress) => {
                in_progress.buffered.push(BufferedCall::Targeting(update))
            }
            TagState::Finished(finished) => update.apply(&mut finished.runtime_config.targeting),
            TagState::SpaFinished(spa) => update.apply(&mut spa.next.targeting),
            TagState::Error(error) => update.apply(&mut error.resume.runtime_config.targeting),
        }
    }

    /// Register a module contributing pipeline steps
    ///
    /// Only possible before the first `requestAds()` cycle.
    pub async fn register_module(&self, module: Arc<dyn TagModule>) {
        let mut state = self.state.lock().await;
        match &mut *state {
            TagState::Configurable(configurable) => {
                self.logger()
                    .debug(SOURCE, &format!("module '{}' registered", module.name()));
                configurable.modules.push(module);
            }
            TagState::Configured(configured) => match module.configure(&configured.config) {
                Ok(()) => {
                    self.logger()
                        .debug(SOURCE, &format!("module '{}' registered", module.name()));
                    configured.modules.push(module);
                }
                Err(e) => self.logger().error(
                    SOURCE,
                    &format!("module '{}' failed to configure: {:#}", module.name(), e),
                ),
            },
            _ => self.logger().error(
                SOURCE,
                &format!(
                    "registerModule('{}') is not allowed after requestAds() was called",
                    module.name()
                ),
            ),
        }
    }

    pub async fn before_request_ads<F>(&self, hook: F)
    where
        F: Fn(&TagConfig) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().await;
        match &mut *state {
            TagState::Configurable(configurable) => configurable.hooks.push_before(Arc::new(hook)),
            TagState::Configured(configured) => configured.hooks.push_before(Arc::new(hook)),
            _ => self
                .logger()
                .error(SOURCE, "beforeRequestAds() is not allowed after requestAds() was called"),
        }
    }

    pub async fn after_request_ads<F>(&self, hook: F)
    where
        F: Fn(&StateSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().await;
        match &mut *state {
            TagState::Configurable(configurable) => configurable.hooks.push_after(Arc::new(hook)),
            TagState::Configured(configured) => configured.hooks.push_after(Arc::new(hook)),
            _ => self
                .logger()
                .error(SOURCE, "afterRequestAds() is not allowed after requestAds() was called"),
        }
    }

    pub async fn get_state(&self) -> StateSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn get_config(&self) -> Option<Arc<TagConfig>> {
        self.state.lock().await.config().cloned()
    }

    pub async fn get_runtime_config(&self) -> RuntimeConfig {
        let state = self.state.lock().await;
        self.runtime_config_of(&state)
    }

    /// Static key-values merged with runtime key-values
    pub async fn get_page_targeting(&self) -> HashMap<String, TargetingValue> {
        let state = self.state.lock().await;
        self.runtime_config_of(&state)
            .page_targeting(state.config().map(|config| config.as_ref()))
    }

    /// Substitute the `{name}` placeholders of an ad unit path
    pub async fn resolve_ad_unit_path(&self, path: &str) -> Result<String, TagError> {
        let variables = {
            let state = self.state.lock().await;
            let mut variables = self.services.default_ad_unit_path_variables();
            variables.extend(
                self.runtime_config_of(&state)
                    .ad_unit_path_variables(state.config().map(|config| config.as_ref())),
            );
            variables
        };
        Ok(resolve_ad_unit_path(path, &variables)?)
    }

    fn runtime_config_of(&self, state: &TagState) -> RuntimeConfig {
        match state {
            TagState::Configurable(configurable) => RuntimeConfig::new(
                resolve_environment(self.services.host.as_ref(), None),
                configurable.targeting.clone(),
            ),
            other => other.runtime_config().cloned().unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for TagController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagController")
            .field("request_ads_calls", &self.request_ads_calls())
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

fn prepare_immediate_run(
    config: &mut Arc<TagConfig>,
    runtime_config: &RuntimeConfig,
    engine: &Arc<AdPipeline>,
    request: &RefreshRequest,
    logger: &LoggerHandle,
) -> Option<ImmediateRun> {
    let slots = match request {
        RefreshRequest::Slot { dom_id, options } => match config.slot(dom_id) {
            Some(slot) if is_refreshable(slot, options) => vec![slot.clone()],
            Some(slot) => {
                logger.debug(
                    SOURCE,
                    &format!("slot '{}' is {} and not refreshed", dom_id, slot.loaded()),
                );
                return None;
            }
            None => {
                logger.warn(SOURCE, &format!("refreshAdSlot: no slot '{}' configured", dom_id));
                return None;
            }
        },
        RefreshRequest::Bucket { name } => {
            let slots = bucket_slots(config, name);
            if slots.is_empty() {
                logger.warn(SOURCE, &format!("refreshBucket: no slots in bucket '{}'", name));
                return None;
            }
            slots
        }
        RefreshRequest::Infinite {
            dom_id,
            configured_dom_id,
        } => {
            let current: &TagConfig = config;
            let Some(clone) = clone_infinite_slot(current, dom_id, configured_dom_id) else {
                logger.warn(
                    SOURCE,
                    &format!(
                        "refreshInfiniteAdSlot: '{}' is not an infinite slot",
                        configured_dom_id
                    ),
                );
                return None;
            };
            append_slot(Arc::make_mut(config), clone.clone());
            vec![clone]
        }
    };

    Some(ImmediateRun {
        engine: engine.clone(),
        config: config.clone(),
        runtime_config: Arc::new(runtime_config.clone()),
        slots,
    })
}
