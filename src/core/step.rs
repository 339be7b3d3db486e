//! Step domain model
//!
//! Each phase of a pipeline run is an ordered list of named steps. A step is
//! a plain record holding a name and an async callback; the engine decides
//! how the steps of a phase are scheduled.

use crate::core::{config::AdSlotConfig, context::PipelineContext, slot::SlotDefinition};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of a single step
pub type StepResult = anyhow::Result<()>;

/// Task returned by a step callback
pub type StepFuture = BoxFuture<'static, StepResult>;

type InitFn = Arc<dyn Fn(Arc<PipelineContext>) -> StepFuture + Send + Sync>;
type ConfigureFn = Arc<dyn Fn(Arc<PipelineContext>, Arc<[AdSlotConfig]>) -> StepFuture + Send + Sync>;
type DefineSlotsFn = Arc<
    dyn Fn(Arc<PipelineContext>, Arc<[AdSlotConfig]>) -> BoxFuture<'static, anyhow::Result<Vec<SlotDefinition>>>
        + Send
        + Sync,
>;
type SlotsFn = Arc<dyn Fn(Arc<PipelineContext>, Arc<[SlotDefinition]>) -> StepFuture + Send + Sync>;

/// The six phases of a pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Configure,
    DefineSlots,
    PrepareRequestAds,
    RequestBids,
    RequestAds,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Init,
        Phase::Configure,
        Phase::DefineSlots,
        Phase::PrepareRequestAds,
        Phase::RequestBids,
        Phase::RequestAds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Configure => "configure",
            Phase::DefineSlots => "defineSlots",
            Phase::PrepareRequestAds => "prepareRequestAds",
            Phase::RequestBids => "requestBids",
            Phase::RequestAds => "requestAds",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs once per engine instance
#[derive(Clone)]
pub struct InitStep {
    pub name: String,
    run: InitFn,
}

impl InitStep {
    pub fn call(&self, ctx: Arc<PipelineContext>) -> StepFuture {
        (self.run)(ctx)
    }
}

/// Runs with every pipeline run
#[derive(Clone)]
pub struct ConfigureStep {
    pub name: String,
    run: ConfigureFn,
}

impl ConfigureStep {
    pub fn call(&self, ctx: Arc<PipelineContext>, slots: Arc<[AdSlotConfig]>) -> StepFuture {
        (self.run)(ctx, slots)
    }
}

/// Produces the slot definitions of a run
#[derive(Clone)]
pub struct DefineSlotsStep {
    pub name: String,
    run: DefineSlotsFn,
}

impl DefineSlotsStep {
    pub fn call(
        &self,
        ctx: Arc<PipelineContext>,
        slots: Arc<[AdSlotConfig]>,
    ) -> BoxFuture<'static, anyhow::Result<Vec<SlotDefinition>>> {
        (self.run)(ctx, slots)
    }
}

/// Prepares targeting before bids are requested; higher priority runs first
#[derive(Clone)]
pub struct PrepareRequestAdsStep {
    pub name: String,
    pub priority: i32,
    run: SlotsFn,
}

impl PrepareRequestAdsStep {
    pub fn call(&self, ctx: Arc<PipelineContext>, slots: Arc<[SlotDefinition]>) -> StepFuture {
        (self.run)(ctx, slots)
    }
}

/// Requests bids from a demand source
#[derive(Clone)]
pub struct RequestBidsStep {
    pub name: String,
    run: SlotsFn,
}

impl RequestBidsStep {
    pub fn call(&self, ctx: Arc<PipelineContext>, slots: Arc<[SlotDefinition]>) -> StepFuture {
        (self.run)(ctx, slots)
    }
}

/// Performs the actual ad server call
#[derive(Clone)]
pub struct RequestAdsStep {
    pub name: String,
    run: SlotsFn,
}

impl RequestAdsStep {
    pub fn call(&self, ctx: Arc<PipelineContext>, slots: Arc<[SlotDefinition]>) -> StepFuture {
        (self.run)(ctx, slots)
    }
}

macro_rules! impl_step_debug {
    ($($step:ty),*) => {
        $(
            impl std::fmt::Debug for $step {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct(stringify!($step)).field("name", &self.name).finish_non_exhaustive()
                }
            }
        )*
    };
}

impl_step_debug!(InitStep, ConfigureStep, DefineSlotsStep, RequestBidsStep, RequestAdsStep);

impl std::fmt::Debug for PrepareRequestAdsStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrepareRequestAdsStep")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

pub fn mk_init_step<F, Fut>(name: impl Into<String>, f: F) -> InitStep
where
    F: Fn(Arc<PipelineContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    InitStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>| f(ctx).boxed()),
    }
}

pub fn mk_configure_step<F, Fut>(name: impl Into<String>, f: F) -> ConfigureStep
where
    F: Fn(Arc<PipelineContext>, Arc<[AdSlotConfig]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    ConfigureStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[AdSlotConfig]>| f(ctx, slots).boxed()),
    }
}

/// Configure step that only fires on the first run of the first `requestAds()` cycle
pub fn mk_configure_step_once<F, Fut>(name: impl Into<String>, f: F) -> ConfigureStep
where
    F: Fn(Arc<PipelineContext>, Arc<[AdSlotConfig]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    ConfigureStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[AdSlotConfig]>| {
            if ctx.is_first_run() {
                f(ctx, slots).boxed()
            } else {
                futures::future::ok::<(), anyhow::Error>(()).boxed()
            }
        }),
    }
}

/// Configure step that fires once per public `requestAds()` cycle
///
/// Bucket runs sharing a `request_ads_calls` value only trigger it once.
pub fn mk_configure_step_once_per_request_ads_cycle<F, Fut>(name: impl Into<String>, f: F) -> ConfigureStep
where
    F: Fn(Arc<PipelineContext>, Arc<[AdSlotConfig]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    let last_cycle = Arc::new(AtomicU64::new(0));
    ConfigureStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[AdSlotConfig]>| {
            let previous = last_cycle.swap(ctx.request_ads_calls, Ordering::SeqCst);
            if previous != ctx.request_ads_calls {
                f(ctx, slots).boxed()
            } else {
                futures::future::ok::<(), anyhow::Error>(()).boxed()
            }
        }),
    }
}

pub fn mk_define_slots_step<F, Fut>(name: impl Into<String>, f: F) -> DefineSlotsStep
where
    F: Fn(Arc<PipelineContext>, Arc<[AdSlotConfig]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<SlotDefinition>>> + Send + 'static,
{
    DefineSlotsStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[AdSlotConfig]>| f(ctx, slots).boxed()),
    }
}

pub fn mk_prepare_request_ads_step<F, Fut>(name: impl Into<String>, priority: i32, f: F) -> PrepareRequestAdsStep
where
    F: Fn(Arc<PipelineContext>, Arc<[SlotDefinition]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    PrepareRequestAdsStep {
        name: name.into(),
        priority,
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[SlotDefinition]>| f(ctx, slots).boxed()),
    }
}

pub fn mk_request_bids_step<F, Fut>(name: impl Into<String>, f: F) -> RequestBidsStep
where
    F: Fn(Arc<PipelineContext>, Arc<[SlotDefinition]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    RequestBidsStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[SlotDefinition]>| f(ctx, slots).boxed()),
    }
}

pub fn mk_request_ads_step<F, Fut>(name: impl Into<String>, f: F) -> RequestAdsStep
where
    F: Fn(Arc<PipelineContext>, Arc<[SlotDefinition]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    RequestAdsStep {
        name: name.into(),
        run: Arc::new(move |ctx: Arc<PipelineContext>, slots: Arc<[SlotDefinition]>| f(ctx, slots).boxed()),
    }
}

/// Complete step bundle executed by the engine
#[derive(Debug, Clone)]
pub struct PipelineConfiguration {
    pub init: Vec<InitStep>,
    pub configure: Vec<ConfigureStep>,
    pub define_slots: DefineSlotsStep,
    pub prepare_request_ads: Vec<PrepareRequestAdsStep>,
    pub request_bids: Vec<RequestBidsStep>,
    pub request_ads: RequestAdsStep,
}

impl PipelineConfiguration {
    /// Bundle with only the mandatory producer and consumer
    pub fn new(define_slots: DefineSlotsStep, request_ads: RequestAdsStep) -> Self {
        Self {
            init: Vec::new(),
            configure: Vec::new(),
            define_slots,
            prepare_request_ads: Vec::new(),
            request_bids: Vec::new(),
            request_ads,
        }
    }

    /// Append the steps a module contributes
    pub fn extend_with(&mut self, module: &dyn crate::core::services::TagModule) {
        self.init.extend(module.init_steps());
        self.configure.extend(module.configure_steps());
        self.prepare_request_ads.extend(module.prepare_request_ads_steps());
        self.request_bids.extend(module.request_bids_steps());
    }

    /// prepareRequestAds steps by descending priority, registration order for ties
    pub fn prepare_request_ads_by_priority(&self) -> Vec<PrepareRequestAdsStep> {
        let mut steps = self.prepare_request_ads.clone();
        steps.sort_by(|a, b| b.priority.cmp(&a.priority));
        steps
    }
}
