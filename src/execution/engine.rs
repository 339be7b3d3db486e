//! Pipeline engine - executes one run of the six phases

use crate::{
    core::{
        config::{AdSlotConfig, TagConfig},
        context::{BucketContext, PipelineContext},
        error::PipelineError,
        runtime::RuntimeConfig,
        services::PipelineServices,
        slot::SlotDefinition,
        step::{Phase, PipelineConfiguration},
    },
    execution::{
        executor::{ExecutionResult, StepExecutor},
        scheduler::{PhaseScheduler, ScheduledStep},
    },
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

const SOURCE: &str = "AdPipeline";

/// Why a run ended before the requestAds phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The run was started without slots
    NoSlots,
    /// defineSlots produced no slot definitions
    NoDefinedSlots,
}

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        auction_id: Uuid,
        request_id: u64,
        request_ads_calls: u64,
        bucket: Option<String>,
        slots: usize,
        started_at: DateTime<Utc>,
    },
    PhaseStarted {
        request_id: u64,
        phase: Phase,
    },
    StepCompleted {
        request_id: u64,
        phase: Phase,
        step: String,
        elapsed: Duration,
    },
    StepFailed {
        request_id: u64,
        phase: Phase,
        step: String,
        error: String,
    },
    RunSkipped {
        request_id: u64,
        reason: SkipReason,
    },
    RunCompleted {
        request_id: u64,
        slots: Vec<String>,
        finished_at: DateTime<Utc>,
    },
    RunFailed {
        request_id: u64,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All phases ran; holds the dom ids of the requested slots
    Completed { request_id: u64, slots: Vec<String> },
    /// Run was started without slots; only init ran
    NoSlots { request_id: u64 },
    /// defineSlots produced nothing; the request phases were skipped
    NoDefinedSlots { request_id: u64 },
}

impl RunOutcome {
    pub fn request_id(&self) -> u64 {
        match self {
            RunOutcome::Completed { request_id, .. }
            | RunOutcome::NoSlots { request_id }
            | RunOutcome::NoDefinedSlots { request_id } => *request_id,
        }
    }
}

/// Pipeline engine owned by one tag controller
///
/// `request_id` and the init-once flag are instance scoped and never reset.
pub struct AdPipeline {
    configuration: PipelineConfiguration,
    services: PipelineServices,
    request_id: AtomicU64,
    init_consumed: AtomicBool,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl AdPipeline {
    pub fn new(configuration: PipelineConfiguration, services: PipelineServices) -> Self {
        Self {
            configuration,
            services,
            request_id: AtomicU64::new(0),
            init_consumed: AtomicBool::new(false),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Share event handlers with another owner (the tag controller)
    pub fn with_event_handlers(mut self, handlers: Arc<Mutex<Vec<EventHandler>>>) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: PipelineEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    pub fn configuration(&self) -> &PipelineConfiguration {
        &self.configuration
    }

    /// requestId of the most recent run, 0 before the first run
    pub fn last_request_id(&self) -> u64 {
        self.request_id.load(Ordering::SeqCst)
    }

    /// Execute one run of the pipeline
    pub async fn run(
        &self,
        slots: &[AdSlotConfig],
        config: Arc<TagConfig>,
        runtime_config: Arc<RuntimeConfig>,
        request_ads_calls: u64,
        bucket_name: Option<&str>,
    ) -> Result<RunOutcome, PipelineError> {
        let request_id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self
            .run_phases(request_id, slots, config, runtime_config, request_ads_calls, bucket_name)
            .await;

        match &result {
            Ok(RunOutcome::Completed { slots, .. }) => {
                info!(request_id, slots = slots.len(), "Pipeline run completed");
                self.emit_event(PipelineEvent::RunCompleted {
                    request_id,
                    slots: slots.clone(),
                    finished_at: Utc::now(),
                })
                .await;
            }
            Ok(RunOutcome::NoSlots { .. }) => {
                self.skip(request_id, SkipReason::NoSlots).await;
            }
            Ok(RunOutcome::NoDefinedSlots { .. }) => {
                self.skip(request_id, SkipReason::NoDefinedSlots).await;
            }
            Err(e) => {
                error!(request_id, "Pipeline run failed: {}", e);
                self.services
                    .logger
                    .error(SOURCE, &format!("run {} failed: {}", request_id, e));
                self.emit_event(PipelineEvent::RunFailed {
                    request_id,
                    error: e.to_string(),
                })
                .await;
            }
        }

        result
    }

    async fn skip(&self, request_id: u64, reason: SkipReason) {
        debug!(request_id, ?reason, "Pipeline run skipped remaining phases");
        self.emit_event(PipelineEvent::RunSkipped { request_id, reason }).await;
    }

    async fn run_phases(
        &self,
        request_id: u64,
        slots: &[AdSlotConfig],
        config: Arc<TagConfig>,
        runtime_config: Arc<RuntimeConfig>,
        request_ads_calls: u64,
        bucket_name: Option<&str>,
    ) -> Result<RunOutcome, PipelineError> {
        let ctx = Arc::new(
            self.build_context(request_id, config, runtime_config, request_ads_calls, bucket_name)
                .await?,
        );
        let executor = StepExecutor::new(request_id);

        info!(
            request_id,
            request_ads_calls,
            bucket = bucket_name.unwrap_or("-"),
            slots = slots.len(),
            "Starting pipeline run"
        );
        self.emit_event(PipelineEvent::RunStarted {
            auction_id: ctx.auction_id,
            request_id,
            request_ads_calls,
            bucket: bucket_name.map(str::to_string),
            slots: slots.len(),
            started_at: Utc::now(),
        })
        .await;

        // init is consumed by the first run, even if it fails
        if !self.init_consumed.swap(true, Ordering::SeqCst) {
            let steps = self
                .configuration
                .init
                .iter()
                .cloned()
                .map(|step| {
                    let ctx = ctx.clone();
                    ScheduledStep::new(step.name.clone(), move || step.call(ctx))
                })
                .collect();
            self.run_phase(Phase::Init, steps, &executor).await?;
        }

        if slots.is_empty() {
            self.services
                .logger
                .debug(SOURCE, &format!("run {} has no slots, skipping remaining phases", request_id));
            return Ok(RunOutcome::NoSlots { request_id });
        }

        let slot_configs: Arc<[AdSlotConfig]> = Arc::from(slots.to_vec());

        let steps = self
            .configuration
            .configure
            .iter()
            .cloned()
            .map(|step| {
                let ctx = ctx.clone();
                let slots = slot_configs.clone();
                ScheduledStep::new(step.name.clone(), move || step.call(ctx, slots))
            })
            .collect();
        self.run_phase(Phase::Configure, steps, &executor).await?;

        let definitions = self.define_slots(&ctx, slot_configs).await?;
        if definitions.is_empty() {
            self.services
                .logger
                .debug(SOURCE, &format!("run {} defined no slots, skipping request phases", request_id));
            return Ok(RunOutcome::NoDefinedSlots { request_id });
        }
        let definitions: Arc<[SlotDefinition]> = Arc::from(definitions);

        let steps = self
            .configuration
            .prepare_request_ads_by_priority()
            .into_iter()
            .map(|step| {
                let ctx = ctx.clone();
                let slots = definitions.clone();
                ScheduledStep::new(step.name.clone(), move || step.call(ctx, slots))
            })
            .collect();
        self.run_phase(Phase::PrepareRequestAds, steps, &executor).await?;

        let steps = self
            .configuration
            .request_bids
            .iter()
            .cloned()
            .map(|step| {
                let ctx = ctx.clone();
                let slots = definitions.clone();
                ScheduledStep::new(step.name.clone(), move || step.call(ctx, slots))
            })
            .collect();
        self.run_phase(Phase::RequestBids, steps, &executor).await?;

        let request_ads = self.configuration.request_ads.clone();
        let step = {
            let ctx = ctx.clone();
            let slots = definitions.clone();
            ScheduledStep::new(request_ads.name.clone(), move || request_ads.call(ctx, slots))
        };
        self.run_phase(Phase::RequestAds, vec![step], &executor).await?;

        Ok(RunOutcome::Completed {
            request_id,
            slots: definitions.iter().map(|d| d.dom_id().to_string()).collect(),
        })
    }

    async fn define_slots(
        &self,
        ctx: &Arc<PipelineContext>,
        slots: Arc<[AdSlotConfig]>,
    ) -> Result<Vec<SlotDefinition>, PipelineError> {
        let request_id = ctx.request_id;
        let step = &self.configuration.define_slots;
        self.emit_event(PipelineEvent::PhaseStarted {
            request_id,
            phase: Phase::DefineSlots,
        })
        .await;

        let started = std::time::Instant::now();
        match step.call(ctx.clone(), slots).await {
            Ok(definitions) => {
                debug!(request_id, defined = definitions.len(), "Slots defined");
                self.emit_event(PipelineEvent::StepCompleted {
                    request_id,
                    phase: Phase::DefineSlots,
                    step: step.name.clone(),
                    elapsed: started.elapsed(),
                })
                .await;
                Ok(definitions)
            }
            Err(source) => {
                self.emit_event(PipelineEvent::StepFailed {
                    request_id,
                    phase: Phase::DefineSlots,
                    step: step.name.clone(),
                    error: source.to_string(),
                })
                .await;
                Err(PipelineError::StepFailed {
                    phase: Phase::DefineSlots,
                    step: step.name.clone(),
                    source,
                })
            }
        }
    }

    /// Run one phase; the first failed step fails the whole run
    async fn run_phase(
        &self,
        phase: Phase,
        steps: Vec<ScheduledStep>,
        executor: &StepExecutor,
    ) -> Result<(), PipelineError> {
        let request_id = executor.request_id();
        self.emit_event(PipelineEvent::PhaseStarted { request_id, phase }).await;

        let results = PhaseScheduler::new(phase).run(steps, executor).await;

        let mut first_failure: Option<ExecutionResult> = None;
        for result in results {
            match &result.outcome {
                Ok(()) => {
                    self.emit_event(PipelineEvent::StepCompleted {
                        request_id,
                        phase,
                        step: result.step.clone(),
                        elapsed: result.elapsed,
                    })
                    .await;
                }
                Err(e) => {
                    self.emit_event(PipelineEvent::StepFailed {
                        request_id,
                        phase,
                        step: result.step.clone(),
                        error: e.to_string(),
                    })
                    .await;
                    if first_failure.is_none() {
                        first_failure = Some(result);
                    }
                }
            }
        }

        match first_failure.and_then(ExecutionResult::into_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn build_context(
        &self,
        request_id: u64,
        config: Arc<TagConfig>,
        runtime_config: Arc<RuntimeConfig>,
        request_ads_calls: u64,
        bucket_name: Option<&str>,
    ) -> Result<PipelineContext, PipelineError> {
        let consent = self
            .services
            .consent
            .snapshot()
            .await
            .map_err(PipelineError::Consent)?;

        let mut ad_unit_path_variables = self.services.default_ad_unit_path_variables();
        ad_unit_path_variables.extend(runtime_config.ad_unit_path_variables(Some(&config)));

        let bucket = bucket_name.map(|name| BucketContext {
            name: name.to_string(),
            timeout: config.buckets.timeout_for(name),
        });

        Ok(PipelineContext {
            auction_id: Uuid::new_v4(),
            request_id,
            request_ads_calls,
            env: runtime_config.environment,
            config,
            runtime_config,
            ad_unit_path_variables,
            consent,
            logger: self.services.logger.clone(),
            label_config_service: self.services.label_config_service.clone(),
            auction: self.services.auction.clone(),
            asset_loader: self.services.asset_loader.clone(),
            bucket,
        })
    }
}

impl std::fmt::Debug for AdPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdPipeline")
            .field("request_id", &self.last_request_id())
            .field("init_consumed", &self.init_consumed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
