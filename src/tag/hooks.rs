//! beforeRequestAds / afterRequestAds hooks

use crate::core::{config::TagConfig, services::LoggerHandle, state::StateSnapshot};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

const SOURCE: &str = "Hooks";

pub type BeforeRequestAdsHook = Arc<dyn Fn(&TagConfig) -> anyhow::Result<()> + Send + Sync>;
pub type AfterRequestAdsHook = Arc<dyn Fn(&StateSnapshot) -> anyhow::Result<()> + Send + Sync>;

/// Hooks registered before the first `requestAds()` call
#[derive(Clone, Default)]
pub struct Hooks {
    before: Vec<BeforeRequestAdsHook>,
    after: Vec<AfterRequestAdsHook>,
}

impl Hooks {
    pub fn push_before(&mut self, hook: BeforeRequestAdsHook) {
        self.before.push(hook);
    }

    pub fn push_after(&mut self, hook: AfterRequestAdsHook) {
        self.after.push(hook);
    }

    /// Run every beforeRequestAds hook; failures are logged
    pub fn run_before(&self, config: &TagConfig, logger: &LoggerHandle) {
        for hook in &self.before {
            guarded("beforeRequestAds", logger, || hook(config));
        }
    }

    /// Run every afterRequestAds hook; failures are logged
    pub fn run_after(&self, snapshot: &StateSnapshot, logger: &LoggerHandle) {
        for hook in &self.after {
            guarded("afterRequestAds", logger, || hook(snapshot));
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

fn guarded<F>(kind: &str, logger: &LoggerHandle, hook: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => logger.error(SOURCE, &format!("{} hook failed: {:#}", kind, e)),
        Err(payload) => logger.error(
            SOURCE,
            &format!("{} hook panicked: {}", kind, panic_message(payload.as_ref())),
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
