//! Dry-run ad network used by the `adtag` binary
//!
//! Defines in-memory slots and records every ad server request instead of
//! sending it.

use crate::core::{
    config::TagConfig,
    services::AdNetworkAdapter,
    slot::{SlotDefinition, StaticAdSlot},
    step::{
        mk_configure_step_once, mk_define_slots_step, mk_init_step, mk_prepare_request_ads_step,
        mk_request_ads_step, PipelineConfiguration,
    },
    TargetingValue,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const SOURCE: &str = "DryRun";
const LIBRARY_URL: &str = "https://securepubads.g.doubleclick.net/tag/js/gpt.js";

/// A slot as it would have been sent to the ad server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedSlot {
    pub dom_id: String,
    pub ad_unit_path: String,
    pub sizes: Vec<[u32; 2]>,
    pub targeting: BTreeMap<String, TargetingValue>,
}

/// One recorded ad server request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRequest {
    pub request_id: u64,
    pub request_ads_calls: u64,
    pub bucket: Option<String>,
    pub slots: Vec<DisplayedSlot>,
}

/// Ad network that never leaves the process
#[derive(Debug, Clone, Default)]
pub struct DryRunAdapter {
    requests: Arc<Mutex<Vec<DisplayRequest>>>,
}

impl DryRunAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests recorded so far, oldest first
    pub async fn requests(&self) -> Vec<DisplayRequest> {
        self.requests.lock().await.clone()
    }
}

impl AdNetworkAdapter for DryRunAdapter {
    fn pipeline_configuration(&self, _config: &TagConfig) -> PipelineConfiguration {
        let define_slots = mk_define_slots_step("dry-run:define-slots", |ctx, slots| async move {
            let active_labels = ctx.active_labels();
            let mut definitions = Vec::new();
            for slot in slots.iter() {
                if !ctx.label_config_service.filter_slot(slot, &active_labels) {
                    debug!(slot = %slot.dom_id, "slot filtered by labels");
                    continue;
                }
                let path = match ctx.resolve_ad_unit_path(&slot.ad_unit_path) {
                    Ok(path) => path,
                    Err(e) => {
                        ctx.logger.error(SOURCE, &format!("slot '{}' skipped: {}", slot.dom_id, e));
                        continue;
                    }
                };
                if ctx.auction.is_slot_throttled(&slot.dom_id, &path) {
                    ctx.logger.info(SOURCE, &format!("slot '{}' is throttled", slot.dom_id));
                    continue;
                }
                let handle = Arc::new(StaticAdSlot::new(slot.dom_id.clone(), path));
                definitions.push(SlotDefinition::new(slot.clone(), handle));
            }
            Ok(definitions)
        });

        let requests = self.requests.clone();
        let request_ads = mk_request_ads_step("dry-run:display", move |ctx, slots| {
            let requests = requests.clone();
            async move {
                let page_keys: Vec<String> = ctx
                    .runtime_config
                    .page_targeting(Some(&ctx.config))
                    .into_keys()
                    .collect();
                let displayed: Vec<DisplayedSlot> = slots
                    .iter()
                    .map(|definition| DisplayedSlot {
                        dom_id: definition.dom_id().to_string(),
                        ad_unit_path: definition.ad_slot.ad_unit_path().to_string(),
                        sizes: definition.supported_sizes(),
                        targeting: page_keys
                            .iter()
                            .filter_map(|key| {
                                definition
                                    .ad_slot
                                    .targeting(key)
                                    .map(|value| (key.clone(), value))
                            })
                            .collect(),
                    })
                    .collect();

                ctx.logger.info(
                    SOURCE,
                    &format!("display {} slot(s) for request {}", displayed.len(), ctx.request_id),
                );
                requests.lock().await.push(DisplayRequest {
                    request_id: ctx.request_id,
                    request_ads_calls: ctx.request_ads_calls,
                    bucket: ctx.bucket.as_ref().map(|bucket| bucket.name.clone()),
                    slots: displayed,
                });
                Ok(())
            }
        });

        let mut configuration = PipelineConfiguration::new(define_slots, request_ads);

        configuration.init.push(mk_init_step("dry-run:load-library", |ctx| async move {
            ctx.asset_loader.load_script(LIBRARY_URL).await
        }));

        configuration
            .configure
            .push(mk_configure_step_once("dry-run:enable-services", |ctx, _| async move {
                ctx.logger.debug(SOURCE, &format!("services enabled ({})", ctx.env));
                Ok(())
            }));

        configuration.prepare_request_ads.push(mk_prepare_request_ads_step(
            "dry-run:page-targeting",
            0,
            |ctx, slots| async move {
                let targeting = ctx.runtime_config.page_targeting(Some(&ctx.config));
                for definition in slots.iter() {
                    for (key, value) in &targeting {
                        definition.ad_slot.set_targeting(key, value.clone());
                    }
                }
                Ok(())
            },
        ));

        configuration
    }
}
