//! Runtime configuration set through the public API

use crate::core::{
    config::{TagConfig, TargetingValue},
    environment::Environment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Targeting set at runtime (`setTargeting`, `addLabel`, `setAdUnitPathVariables`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Targeting {
    pub key_values: HashMap<String, TargetingValue>,
    pub labels: Vec<String>,
    pub ad_unit_path_variables: HashMap<String, String>,
}

impl Targeting {
    pub fn set_key_value(&mut self, key: String, value: TargetingValue) {
        self.key_values.insert(key, value);
    }

    pub fn add_label(&mut self, label: String) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    pub fn set_ad_unit_path_variables(&mut self, variables: HashMap<String, String>) {
        self.ad_unit_path_variables.extend(variables);
    }
}

/// Runtime configuration of the current page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub environment: Environment,

    #[serde(flatten)]
    pub targeting: Targeting,
}

impl RuntimeConfig {
    pub fn new(environment: Environment, targeting: Targeting) -> Self {
        Self {
            environment,
            targeting,
        }
    }

    /// Static key-values merged with runtime ones, runtime wins
    pub fn page_targeting(&self, config: Option<&TagConfig>) -> HashMap<String, TargetingValue> {
        let mut merged = config
            .map(|config| config.targeting.key_values.clone())
            .unwrap_or_default();
        merged.extend(self.targeting.key_values.clone());
        merged
    }

    /// Static labels followed by runtime labels
    pub fn active_labels(&self, config: &TagConfig) -> Vec<String> {
        let mut labels = config.targeting.labels.clone();
        for label in &self.targeting.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }

    /// Static path variables merged with runtime ones, runtime wins
    pub fn ad_unit_path_variables(&self, config: Option<&TagConfig>) -> HashMap<String, String> {
        let mut variables = config
            .map(|config| config.targeting.ad_unit_path_variables.clone())
            .unwrap_or_default();
        variables.extend(self.targeting.ad_unit_path_variables.clone());
        variables
    }
}
