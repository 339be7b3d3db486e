//! Environment selection and page overrides

use crate::core::services::BrowserHost;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Query parameter and storage key used to override the environment
pub const ENVIRONMENT_OVERRIDE_KEY: &str = "adtagEnv";

/// Environment the tag runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("Invalid environment: {}", other)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Test => f.write_str("test"),
        }
    }
}

/// Resolve the environment
///
/// Precedence: query parameter, session storage, local storage, the configured
/// value, then production. Invalid values are skipped.
pub fn resolve_environment(host: &dyn BrowserHost, configured: Option<Environment>) -> Environment {
    let overrides = [
        ("query parameter", host.query_param(ENVIRONMENT_OVERRIDE_KEY)),
        ("session storage", host.session_storage(ENVIRONMENT_OVERRIDE_KEY)),
        ("local storage", host.local_storage(ENVIRONMENT_OVERRIDE_KEY)),
    ];

    for (source, value) in overrides {
        let Some(value) = value else { continue };
        match value.parse::<Environment>() {
            Ok(environment) => {
                debug!(%environment, source, "environment override");
                return environment;
            }
            Err(e) => debug!(source, "ignoring environment override: {}", e),
        }
    }

    configured.unwrap_or_default()
}
