//! Ad unit path templates

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ad unit path '{path}' uses variable '{variable}' which has no value")]
pub struct AdUnitPathError {
    pub path: String,
    pub variable: String,
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_\-]+)\}").expect("placeholder pattern is valid"))
}

/// Substitute `{name}` placeholders in an ad unit path
///
/// Fails on the first placeholder without a value.
pub fn resolve_ad_unit_path(
    path: &str,
    variables: &HashMap<String, String>,
) -> Result<String, AdUnitPathError> {
    if let Some(missing) = placeholder()
        .captures_iter(path)
        .map(|captures| captures[1].to_string())
        .find(|name| !variables.contains_key(name))
    {
        return Err(AdUnitPathError {
            path: path.to_string(),
            variable: missing,
        });
    }

    let resolved = placeholder().replace_all(path, |captures: &regex::Captures<'_>| {
        variables.get(&captures[1]).cloned().unwrap_or_default()
    });
    Ok(resolved.into_owned())
}
