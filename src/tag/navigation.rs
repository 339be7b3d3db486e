//! Navigation validation in single page application mode

use crate::core::{config::ValidateLocation, error::TagError, services::BrowserHost};
use serde::Serialize;

/// Location recorded at the end of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLocation {
    pub href: String,
    pub path: String,
}

impl PageLocation {
    pub fn current(host: &dyn BrowserHost) -> Self {
        Self {
            href: host.href(),
            path: host.pathname(),
        }
    }

    /// Whether two locations count as the same page under `mode`
    pub fn is_same_page(&self, other: &PageLocation, mode: ValidateLocation) -> bool {
        match mode {
            ValidateLocation::Href => self.href == other.href,
            ValidateLocation::Path => self.path == other.path,
            ValidateLocation::None => false,
        }
    }
}

/// Reject a new cycle on the page the last cycle ran on
pub fn validate_location(
    current: &PageLocation,
    last: &PageLocation,
    mode: ValidateLocation,
) -> Result<(), TagError> {
    if current.is_same_page(last, mode) {
        return Err(TagError::SameLocation { mode });
    }
    Ok(())
}
