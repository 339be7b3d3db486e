//! Tag controller - public lifecycle, bucket splitting, SPA validation and
//! queued refreshes

pub mod buckets;
pub mod controller;
pub mod hooks;
pub mod navigation;
pub mod refresh;
mod state;

pub use buckets::{split_into_buckets, BucketGroup};
pub use controller::TagController;
pub use hooks::{AfterRequestAdsHook, BeforeRequestAdsHook, Hooks};
pub use navigation::{validate_location, PageLocation};
pub use refresh::{RefreshOptions, RefreshOutcome, RefreshTicket};
