//! OTA update checker for AospExtended builds.
//!
//! The workspace is split into focused crates, re-exported here:
//! - [`update`]: update records, build dates and comparison
//! - [`config`]: configuration, data directory and persisted check state
//! - [`core`]: the update check service, fetching, notification and observers
//! - [`utils`]: HTTP transport, system properties and time helpers

pub use ota_config as config;
pub use ota_core as core;
pub use ota_update as update;
pub use ota_utils as utils;

pub use ota_config::{FileStateStore, UpdaterConfig};
pub use ota_core::{CheckFinished, HttpUpdateSource, ServiceCommand, UpdateCheckService};
pub use ota_update::{BuildDate, UpdateRecord};
