pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ProvisionerConfig;

pub use core::provisioner::{
    LayoutRequest, PlacementMode, ProvisionRequest, ProvisionStage, Provisioned, Provisioner,
};
pub use utils::error::{ProvisionError, Result};
