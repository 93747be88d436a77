pub mod cooldown;
pub mod engine_parts;
pub mod placement;
pub mod presets;
pub mod provisioner;
pub mod socket_planner;

pub use crate::domain::model::{ModuleCatalog, Part, PartCatalog, Pose, Preset, Socket};
pub use crate::domain::ports::{
    Clock, EntityFactory, InventorySystem, PermissionService, PhysicsProbe, PresetStore,
};
pub use crate::utils::error::Result;
