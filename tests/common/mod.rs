#![allow(dead_code)]

use chrono::{DateTime, Utc};
use glam::Vec3;
use modcar_provision::adapters::memory::{ManualClock, MemoryPresetStore, MemoryWorld, StaticPermissions};
use modcar_provision::domain::model::{ActorId, ModuleId};
use modcar_provision::{LayoutRequest, ProvisionRequest, Provisioner, ProvisionerConfig};

pub type TestProvisioner = Provisioner<MemoryWorld, MemoryPresetStore, StaticPermissions, ManualClock>;

pub const ACTOR: ActorId = ActorId(76561198000000001);
pub const OTHER: ActorId = ActorId(76561198000000002);

pub const COCKPIT: ModuleId = ModuleId(100);
pub const STORAGE: ModuleId = ModuleId(200);
pub const ENGINE: ModuleId = ModuleId(300);
pub const FLATBED: ModuleId = ModuleId(400);
pub const TANKER: ModuleId = ModuleId(500);

pub const CONFIG: &str = r#"
[lift]
attempts = 3
interval_ms = 1

[[modules]]
id = 100
category = "seating"
span = 1

[[modules]]
id = 200
category = "storage"
span = 1

[[modules]]
id = 300
category = "engine"
span = 1
engine_slots = ["crankshaft", "piston", "piston", "valve"]

[[modules]]
id = 400
category = "generic"
span = 2

[[modules]]
id = 500
category = "storage"
span = 1
liquid_capacity = 1000

[[server_presets]]
name = "Flatbed"
module_ids = [100, 400]
engine_tier = 2
fuel_amount = -1

[[server_presets]]
name = "Secure"
module_ids = [100, 200]
code_lock = true
key_lock = true
"#;

pub fn start_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn ids(raw: &[i32]) -> Vec<ModuleId> {
    raw.iter().copied().map(ModuleId).collect()
}

pub fn build(permissions: StaticPermissions, store: MemoryPresetStore) -> (TestProvisioner, ManualClock) {
    let config = ProvisionerConfig::from_toml_str(CONFIG).unwrap();
    let world = MemoryWorld::flat(config.module_catalog(), 0.0);
    let clock = ManualClock::new(start_time());
    let provisioner = Provisioner::new(world, store, permissions, clock.clone(), config);
    (provisioner, clock)
}

pub fn provisioner() -> (TestProvisioner, ManualClock) {
    build(StaticPermissions::allow_all(4, 3), MemoryPresetStore::new())
}

pub fn request(raw: &[i32]) -> ProvisionRequest {
    ProvisionRequest::new(LayoutRequest::Modules(ids(raw)), Vec3::ZERO, Vec3::Z)
}
