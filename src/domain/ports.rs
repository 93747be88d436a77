use crate::domain::model::{
    ActorId, ActorSettings, Capability, EngineStorage, FillAmount, LengthClass, ModuleId, Pose,
    Preset, PresetScope, Socket, VehicleHandle,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glam::{Quat, Vec3};

#[async_trait]
pub trait EntityFactory: Send {
    /// `randomize_modules` lets the factory pick its own module set.
    fn create(
        &mut self,
        owner: ActorId,
        length: LengthClass,
        pose: Pose,
        randomize_modules: bool,
    ) -> Result<VehicleHandle>;

    fn destroy(&mut self, handle: VehicleHandle) -> Result<()>;

    fn exists(&self, handle: VehicleHandle) -> bool;

    fn socket_count(&self, handle: VehicleHandle) -> Result<usize>;

    /// Resolves once every module added so far has finished attaching.
    async fn await_attached(&mut self, handle: VehicleHandle) -> Result<()>;

    fn relocate(&mut self, handle: VehicleHandle, pose: Pose) -> Result<()>;

    fn is_held_by_lift(&self, handle: VehicleHandle) -> bool;

    fn release_from_lift(&mut self, handle: VehicleHandle) -> Result<()>;

    fn is_occupied(&self, handle: VehicleHandle) -> bool;

    fn dismount_all(&mut self, handle: VehicleHandle) -> Result<()>;

    /// Code lock whose code is known to `owner`.
    fn add_code_lock(&mut self, handle: VehicleHandle, owner: ActorId) -> Result<()>;

    /// Key lock plus a matching key handed to `owner`.
    fn add_key_lock(&mut self, handle: VehicleHandle, owner: ActorId) -> Result<()>;
}

pub trait InventorySystem: Send {
    fn sockets(&self, handle: VehicleHandle) -> Result<Vec<Socket>>;

    fn remove_module(&mut self, handle: VehicleHandle, index: usize) -> Result<()>;

    /// Returns `false` when the module could not be attached at `index`.
    fn add_module(&mut self, handle: VehicleHandle, index: usize, module: ModuleId) -> Result<bool>;

    /// Engine storages of attached engine modules, in module order.
    fn engine_storages(&self, handle: VehicleHandle) -> Result<Vec<EngineStorage>>;

    fn store_engine_storages(
        &mut self,
        handle: VehicleHandle,
        storages: Vec<EngineStorage>,
    ) -> Result<()>;

    fn is_dead(&self, handle: VehicleHandle) -> Result<bool>;

    fn revive(&mut self, handle: VehicleHandle) -> Result<()>;

    /// Restores health of the vehicle and all of its modules.
    fn restore_health(&mut self, handle: VehicleHandle) -> Result<()>;

    fn top_up_fuel(&mut self, handle: VehicleHandle, amount: FillAmount) -> Result<()>;

    /// Returns the number of liquid containers that received liquid.
    fn fill_liquid_containers(&mut self, handle: VehicleHandle, amount: FillAmount) -> Result<usize>;
}

/// Physics layers, combined into masks for probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Layer {
    Default = 1 << 0,
    Terrain = 1 << 1,
    World = 1 << 2,
    Construction = 1 << 3,
    Deployed = 1 << 4,
    Player = 1 << 5,
    Ai = 1 << 6,
    VehicleDetailed = 1 << 7,
    VehicleWorld = 1 << 8,
    Tree = 1 << 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const fn of(layers: &[Layer]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < layers.len() {
            bits |= layers[i] as u32;
            i += 1;
        }
        Self(bits)
    }

    pub fn contains(self, layer: Layer) -> bool {
        self.0 & layer as u32 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeHit {
    pub point: Vec3,
    pub normal: Vec3,
}

/// Oriented box swept along `direction` for `distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCast {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
    pub direction: Vec3,
    pub distance: f32,
}

pub trait PhysicsProbe: Send {
    fn probe_down(&self, origin: Vec3, max_distance: f32, layers: LayerMask) -> Option<ProbeHit>;

    fn box_cast_hits(&self, cast: &BoxCast, layers: LayerMask) -> bool;
}

/// Presets and per-actor settings. Name lookups are case-insensitive.
pub trait PresetStore: Send {
    fn list(&self, scope: &PresetScope) -> Vec<Preset>;

    fn actor_settings(&self, actor: ActorId) -> ActorSettings;

    fn store_actor_settings(&mut self, actor: ActorId, settings: ActorSettings) -> Result<()>;

    fn insert(&mut self, scope: &PresetScope, preset: Preset) -> Result<()>;

    fn replace(&mut self, scope: &PresetScope, preset: Preset) -> Result<()>;

    fn rename(&mut self, scope: &PresetScope, old_name: &str, new_name: &str) -> Result<()>;

    fn remove(&mut self, scope: &PresetScope, name: &str) -> Result<()>;

    fn find_exact(&self, scope: &PresetScope, name: &str) -> Option<Preset> {
        self.list(scope)
            .into_iter()
            .find(|preset| preset.name_matches(name))
    }
}

pub trait PermissionService: Send {
    /// 0 means the actor may not spawn vehicles at all.
    fn max_sockets(&self, actor: ActorId) -> usize;

    fn engine_tier_ceiling(&self, actor: ActorId) -> u8;

    fn allows(&self, actor: ActorId, capability: Capability) -> bool;
}

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
