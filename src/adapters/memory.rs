//! In-memory collaborators: a flat test world, a preset store, static
//! permissions and a manual clock. Used by the CLI simulation and the tests.

use crate::domain::model::{
    ActorId, ActorSettings, Capability, EngineStorage, FillAmount, LengthClass, ModuleCatalog, ModuleCategory,
    ModuleId, Pose, Preset, PresetScope, Socket, VehicleHandle,
};
use crate::domain::ports::{
    BoxCast, Clock, EntityFactory, InventorySystem, Layer, LayerMask, PermissionService,
    PhysicsProbe, PresetStore, ProbeHit,
};
use crate::utils::error::{ProvisionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glam::{Vec2, Vec3};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ground {
    /// Height at the origin plus a gradient along x/z.
    Plane { height: f32, slope: Vec2 },
    Void,
}

impl Ground {
    fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        match self {
            Self::Plane { height, slope } => Some(height + slope.x * x + slope.y * z),
            Self::Void => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub min: Vec3,
    pub max: Vec3,
    pub layer: Layer,
}

#[derive(Debug, Clone)]
pub struct MemoryVehicle {
    pub owner: ActorId,
    pub length: LengthClass,
    pub pose: Pose,
    pub sockets: Vec<Socket>,
    /// Attached engine storages keyed by socket.
    pub engines: BTreeMap<usize, EngineStorage>,
    /// (amount, capacity) of attached liquid containers keyed by socket.
    pub liquids: BTreeMap<usize, (u32, u32)>,
    pub pending_attach: Vec<usize>,
    pub health: f32,
    pub max_health: f32,
    pub dead: bool,
    pub fuel: u32,
    pub fuel_capacity: u32,
    pub occupants: u32,
    pub on_lift: bool,
    /// Times the lift grabs the vehicle back after a release.
    pub lift_regrabs: u32,
    pub code_lock: Option<ActorId>,
    pub key_lock: Option<ActorId>,
    /// Pending modules never attach; `await_attached` fails instead.
    pub attach_fails: bool,
}

pub struct MemoryWorld {
    catalog: ModuleCatalog,
    ground: Ground,
    obstacles: Vec<Obstacle>,
    vehicles: HashMap<VehicleHandle, MemoryVehicle>,
    next_handle: u64,
}

impl MemoryWorld {
    pub fn new(catalog: ModuleCatalog, ground: Ground) -> Self {
        Self {
            catalog,
            ground,
            obstacles: Vec::new(),
            vehicles: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn flat(catalog: ModuleCatalog, height: f32) -> Self {
        Self::new(
            catalog,
            Ground::Plane {
                height,
                slope: Vec2::ZERO,
            },
        )
    }

    pub fn set_ground(&mut self, ground: Ground) {
        self.ground = ground;
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    pub fn vehicle(&self, handle: VehicleHandle) -> Option<&MemoryVehicle> {
        self.vehicles.get(&handle)
    }

    pub fn vehicle_mut(&mut self, handle: VehicleHandle) -> Option<&mut MemoryVehicle> {
        self.vehicles.get_mut(&handle)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    fn get(&self, handle: VehicleHandle) -> Result<&MemoryVehicle> {
        self.vehicles.get(&handle).ok_or_else(|| missing(handle))
    }

    fn get_mut(&mut self, handle: VehicleHandle) -> Result<&mut MemoryVehicle> {
        self.vehicles.get_mut(&handle).ok_or_else(|| missing(handle))
    }

    fn random_layout(&self, count: usize) -> Vec<Socket> {
        let single_span: Vec<ModuleId> = self
            .catalog
            .ids()
            .into_iter()
            .filter(|id| self.catalog.span(*id) == Some(1))
            .collect();

        (0..count)
            .map(|index| match single_span.get(index % single_span.len().max(1)) {
                Some(&module) => Socket::primary(module),
                None => Socket::Empty,
            })
            .collect()
    }
}

fn missing(handle: VehicleHandle) -> ProvisionError {
    ProvisionError::Collaborator {
        message: format!("vehicle {:?} does not exist", handle),
    }
}

#[async_trait]
impl EntityFactory for MemoryWorld {
    fn create(
        &mut self,
        owner: ActorId,
        length: LengthClass,
        pose: Pose,
        randomize_modules: bool,
    ) -> Result<VehicleHandle> {
        let handle = VehicleHandle(self.next_handle);
        self.next_handle += 1;

        let count = length.socket_count();
        let sockets = if randomize_modules {
            self.random_layout(count)
        } else {
            vec![Socket::Empty; count]
        };
        let pending_attach = sockets
            .iter()
            .enumerate()
            .filter(|(_, socket)| socket.primary_module().is_some())
            .map(|(index, _)| index)
            .collect();

        self.vehicles.insert(
            handle,
            MemoryVehicle {
                owner,
                length,
                pose,
                sockets,
                engines: BTreeMap::new(),
                liquids: BTreeMap::new(),
                pending_attach,
                health: 1000.0,
                max_health: 1000.0,
                dead: false,
                fuel: 0,
                fuel_capacity: 500,
                occupants: 0,
                on_lift: false,
                lift_regrabs: 0,
                code_lock: None,
                key_lock: None,
                attach_fails: false,
            },
        );
        Ok(handle)
    }

    fn destroy(&mut self, handle: VehicleHandle) -> Result<()> {
        self.vehicles.remove(&handle).map(|_| ()).ok_or_else(|| missing(handle))
    }

    fn exists(&self, handle: VehicleHandle) -> bool {
        self.vehicles.contains_key(&handle)
    }

    fn socket_count(&self, handle: VehicleHandle) -> Result<usize> {
        Ok(self.get(handle)?.sockets.len())
    }

    async fn await_attached(&mut self, handle: VehicleHandle) -> Result<()> {
        tokio::task::yield_now().await;

        let catalog = self.catalog.clone();
        let vehicle = self.get_mut(handle)?;
        if vehicle.attach_fails && !vehicle.pending_attach.is_empty() {
            return Err(ProvisionError::Collaborator {
                message: format!("modules of vehicle {:?} failed to attach", handle),
            });
        }
        for socket in std::mem::take(&mut vehicle.pending_attach) {
            let Some(module) = vehicle.sockets.get(socket).and_then(Socket::primary_module) else {
                continue;
            };
            let Some(entry) = catalog.get(module) else {
                continue;
            };
            if entry.category == ModuleCategory::Engine {
                vehicle
                    .engines
                    .insert(socket, EngineStorage::empty(socket, &entry.engine_slots));
            }
            if let Some(capacity) = entry.liquid_capacity {
                vehicle.liquids.insert(socket, (0, capacity));
            }
        }
        Ok(())
    }

    fn relocate(&mut self, handle: VehicleHandle, pose: Pose) -> Result<()> {
        self.get_mut(handle)?.pose = pose;
        Ok(())
    }

    fn is_held_by_lift(&self, handle: VehicleHandle) -> bool {
        self.vehicles.get(&handle).is_some_and(|vehicle| vehicle.on_lift)
    }

    fn release_from_lift(&mut self, handle: VehicleHandle) -> Result<()> {
        let vehicle = self.get_mut(handle)?;
        if vehicle.lift_regrabs > 0 {
            vehicle.lift_regrabs -= 1;
        } else {
            vehicle.on_lift = false;
        }
        Ok(())
    }

    fn is_occupied(&self, handle: VehicleHandle) -> bool {
        self.vehicles
            .get(&handle)
            .is_some_and(|vehicle| vehicle.occupants > 0)
    }

    fn dismount_all(&mut self, handle: VehicleHandle) -> Result<()> {
        self.get_mut(handle)?.occupants = 0;
        Ok(())
    }

    fn add_code_lock(&mut self, handle: VehicleHandle, owner: ActorId) -> Result<()> {
        self.get_mut(handle)?.code_lock = Some(owner);
        Ok(())
    }

    fn add_key_lock(&mut self, handle: VehicleHandle, owner: ActorId) -> Result<()> {
        self.get_mut(handle)?.key_lock = Some(owner);
        Ok(())
    }
}

impl InventorySystem for MemoryWorld {
    fn sockets(&self, handle: VehicleHandle) -> Result<Vec<Socket>> {
        Ok(self.get(handle)?.sockets.clone())
    }

    fn remove_module(&mut self, handle: VehicleHandle, index: usize) -> Result<()> {
        let vehicle = self.get_mut(handle)?;
        let module = vehicle
            .sockets
            .get(index)
            .and_then(Socket::primary_module)
            .ok_or_else(|| ProvisionError::Collaborator {
                message: format!("socket {} holds no removable module", index),
            })?;

        vehicle.sockets[index] = Socket::Empty;
        if let Some(next) = vehicle.sockets.get_mut(index + 1) {
            if *next == Socket::continuation(module) {
                *next = Socket::Empty;
            }
        }
        vehicle.engines.remove(&index);
        vehicle.liquids.remove(&index);
        vehicle.pending_attach.retain(|&socket| socket != index);
        Ok(())
    }

    fn add_module(&mut self, handle: VehicleHandle, index: usize, module: ModuleId) -> Result<bool> {
        let span = self.catalog.span(module).unwrap_or(1);
        let vehicle = self.get_mut(handle)?;

        let free = (index..index + span).all(|socket| {
            vehicle
                .sockets
                .get(socket)
                .is_some_and(|state| state.is_empty())
        });
        if !free {
            return Ok(false);
        }

        vehicle.sockets[index] = Socket::primary(module);
        if span == 2 {
            vehicle.sockets[index + 1] = Socket::continuation(module);
        }
        vehicle.pending_attach.push(index);
        Ok(true)
    }

    fn engine_storages(&self, handle: VehicleHandle) -> Result<Vec<EngineStorage>> {
        Ok(self.get(handle)?.engines.values().cloned().collect())
    }

    fn store_engine_storages(
        &mut self,
        handle: VehicleHandle,
        storages: Vec<EngineStorage>,
    ) -> Result<()> {
        let vehicle = self.get_mut(handle)?;
        for storage in storages {
            if let Some(existing) = vehicle.engines.get_mut(&storage.socket) {
                *existing = storage;
            }
        }
        Ok(())
    }

    fn is_dead(&self, handle: VehicleHandle) -> Result<bool> {
        Ok(self.get(handle)?.dead)
    }

    fn revive(&mut self, handle: VehicleHandle) -> Result<()> {
        self.get_mut(handle)?.dead = false;
        Ok(())
    }

    fn restore_health(&mut self, handle: VehicleHandle) -> Result<()> {
        let vehicle = self.get_mut(handle)?;
        vehicle.health = vehicle.max_health;
        Ok(())
    }

    fn top_up_fuel(&mut self, handle: VehicleHandle, amount: FillAmount) -> Result<()> {
        let vehicle = self.get_mut(handle)?;
        let target = amount.resolve(vehicle.fuel_capacity);
        if vehicle.fuel < target {
            vehicle.fuel = target;
        }
        Ok(())
    }

    fn fill_liquid_containers(&mut self, handle: VehicleHandle, amount: FillAmount) -> Result<usize> {
        let vehicle = self.get_mut(handle)?;
        let mut filled = 0;
        for (current, capacity) in vehicle.liquids.values_mut() {
            let target = amount.resolve(*capacity);
            if *current < target {
                *current = target;
                filled += 1;
            }
        }
        Ok(filled)
    }
}

impl PhysicsProbe for MemoryWorld {
    fn probe_down(&self, origin: Vec3, max_distance: f32, layers: LayerMask) -> Option<ProbeHit> {
        if !layers.contains(Layer::Terrain) {
            return None;
        }
        let height = self.ground.height_at(origin.x, origin.z)?;
        let depth = origin.y - height;
        (0.0..=max_distance).contains(&depth).then(|| ProbeHit {
            point: Vec3::new(origin.x, height, origin.z),
            normal: Vec3::Y,
        })
    }

    /// Tests the axis-aligned bounds of the swept box, which over-approximates
    /// rotated boxes.
    fn box_cast_hits(&self, cast: &BoxCast, layers: LayerMask) -> bool {
        let sweep = cast.direction * cast.distance;
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    let corner = cast.center + cast.rotation * (cast.half_extents * Vec3::new(sx, sy, sz));
                    for point in [corner, corner + sweep] {
                        min = min.min(point);
                        max = max.max(point);
                    }
                }
            }
        }

        self.obstacles.iter().any(|obstacle| {
            layers.contains(obstacle.layer)
                && obstacle.min.cmple(max).all()
                && obstacle.max.cmpge(min).all()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPresetStore {
    presets: HashMap<PresetScope, Vec<Preset>>,
    settings: HashMap<ActorId, ActorSettings>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor_settings(mut self, actor: ActorId, settings: ActorSettings) -> Self {
        self.settings.insert(actor, settings);
        self
    }

    fn position(&self, scope: &PresetScope, name: &str) -> Option<usize> {
        self.presets
            .get(scope)?
            .iter()
            .position(|preset| preset.name_matches(name))
    }

    fn not_found(name: &str) -> ProvisionError {
        ProvisionError::PresetNotFound {
            name: name.to_string(),
        }
    }
}

impl PresetStore for MemoryPresetStore {
    fn list(&self, scope: &PresetScope) -> Vec<Preset> {
        self.presets.get(scope).cloned().unwrap_or_default()
    }

    fn actor_settings(&self, actor: ActorId) -> ActorSettings {
        self.settings.get(&actor).copied().unwrap_or_default()
    }

    fn store_actor_settings(&mut self, actor: ActorId, settings: ActorSettings) -> Result<()> {
        self.settings.insert(actor, settings);
        Ok(())
    }

    fn insert(&mut self, scope: &PresetScope, preset: Preset) -> Result<()> {
        if self.position(scope, &preset.name).is_some() {
            return Err(ProvisionError::PresetAlreadyExists { name: preset.name });
        }
        self.presets.entry(scope.clone()).or_default().push(preset);
        Ok(())
    }

    fn replace(&mut self, scope: &PresetScope, preset: Preset) -> Result<()> {
        let index = self
            .position(scope, &preset.name)
            .ok_or_else(|| Self::not_found(&preset.name))?;
        if let Some(presets) = self.presets.get_mut(scope) {
            presets[index] = preset;
        }
        Ok(())
    }

    fn rename(&mut self, scope: &PresetScope, old_name: &str, new_name: &str) -> Result<()> {
        let index = self
            .position(scope, old_name)
            .ok_or_else(|| Self::not_found(old_name))?;
        if let Some(presets) = self.presets.get_mut(scope) {
            presets[index].name = new_name.to_string();
        }
        Ok(())
    }

    fn remove(&mut self, scope: &PresetScope, name: &str) -> Result<()> {
        let index = self.position(scope, name).ok_or_else(|| Self::not_found(name))?;
        if let Some(presets) = self.presets.get_mut(scope) {
            presets.remove(index);
        }
        Ok(())
    }
}

/// Grants the same socket ceiling, tier ceiling and capabilities to every actor.
#[derive(Debug, Clone)]
pub struct StaticPermissions {
    pub max_sockets: usize,
    pub engine_tier: u8,
    pub capabilities: HashSet<Capability>,
}

impl StaticPermissions {
    pub fn allow_all(max_sockets: usize, engine_tier: u8) -> Self {
        Self {
            max_sockets,
            engine_tier,
            capabilities: [
                Capability::Fix,
                Capability::Fetch,
                Capability::Despawn,
                Capability::Presets,
                Capability::PresetLoad,
                Capability::CommonPresets,
                Capability::ManageCommonPresets,
                Capability::AutoFuel,
                Capability::AutoFillTankers,
                Capability::AutoCodeLock,
                Capability::AutoKeyLock,
                Capability::GiveVehicle,
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.capabilities.remove(&capability);
        self
    }
}

impl PermissionService for StaticPermissions {
    fn max_sockets(&self, _actor: ActorId) -> usize {
        self.max_sockets
    }

    fn engine_tier_ceiling(&self, _actor: ActorId) -> u8 {
        self.engine_tier
    }

    fn allows(&self, _actor: ActorId, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        self.millis.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
