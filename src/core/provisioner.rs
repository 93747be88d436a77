use crate::config::toml_config::{BehaviorSettings, FillSettings, LiftSettings, ProvisionerConfig, ServerPreset};
use crate::core::cooldown::CooldownGate;
use crate::core::engine_parts::{EnginePartAllocator, UpgradeReport};
use crate::core::placement::PlacementSolver;
use crate::core::presets::{resolve_unique, PresetBook, DEFAULT_PRESET_NAME};
use crate::core::socket_planner::{legacy_from_layout, ModuleSocketPlanner, SocketOp};
use crate::domain::model::{
    ActionKind, ActorId, ActorSetting, ActorSettings, Capability, FillAmount, LengthClass, ModuleCatalog, ModuleId, Part,
    PartCatalog, Pose, Preset, PresetScope, Socket, VehicleHandle,
};
use crate::domain::ports::{Clock, EntityFactory, InventorySystem, PermissionService, PhysicsProbe, PresetStore};
use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::validate_socket_count;
use glam::Vec3;
use serde::Serialize;
use std::collections::HashMap;

pub const MAX_ENGINE_TIER: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutRequest {
    /// Flat legacy encoding, one id per socket.
    Modules(Vec<ModuleId>),
    /// Let the entity factory pick the modules.
    Random(LengthClass),
}

impl LayoutRequest {
    fn length(&self) -> Result<LengthClass> {
        match self {
            Self::Modules(ids) => validate_socket_count(ids.len()),
            Self::Random(length) => Ok(*length),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    /// Fail unless a ground-fitted pose with clearance exists.
    #[default]
    Checked,
    /// Use the fixed pose in front of the actor when the solver fails.
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub layout: LayoutRequest,
    pub engine_tier: u8,
    pub fuel: FillAmount,
    pub liquid: FillAmount,
    pub actor_position: Vec3,
    pub actor_forward: Vec3,
    pub placement: PlacementMode,
    pub code_lock: bool,
    pub key_lock: bool,
    /// Register the vehicle as the actor's one tracked vehicle.
    pub track: bool,
    /// Apply the actor's socket ceiling, tier ceiling, fill permissions and spawn cooldown.
    pub enforce_limits: bool,
}

impl ProvisionRequest {
    pub fn new(layout: LayoutRequest, actor_position: Vec3, actor_forward: Vec3) -> Self {
        Self {
            layout,
            engine_tier: 0,
            fuel: FillAmount::None,
            liquid: FillAmount::None,
            actor_position,
            actor_forward,
            placement: PlacementMode::Checked,
            code_lock: false,
            key_lock: false,
            track: true,
            enforce_limits: true,
        }
    }

    pub fn with_engine_tier(mut self, tier: u8) -> Self {
        self.engine_tier = tier;
        self
    }

    pub fn with_fuel(mut self, fuel: FillAmount) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn with_liquid(mut self, liquid: FillAmount) -> Self {
        self.liquid = liquid;
        self
    }

    pub fn with_placement(mut self, placement: PlacementMode) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_locks(mut self, code_lock: bool, key_lock: bool) -> Self {
        self.code_lock = code_lock;
        self.key_lock = key_lock;
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track = false;
        self
    }

    pub fn unrestricted(mut self) -> Self {
        self.enforce_limits = false;
        self
    }
}

/// A vehicle is `Requested` once the entity exists and `Provisioned` after
/// its modules have attached and engine parts and fluids are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProvisionStage {
    Requested,
    Provisioned,
}

#[derive(Debug, Clone, Serialize)]
pub struct Provisioned {
    pub handle: VehicleHandle,
    pub pose: Pose,
    pub used_fallback_pose: bool,
    pub stage: ProvisionStage,
    pub socket_ops: Vec<SocketOp>,
    /// Adds the inventory refused.
    pub refused: Vec<SocketOp>,
    pub engine: UpgradeReport,
    pub liquid_containers_filled: usize,
    pub code_locked: bool,
    pub key_locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixReport {
    pub revived: bool,
    pub engine: UpgradeReport,
    pub liquid_containers_filled: usize,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub preset: Preset,
    pub socket_ops: Vec<SocketOp>,
    pub refused: Vec<SocketOp>,
    /// Parts above the actor's tier that found no slot in the new layout.
    pub leftover: Vec<Part>,
    pub discarded: usize,
    pub fix: FixReport,
}

/// Owns the collaborators, catalogs, cooldowns and tracked vehicles, and
/// drives every provisioning flow.
pub struct Provisioner<W, S, P, C>
where
    W: EntityFactory + InventorySystem + PhysicsProbe,
    S: PresetStore,
    P: PermissionService,
    C: Clock,
{
    world: W,
    presets: PresetBook<S>,
    permissions: P,
    clock: C,
    modules: ModuleCatalog,
    parts: PartCatalog,
    cooldowns: CooldownGate,
    solver: PlacementSolver,
    fill: FillSettings,
    lift: LiftSettings,
    behavior: BehaviorSettings,
    server_presets: Vec<ServerPreset>,
    vehicles: HashMap<ActorId, VehicleHandle>,
}

impl<W, S, P, C> Provisioner<W, S, P, C>
where
    W: EntityFactory + InventorySystem + PhysicsProbe,
    S: PresetStore,
    P: PermissionService,
    C: Clock,
{
    pub fn new(world: W, store: S, permissions: P, clock: C, config: ProvisionerConfig) -> Self {
        let server_presets = config.normalized_server_presets();
        Self {
            world,
            presets: PresetBook::new(store, config.presets.clone()),
            permissions,
            clock,
            modules: config.module_catalog(),
            parts: config.part_catalog(),
            cooldowns: CooldownGate::new(config.cooldowns.clone()),
            solver: PlacementSolver::new(config.placement.clone()),
            fill: config.fill,
            lift: config.lift,
            behavior: config.behavior,
            server_presets,
            vehicles: HashMap::new(),
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn presets(&self) -> &PresetBook<S> {
        &self.presets
    }

    pub fn cooldowns(&self) -> &CooldownGate {
        &self.cooldowns
    }

    pub fn module_catalog(&self) -> &ModuleCatalog {
        &self.modules
    }

    pub fn server_presets(&self) -> &[ServerPreset] {
        &self.server_presets
    }

    pub fn vehicle_of(&self, actor: ActorId) -> Option<VehicleHandle> {
        self.vehicles.get(&actor).copied()
    }

    /// Creates a vehicle for `actor` and brings it to the requested layout,
    /// engine tier and fill levels.
    pub async fn provision(&mut self, actor: ActorId, request: ProvisionRequest) -> Result<Provisioned> {
        let length = request.layout.length()?;
        let mut tier = request.engine_tier.min(MAX_ENGINE_TIER);

        if request.track && self.tracked(actor).is_ok() {
            return Err(ProvisionError::VehicleAlreadyExists);
        }

        if request.enforce_limits {
            if length.socket_count() > self.permissions.max_sockets(actor) {
                return Err(ProvisionError::PermissionDenied {
                    action: format!("spawn a {}-socket vehicle", length.socket_count()),
                });
            }
            self.cooldowns.check(actor, ActionKind::Spawn, self.clock.now())?;
            tier = tier.min(self.permissions.engine_tier_ceiling(actor));
        }

        let (ops, randomize) = match &request.layout {
            LayoutRequest::Modules(ids) => {
                let empty = vec![Socket::Empty; length.socket_count()];
                (ModuleSocketPlanner::new(&self.modules).reconcile(&empty, ids)?, false)
            }
            LayoutRequest::Random(_) => (Vec::new(), true),
        };

        let placed = self.solver.find_placement(
            &self.world,
            request.actor_position,
            request.actor_forward,
            length,
        );
        let (pose, used_fallback_pose) = match (placed, request.placement) {
            (Ok(pose), _) => (pose, false),
            (Err(e), PlacementMode::Checked) => return Err(e.into()),
            (Err(e), PlacementMode::BestEffort) => {
                tracing::debug!("Placement failed ({}), using fallback pose", e);
                (
                    self.solver
                        .fallback_pose(request.actor_position, request.actor_forward),
                    true,
                )
            }
        };

        let handle = self.world.create(actor, length, pose, randomize)?;

        let settled = self
            .settle(actor, handle, &request, tier, ops, pose, used_fallback_pose)
            .await;
        let provisioned = match settled {
            Ok(provisioned) => provisioned,
            Err(e) => {
                if let Err(cleanup) = self.world.destroy(handle) {
                    tracing::warn!("Failed to remove half-provisioned vehicle {:?}: {}", handle, cleanup);
                }
                return Err(e);
            }
        };

        if request.track {
            self.vehicles.insert(actor, handle);
        }
        if request.enforce_limits {
            self.cooldowns.start(actor, ActionKind::Spawn, self.clock.now());
        }

        tracing::info!(
            "🚗 Provisioned {:?} vehicle {:?} for actor {} ({} socket ops, engine tier {})",
            length,
            handle,
            actor,
            provisioned.socket_ops.len(),
            tier
        );
        Ok(provisioned)
    }

    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &mut self,
        actor: ActorId,
        handle: VehicleHandle,
        request: &ProvisionRequest,
        tier: u8,
        ops: Vec<SocketOp>,
        pose: Pose,
        used_fallback_pose: bool,
    ) -> Result<Provisioned> {
        let refused = ModuleSocketPlanner::new(&self.modules).apply(&mut self.world, handle, &ops)?;

        tracing::debug!("Vehicle {:?} {:?}, waiting for modules to attach", handle, ProvisionStage::Requested);
        self.world.await_attached(handle).await?;

        let engine = self.normalize_engine(handle, tier)?;
        let liquid_containers_filled =
            self.top_up(actor, handle, request.fuel, request.liquid, request.enforce_limits)?;

        let granted = |capability| !request.enforce_limits || self.permissions.allows(actor, capability);
        let code_locked = request.code_lock && granted(Capability::AutoCodeLock);
        let key_locked = request.key_lock && granted(Capability::AutoKeyLock);
        if code_locked {
            self.world.add_code_lock(handle, actor)?;
        }
        if key_locked {
            self.world.add_key_lock(handle, actor)?;
        }

        Ok(Provisioned {
            handle,
            pose,
            used_fallback_pose,
            stage: ProvisionStage::Provisioned,
            socket_ops: ops,
            refused,
            engine,
            liquid_containers_filled,
            code_locked,
            key_locked,
        })
    }

    /// Chat-style spawn: the actor's default preset if saved, otherwise
    /// random modules at the actor's socket ceiling.
    pub async fn spawn(&mut self, actor: ActorId, position: Vec3, forward: Vec3) -> Result<Provisioned> {
        let scope = PresetScope::Actor(actor);
        let layout = match self.presets.store().find_exact(&scope, DEFAULT_PRESET_NAME) {
            Some(preset) => LayoutRequest::Modules(preset.module_ids),
            None => {
                let max_sockets = self.permissions.max_sockets(actor);
                if max_sockets < 2 {
                    return Err(ProvisionError::PermissionDenied {
                        action: "spawn a vehicle".to_string(),
                    });
                }
                LayoutRequest::Random(validate_socket_count(max_sockets.min(4))?)
            }
        };

        let request = self.actor_request(actor, layout, position, forward);
        self.provision(actor, request).await
    }

    /// Spawns from one of the actor's presets or a common preset.
    pub async fn spawn_preset(
        &mut self,
        actor: ActorId,
        scope: &PresetScope,
        name: &str,
        position: Vec3,
        forward: Vec3,
    ) -> Result<Provisioned> {
        self.check_preset_access(actor, scope, false)?;
        let preset = self.presets.resolve(scope, name)?;

        let request = self.actor_request(actor, LayoutRequest::Modules(preset.module_ids), position, forward);
        self.provision(actor, request).await
    }

    /// Spawns a server preset for `target` on behalf of `giver`. The vehicle
    /// is not tracked and the target's limits do not apply.
    pub async fn give_preset(
        &mut self,
        giver: ActorId,
        target: ActorId,
        name: &str,
        position: Vec3,
        forward: Vec3,
    ) -> Result<Provisioned> {
        self.require(giver, Capability::GiveVehicle, "give vehicles")?;
        let server = resolve_unique(&self.server_presets, name, |preset| preset.name.as_str())?.clone();

        tracing::info!("🎁 Actor {} gives preset '{}' to actor {}", giver, server.name, target);
        let request = ProvisionRequest::new(LayoutRequest::Modules(server.module_ids), position, forward)
            .with_engine_tier(server.engine_tier)
            .with_fuel(FillAmount::from_legacy(server.fuel_amount))
            .with_liquid(FillAmount::from_legacy(server.fresh_water_amount))
            .with_locks(server.code_lock, server.key_lock)
            .with_placement(PlacementMode::BestEffort)
            .untracked()
            .unrestricted();
        self.provision(target, request).await
    }

    /// Moves the actor's vehicle in front of them.
    pub async fn fetch(&mut self, actor: ActorId, position: Vec3, forward: Vec3) -> Result<Pose> {
        self.require(actor, Capability::Fetch, "fetch vehicle")?;
        let handle = self.tracked(actor)?;

        let occupied = self.world.is_occupied(handle);
        if occupied && !self.behavior.can_fetch_while_occupied {
            return Err(ProvisionError::VehicleOccupied);
        }
        self.cooldowns.check(actor, ActionKind::Fetch, self.clock.now())?;

        let length = validate_socket_count(self.world.socket_count(handle)?)?;
        let pose = self.solver.find_placement(&self.world, position, forward, length)?;

        self.release_from_lift(handle).await?;
        if occupied && self.behavior.dismount_on_fetch {
            self.world.dismount_all(handle)?;
        }
        self.world.relocate(handle, pose)?;
        self.cooldowns.start(actor, ActionKind::Fetch, self.clock.now());

        tracing::info!("📍 Fetched vehicle {:?} for actor {}", handle, actor);
        Ok(pose)
    }

    async fn release_from_lift(&mut self, handle: VehicleHandle) -> Result<()> {
        let mut attempts = 0;
        while self.world.is_held_by_lift(handle) {
            if attempts >= self.lift.attempts {
                tracing::warn!("Vehicle {:?} still held by lift after {} attempts", handle, attempts);
                return Err(ProvisionError::LiftReleaseFailed { attempts });
            }
            self.world.release_from_lift(handle)?;
            attempts += 1;
            tokio::time::sleep(self.lift.interval()).await;
        }
        Ok(())
    }

    /// Revives, repairs and refuels the actor's vehicle.
    pub fn fix(&mut self, actor: ActorId) -> Result<FixReport> {
        self.require(actor, Capability::Fix, "fix vehicle")?;
        let handle = self.tracked(actor)?;
        self.cooldowns.check(actor, ActionKind::Fix, self.clock.now())?;

        let report = self.repair(actor, handle)?;
        self.cooldowns.start(actor, ActionKind::Fix, self.clock.now());

        tracing::info!("🔧 Fixed vehicle {:?} for actor {}", handle, actor);
        Ok(report)
    }

    fn repair(&mut self, actor: ActorId, handle: VehicleHandle) -> Result<FixReport> {
        let revived = self.world.is_dead(handle)?;
        if revived {
            self.world.revive(handle)?;
        }
        self.world.restore_health(handle)?;

        let engine = self.normalize_engine(handle, self.tier_ceiling(actor))?;
        let (fuel, water) = (self.fill.fuel(), self.fill.fresh_water());
        let liquid_containers_filled = self.top_up(actor, handle, fuel, water, true)?;

        Ok(FixReport {
            revived,
            engine,
            liquid_containers_filled,
        })
    }

    /// Rebuilds the actor's vehicle to match a preset, keeping engine parts
    /// above the actor's tier.
    pub async fn load_preset(&mut self, actor: ActorId, scope: &PresetScope, name: &str) -> Result<LoadReport> {
        self.require(actor, Capability::PresetLoad, "load presets")?;
        self.check_preset_access(actor, scope, false)?;
        let handle = self.tracked(actor)?;

        if self.world.is_occupied(handle) {
            return Err(ProvisionError::VehicleOccupied);
        }
        self.cooldowns.check(actor, ActionKind::LoadPreset, self.clock.now())?;

        let preset = self.presets.resolve(scope, name)?;
        if preset.num_sockets() > self.permissions.max_sockets(actor) {
            return Err(ProvisionError::PermissionDenied {
                action: format!("load a {}-socket preset", preset.num_sockets()),
            });
        }
        let socket_count = self.world.socket_count(handle)?;
        if socket_count != preset.num_sockets() {
            return Err(ProvisionError::SocketCountMismatch {
                current: socket_count,
                target: preset.num_sockets(),
            });
        }

        let current = self.world.sockets(handle)?;
        let ops = ModuleSocketPlanner::new(&self.modules).reconcile(&current, &preset.module_ids)?;
        let tier = self.tier_ceiling(actor);

        let mut storages = self.world.engine_storages(handle)?;
        let extracted = EnginePartAllocator::new(&self.parts).extract_above_tier(&mut storages, tier);
        self.world.store_engine_storages(handle, storages)?;

        let (refused, leftover) = match self.rebuild_layout(handle, &ops, extracted.keep).await {
            Ok(rebuilt) => rebuilt,
            Err((cause, parts)) => return Err(self.restore_parts(handle, parts, cause)),
        };

        let fix = self.repair(actor, handle)?;
        self.cooldowns.start(actor, ActionKind::LoadPreset, self.clock.now());

        tracing::info!(
            "📦 Loaded preset '{}' onto vehicle {:?} ({} socket ops, {} parts left over)",
            preset.name,
            handle,
            ops.len(),
            leftover.len()
        );
        Ok(LoadReport {
            preset,
            socket_ops: ops,
            refused,
            leftover,
            discarded: extracted.discarded,
            fix,
        })
    }

    /// Applies `ops`, waits for attachment and reinstalls `parts`. On failure
    /// the parts come back with the error.
    async fn rebuild_layout(
        &mut self,
        handle: VehicleHandle,
        ops: &[SocketOp],
        parts: Vec<Part>,
    ) -> std::result::Result<(Vec<SocketOp>, Vec<Part>), (ProvisionError, Vec<Part>)> {
        let refused = match ModuleSocketPlanner::new(&self.modules).apply(&mut self.world, handle, ops) {
            Ok(refused) => refused,
            Err(e) => return Err((e, parts)),
        };
        if let Err(e) = self.world.await_attached(handle).await {
            return Err((e, parts));
        }

        let mut storages = match self.world.engine_storages(handle) {
            Ok(storages) => storages,
            Err(e) => return Err((e, parts)),
        };
        let leftover = EnginePartAllocator::new(&self.parts).reinstall(&mut storages, parts.clone());
        match self.world.store_engine_storages(handle, storages) {
            Ok(()) => Ok((refused, leftover)),
            Err(e) => Err((e, parts)),
        }
    }

    /// Puts parts back into whatever engine storages the vehicle still has.
    /// Parts that find no slot ride along in the returned error.
    fn restore_parts(&mut self, handle: VehicleHandle, parts: Vec<Part>, cause: ProvisionError) -> ProvisionError {
        let leftover = match self.world.engine_storages(handle) {
            Ok(mut storages) => {
                let leftover = EnginePartAllocator::new(&self.parts).reinstall(&mut storages, parts.clone());
                match self.world.store_engine_storages(handle, storages) {
                    Ok(()) => leftover,
                    Err(e) => {
                        tracing::warn!("Could not restore engine parts of vehicle {:?}: {}", handle, e);
                        parts
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Could not read engine storages of vehicle {:?}: {}", handle, e);
                parts
            }
        };

        if leftover.is_empty() {
            cause
        } else {
            tracing::warn!("⚠️ Returning {} engine parts after failed rebuild of {:?}", leftover.len(), handle);
            ProvisionError::PartsReturned {
                parts: leftover,
                source: Box::new(cause),
            }
        }
    }

    /// Destroys the actor's vehicle and returns the engine parts above their tier.
    pub fn destroy(&mut self, actor: ActorId) -> Result<Vec<Part>> {
        self.require(actor, Capability::Despawn, "destroy vehicle")?;
        let handle = self.tracked(actor)?;

        if self.world.is_occupied(handle) && !self.behavior.can_despawn_while_occupied {
            return Err(ProvisionError::VehicleOccupied);
        }

        let tier = self.tier_ceiling(actor);
        let mut storages = self.world.engine_storages(handle)?;
        let extracted = EnginePartAllocator::new(&self.parts).extract_above_tier(&mut storages, tier);

        self.world.destroy(handle)?;
        self.vehicles.remove(&actor);

        tracing::info!(
            "🗑️ Destroyed vehicle {:?} of actor {}, returned {} parts",
            handle,
            actor,
            extracted.keep.len()
        );
        Ok(extracted.keep)
    }

    /// Saves the layout of the actor's vehicle as a preset.
    pub fn save_preset(&mut self, actor: ActorId, scope: &PresetScope, name: Option<&str>) -> Result<Preset> {
        self.check_preset_access(actor, scope, true)?;
        let module_ids = self.current_layout(actor)?;
        self.presets.save(scope, name, module_ids)
    }

    /// Overwrites a preset with the layout of the actor's vehicle.
    pub fn update_preset(&mut self, actor: ActorId, scope: &PresetScope, name: Option<&str>) -> Result<Preset> {
        self.check_preset_access(actor, scope, true)?;
        let module_ids = self.current_layout(actor)?;
        self.presets.update(scope, name, module_ids)
    }

    pub fn rename_preset(
        &mut self,
        actor: ActorId,
        scope: &PresetScope,
        old_name: &str,
        new_name: &str,
    ) -> Result<Preset> {
        self.check_preset_access(actor, scope, true)?;
        self.presets.rename(scope, old_name, new_name)
    }

    pub fn delete_preset(&mut self, actor: ActorId, scope: &PresetScope, name: &str) -> Result<Preset> {
        self.check_preset_access(actor, scope, true)?;
        self.presets.delete(scope, name)
    }

    /// Common presets are limited to those the actor may spawn.
    pub fn list_presets(&self, actor: ActorId, scope: &PresetScope) -> Result<Vec<Preset>> {
        self.check_preset_access(actor, scope, false)?;
        let max_sockets = match scope {
            PresetScope::Common => Some(self.permissions.max_sockets(actor)),
            PresetScope::Actor(_) => None,
        };
        Ok(self.presets.list(scope, max_sockets))
    }

    pub fn actor_settings(&self, actor: ActorId) -> ActorSettings {
        self.presets.store().actor_settings(actor)
    }

    /// Flips one of the actor's switches and returns its new value.
    pub fn toggle_setting(&mut self, actor: ActorId, setting: ActorSetting) -> Result<bool> {
        self.require(actor, setting.capability(), "change this setting")?;
        let mut settings = self.actor_settings(actor);
        let enabled = settings.toggle(setting);
        self.presets.store_mut().store_actor_settings(actor, settings)?;

        tracing::info!("⚙️ Actor {} set {:?} to {}", actor, setting, enabled);
        Ok(enabled)
    }

    /// Forget a vehicle the world destroyed on its own.
    pub fn on_vehicle_destroyed(&mut self, handle: VehicleHandle) {
        self.vehicles.retain(|_, tracked| *tracked != handle);
    }

    pub fn on_world_reset(&mut self) {
        tracing::info!("🔄 World reset: clearing {} tracked vehicles and all cooldowns", self.vehicles.len());
        self.vehicles.clear();
        self.cooldowns.clear_all();
    }

    fn actor_request(&self, actor: ActorId, layout: LayoutRequest, position: Vec3, forward: Vec3) -> ProvisionRequest {
        let settings = self.actor_settings(actor);
        ProvisionRequest::new(layout, position, forward)
            .with_engine_tier(self.tier_ceiling(actor))
            .with_fuel(self.fill.fuel())
            .with_liquid(self.fill.fresh_water())
            .with_locks(settings.auto_code_lock, settings.auto_key_lock)
    }

    fn current_layout(&mut self, actor: ActorId) -> Result<Vec<ModuleId>> {
        let handle = self.tracked(actor)?;
        Ok(legacy_from_layout(&self.world.sockets(handle)?))
    }

    fn tier_ceiling(&self, actor: ActorId) -> u8 {
        self.permissions.engine_tier_ceiling(actor).min(MAX_ENGINE_TIER)
    }

    /// A tracked handle whose entity is gone is dropped silently.
    fn tracked(&mut self, actor: ActorId) -> Result<VehicleHandle> {
        match self.vehicles.get(&actor).copied() {
            Some(handle) if self.world.exists(handle) => Ok(handle),
            Some(handle) => {
                tracing::debug!("Dropping stale vehicle {:?} of actor {}", handle, actor);
                self.vehicles.remove(&actor);
                Err(ProvisionError::VehicleNotFound)
            }
            None => Err(ProvisionError::VehicleNotFound),
        }
    }

    fn require(&self, actor: ActorId, capability: Capability, action: &str) -> Result<()> {
        if self.permissions.allows(actor, capability) {
            Ok(())
        } else {
            Err(ProvisionError::PermissionDenied {
                action: action.to_string(),
            })
        }
    }

    fn check_preset_access(&self, actor: ActorId, scope: &PresetScope, manage: bool) -> Result<()> {
        match scope {
            PresetScope::Actor(owner) if *owner == actor => {
                self.require(actor, Capability::Presets, "use presets")
            }
            PresetScope::Actor(_) => Err(ProvisionError::PermissionDenied {
                action: "use another actor's presets".to_string(),
            }),
            PresetScope::Common if manage => {
                self.require(actor, Capability::ManageCommonPresets, "manage common presets")
            }
            PresetScope::Common => self.require(actor, Capability::CommonPresets, "use common presets"),
        }
    }

    fn normalize_engine(&mut self, handle: VehicleHandle, tier: u8) -> Result<UpgradeReport> {
        let mut storages = self.world.engine_storages(handle)?;
        if storages.is_empty() {
            return Ok(UpgradeReport::default());
        }
        let report = EnginePartAllocator::new(&self.parts).upgrade_or_repair_to_tier(&mut storages, tier);
        self.world.store_engine_storages(handle, storages)?;
        Ok(report)
    }

    /// When limits apply, fuel needs `AutoFuel` and fresh water needs both
    /// `AutoFillTankers` and the actor's switch of the same name.
    fn top_up(
        &mut self,
        actor: ActorId,
        handle: VehicleHandle,
        fuel: FillAmount,
        liquid: FillAmount,
        enforce_limits: bool,
    ) -> Result<usize> {
        let granted = |capability| !enforce_limits || self.permissions.allows(actor, capability);
        let add_fuel = fuel != FillAmount::None && granted(Capability::AutoFuel);
        let add_liquid = liquid != FillAmount::None
            && granted(Capability::AutoFillTankers)
            && (!enforce_limits || self.actor_settings(actor).auto_fill_tankers);

        if add_fuel {
            self.world.top_up_fuel(handle, fuel)?;
        }
        if add_liquid {
            return self.world.fill_liquid_containers(handle, liquid);
        }
        Ok(0)
    }
}
