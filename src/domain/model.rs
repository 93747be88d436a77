use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleHandle(pub u64);

/// Item id of a vehicle module. `0` marks an empty socket in the flat preset encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub i32);

impl ModuleId {
    pub const EMPTY: ModuleId = ModuleId(0);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthClass {
    Short,
    Medium,
    Long,
}

impl LengthClass {
    pub fn from_socket_count(count: usize) -> Option<Self> {
        match count {
            2 => Some(Self::Short),
            3 => Some(Self::Medium),
            4 => Some(Self::Long),
            _ => None,
        }
    }

    pub fn socket_count(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Medium => 3,
            Self::Long => 4,
        }
    }
}

/// Socket state; the socket index is its position in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Socket {
    Empty,
    /// `is_primary == false` marks the continuation of a 2-span module.
    Occupied { module: ModuleId, is_primary: bool },
}

impl Socket {
    pub fn primary(module: ModuleId) -> Self {
        Self::Occupied {
            module,
            is_primary: true,
        }
    }

    pub fn continuation(module: ModuleId) -> Self {
        Self::Occupied {
            module,
            is_primary: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Module id if this socket is the addressable (primary) socket of a module.
    pub fn primary_module(&self) -> Option<ModuleId> {
        match self {
            Self::Occupied {
                module,
                is_primary: true,
            } => Some(*module),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    Generic,
    Engine,
    Storage,
    Seating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Crankshaft,
    Carburetor,
    Piston,
    Sparkplug,
    Valve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCatalogEntry {
    pub category: ModuleCategory,
    pub span: u8,
    #[serde(default)]
    pub engine_slots: Vec<PartKind>,
    #[serde(default)]
    pub liquid_capacity: Option<u32>,
}

impl ModuleCatalogEntry {
    pub fn new(category: ModuleCategory, span: u8) -> Self {
        Self {
            category,
            span,
            engine_slots: Vec::new(),
            liquid_capacity: None,
        }
    }

    pub fn engine(span: u8, slots: Vec<PartKind>) -> Self {
        Self {
            engine_slots: slots,
            ..Self::new(ModuleCategory::Engine, span)
        }
    }

    pub fn tanker(span: u8, capacity: u32) -> Self {
        Self {
            liquid_capacity: Some(capacity),
            ..Self::new(ModuleCategory::Storage, span)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    entries: HashMap<ModuleId, ModuleCatalogEntry>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, id: ModuleId, entry: ModuleCatalogEntry) -> Self {
        self.entries.insert(id, entry);
        self
    }

    pub fn insert(&mut self, id: ModuleId, entry: ModuleCatalogEntry) {
        self.entries.insert(id, entry);
    }

    pub fn get(&self, id: ModuleId) -> Option<&ModuleCatalogEntry> {
        self.entries.get(&id)
    }

    pub fn span(&self, id: ModuleId) -> Option<usize> {
        self.entries.get(&id).map(|entry| entry.span as usize)
    }

    /// Known module ids in ascending order.
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub kind: PartKind,
    pub tier: u8,
    pub condition: f32,
    pub max_condition: f32,
}

impl Part {
    pub fn new(kind: PartKind, tier: u8, max_condition: f32) -> Self {
        Self {
            kind,
            tier,
            condition: max_condition,
            max_condition,
        }
    }

    pub fn damaged(mut self, condition: f32) -> Self {
        self.condition = condition.clamp(0.0, self.max_condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSlot {
    pub kind: PartKind,
    pub part: Option<Part>,
}

/// Engine component slots of one attached engine module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStorage {
    pub socket: usize,
    /// Locked storages are controlled by another subsystem and left untouched.
    pub locked: bool,
    pub slots: Vec<EngineSlot>,
}

impl EngineStorage {
    pub fn empty(socket: usize, kinds: &[PartKind]) -> Self {
        Self {
            socket,
            locked: false,
            slots: kinds
                .iter()
                .map(|&kind| EngineSlot { kind, part: None })
                .collect(),
        }
    }
}

/// Fresh parts available per (kind, tier), with their max condition.
#[derive(Debug, Clone, Default)]
pub struct PartCatalog {
    parts: HashMap<(PartKind, u8), f32>,
}

impl PartCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiers 1..=3 for every part kind, all at the given max condition.
    pub fn standard(max_condition: f32) -> Self {
        let mut catalog = Self::new();
        for kind in [
            PartKind::Crankshaft,
            PartKind::Carburetor,
            PartKind::Piston,
            PartKind::Sparkplug,
            PartKind::Valve,
        ] {
            for tier in 1..=3 {
                catalog.insert(kind, tier, max_condition);
            }
        }
        catalog
    }

    pub fn insert(&mut self, kind: PartKind, tier: u8, max_condition: f32) {
        self.parts.insert((kind, tier), max_condition);
    }

    pub fn remove(&mut self, kind: PartKind, tier: u8) {
        self.parts.remove(&(kind, tier));
    }

    pub fn fresh(&self, kind: PartKind, tier: u8) -> Option<Part> {
        self.parts
            .get(&(kind, tier))
            .map(|&max_condition| Part::new(kind, tier, max_condition))
    }
}

/// Named module layout in the flat legacy encoding (0 = empty / continuation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub module_ids: Vec<ModuleId>,
}

impl Preset {
    pub fn new(name: impl Into<String>, module_ids: Vec<ModuleId>) -> Self {
        Self {
            name: name.into(),
            module_ids,
        }
    }

    pub fn num_sockets(&self) -> usize {
        self.module_ids.len()
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PresetScope {
    Actor(ActorId),
    Common,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Spawn,
    Fetch,
    LoadPreset,
    Fix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Fix,
    Fetch,
    Despawn,
    Presets,
    PresetLoad,
    CommonPresets,
    ManageCommonPresets,
    AutoFuel,
    AutoFillTankers,
    AutoCodeLock,
    AutoKeyLock,
    GiveVehicle,
}

/// Per-actor switches, each gated by the capability of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorSetting {
    AutoCodeLock,
    AutoKeyLock,
    AutoFillTankers,
}

impl ActorSetting {
    pub fn capability(self) -> Capability {
        match self {
            Self::AutoCodeLock => Capability::AutoCodeLock,
            Self::AutoKeyLock => Capability::AutoKeyLock,
            Self::AutoFillTankers => Capability::AutoFillTankers,
        }
    }
}

/// All switches start off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSettings {
    #[serde(default)]
    pub auto_code_lock: bool,
    #[serde(default)]
    pub auto_key_lock: bool,
    #[serde(default)]
    pub auto_fill_tankers: bool,
}

impl ActorSettings {
    pub fn get(&self, setting: ActorSetting) -> bool {
        match setting {
            ActorSetting::AutoCodeLock => self.auto_code_lock,
            ActorSetting::AutoKeyLock => self.auto_key_lock,
            ActorSetting::AutoFillTankers => self.auto_fill_tankers,
        }
    }

    /// Flips the switch and returns its new value.
    pub fn toggle(&mut self, setting: ActorSetting) -> bool {
        let flag = match setting {
            ActorSetting::AutoCodeLock => &mut self.auto_code_lock,
            ActorSetting::AutoKeyLock => &mut self.auto_key_lock,
            ActorSetting::AutoFillTankers => &mut self.auto_fill_tankers,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillAmount {
    #[default]
    None,
    /// Fill to container capacity.
    Max,
    Exact(u32),
}

impl FillAmount {
    /// `-1` = fill to max, `0` = nothing, otherwise an exact amount.
    pub fn from_legacy(amount: i32) -> Self {
        match amount {
            0 => Self::None,
            n if n < 0 => Self::Max,
            n => Self::Exact(n as u32),
        }
    }

    pub fn resolve(self, capacity: u32) -> u32 {
        match self {
            Self::None => 0,
            Self::Max => capacity,
            Self::Exact(amount) => amount,
        }
    }
}
