use crate::core::cooldown::CooldownDurations;
use crate::core::placement::PlacementSettings;
use crate::core::presets::PresetSettings;
use crate::core::socket_planner::ModuleSocketPlanner;
use crate::domain::model::{
    FillAmount, ModuleCatalog, ModuleCatalogEntry, ModuleCategory, ModuleId, PartCatalog,
    PartKind, Preset, Socket,
};
use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::{
    validate_positive_number, validate_preset_name, validate_range, validate_socket_count,
    validate_unique, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    #[serde(default)]
    pub fill: FillSettings,
    #[serde(default)]
    pub presets: PresetSettings,
    #[serde(default)]
    pub cooldowns: CooldownDurations,
    #[serde(default)]
    pub placement: PlacementSettings,
    #[serde(default)]
    pub lift: LiftSettings,
    #[serde(default)]
    pub behavior: BehaviorSettings,
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
    #[serde(default)]
    pub parts: Vec<PartDefinition>,
    #[serde(default)]
    pub server_presets: Vec<ServerPreset>,
}

/// Amounts use the legacy encoding: `-1` fills to capacity, `0` adds nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSettings {
    #[serde(default = "default_fuel_amount")]
    pub fuel_amount: i32,
    #[serde(default = "default_fresh_water_amount")]
    pub fresh_water_amount: i32,
}

fn default_fuel_amount() -> i32 {
    500
}

fn default_fresh_water_amount() -> i32 {
    -1
}

impl Default for FillSettings {
    fn default() -> Self {
        Self {
            fuel_amount: default_fuel_amount(),
            fresh_water_amount: default_fresh_water_amount(),
        }
    }
}

impl FillSettings {
    pub fn fuel(&self) -> FillAmount {
        FillAmount::from_legacy(self.fuel_amount)
    }

    pub fn fresh_water(&self) -> FillAmount {
        FillAmount::from_legacy(self.fresh_water_amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftSettings {
    #[serde(default = "default_lift_attempts")]
    pub attempts: u32,
    #[serde(default = "default_lift_interval_ms")]
    pub interval_ms: u64,
}

fn default_lift_attempts() -> u32 {
    5
}

fn default_lift_interval_ms() -> u64 {
    500
}

impl Default for LiftSettings {
    fn default() -> Self {
        Self {
            attempts: default_lift_attempts(),
            interval_ms: default_lift_interval_ms(),
        }
    }
}

impl LiftSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorSettings {
    #[serde(default)]
    pub can_fetch_while_occupied: bool,
    #[serde(default)]
    pub can_despawn_while_occupied: bool,
    #[serde(default = "default_true")]
    pub dismount_on_fetch: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            can_fetch_while_occupied: false,
            can_despawn_while_occupied: false,
            dismount_on_fetch: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: ModuleId,
    #[serde(flatten)]
    pub entry: ModuleCatalogEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartDefinition {
    pub kind: PartKind,
    pub tier: u8,
    #[serde(default = "default_max_condition")]
    pub max_condition: f32,
}

fn default_max_condition() -> f32 {
    100.0
}

/// Admin-authored layout that can be given to any actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPreset {
    pub name: String,
    /// Authored without continuation zeros; a `0` here is an empty socket.
    pub module_ids: Vec<ModuleId>,
    #[serde(default)]
    pub engine_tier: u8,
    #[serde(default)]
    pub fuel_amount: i32,
    #[serde(default)]
    pub fresh_water_amount: i32,
    #[serde(default)]
    pub code_lock: bool,
    #[serde(default)]
    pub key_lock: bool,
}

impl ServerPreset {
    pub fn preset(&self) -> Preset {
        Preset::new(self.name.clone(), self.module_ids.clone())
    }
}

impl ProvisionerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProvisionError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${FUEL_AMOUNT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProvisionError::ConfigError {
            message: format!("Invalid env var pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn module_catalog(&self) -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new();
        for module in &self.modules {
            catalog.insert(module.id, module.entry.clone());
        }
        catalog
    }

    /// 未設定零件時使用標準零件表 (tier 1..=3)
    pub fn part_catalog(&self) -> PartCatalog {
        if self.parts.is_empty() {
            return PartCatalog::standard(default_max_condition());
        }
        let mut catalog = PartCatalog::new();
        for part in &self.parts {
            catalog.insert(part.kind, part.tier, part.max_condition);
        }
        catalog
    }

    /// Server presets with continuation zeros inserted after 2-span modules.
    /// `server_presets` keeps the authored lists; every `0` written there is
    /// an empty socket.
    pub fn normalized_server_presets(&self) -> Vec<ServerPreset> {
        let catalog = self.module_catalog();
        let planner = ModuleSocketPlanner::new(&catalog);
        self.server_presets
            .iter()
            .map(|preset| ServerPreset {
                module_ids: planner.normalize(&preset.module_ids),
                ..preset.clone()
            })
            .collect()
    }

    fn validate_modules(&self) -> Result<()> {
        let ids: Vec<ModuleId> = self.modules.iter().map(|module| module.id).collect();
        validate_unique("modules.id", &ids)?;

        for module in &self.modules {
            if module.id.is_empty() {
                return Err(ProvisionError::InvalidConfigValueError {
                    field: "modules.id".to_string(),
                    value: module.id.to_string(),
                    reason: "Module id 0 is reserved for empty sockets".to_string(),
                });
            }
            validate_range("modules.span", module.entry.span, 1, 2)?;
            if module.entry.category == ModuleCategory::Engine && module.entry.engine_slots.is_empty() {
                return Err(ProvisionError::InvalidConfigValueError {
                    field: "modules.engine_slots".to_string(),
                    value: module.id.to_string(),
                    reason: "Engine modules need at least one slot".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_server_presets(&self) -> Result<()> {
        let catalog = self.module_catalog();
        let planner = ModuleSocketPlanner::new(&catalog);

        for preset in self.normalized_server_presets() {
            validate_preset_name(&preset.name, self.presets.max_name_length)?;
            validate_range("server_presets.engine_tier", preset.engine_tier, 0, 3)?;
            let count = validate_socket_count(preset.module_ids.len())?;
            planner.reconcile(&vec![Socket::Empty; count.socket_count()], &preset.module_ids)?;
        }
        Ok(())
    }
}

impl Validate for ProvisionerConfig {
    fn validate(&self) -> Result<()> {
        validate_range("fill.fuel_amount", self.fill.fuel_amount, -1, i32::MAX)?;
        validate_range("fill.fresh_water_amount", self.fill.fresh_water_amount, -1, i32::MAX)?;
        validate_positive_number("presets.max_per_actor", self.presets.max_per_actor, 1)?;
        validate_positive_number("presets.max_name_length", self.presets.max_name_length, 1)?;
        validate_positive_number("lift.attempts", self.lift.attempts as usize, 1)?;
        validate_range("placement.probe_depth", self.placement.probe_depth, 0.1, 100.0)?;
        validate_range("placement.roll_factor", self.placement.roll_factor, 0.0, 90.0)?;

        for part in &self.parts {
            validate_range("parts.tier", part.tier, 1, 3)?;
            validate_range("parts.max_condition", part.max_condition, 1.0, f32::MAX)?;
        }

        self.validate_modules()?;
        self.validate_server_presets()
    }
}
