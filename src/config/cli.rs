use crate::adapters::memory::{MemoryPresetStore, MemoryWorld, StaticPermissions};
use crate::config::{CliConfig, ProvisionerConfig};
use crate::core::presets::resolve_unique;
use crate::core::provisioner::{LayoutRequest, PlacementMode, ProvisionRequest, Provisioner, MAX_ENGINE_TIER};
use crate::domain::model::{ActorId, ActorSettings, FillAmount};
use crate::domain::ports::SystemClock;
use crate::utils::error::Result;
use glam::Vec3;

/// Catalog and server presets used when no config file is given.
pub const DEMO_CONFIG: &str = include_str!("../../config/demo.toml");

pub type MemoryProvisioner = Provisioner<MemoryWorld, MemoryPresetStore, StaticPermissions, SystemClock>;

pub fn load_config(cli: &CliConfig) -> Result<ProvisionerConfig> {
    match &cli.config {
        Some(path) => {
            tracing::debug!("Loading config from {}", path);
            ProvisionerConfig::from_file(path)
        }
        None => ProvisionerConfig::from_toml_str(DEMO_CONFIG),
    }
}

/// Flat in-memory world where the CLI actor holds every capability and
/// has tanker filling switched on. Locks stay off unless a preset asks.
pub fn memory_provisioner(cli: &CliConfig, config: ProvisionerConfig) -> MemoryProvisioner {
    let world = MemoryWorld::flat(config.module_catalog(), cli.ground);
    let permissions = StaticPermissions::allow_all(4, MAX_ENGINE_TIER);
    let settings = ActorSettings {
        auto_fill_tankers: true,
        ..ActorSettings::default()
    };
    let store = MemoryPresetStore::new().with_actor_settings(ActorId(cli.actor), settings);
    Provisioner::new(world, store, permissions, SystemClock, config)
}

impl CliConfig {
    pub fn actor_position(&self) -> Vec3 {
        match self.position.as_slice() {
            [x, y, z] => Vec3::new(*x, *y, *z),
            _ => Vec3::ZERO,
        }
    }

    pub fn actor_forward(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        Vec3::new(yaw.sin(), 0.0, yaw.cos())
    }

    pub fn request(&self, config: &ProvisionerConfig) -> Result<ProvisionRequest> {
        let placement = if self.best_effort {
            PlacementMode::BestEffort
        } else {
            PlacementMode::Checked
        };
        let base = |layout| {
            ProvisionRequest::new(layout, self.actor_position(), self.actor_forward())
                .with_placement(placement)
        };

        if let Some(name) = &self.preset {
            let presets = config.normalized_server_presets();
            let preset = resolve_unique(&presets, name, |preset| preset.name.as_str())?;
            return Ok(base(LayoutRequest::Modules(preset.module_ids.clone()))
                .with_engine_tier(preset.engine_tier)
                .with_fuel(FillAmount::from_legacy(preset.fuel_amount))
                .with_liquid(FillAmount::from_legacy(preset.fresh_water_amount))
                .with_locks(preset.code_lock, preset.key_lock));
        }

        let layout = match self.random {
            Some(length) => LayoutRequest::Random(length.into()),
            None => LayoutRequest::Modules(self.module_ids()),
        };
        Ok(base(layout)
            .with_engine_tier(self.engine_tier)
            .with_fuel(config.fill.fuel())
            .with_liquid(config.fill.fresh_water()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LengthClass, ModuleId};
    use clap::Parser;

    #[test]
    fn test_demo_config_is_valid() {
        use crate::utils::validation::Validate;

        let config = ProvisionerConfig::from_toml_str(DEMO_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.server_presets.is_empty());
    }

    #[test]
    fn test_request_from_server_preset() {
        let config = ProvisionerConfig::from_toml_str(DEMO_CONFIG).unwrap();
        let cli = CliConfig::parse_from(["modcar", "--preset", "hauler"]);

        let request = cli.request(&config).unwrap();

        assert_eq!(
            request.layout,
            LayoutRequest::Modules(vec![ModuleId(10), ModuleId(30), ModuleId(40), ModuleId(0)])
        );
        assert_eq!(request.engine_tier, 2);
    }

    #[test]
    fn test_cli_actor_fills_tankers() {
        let config = ProvisionerConfig::from_toml_str(DEMO_CONFIG).unwrap();
        let cli = CliConfig::parse_from(["modcar", "--preset", "water"]);

        let provisioner = memory_provisioner(&cli, config);
        let settings = provisioner.actor_settings(ActorId(cli.actor));

        assert!(settings.auto_fill_tankers);
        assert!(!settings.auto_code_lock && !settings.auto_key_lock);
    }

    #[test]
    fn test_request_from_random_length() {
        let config = ProvisionerConfig::from_toml_str(DEMO_CONFIG).unwrap();
        let cli = CliConfig::parse_from(["modcar", "--random", "medium", "--yaw", "90"]);

        let request = cli.request(&config).unwrap();

        assert_eq!(request.layout, LayoutRequest::Random(LengthClass::Medium));
        assert!((request.actor_forward - Vec3::X).length() < 1e-5);
    }
}
