#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use toml_config::ProvisionerConfig;

#[cfg(feature = "cli")]
use crate::domain::model::{LengthClass, ModuleId};
#[cfg(feature = "cli")]
use crate::utils::error::{ProvisionError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_range, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum LengthArg {
    Short,
    Medium,
    Long,
}

#[cfg(feature = "cli")]
impl From<LengthArg> for LengthClass {
    fn from(arg: LengthArg) -> Self {
        match arg {
            LengthArg::Short => LengthClass::Short,
            LengthArg::Medium => LengthClass::Medium,
            LengthArg::Long => LengthClass::Long,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "modcar")]
#[command(about = "Provision a modular vehicle in an in-memory test world")]
pub struct CliConfig {
    /// TOML config; the bundled demo config is used when omitted
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value = "1")]
    pub actor: u64,

    /// Module ids per socket, 0 for empty (e.g. 100,0,200)
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["preset", "random"])]
    pub modules: Vec<i32>,

    /// Server preset name
    #[arg(long, conflicts_with = "random")]
    pub preset: Option<String>,

    /// Let the world pick random modules
    #[arg(long, value_enum)]
    pub random: Option<LengthArg>,

    #[arg(long, default_value = "0")]
    pub engine_tier: u8,

    /// Actor position as x,y,z
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, default_values_t = [0.0f32, 0.0, 0.0])]
    pub position: Vec<f32>,

    /// Actor heading in degrees, 0 faces +Z
    #[arg(long, allow_negative_numbers = true, default_value = "0")]
    pub yaw: f32,

    /// Ground height of the test world
    #[arg(long, allow_negative_numbers = true, default_value = "0")]
    pub ground: f32,

    /// Fall back to the fixed pose when no surface fits
    #[arg(long)]
    pub best_effort: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.modules.iter().copied().map(ModuleId).collect()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_range("engine_tier", self.engine_tier, 0, 3)?;

        if self.position.len() != 3 {
            return Err(ProvisionError::InvalidConfigValueError {
                field: "position".to_string(),
                value: format!("{:?}", self.position),
                reason: "Position needs exactly three components".to_string(),
            });
        }

        let layouts = [!self.modules.is_empty(), self.preset.is_some(), self.random.is_some()];
        if layouts.iter().filter(|given| **given).count() != 1 {
            return Err(ProvisionError::ConfigError {
                message: "Pass exactly one of --modules, --preset or --random".to_string(),
            });
        }
        Ok(())
    }
}
