use crate::domain::model::{ModuleId, Part};
use std::time::Duration;
use thiserror::Error;

/// 放置失敗：找不到地面或空間不足
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    #[error("No surface found under one or more vehicle corners")]
    NoSurface,

    #[error("Not enough space to place the vehicle")]
    InsufficientSpace,
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Socket count mismatch: target has {target} sockets, vehicle has {current}")]
    SocketCountMismatch { current: usize, target: usize },

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("Action on cooldown for another {}s", remaining.as_secs())]
    OnCooldown { remaining: Duration },

    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    #[error("Preset not found: {name}")]
    PresetNotFound { name: String },

    #[error("Multiple presets match '{name}'")]
    AmbiguousPresetMatch { name: String },

    #[error("Preset already exists: {name}")]
    PresetAlreadyExists { name: String },

    #[error("Preset name exceeds {max} characters: {name}")]
    PresetNameTooLong { name: String, max: usize },

    #[error("Preset limit of {max} reached")]
    TooManyPresets { max: usize },

    #[error("Unsupported socket count: {count}")]
    InvalidSocketCount { count: usize },

    #[error("Unknown module id: {0}")]
    UnknownModule(ModuleId),

    #[error("Module span conflict at socket {index}")]
    SpanConflict { index: usize },

    #[error("Actor has no vehicle")]
    VehicleNotFound,

    #[error("Actor already has a vehicle")]
    VehicleAlreadyExists,

    #[error("Vehicle is occupied")]
    VehicleOccupied,

    #[error("Vehicle could not be released from lift after {attempts} attempts")]
    LiftReleaseFailed { attempts: u32 },

    /// 重建失敗時無法放回車上的引擎零件
    #[error("{source} ({} engine parts returned)", parts.len())]
    PartsReturned {
        parts: Vec<Part>,
        source: Box<ProvisionError>,
    },

    #[error("Collaborator failure: {message}")]
    Collaborator { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 可重試 (冷卻、空間)
    Low,
    /// 請求被拒絕
    Medium,
    /// 外部系統或資料問題
    High,
    /// 設定錯誤，無法啟動
    Critical,
}

impl ProvisionError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::PartsReturned { source, .. } => source.severity(),
            Self::OnCooldown { .. } | Self::Placement(_) | Self::VehicleOccupied => {
                ErrorSeverity::Low
            }
            Self::SocketCountMismatch { .. }
            | Self::PermissionDenied { .. }
            | Self::PresetNotFound { .. }
            | Self::AmbiguousPresetMatch { .. }
            | Self::PresetAlreadyExists { .. }
            | Self::PresetNameTooLong { .. }
            | Self::TooManyPresets { .. }
            | Self::InvalidSocketCount { .. }
            | Self::VehicleNotFound
            | Self::VehicleAlreadyExists
            | Self::LiftReleaseFailed { .. } => ErrorSeverity::Medium,
            Self::UnknownModule(_)
            | Self::SpanConflict { .. }
            | Self::Collaborator { .. }
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorSeverity::High,
            Self::TomlError(_) | Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::PartsReturned { source, .. } => source.recovery_suggestion(),
            Self::OnCooldown { .. } => "Wait for the cooldown to expire",
            Self::Placement(PlacementError::NoSurface) => "Face a flat surface closer to the ground",
            Self::Placement(PlacementError::InsufficientSpace) => {
                "Move to an open area away from walls, players and vehicles"
            }
            Self::SocketCountMismatch { .. } => "Pick a preset with the same socket count as the vehicle",
            Self::AmbiguousPresetMatch { .. } => "Use the full preset name",
            Self::PresetNameTooLong { .. } => "Choose a shorter preset name",
            Self::TooManyPresets { .. } => "Delete an existing preset first",
            Self::VehicleAlreadyExists => "Fetch or destroy the existing vehicle",
            Self::VehicleOccupied => "Ask passengers to leave the vehicle",
            Self::LiftReleaseFailed { .. } => "Lower the lift or destroy the vehicle",
            Self::UnknownModule(_) | Self::SpanConflict { .. } => "Check the module ids in the preset",
            Self::TomlError(_) | Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file and restart"
            }
            _ => "Check the logs for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
