use crate::domain::model::{ActionKind, ActorId};
use crate::utils::error::{ProvisionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Cooldown per action kind, in seconds. Zero disables the gate for that action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownDurations {
    #[serde(default = "default_spawn_seconds")]
    pub spawn_seconds: u64,
    #[serde(default = "default_fetch_seconds")]
    pub fetch_seconds: u64,
    #[serde(default = "default_load_preset_seconds")]
    pub load_preset_seconds: u64,
    #[serde(default = "default_fix_seconds")]
    pub fix_seconds: u64,
}

fn default_spawn_seconds() -> u64 {
    3600
}

fn default_fetch_seconds() -> u64 {
    600
}

fn default_load_preset_seconds() -> u64 {
    3600
}

fn default_fix_seconds() -> u64 {
    3600
}

impl Default for CooldownDurations {
    fn default() -> Self {
        Self {
            spawn_seconds: default_spawn_seconds(),
            fetch_seconds: default_fetch_seconds(),
            load_preset_seconds: default_load_preset_seconds(),
            fix_seconds: default_fix_seconds(),
        }
    }
}

impl CooldownDurations {
    pub fn disabled() -> Self {
        Self {
            spawn_seconds: 0,
            fetch_seconds: 0,
            load_preset_seconds: 0,
            fix_seconds: 0,
        }
    }

    pub fn duration(&self, kind: ActionKind) -> Duration {
        let seconds = match kind {
            ActionKind::Spawn => self.spawn_seconds,
            ActionKind::Fetch => self.fetch_seconds,
            ActionKind::LoadPreset => self.load_preset_seconds,
            ActionKind::Fix => self.fix_seconds,
        };
        Duration::from_secs(seconds)
    }
}

/// Per-actor, per-action rate limiter keyed on last-use timestamps.
#[derive(Debug, Clone, Default)]
pub struct CooldownGate {
    durations: CooldownDurations,
    last_used: HashMap<(ActorId, ActionKind), DateTime<Utc>>,
}

impl CooldownGate {
    pub fn new(durations: CooldownDurations) -> Self {
        Self {
            durations,
            last_used: HashMap::new(),
        }
    }

    pub fn remaining(&self, actor: ActorId, kind: ActionKind, now: DateTime<Utc>) -> Duration {
        let duration = self.durations.duration(kind);
        if duration.is_zero() {
            return Duration::ZERO;
        }

        let Some(started) = self.last_used.get(&(actor, kind)) else {
            return Duration::ZERO;
        };

        // A clock that moved backwards counts as no time elapsed.
        let elapsed = (now - *started).to_std().unwrap_or(Duration::ZERO);
        duration.saturating_sub(elapsed)
    }

    pub fn start(&mut self, actor: ActorId, kind: ActionKind, now: DateTime<Utc>) {
        if self.durations.duration(kind).is_zero() {
            return;
        }
        self.last_used.insert((actor, kind), now);
    }

    /// `OnCooldown` while time remains, `Ok` otherwise.
    pub fn check(&self, actor: ActorId, kind: ActionKind, now: DateTime<Utc>) -> Result<()> {
        let remaining = self.remaining(actor, kind, now);
        if remaining.is_zero() {
            Ok(())
        } else {
            tracing::debug!("Actor {} on {:?} cooldown for {:?}", actor, kind, remaining);
            Err(ProvisionError::OnCooldown { remaining })
        }
    }

    /// World/save reset.
    pub fn clear_all(&mut self) {
        self.last_used.clear();
    }

    pub fn durations(&self) -> &CooldownDurations {
        &self.durations
    }
}
