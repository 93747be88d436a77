use crate::domain::model::{ModuleId, Preset, PresetScope};
use crate::domain::ports::PresetStore;
use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::validate_preset_name;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRESET_NAME: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetSettings {
    #[serde(default = "default_max_per_actor")]
    pub max_per_actor: usize,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

fn default_max_per_actor() -> usize {
    10
}

fn default_max_name_length() -> usize {
    30
}

impl Default for PresetSettings {
    fn default() -> Self {
        Self {
            max_per_actor: default_max_per_actor(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Exact case-insensitive match first, then a unique case-insensitive
/// substring match.
pub fn resolve_unique<'a, T>(
    items: &'a [T],
    name: &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<&'a T> {
    let wanted = name.to_lowercase();
    if let Some(item) = items.iter().find(|item| name_of(item).to_lowercase() == wanted) {
        return Ok(item);
    }

    let mut matches = items
        .iter()
        .filter(|item| name_of(item).to_lowercase().contains(&wanted));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item),
        (None, _) => Err(ProvisionError::PresetNotFound {
            name: name.to_string(),
        }),
        (Some(_), Some(_)) => Err(ProvisionError::AmbiguousPresetMatch {
            name: name.to_string(),
        }),
    }
}

/// Named layouts on top of a `PresetStore`, with per-actor limits and
/// forgiving name resolution.
pub struct PresetBook<S: PresetStore> {
    store: S,
    settings: PresetSettings,
}

impl<S: PresetStore> PresetBook<S> {
    pub fn new(store: S, settings: PresetSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn settings(&self) -> &PresetSettings {
        &self.settings
    }

    pub fn resolve(&self, scope: &PresetScope, name: &str) -> Result<Preset> {
        let presets = self.store.list(scope);
        resolve_unique(&presets, name, |preset| preset.name.as_str()).cloned()
    }

    /// Saves a new preset. `None` saves under the default name.
    pub fn save(
        &mut self,
        scope: &PresetScope,
        name: Option<&str>,
        module_ids: Vec<ModuleId>,
    ) -> Result<Preset> {
        let name = name.unwrap_or(DEFAULT_PRESET_NAME);
        validate_preset_name(name, self.settings.max_name_length)?;

        if self.store.find_exact(scope, name).is_some() {
            return Err(ProvisionError::PresetAlreadyExists {
                name: name.to_string(),
            });
        }
        if matches!(scope, PresetScope::Actor(_))
            && self.store.list(scope).len() >= self.settings.max_per_actor
        {
            return Err(ProvisionError::TooManyPresets {
                max: self.settings.max_per_actor,
            });
        }

        let preset = Preset::new(name, module_ids);
        self.store.insert(scope, preset.clone())?;
        tracing::info!("💾 Saved preset '{}' ({} sockets)", preset.name, preset.num_sockets());
        Ok(preset)
    }

    /// Overwrites the modules of the preset that `name` resolves to.
    pub fn update(
        &mut self,
        scope: &PresetScope,
        name: Option<&str>,
        module_ids: Vec<ModuleId>,
    ) -> Result<Preset> {
        let existing = self.resolve(scope, name.unwrap_or(DEFAULT_PRESET_NAME))?;
        let preset = Preset::new(existing.name, module_ids);
        self.store.replace(scope, preset.clone())?;
        tracing::info!("💾 Updated preset '{}'", preset.name);
        Ok(preset)
    }

    /// A rename that only changes letter case is allowed.
    pub fn rename(&mut self, scope: &PresetScope, old_name: &str, new_name: &str) -> Result<Preset> {
        validate_preset_name(new_name, self.settings.max_name_length)?;
        let existing = self.resolve(scope, old_name)?;

        if !existing.name_matches(new_name) && self.store.find_exact(scope, new_name).is_some() {
            return Err(ProvisionError::PresetAlreadyExists {
                name: new_name.to_string(),
            });
        }

        self.store.rename(scope, &existing.name, new_name)?;
        tracing::info!("✏️ Renamed preset '{}' to '{}'", existing.name, new_name);
        Ok(Preset::new(new_name, existing.module_ids))
    }

    pub fn delete(&mut self, scope: &PresetScope, name: &str) -> Result<Preset> {
        let existing = self.resolve(scope, name)?;
        self.store.remove(scope, &existing.name)?;
        tracing::info!("🗑️ Deleted preset '{}'", existing.name);
        Ok(existing)
    }

    /// Default preset first, then by name. `max_sockets` hides presets
    /// larger than the caller may spawn.
    pub fn list(&self, scope: &PresetScope, max_sockets: Option<usize>) -> Vec<Preset> {
        let mut presets: Vec<Preset> = self
            .store
            .list(scope)
            .into_iter()
            .filter(|preset| max_sockets.map_or(true, |max| preset.num_sockets() <= max))
            .collect();

        presets.sort_by(|a, b| {
            let a_default = a.name_matches(DEFAULT_PRESET_NAME);
            let b_default = b.name_matches(DEFAULT_PRESET_NAME);
            b_default
                .cmp(&a_default)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        presets
    }
}
