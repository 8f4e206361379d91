//! Engine settings persisted as `frameline.json`.
//!
//! Every field has a default, so partial or older files load cleanly.
//! A missing file is normal; an unreadable one is logged and replaced by
//! defaults rather than failing startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::viewport::DEFAULT_MIN_SCALE_SPAN;
use crate::paths::{self, PathConfig};
use crate::render::coordinator::SignalGroup;
use crate::render::track_renderer::{Dimensions, Palette};

pub const SETTINGS_FILE: &str = "frameline.json";

/// Base debounce delay per signal group, before density scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceSettings {
    pub entries_ms: u64,
    pub scale_ms: u64,
    pub filter_ms: u64,
    pub selection_ms: u64,
    pub active_ms: u64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            entries_ms: 100,
            scale_ms: 16,
            filter_ms: 250,
            selection_ms: 16,
            active_ms: 16,
        }
    }
}

impl DebounceSettings {
    pub fn base(&self, group: SignalGroup) -> Duration {
        let ms = match group {
            SignalGroup::Entries => self.entries_ms,
            SignalGroup::Scale => self.scale_ms,
            SignalGroup::Filter => self.filter_ms,
            SignalGroup::Selection => self.selection_ms,
            SignalGroup::Active => self.active_ms,
        };
        Duration::from_millis(ms)
    }

    /// All delays zero (dispatch on the next tick)
    pub fn immediate() -> Self {
        Self {
            entries_ms: 0,
            scale_ms: 0,
            filter_ms: 0,
            selection_ms: 0,
            active_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub debounce: DebounceSettings,
    /// Narrowest zoom window in timeline percent
    pub min_scale_span: f64,
    /// Default per-track canvas size
    pub canvas: Dimensions,
    pub palette: Palette,
    /// Hit-test slack around the cursor, in pixels
    pub hit_tolerance_px: f64,
    /// Minimum ruler label spacing, in pixels
    pub ruler_min_spacing: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: DebounceSettings::default(),
            min_scale_span: DEFAULT_MIN_SCALE_SPAN,
            canvas: Dimensions::new(1200, 24),
            palette: Palette::default(),
            hit_tolerance_px: 4.0,
            ruler_min_spacing: 80.0,
        }
    }
}

impl EngineSettings {
    /// Load from `path`; defaults if missing or invalid.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::read(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring settings {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).context("Failed to parse settings JSON")
    }

    /// Resolve `frameline.json` through the config dir priority and load it
    pub fn load_from(config: &PathConfig) -> Self {
        Self::load(&paths::config_file(SETTINGS_FILE, config))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::color::Color;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = EngineSettings::load(&dir.path().join(SETTINGS_FILE));
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r##"{ "debounce": { "filter_ms": 500 }, "palette": { "selected": "#00ff00" } }"##,
        )
        .unwrap();
        let settings = EngineSettings::load(&path);
        assert_eq!(settings.debounce.filter_ms, 500);
        assert_eq!(settings.debounce.entries_ms, 100);
        assert_eq!(settings.palette.selected, Color::rgb(0, 255, 0));
        assert_eq!(settings.canvas, Dimensions::new(1200, 24));
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(EngineSettings::load(&path), EngineSettings::default());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let mut settings = EngineSettings::default();
        settings.min_scale_span = 1.5;
        settings.debounce.active_ms = 8;
        settings.save(&path).unwrap();
        assert_eq!(EngineSettings::load(&path), settings);
    }

    #[test]
    fn test_base_delay_per_group() {
        let d = DebounceSettings::default();
        assert_eq!(d.base(SignalGroup::Filter), Duration::from_millis(250));
        assert_eq!(DebounceSettings::immediate().base(SignalGroup::Entries), Duration::ZERO);
    }
}
