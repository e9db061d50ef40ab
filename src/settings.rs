//! Generator and validator tuning
//!
//! Persisted as JSON next to the map requests; every field has a default so
//! partial files are accepted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Search budget presets for the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchPreset {
    Fast,
    #[default]
    Balanced,
    Thorough,
}

impl SearchPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPreset::Fast => "fast",
            SearchPreset::Balanced => "balanced",
            SearchPreset::Thorough => "thorough",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Some(SearchPreset::Fast),
            "balanced" | "default" => Some(SearchPreset::Balanced),
            "thorough" => Some(SearchPreset::Thorough),
            _ => None,
        }
    }

    /// Frames simulated by the branch-ordering lookahead
    pub fn lookahead_frames(&self) -> u32 {
        match self {
            SearchPreset::Fast => 24,
            SearchPreset::Balanced => 60,
            SearchPreset::Thorough => 90,
        }
    }

    /// Hard cap on stack pops before the search gives up
    pub fn max_iterations(&self) -> u64 {
        match self {
            SearchPreset::Fast => 250_000,
            SearchPreset::Balanced => 2_000_000,
            SearchPreset::Thorough => 8_000_000,
        }
    }
}

/// Generation and search tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Validator budget preset
    pub preset: SearchPreset,

    // === Validator ===
    /// Stack pops between cooperative yields
    pub yield_every: u64,
    /// Lookahead depth for branch ordering
    pub lookahead_frames: u32,
    /// Stack pops before the search reports failure
    pub max_iterations: u64,
    /// Base minimum interval between input toggles (seconds at speed 1)
    pub debounce_base: f64,
    /// Distance from lane centre past which a toggle ignores the debounce
    pub escape_distance: f64,
    /// Memoisation bucket sizes (px)
    pub bucket_x: f64,
    pub bucket_y: f64,

    // === Terrain ===
    /// Clearance kept between the reference corridor and any geometry
    pub safety_pad: f64,
    /// Global multiplier on hazard placement probability
    pub hazard_density: f64,
    /// Keep hazards this far (px) from portal walls
    pub portal_clearance: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        let preset = SearchPreset::Balanced;
        Self {
            preset,

            yield_every: 1000,
            lookahead_frames: preset.lookahead_frames(),
            max_iterations: preset.max_iterations(),
            debounce_base: 0.05,
            escape_distance: 25.0,
            bucket_x: 5.0,
            bucket_y: 2.0,

            safety_pad: 12.0,
            hazard_density: 1.0,
            portal_clearance: 100.0,
        }
    }
}

impl GeneratorSettings {
    /// Create settings from a search preset
    pub fn from_preset(preset: SearchPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a search preset (updates the validator budget)
    pub fn apply_preset(&mut self, preset: SearchPreset) {
        self.preset = preset;
        self.lookahead_frames = preset.lookahead_frames();
        self.max_iterations = preset.max_iterations();
    }

    /// Yield cadence, never zero
    pub fn effective_yield_every(&self) -> u64 {
        self.yield_every.max(1)
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)?;
        log::info!("Loaded generator settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Using default generator settings ({})", err);
                Self::default()
            }
        }
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Generator settings saved to {}", path.display());
        Ok(())
    }
}

/// Caller-side retry policy for the regeneration loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total generate+validate attempts (first attempt included)
    pub max_attempts: u32,
    /// Safety multiplier added per retry
    pub safety_step: f64,
    /// Hazard multiplier decay per retry (`1 / (1 + decay * attempt)`)
    pub hazard_decay: f64,
    /// Resume this far (px) before the failure frontier
    pub backoff_px: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            safety_step: 0.15,
            hazard_decay: 0.35,
            backoff_px: 600.0,
        }
    }
}

impl RetryPolicy {
    /// Gap safety multiplier for a 0-based attempt
    pub fn safety_multiplier(&self, attempt: u32) -> f64 {
        1.0 + self.safety_step * attempt as f64
    }

    /// Hazard density multiplier for a 0-based attempt
    pub fn hazard_multiplier(&self, attempt: u32) -> f64 {
        1.0 / (1.0 + self.hazard_decay * attempt as f64)
    }
}
