//! Generation inputs and the single-owner generation context

use serde::{Deserialize, Serialize};

use super::terrain::TerrainColumn;
use crate::consts::*;
use crate::error::{MapError, Result};
use crate::sim::{BeatAction, Obstacle, PathPoint, Portal, StateEvent};

/// Song section with a loudness estimate in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

fn default_intensity() -> f64 {
    0.5
}

/// Everything the generator consumes from the audio analysis side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub seed: u64,
    pub beat_times: Vec<f64>,
    #[serde(default)]
    pub sections: Vec<Section>,
    pub duration: f64,
    pub bpm: f64,
    /// Seconds per measure; non-positive means four beats at `bpm`
    #[serde(default)]
    pub measure_length: f64,
    pub difficulty: u8,
}

impl MapRequest {
    /// Reject inputs the generator cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(MapError::InvalidDifficulty(self.difficulty));
        }
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(MapError::InvalidTempo(self.bpm));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(MapError::InvalidDuration(self.duration));
        }
        for (index, pair) in self.beat_times.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(MapError::UnsortedBeats { index: index + 1 });
            }
        }
        if let Some(index) = self.beat_times.iter().position(|b| !b.is_finite()) {
            return Err(MapError::UnsortedBeats { index });
        }
        Ok(())
    }

    /// Seconds per measure
    pub fn measure_duration(&self) -> f64 {
        if self.measure_length > 0.0 {
            self.measure_length
        } else if self.bpm > 0.0 {
            4.0 * 60.0 / self.bpm
        } else {
            2.0
        }
    }

    /// Intensity of the section containing `t` (0.5 outside every section)
    pub fn intensity_at(&self, t: f64) -> f64 {
        self.sections
            .iter()
            .find(|s| t >= s.start_time && t < s.end_time)
            .map(|s| s.intensity)
            .unwrap_or(0.5)
    }

    /// Start of the measure containing `t`
    pub fn measure_floor(&self, t: f64) -> f64 {
        let measure = self.measure_duration();
        ((t / measure) + 1e-9).floor().max(0.0) * measure
    }
}

/// Frozen history handed back in for a tail regeneration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeOptions {
    /// Regenerate from this time on
    pub time: f64,
    pub state_events: Vec<StateEvent>,
    pub beat_actions: Vec<BeatAction>,
    /// Obstacles of the previous attempt; only the prefix is kept
    pub obstacles: Vec<Obstacle>,
    pub portals: Vec<Portal>,
    /// Terrain columns of the previous attempt; the prefix is laid again as is
    #[serde(default)]
    pub columns: Vec<TerrainColumn>,
}

impl ResumeOptions {
    /// Capture a context's history for regeneration from `time`
    pub fn from_context(ctx: &GenerationContext, time: f64) -> Self {
        Self {
            time,
            state_events: ctx.state_events.clone(),
            beat_actions: ctx.beat_actions.clone(),
            obstacles: ctx.obstacles.clone(),
            portals: ctx.portals.clone(),
            columns: ctx.columns.clone(),
        }
    }
}

/// Loosening applied on retries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// 0-based attempt number (also salts the RNG streams)
    pub attempt: u32,
    /// Widens every gap (> 1 on retries)
    pub safety_multiplier: f64,
    /// Scales hazard placement probability (< 1 on retries)
    pub hazard_multiplier: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            attempt: 0,
            safety_multiplier: 1.0,
            hazard_multiplier: 1.0,
        }
    }
}

/// The state of one generation, owned by exactly one pipeline run.
///
/// The planner fills the timeline and reference path, the terrain generator
/// adds geometry, and the validator replaces `autoplay_log` with its proof.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub difficulty: u8,
    pub base_speed: f64,
    pub measure_duration: f64,
    pub state_events: Vec<StateEvent>,
    pub beat_actions: Vec<BeatAction>,
    /// Forward simulation of the planned actions (tick-indexed from 0)
    pub reference_path: Vec<PathPoint>,
    /// Authoritative trajectory; the reference path until validated
    pub autoplay_log: Vec<PathPoint>,
    /// Sorted by x
    pub obstacles: Vec<Obstacle>,
    /// Sorted by x
    pub portals: Vec<Portal>,
    pub columns: Vec<TerrainColumn>,
    pub total_length: f64,
    pub safety_multiplier: f64,
    pub hazard_multiplier: f64,
    /// Set when this context regenerated a tail
    pub resumed_from: Option<f64>,
    /// Path x up to which the previous attempt's geometry was kept
    pub frozen_until_x: Option<f64>,
}

impl GenerationContext {
    /// Reference-path time at which the path first reaches `x`
    pub fn time_at_x(&self, x: f64) -> f64 {
        let path = &self.reference_path;
        let idx = path.partition_point(|p| p.x < x);
        match path.get(idx).or_else(|| path.last()) {
            Some(p) => p.time,
            None => 0.0,
        }
    }

    /// Reference-path point at time `t`
    pub fn point_at_time(&self, t: f64) -> Option<&PathPoint> {
        let idx = self.reference_path.partition_point(|p| p.time < t - 1e-9);
        self.reference_path.get(idx)
    }

    /// Terrain column containing `x`
    pub fn column_at(&self, x: f64) -> Option<&TerrainColumn> {
        let idx = self.columns.partition_point(|c| c.x + COLUMN_WIDTH <= x);
        self.columns.get(idx).filter(|c| c.x <= x)
    }

    /// Centre of the terrain opening at `x`
    pub fn gap_center_at(&self, x: f64) -> Option<f64> {
        self.column_at(x).map(|c| (c.ceiling + c.floor) * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MapRequest {
        MapRequest {
            title: "test".into(),
            seed: 1,
            beat_times: vec![0.5, 1.0],
            sections: vec![Section {
                start_time: 0.0,
                end_time: 4.0,
                intensity: 0.9,
            }],
            duration: 10.0,
            bpm: 120.0,
            measure_length: 0.0,
            difficulty: 5,
        }
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(request().validate().is_ok());
        let mut bad = request();
        bad.difficulty = 31;
        assert!(matches!(bad.validate(), Err(MapError::InvalidDifficulty(31))));
        let mut bad = request();
        bad.bpm = 0.0;
        assert!(matches!(bad.validate(), Err(MapError::InvalidTempo(_))));
        let mut bad = request();
        bad.beat_times = vec![1.0, 0.5];
        assert!(matches!(bad.validate(), Err(MapError::UnsortedBeats { index: 1 })));
    }

    #[test]
    fn test_measure_duration_prefers_explicit_length() {
        let mut req = request();
        assert_eq!(req.measure_duration(), 2.0);
        req.measure_length = 1.5;
        assert_eq!(req.measure_duration(), 1.5);
        assert_eq!(req.measure_floor(4.4), 3.0);
    }

    #[test]
    fn test_intensity_lookup() {
        let req = request();
        assert_eq!(req.intensity_at(1.0), 0.9);
        assert_eq!(req.intensity_at(5.0), 0.5);
    }

    #[test]
    fn test_request_json_is_camel_case() {
        let json = r#"{"beatTimes":[0.5],"duration":5,"bpm":120,"difficulty":1}"#;
        let req: MapRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.beat_times, vec![0.5]);
        assert_eq!(req.measure_length, 0.0);
        assert!(req.sections.is_empty());
    }
}
