//! Map record exchange format
//!
//! A finished map is stored as one camelCase JSON document. The autoplay log
//! is packed into a flat `[x, y, holding, time, ...]` array.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::generator::{GenerationContext, MapRequest, Section};
use crate::sim::{Obstacle, PathPoint, Portal};

/// Numbers per packed path point
pub const PACKED_STRIDE: usize = 4;

/// Persisted map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRecord {
    pub title: String,
    pub difficulty: u8,
    pub seed: u64,
    pub engine_obstacles: Vec<Obstacle>,
    pub engine_portals: Vec<Portal>,
    /// Packed autoplay log
    pub autoplay_log: Vec<f64>,
    pub duration: f64,
    pub beat_times: Vec<f64>,
    #[serde(default)]
    pub sections: Vec<Section>,
    pub bpm: f64,
    #[serde(default)]
    pub measure_length: f64,
}

impl MapRecord {
    /// Capture a generated map together with the request it came from
    pub fn from_context(request: &MapRequest, ctx: &GenerationContext) -> Self {
        Self {
            title: request.title.clone(),
            difficulty: ctx.difficulty,
            seed: request.seed,
            engine_obstacles: ctx.obstacles.clone(),
            engine_portals: ctx.portals.clone(),
            autoplay_log: pack_autoplay_log(&ctx.autoplay_log),
            duration: request.duration,
            beat_times: request.beat_times.clone(),
            sections: request.sections.clone(),
            bpm: request.bpm,
            measure_length: request.measure_duration(),
        }
    }

    /// Request that regenerates this map from scratch
    pub fn request(&self) -> MapRequest {
        MapRequest {
            title: self.title.clone(),
            seed: self.seed,
            beat_times: self.beat_times.clone(),
            sections: self.sections.clone(),
            duration: self.duration,
            bpm: self.bpm,
            measure_length: self.measure_length,
            difficulty: self.difficulty,
        }
    }

    /// Unpacked autoplay log
    pub fn path(&self) -> Result<Vec<PathPoint>> {
        unpack_autoplay_log(&self.autoplay_log)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&json)?;
        log::info!(
            "Loaded map '{}' ({} obstacles) from {}",
            record.title,
            record.engine_obstacles.len(),
            path.display()
        );
        Ok(record)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Map '{}' saved to {}", self.title, path.display());
        Ok(())
    }
}

/// Flatten a path to `[x, y, holding (0/1), time]` per point
pub fn pack_autoplay_log(log: &[PathPoint]) -> Vec<f64> {
    let mut packed = Vec::with_capacity(log.len() * PACKED_STRIDE);
    for point in log {
        packed.extend([
            point.x,
            point.y,
            if point.holding { 1.0 } else { 0.0 },
            point.time,
        ]);
    }
    packed
}

/// Inverse of `pack_autoplay_log`
pub fn unpack_autoplay_log(packed: &[f64]) -> Result<Vec<PathPoint>> {
    if packed.len() % PACKED_STRIDE != 0 {
        return Err(MapError::MalformedPackedLog(packed.len()));
    }
    Ok(packed
        .chunks_exact(PACKED_STRIDE)
        .map(|c| PathPoint {
            x: c[0],
            y: c[1],
            holding: c[2] >= 0.5,
            time: c[3],
        })
        .collect())
}
