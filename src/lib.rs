//! Beatwave - music-synchronised wave course generation
//!
//! Core modules:
//! - `sim`: Deterministic motion model, obstacle poses and collision
//! - `generator`: Timeline planning, reference path and terrain generation
//! - `validator`: Backtracking search that proves a map is survivable
//! - `regen`: Retry loop that regenerates the failing tail of a map
//! - `persistence`: Map record exchange format
//! - `settings`: Data-driven tuning for generation and search

pub mod error;
pub mod generator;
pub mod persistence;
pub mod regen;
pub mod settings;
pub mod sim;
pub mod validator;

pub use error::MapError;
pub use generator::{GenerationContext, MapRequest, ResumeOptions, Section, generate};
pub use persistence::MapRecord;
pub use regen::{GenerationReport, generate_playable};
pub use settings::{GeneratorSettings, RetryPolicy, SearchPreset};
pub use validator::{ValidationOutcome, ValidationPoll, Validator};

use glam::DVec2;

/// Engine configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, shared by planner, validator and replay)
    pub const SIM_DT: f64 = 1.0 / 60.0;

    /// Lane bounds (screen space, y grows downward)
    pub const MIN_Y: f64 = 0.0;
    pub const MAX_Y: f64 = 720.0;
    /// Obstacles whose vertical centre is below this rest on the floor
    pub const FLOOR_HALF_Y: f64 = 300.0;

    /// Canonical spawn point
    pub const SPAWN_X: f64 = 200.0;
    pub const SPAWN_Y: f64 = 360.0;

    /// Hitbox half-extent of the wave icon (diamond)
    pub const PLAYER_RADIUS: f64 = 40.0;
    pub const MINI_PLAYER_RADIUS: f64 = 20.0;

    /// Terrain grid
    pub const COLUMN_WIDTH: f64 = 50.0;
    pub const BLOCK_SIZE: f64 = 50.0;

    /// Falling spikes start dropping once the player is this close
    pub const FALL_TRIGGER_DISTANCE: f64 = 150.0;
    /// Falling spike acceleration (px/s²)
    pub const FALL_GRAVITY: f64 = 2500.0;

    pub const MIN_DIFFICULTY: u8 = 1;
    pub const MAX_DIFFICULTY: u8 = 30;
}

/// Rotate a point about a pivot by `degrees` (clockwise on screen, since y grows down)
#[inline]
pub fn rotate_about(point: DVec2, pivot: DVec2, degrees: f64) -> DVec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let d = point - pivot;
    pivot + DVec2::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos)
}

/// Point on a circle of `radius` around `center` at angle `theta` (radians)
#[inline]
pub fn orbit_point(center: DVec2, radius: f64, theta: f64) -> DVec2 {
    center + DVec2::new(theta.cos(), theta.sin()) * radius
}

/// Clamp a difficulty into the supported range
#[inline]
pub fn clamp_difficulty(difficulty: u8) -> u8 {
    difficulty.clamp(consts::MIN_DIFFICULTY, consts::MAX_DIFFICULTY)
}
