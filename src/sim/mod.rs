//! Deterministic simulation module
//!
//! The motion model, obstacle poses and collision shared by the planner, the
//! validator and replay. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Poses are functions of simulation time, never stored animation state
//! - Stable iteration order (x-sorted obstacles and portals)
//! - No I/O or platform dependencies

pub mod collision;
pub mod geometry;
pub mod obstacle;
pub mod physics;
pub mod portal;
pub mod state;

pub use collision::{ObstacleIndex, collide, hitbox_samples};
pub use geometry::Rect;
pub use obstacle::{
    Anchor, CustomData, Movement, MovementKind, NestedOrbit, Obstacle, ObstacleKind, OrbitData,
    Pose, ShapeClass, pose_at,
};
pub use physics::{base_speed, clamp_to_lane, step, velocity, wave_angle};
pub use portal::{Portal, PortalKind, advance_portals, apply_portal, touch_portals};
pub use state::{
    ActionKind, BeatAction, PathPoint, PlayerState, SizeClass, SpeedType, StateEvent,
};
