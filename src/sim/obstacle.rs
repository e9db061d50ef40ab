//! Obstacle model and time-parameterised poses
//!
//! An obstacle's collidable pose at time `t` is always `pose_at(obstacle, t)`.
//! Nothing about animation is stored between ticks, so the planner, the
//! validator and replay can never disagree about where a hazard is.

use std::f64::consts::TAU;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geometry::{Rect, rotated_bounds};
use crate::consts::*;
use crate::orbit_point;

/// Obstacle types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Block,
    RotatedBlock,
    MovingBlock,
    Spike,
    MiniSpike,
    GrowingSpike,
    FallingSpike,
    Slope,
    Triangle,
    SteepTriangle,
    Saw,
    SpikeBall,
    Mine,
    Orb,
    Laser,
    VLaser,
    LaserBeam,
    Planet,
    Star,
    Rotor,
    Hammer,
    SwingBlade,
    PistonV,
    CrusherJaw,
    /// Unrecognised tag; never collides
    #[serde(other)]
    Unknown,
}

/// Collision shape family for a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    Rect,
    /// Isosceles triangle pointing away from its anchor surface
    Spike,
    /// Right triangle filling half the box; hypotenuse from rotation sign
    RightTriangle,
    /// Ellipse inscribed in the box, shrunk to 90%
    Ellipse,
    HorizontalBand,
    VerticalBand,
    /// Body circle plus orbiting moons
    Orbital,
    None,
}

/// Motion applied when no explicit movement descriptor is given
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImplicitMotion {
    /// Continuous rotation (deg/s)
    Spin(f64),
    /// Vertical bob (amplitude, rad/s)
    Bob(f64, f64),
    /// Pendulum rotation about the centre (amplitude deg, rad/s)
    Swing(f64, f64),
    /// Pendulum bob displacement (arm length, amplitude rad, rad/s)
    Pendulum(f64, f64, f64),
    /// Vertical pump away from the anchor (travel, rad/s)
    Pump(f64, f64),
    /// Half-wave slam away from the anchor (travel, rad/s)
    Slam(f64, f64),
    /// Height oscillates between 40% and 100% (rad/s)
    Grow(f64),
}

impl ObstacleKind {
    pub fn shape(self) -> ShapeClass {
        match self {
            ObstacleKind::Block
            | ObstacleKind::RotatedBlock
            | ObstacleKind::MovingBlock
            | ObstacleKind::Rotor
            | ObstacleKind::Hammer
            | ObstacleKind::PistonV
            | ObstacleKind::CrusherJaw => ShapeClass::Rect,
            ObstacleKind::Spike
            | ObstacleKind::MiniSpike
            | ObstacleKind::GrowingSpike
            | ObstacleKind::FallingSpike => ShapeClass::Spike,
            ObstacleKind::Slope | ObstacleKind::Triangle | ObstacleKind::SteepTriangle => {
                ShapeClass::RightTriangle
            }
            ObstacleKind::Saw
            | ObstacleKind::SpikeBall
            | ObstacleKind::Mine
            | ObstacleKind::Orb
            | ObstacleKind::SwingBlade => ShapeClass::Ellipse,
            ObstacleKind::Laser | ObstacleKind::LaserBeam => ShapeClass::HorizontalBand,
            ObstacleKind::VLaser => ShapeClass::VerticalBand,
            ObstacleKind::Planet | ObstacleKind::Star => ShapeClass::Orbital,
            ObstacleKind::Unknown => ShapeClass::None,
        }
    }

    /// Whether `rotation` rotates the collision frame. Right triangles use
    /// the rotation sign for orientation instead.
    pub fn uses_frame_rotation(self) -> bool {
        !matches!(
            self.shape(),
            ShapeClass::RightTriangle | ShapeClass::Orbital | ShapeClass::None
        )
    }

    pub fn implicit_motion(self) -> Option<ImplicitMotion> {
        match self {
            ObstacleKind::Saw => Some(ImplicitMotion::Spin(180.0)),
            ObstacleKind::Rotor => Some(ImplicitMotion::Spin(120.0)),
            ObstacleKind::SpikeBall => Some(ImplicitMotion::Bob(25.0, 2.0)),
            ObstacleKind::Hammer => Some(ImplicitMotion::Swing(50.0, 2.0)),
            ObstacleKind::SwingBlade => Some(ImplicitMotion::Pendulum(40.0, 0.8, 1.6)),
            ObstacleKind::PistonV => Some(ImplicitMotion::Pump(60.0, 3.0)),
            ObstacleKind::CrusherJaw => Some(ImplicitMotion::Slam(80.0, 2.5)),
            ObstacleKind::GrowingSpike => Some(ImplicitMotion::Grow(2.0)),
            ObstacleKind::Block
            | ObstacleKind::RotatedBlock
            | ObstacleKind::MovingBlock
            | ObstacleKind::Spike
            | ObstacleKind::MiniSpike
            | ObstacleKind::FallingSpike
            | ObstacleKind::Slope
            | ObstacleKind::Triangle
            | ObstacleKind::SteepTriangle
            | ObstacleKind::Mine
            | ObstacleKind::Orb
            | ObstacleKind::Laser
            | ObstacleKind::VLaser
            | ObstacleKind::LaserBeam
            | ObstacleKind::Planet
            | ObstacleKind::Star
            | ObstacleKind::Unknown => None,
        }
    }
}

/// Explicit movement type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    #[default]
    None,
    Updown,
    Rotate,
}

/// Explicit movement descriptor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(rename = "type", default)]
    pub kind: MovementKind,
    /// rad/s for updown, deg/s for rotate
    #[serde(default)]
    pub speed: f64,
    /// Amplitude in px for updown
    #[serde(default)]
    pub range: f64,
    /// Phase offset (rad for updown, deg for rotate)
    #[serde(default)]
    pub phase: f64,
}

/// Which surface a spike or slope hangs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Floor,
    Ceiling,
}

/// Sub-moons orbiting each moon of a star
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedOrbit {
    pub distance: f64,
    pub speed: f64,
    pub count: u32,
    pub radius: f64,
}

/// Orbit parameters for planets and stars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrbitData {
    pub orbit_distance: f64,
    /// rad/s
    pub orbit_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_orbit: Option<NestedOrbit>,
}

/// Kind-specific extra data
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbit: Option<OrbitData>,
    /// Time a falling spike starts to drop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

/// A placed obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    #[serde(default)]
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees; slope kinds read only its sign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
    /// Orbiting moons (planet/star); only their size is used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Obstacle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,
}

/// Collidable placement at an instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees
    pub rotation: f64,
}

impl Pose {
    pub fn rect(&self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

/// Default orbit for planets/stars without custom data
const DEFAULT_ORBIT_SPEED: f64 = 1.5;

impl Obstacle {
    pub fn new(id: u32, kind: ObstacleKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            width,
            height,
            rotation: None,
            movement: None,
            children: Vec::new(),
            custom_data: None,
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.custom_data.get_or_insert_with(CustomData::default).anchor = Some(anchor);
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = Some(degrees);
        self
    }

    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = Some(movement);
        self
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn rect(&self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }

    /// Anchor surface: explicit custom data, else the half of the lane it sits in
    pub fn anchor(&self) -> Anchor {
        if let Some(anchor) = self.custom_data.and_then(|c| c.anchor) {
            return anchor;
        }
        if self.y > FLOOR_HALF_Y {
            Anchor::Floor
        } else {
            Anchor::Ceiling
        }
    }

    pub fn orbit(&self) -> OrbitData {
        self.custom_data
            .and_then(|c| c.orbit)
            .unwrap_or(OrbitData {
                orbit_distance: self.width.max(self.height) * 0.9,
                orbit_speed: DEFAULT_ORBIT_SPEED,
                nested_orbit: None,
            })
    }

    pub fn trigger_time(&self) -> Option<f64> {
        self.custom_data.and_then(|c| c.trigger_time)
    }

    fn explicit_movement(&self) -> Option<Movement> {
        self.movement.filter(|m| m.kind != MovementKind::None)
    }

    fn phase(&self) -> f64 {
        self.movement.map(|m| m.phase).unwrap_or(0.0)
    }

    /// Pose with no animation applied
    pub fn rest_pose(&self) -> Pose {
        Pose {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation.unwrap_or(0.0),
        }
    }

    /// True when the pose depends on time
    pub fn is_animated(&self) -> bool {
        self.explicit_movement().is_some()
            || self.kind.implicit_motion().is_some()
            || self.kind == ObstacleKind::FallingSpike && self.trigger_time().is_some()
            || self.kind.shape() == ShapeClass::Orbital && !self.children.is_empty()
    }

    /// Centres and radii of every orbiting body at time `t`
    pub fn orbiters_at(&self, pose: &Pose, t: f64) -> Vec<(DVec2, f64)> {
        let orbit = self.orbit();
        let center = pose.center();
        let count = self.children.len();
        let mut bodies = Vec::with_capacity(count);
        for (i, child) in self.children.iter().enumerate() {
            let theta = t * orbit.orbit_speed + i as f64 * TAU / count as f64;
            let moon = orbit_point(center, orbit.orbit_distance, theta);
            bodies.push((moon, child.width.min(child.height) * 0.5));

            if self.kind != ObstacleKind::Star {
                continue;
            }
            if let Some(nested) = orbit.nested_orbit {
                let sub_count = nested.count.max(1);
                for j in 0..sub_count {
                    let sub_theta = t * nested.speed + j as f64 * TAU / sub_count as f64;
                    bodies.push((orbit_point(moon, nested.distance, sub_theta), nested.radius));
                }
            }
        }
        bodies
    }

    /// Furthest distance any orbiter reaches from the body centre
    pub fn orbit_reach(&self) -> f64 {
        let body = self.width.max(self.height) * 0.5;
        if self.children.is_empty() {
            return body;
        }
        let orbit = self.orbit();
        let moon = self
            .children
            .iter()
            .map(|c| c.width.min(c.height) * 0.5)
            .fold(0.0, f64::max);
        let nested = match (self.kind, orbit.nested_orbit) {
            (ObstacleKind::Star, Some(n)) => n.distance + n.radius,
            _ => 0.0,
        };
        body.max(orbit.orbit_distance + moon.max(nested))
    }

    /// Bounding box of the collidable geometry for a given pose
    pub fn pose_bounds(&self, pose: &Pose) -> Rect {
        match self.kind.shape() {
            ShapeClass::Orbital => {
                let reach = self.orbit_reach();
                Rect::around(pose.center(), reach, reach)
            }
            _ if self.kind.uses_frame_rotation() => rotated_bounds(&pose.rect(), pose.rotation),
            _ => pose.rect(),
        }
    }

    /// Conservative bounding box over all time
    pub fn swept_bounds(&self) -> Rect {
        let rest = self.rest_pose();
        let mut bounds = self.pose_bounds(&rest);
        let spun = Rect::around(
            rest.center(),
            rest.width.hypot(rest.height) * 0.5,
            rest.width.hypot(rest.height) * 0.5,
        );
        let away = match self.anchor() {
            Anchor::Floor => -1.0,
            Anchor::Ceiling => 1.0,
        };

        if let Some(movement) = self.explicit_movement() {
            return match movement.kind {
                MovementKind::Updown => Rect {
                    top: bounds.top - movement.range.abs(),
                    bottom: bounds.bottom + movement.range.abs(),
                    ..bounds
                },
                MovementKind::Rotate if self.kind.uses_frame_rotation() => spun,
                _ => bounds,
            };
        }

        match self.kind.implicit_motion() {
            Some(ImplicitMotion::Spin(_)) | Some(ImplicitMotion::Swing(..)) => {
                if self.kind.uses_frame_rotation() {
                    bounds = spun;
                }
            }
            Some(ImplicitMotion::Bob(amplitude, _)) => {
                bounds.top -= amplitude;
                bounds.bottom += amplitude;
            }
            Some(ImplicitMotion::Pendulum(arm, amplitude, _)) => {
                let dx = arm * amplitude.sin();
                let dy = arm * (1.0 - amplitude.cos());
                bounds.left -= dx;
                bounds.right += dx;
                bounds.bottom += dy;
            }
            Some(ImplicitMotion::Pump(travel, _)) | Some(ImplicitMotion::Slam(travel, _)) => {
                if away < 0.0 {
                    bounds.top -= travel;
                } else {
                    bounds.bottom += travel;
                }
            }
            Some(ImplicitMotion::Grow(_)) | None => {}
        }

        if self.kind == ObstacleKind::FallingSpike && self.trigger_time().is_some() {
            bounds.bottom = bounds.bottom.max(MAX_Y + self.height);
        }
        bounds
    }

    /// Bounding box over the time window `[t0, t1]`. Exact for static and
    /// falling obstacles, conservative otherwise.
    pub fn extent_during(&self, t0: f64, t1: f64) -> Rect {
        if self.kind == ObstacleKind::FallingSpike && self.explicit_movement().is_none() {
            let a = self.pose_bounds(&pose_at(self, t0));
            let b = self.pose_bounds(&pose_at(self, t1));
            return a.union(&b);
        }
        if self.is_animated() {
            self.swept_bounds()
        } else {
            self.pose_bounds(&self.rest_pose())
        }
    }
}

/// Collidable pose of an obstacle at simulation time `t`
pub fn pose_at(obstacle: &Obstacle, t: f64) -> Pose {
    let mut pose = obstacle.rest_pose();
    let phase = obstacle.phase();

    if let Some(movement) = obstacle.explicit_movement() {
        match movement.kind {
            MovementKind::Updown => {
                pose.y += movement.range * (t * movement.speed + movement.phase).sin();
            }
            MovementKind::Rotate => {
                pose.rotation += movement.phase + t * movement.speed;
            }
            MovementKind::None => {}
        }
    } else if let Some(motion) = obstacle.kind.implicit_motion() {
        let away = match obstacle.anchor() {
            Anchor::Floor => -1.0,
            Anchor::Ceiling => 1.0,
        };
        match motion {
            ImplicitMotion::Spin(deg_per_sec) => {
                pose.rotation += t * deg_per_sec;
            }
            ImplicitMotion::Bob(amplitude, speed) => {
                pose.y += amplitude * (t * speed + phase).sin();
            }
            ImplicitMotion::Swing(amplitude, speed) => {
                pose.rotation += amplitude * (t * speed + phase).sin();
            }
            ImplicitMotion::Pendulum(arm, amplitude, speed) => {
                let theta = amplitude * (t * speed + phase).sin();
                pose.x += arm * theta.sin();
                pose.y += arm * (1.0 - theta.cos());
            }
            ImplicitMotion::Pump(travel, speed) => {
                pose.y += away * travel * (0.5 - 0.5 * (t * speed + phase).cos());
            }
            ImplicitMotion::Slam(travel, speed) => {
                pose.y += away * travel * (t * speed + phase).sin().max(0.0);
            }
            ImplicitMotion::Grow(speed) => {
                let scale = 0.4 + 0.6 * (0.5 + 0.5 * (t * speed + phase).sin());
                let grown = obstacle.height * scale;
                if obstacle.anchor() == Anchor::Floor {
                    pose.y = obstacle.y + obstacle.height - grown;
                }
                pose.height = grown;
            }
        }
    }

    if obstacle.kind == ObstacleKind::FallingSpike {
        if let Some(trigger) = obstacle.trigger_time() {
            if t > trigger {
                let elapsed = t - trigger;
                let drop = 0.5 * FALL_GRAVITY * elapsed * elapsed;
                pose.y = (pose.y + drop).min(MAX_Y + obstacle.height);
            }
        }
    }

    pose
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_json_tags() {
        let json = r#"{"type":"v_laser","x":0,"y":0,"width":10,"height":100}"#;
        let obs: Obstacle = serde_json::from_str(json).unwrap();
        assert_eq!(obs.kind, ObstacleKind::VLaser);
        let json = r#"{"type":"piston_v","x":0,"y":0,"width":10,"height":100}"#;
        let obs: Obstacle = serde_json::from_str(json).unwrap();
        assert_eq!(obs.kind, ObstacleKind::PistonV);
        let json = r#"{"type":"teapot","x":0,"y":0,"width":10,"height":100}"#;
        let obs: Obstacle = serde_json::from_str(json).unwrap();
        assert_eq!(obs.kind, ObstacleKind::Unknown);
    }

    #[test]
    fn test_static_pose_is_rest_pose() {
        let obs = Obstacle::new(1, ObstacleKind::Block, 10.0, 20.0, 30.0, 40.0);
        assert_eq!(pose_at(&obs, 3.7), obs.rest_pose());
        assert!(!obs.is_animated());
    }

    #[test]
    fn test_updown_movement() {
        let obs = Obstacle::new(1, ObstacleKind::MovingBlock, 0.0, 300.0, 50.0, 50.0).with_movement(
            Movement {
                kind: MovementKind::Updown,
                speed: std::f64::consts::PI,
                range: 40.0,
                phase: 0.0,
            },
        );
        let pose = pose_at(&obs, 0.5);
        assert!((pose.y - 340.0).abs() < 1e-9);
        let swept = obs.swept_bounds();
        assert_eq!(swept.top, 260.0);
        assert_eq!(swept.bottom, 390.0);
    }

    #[test]
    fn test_falling_spike_follows_gravity_after_trigger() {
        let mut obs = Obstacle::new(1, ObstacleKind::FallingSpike, 500.0, 0.0, 50.0, 50.0);
        obs.custom_data = Some(CustomData {
            trigger_time: Some(1.0),
            ..Default::default()
        });
        assert_eq!(pose_at(&obs, 0.9).y, 0.0);
        let pose = pose_at(&obs, 1.2);
        assert!((pose.y - 0.5 * FALL_GRAVITY * 0.04).abs() < 1e-9);
        let window = obs.extent_during(1.0, 1.2);
        assert!((window.bottom - (50.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_growing_spike_stays_anchored_to_floor() {
        let obs = Obstacle::new(1, ObstacleKind::GrowingSpike, 0.0, 600.0, 50.0, 100.0)
            .with_anchor(Anchor::Floor);
        for i in 0..20 {
            let pose = pose_at(&obs, i as f64 * 0.13);
            assert!((pose.y + pose.height - 700.0).abs() < 1e-9);
            assert!(pose.height >= 40.0 - 1e-9 && pose.height <= 100.0 + 1e-9);
        }
    }

    #[test]
    fn test_piston_pumps_away_from_anchor() {
        let obs = Obstacle::new(1, ObstacleKind::PistonV, 0.0, 0.0, 40.0, 100.0)
            .with_anchor(Anchor::Ceiling);
        let pose = pose_at(&obs, std::f64::consts::PI / 3.0);
        assert!(pose.y > 0.0);
        assert!(obs.swept_bounds().bottom >= 160.0);
    }

    #[test]
    fn test_orbit_reach_covers_nested_moons() {
        let mut star = Obstacle::new(1, ObstacleKind::Star, 0.0, 0.0, 60.0, 60.0);
        star.children = vec![Obstacle::new(0, ObstacleKind::Orb, 0.0, 0.0, 20.0, 20.0); 2];
        star.custom_data = Some(CustomData {
            orbit: Some(OrbitData {
                orbit_distance: 70.0,
                orbit_speed: 1.0,
                nested_orbit: Some(NestedOrbit {
                    distance: 25.0,
                    speed: 3.0,
                    count: 2,
                    radius: 6.0,
                }),
            }),
            ..Default::default()
        });
        assert_eq!(star.orbit_reach(), 70.0 + 31.0);
        let pose = star.rest_pose();
        for t in [0.0, 0.7, 2.3] {
            for (center, radius) in star.orbiters_at(&pose, t) {
                assert!(center.distance(pose.center()) + radius <= star.orbit_reach() + 1e-9);
            }
        }
        assert_eq!(star.orbiters_at(&pose, 0.0).len(), 2 + 2 * 2);
    }

    #[test]
    fn test_anchor_defaults_to_lane_half() {
        let floor = Obstacle::new(1, ObstacleKind::Spike, 0.0, 650.0, 50.0, 40.0);
        assert_eq!(floor.anchor(), Anchor::Floor);
        let ceiling = Obstacle::new(1, ObstacleKind::Spike, 0.0, 350.0, 50.0, 40.0)
            .with_anchor(Anchor::Ceiling);
        assert_eq!(ceiling.anchor(), Anchor::Ceiling);
    }
}
