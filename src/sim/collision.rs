//! Collision between the wave hitbox and obstacles
//!
//! The hitbox is the wave icon's diamond: the centre plus four corners at
//! `(±r, 0)` and `(0, ±r)`. A hit is any sample landing inside the obstacle's
//! shape at the given simulation time.

use glam::DVec2;

use super::geometry::{Rect, point_in_circle, point_in_ellipse, point_in_triangle};
use super::obstacle::{Anchor, Obstacle, ObstacleKind, Pose, ShapeClass, pose_at};
use crate::consts::*;
use crate::rotate_about;

/// Ellipse hazards collide at 90% of their drawn box
const ELLIPSE_SHRINK: f64 = 0.9;
/// Laser bands cover this share of the cross dimension
const LASER_BAND: f64 = 0.4;

/// Centre plus the four diamond corners
#[inline]
pub fn hitbox_samples(px: f64, py: f64, radius: f64) -> [DVec2; 5] {
    [
        DVec2::new(px, py),
        DVec2::new(px - radius, py),
        DVec2::new(px + radius, py),
        DVec2::new(px, py - radius),
        DVec2::new(px, py + radius),
    ]
}

/// Does the hitbox at `(px, py)` overlap `obstacle` at time `t`?
pub fn collide(obstacle: &Obstacle, px: f64, py: f64, radius: f64, t: f64) -> bool {
    if obstacle.kind == ObstacleKind::FallingSpike && px < obstacle.x - FALL_TRIGGER_DISTANCE {
        return false;
    }

    let pose = pose_at(obstacle, t);
    let reach = obstacle.pose_bounds(&pose).expand(radius);
    if !reach.contains(DVec2::new(px, py)) {
        return false;
    }

    let samples = hitbox_samples(px, py, radius);
    match obstacle.kind.shape() {
        ShapeClass::None => false,
        ShapeClass::Orbital => orbital_hit(obstacle, &pose, &samples, t),
        shape => {
            let rotate = obstacle.kind.uses_frame_rotation() && pose.rotation != 0.0;
            let pivot = pose.center();
            samples.iter().any(|&sample| {
                let local = if rotate {
                    rotate_about(sample, pivot, -pose.rotation)
                } else {
                    sample
                };
                shape_contains(shape, obstacle.anchor(), &pose, local)
            })
        }
    }
}

/// Point test in the obstacle's local (unrotated) frame
fn shape_contains(shape: ShapeClass, anchor: Anchor, pose: &Pose, p: DVec2) -> bool {
    let rect = pose.rect();
    match shape {
        ShapeClass::Rect => rect.contains(p),
        ShapeClass::Spike => {
            let (a, b, apex) = spike_vertices(anchor, &rect);
            point_in_triangle(p, a, b, apex)
        }
        ShapeClass::RightTriangle => {
            let [a, b, c] = right_triangle_vertices(anchor, pose.rotation, &rect);
            point_in_triangle(p, a, b, c)
        }
        ShapeClass::Ellipse => point_in_ellipse(
            p,
            rect.center(),
            rect.width() * 0.5 * ELLIPSE_SHRINK,
            rect.height() * 0.5 * ELLIPSE_SHRINK,
        ),
        ShapeClass::HorizontalBand => {
            let half = rect.height() * LASER_BAND * 0.5;
            let cy = rect.center().y;
            p.x >= rect.left && p.x <= rect.right && (p.y - cy).abs() <= half
        }
        ShapeClass::VerticalBand => {
            let half = rect.width() * LASER_BAND * 0.5;
            let cx = rect.center().x;
            p.y >= rect.top && p.y <= rect.bottom && (p.x - cx).abs() <= half
        }
        ShapeClass::Orbital | ShapeClass::None => false,
    }
}

/// Base corners and apex of a spike resting on `anchor`
pub fn spike_vertices(anchor: Anchor, rect: &Rect) -> (DVec2, DVec2, DVec2) {
    let mid = rect.center().x;
    match anchor {
        Anchor::Floor => (
            DVec2::new(rect.left, rect.bottom),
            DVec2::new(rect.right, rect.bottom),
            DVec2::new(mid, rect.top),
        ),
        Anchor::Ceiling => (
            DVec2::new(rect.left, rect.top),
            DVec2::new(rect.right, rect.top),
            DVec2::new(mid, rect.bottom),
        ),
    }
}

/// Solid half of a slope box. Positive rotation rises to the right; the
/// floor variant is solid below the diagonal, the ceiling variant above it.
pub fn right_triangle_vertices(anchor: Anchor, rotation: f64, rect: &Rect) -> [DVec2; 3] {
    let tl = DVec2::new(rect.left, rect.top);
    let tr = DVec2::new(rect.right, rect.top);
    let bl = DVec2::new(rect.left, rect.bottom);
    let br = DVec2::new(rect.right, rect.bottom);
    let rises = rotation >= 0.0;
    match (anchor, rises) {
        (Anchor::Floor, true) => [bl, tr, br],
        (Anchor::Floor, false) => [tl, br, bl],
        (Anchor::Ceiling, true) => [bl, tr, tl],
        (Anchor::Ceiling, false) => [tl, br, tr],
    }
}

fn orbital_hit(obstacle: &Obstacle, pose: &Pose, samples: &[DVec2; 5], t: f64) -> bool {
    let body = pose.center();
    let body_radius = pose.width.min(pose.height) * 0.5;
    if samples.iter().any(|&s| point_in_circle(s, body, body_radius)) {
        return true;
    }
    obstacle
        .orbiters_at(pose, t)
        .into_iter()
        .any(|(center, radius)| samples.iter().any(|&s| point_in_circle(s, center, radius)))
}

/// X-sorted obstacle index for sweep queries.
///
/// Each obstacle's all-time bounds are cached at construction. Because
/// animated obstacles can reach left of their `x`, lookups widen the binary
/// search by the largest such reach.
pub struct ObstacleIndex<'a> {
    obstacles: &'a [Obstacle],
    bounds: Vec<Rect>,
    max_left_reach: f64,
    max_right_reach: f64,
}

impl<'a> ObstacleIndex<'a> {
    /// `obstacles` must be sorted by `x`
    pub fn new(obstacles: &'a [Obstacle]) -> Self {
        debug_assert!(obstacles.windows(2).all(|w| w[0].x <= w[1].x));
        let bounds: Vec<Rect> = obstacles.iter().map(Obstacle::swept_bounds).collect();
        let mut max_left_reach: f64 = 0.0;
        let mut max_right_reach: f64 = 0.0;
        for (obs, b) in obstacles.iter().zip(&bounds) {
            max_left_reach = max_left_reach.max(obs.x - b.left);
            max_right_reach = max_right_reach.max(b.right - obs.x);
        }
        Self {
            obstacles,
            bounds,
            max_left_reach,
            max_right_reach,
        }
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Obstacles whose swept bounds overlap `[left, right]` horizontally
    pub fn candidates(&self, left: f64, right: f64) -> impl Iterator<Item = &'a Obstacle> + '_ {
        let start = self
            .obstacles
            .partition_point(|o| o.x < left - self.max_right_reach);
        let end = self
            .obstacles
            .partition_point(|o| o.x <= right + self.max_left_reach);
        let obstacles = self.obstacles;
        (start..end.max(start))
            .filter(move |&i| self.bounds[i].overlaps_x(left, right))
            .map(move |i| &obstacles[i])
    }

    /// Does the hitbox collide with anything at time `t`?
    pub fn collides(&self, px: f64, py: f64, radius: f64, t: f64) -> bool {
        self.candidates(px - radius, px + radius)
            .any(|obs| collide(obs, px, py, radius, t))
    }

    /// Ids of obstacles whose bounds come within `distance` of a point
    pub fn near(&self, x: f64, y: f64, distance: f64) -> Vec<u32> {
        self.candidates(x - distance, x + distance)
            .filter(|obs| {
                obs.swept_bounds()
                    .expand(distance)
                    .contains(DVec2::new(x, y))
            })
            .map(|obs| obs.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike_c() -> Obstacle {
        serde_json::from_str(r#"{"type":"spike","x":100,"y":650,"width":50,"height":40}"#)
            .unwrap()
    }

    #[test]
    fn test_floor_spike_apex_and_outside() {
        let spike = spike_c();
        assert!(collide(&spike, 125.0, 615.0, PLAYER_RADIUS, 0.0));
        assert!(!collide(&spike, 101.0, 651.0, PLAYER_RADIUS, 0.0));
    }

    #[test]
    fn test_block_hit_and_miss() {
        let block = Obstacle::new(1, ObstacleKind::Block, 300.0, 600.0, 50.0, 120.0);
        assert!(collide(&block, 325.0, 580.0, PLAYER_RADIUS, 0.0));
        assert!(!collide(&block, 325.0, 555.0, PLAYER_RADIUS, 0.0));
        assert!(!collide(&block, 325.0, 575.0, MINI_PLAYER_RADIUS, 0.0));
    }

    #[test]
    fn test_rotated_block_counter_rotates_samples() {
        // A thin horizontal bar rotated 90° becomes vertical
        let bar = Obstacle::new(1, ObstacleKind::RotatedBlock, 0.0, 95.0, 200.0, 10.0)
            .with_rotation(90.0);
        assert!(collide(&bar, 100.0, 20.0, 5.0, 0.0));
        assert!(!collide(&bar, 20.0, 100.0, 5.0, 0.0));
    }

    #[test]
    fn test_slope_orientation_from_rotation_sign() {
        let rising = Obstacle::new(1, ObstacleKind::Slope, 0.0, 600.0, 50.0, 50.0)
            .with_rotation(45.0)
            .with_anchor(Anchor::Floor);
        // Solid bottom-right, open top-left
        assert!(collide(&rising, 45.0, 645.0, 1.0, 0.0));
        assert!(!collide(&rising, 5.0, 605.0, 1.0, 0.0));

        let falling = Obstacle::new(1, ObstacleKind::Slope, 0.0, 600.0, 50.0, 50.0)
            .with_rotation(-45.0)
            .with_anchor(Anchor::Floor);
        assert!(collide(&falling, 5.0, 645.0, 1.0, 0.0));
        assert!(!collide(&falling, 45.0, 605.0, 1.0, 0.0));
    }

    #[test]
    fn test_ellipse_is_shrunk() {
        let saw = Obstacle::new(1, ObstacleKind::Mine, 0.0, 0.0, 100.0, 100.0);
        assert!(collide(&saw, 50.0, 50.0, 1.0, 0.0));
        // Corner of the box but outside the 0.9 ellipse
        assert!(!collide(&saw, 50.0, 2.0, 1.0, 0.0));
    }

    #[test]
    fn test_laser_band_is_thin() {
        let laser = Obstacle::new(1, ObstacleKind::Laser, 0.0, 100.0, 200.0, 100.0);
        assert!(collide(&laser, 100.0, 150.0, 1.0, 0.0));
        assert!(!collide(&laser, 100.0, 105.0, 1.0, 0.0));
        let v_laser = Obstacle::new(1, ObstacleKind::VLaser, 0.0, 100.0, 100.0, 200.0);
        assert!(collide(&v_laser, 50.0, 200.0, 1.0, 0.0));
        assert!(!collide(&v_laser, 5.0, 200.0, 1.0, 0.0));
    }

    #[test]
    fn test_planet_moon_moves_with_time() {
        let mut planet = Obstacle::new(1, ObstacleKind::Planet, 200.0, 200.0, 40.0, 40.0);
        planet.children = vec![Obstacle::new(0, ObstacleKind::Orb, 0.0, 0.0, 20.0, 20.0)];
        planet.custom_data = Some(super::super::obstacle::CustomData {
            orbit: Some(super::super::obstacle::OrbitData {
                orbit_distance: 60.0,
                orbit_speed: std::f64::consts::PI,
                nested_orbit: None,
            }),
            ..Default::default()
        });
        // Moon at theta 0 sits right of centre (220 + 60, 220)
        assert!(collide(&planet, 280.0, 220.0, 1.0, 0.0));
        assert!(!collide(&planet, 280.0, 220.0, 1.0, 0.5));
        // Half a turn later it sits on the left
        assert!(collide(&planet, 160.0, 220.0, 1.0, 1.0));
    }

    #[test]
    fn test_falling_spike_needs_trigger_distance() {
        let mut spike = Obstacle::new(1, ObstacleKind::FallingSpike, 500.0, 0.0, 50.0, 60.0)
            .with_anchor(Anchor::Ceiling);
        spike.custom_data.as_mut().unwrap().trigger_time = Some(0.0);
        assert!(!collide(&spike, 340.0, 20.0, 1.0, 0.0));
        assert!(collide(&spike, 525.0, 20.0, 1.0, 0.0));
        // Fallen far below its rest position after a second
        assert!(!collide(&spike, 525.0, 20.0, 1.0, 1.0));
    }

    #[test]
    fn test_unknown_kind_never_collides() {
        let json = r#"{"type":"blob","x":0,"y":0,"width":1000,"height":1000}"#;
        let obs: Obstacle = serde_json::from_str(json).unwrap();
        assert!(!collide(&obs, 500.0, 500.0, PLAYER_RADIUS, 0.0));
    }

    #[test]
    fn test_index_candidates_include_wide_reach() {
        let mover = Obstacle::new(1, ObstacleKind::SwingBlade, 400.0, 300.0, 40.0, 40.0);
        let obstacles = vec![
            Obstacle::new(0, ObstacleKind::Block, 0.0, 0.0, 50.0, 50.0),
            mover,
            Obstacle::new(2, ObstacleKind::Block, 900.0, 0.0, 50.0, 50.0),
        ];
        let index = ObstacleIndex::new(&obstacles);
        let ids: Vec<u32> = index.candidates(370.0, 380.0).map(|o| o.id).collect();
        assert_eq!(ids, vec![1]);
        assert!(index.candidates(600.0, 800.0).next().is_none());
        assert_eq!(index.near(25.0, 25.0, 10.0), vec![0]);
    }
}
