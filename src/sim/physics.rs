//! Wave motion model
//!
//! The one integration function shared by the planner's forward simulation,
//! the validator and replay. Any change here changes every proof, so keep it
//! pure and free of hidden state.

use super::state::{PlayerState, SizeClass};
use crate::clamp_difficulty;
use crate::consts::*;

/// Horizontal speed at multiplier 1 (px/s)
pub fn base_speed(difficulty: u8) -> f64 {
    let d = clamp_difficulty(difficulty) as f64;
    300.0 + 6.0 * (d - 1.0)
}

/// Wave angle in degrees. Mini mode steepens as speed rises so the zig-zag
/// keeps its on-screen slope.
pub fn wave_angle(size: SizeClass, speed_multiplier: f64) -> f64 {
    match size {
        SizeClass::Normal => 45.0,
        SizeClass::Mini => {
            if speed_multiplier >= 1.9 {
                78.0
            } else if speed_multiplier >= 1.7 {
                72.0
            } else {
                60.0
            }
        }
    }
}

/// Lane clamp for a given hitbox radius
#[inline]
pub fn clamp_to_lane(y: f64, radius: f64) -> f64 {
    y.clamp(MIN_Y + radius, MAX_Y - radius)
}

/// Velocity (vx, vy) for the current state; vy is negative while rising
#[inline]
pub fn velocity(state: &PlayerState, base_speed: f64) -> (f64, f64) {
    let vx = base_speed * state.speed_multiplier();
    let magnitude = vx * state.wave_angle.to_radians().tan();
    let vy = if state.rising() { -magnitude } else { magnitude };
    (vx, vy)
}

/// Advance one tick with the given input held
pub fn step(state: &mut PlayerState, holding: bool, base_speed: f64, dt: f64) {
    state.holding = holding;
    let (vx, vy) = velocity(state, base_speed);
    state.x += vx * dt;
    state.y = clamp_to_lane(state.y + vy * dt, state.radius());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::SpeedType;

    #[test]
    fn test_base_speed_clamps_difficulty() {
        assert_eq!(base_speed(0), base_speed(1));
        assert_eq!(base_speed(99), base_speed(30));
        assert!(base_speed(30) > base_speed(1));
    }

    #[test]
    fn test_mini_wave_angle_thresholds() {
        assert_eq!(wave_angle(SizeClass::Mini, 1.0), 60.0);
        assert_eq!(wave_angle(SizeClass::Mini, SpeedType::Triple.multiplier()), 72.0);
        assert_eq!(wave_angle(SizeClass::Mini, SpeedType::Quadruple.multiplier()), 78.0);
        assert_eq!(wave_angle(SizeClass::Normal, 2.0), 45.0);
    }

    #[test]
    fn test_step_moves_diagonally_at_45_degrees() {
        let mut p = PlayerState::spawn();
        let speed = base_speed(1);
        step(&mut p, true, speed, SIM_DT);
        let dx = p.x - SPAWN_X;
        let dy = p.y - SPAWN_Y;
        assert!((dx - speed * SIM_DT).abs() < 1e-9);
        // Holding rises (negative y)
        assert!((dy + dx).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_gravity_flips_vertical_direction() {
        let mut p = PlayerState::spawn();
        p.gravity_inverted = true;
        step(&mut p, true, base_speed(1), SIM_DT);
        assert!(p.y > SPAWN_Y);
    }

    #[test]
    fn test_position_clamps_to_lane() {
        let mut p = PlayerState::at(0.0, MIN_Y + 41.0);
        for _ in 0..120 {
            step(&mut p, true, base_speed(30), SIM_DT);
        }
        assert_eq!(p.y, MIN_Y + PLAYER_RADIUS);
        for _ in 0..240 {
            step(&mut p, false, base_speed(30), SIM_DT);
        }
        assert_eq!(p.y, MAX_Y - PLAYER_RADIUS);
    }

    #[test]
    fn test_step_is_reproducible() {
        let mut a = PlayerState::spawn();
        let mut b = PlayerState::spawn();
        for i in 0..500 {
            let hold = (i / 7) % 2 == 0;
            step(&mut a, hold, base_speed(17), SIM_DT);
            step(&mut b, hold, base_speed(17), SIM_DT);
        }
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
    }
}
