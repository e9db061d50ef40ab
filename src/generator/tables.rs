//! Difficulty tuning tables
//!
//! Probabilities, speed weights, gap bands and hazard pools live here as
//! plain data so they can be tested without running generation.

use rand::Rng;

use crate::clamp_difficulty;
use crate::sim::{ObstacleKind, SpeedType};

/// Per-measure modifier probabilities for a difficulty tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierTable {
    pub speed_change: f64,
    pub gravity_flip: f64,
    pub mini_entry: f64,
    pub mini_exit: f64,
    /// Relative weights when a speed change is rolled
    pub speed_weights: &'static [(SpeedType, f64)],
}

const TIER_0: ModifierTable = ModifierTable {
    speed_change: 0.10,
    gravity_flip: 0.05,
    mini_entry: 0.04,
    mini_exit: 0.6,
    speed_weights: &[
        (SpeedType::Quarter, 1.0),
        (SpeedType::Half, 3.0),
        (SpeedType::Normal, 5.0),
        (SpeedType::Double, 2.0),
    ],
};

const TIER_1: ModifierTable = ModifierTable {
    speed_change: 0.18,
    gravity_flip: 0.10,
    mini_entry: 0.04,
    mini_exit: 0.6,
    speed_weights: &[
        (SpeedType::Half, 2.0),
        (SpeedType::Normal, 4.0),
        (SpeedType::Double, 3.0),
        (SpeedType::Triple, 1.0),
    ],
};

const TIER_2: ModifierTable = ModifierTable {
    speed_change: 0.25,
    gravity_flip: 0.15,
    mini_entry: 0.04,
    mini_exit: 0.6,
    speed_weights: &[
        (SpeedType::Half, 1.0),
        (SpeedType::Normal, 3.0),
        (SpeedType::Double, 3.0),
        (SpeedType::Triple, 2.0),
        (SpeedType::Quadruple, 1.0),
    ],
};

const TIER_3: ModifierTable = ModifierTable {
    speed_change: 0.35,
    gravity_flip: 0.22,
    mini_entry: 0.08,
    mini_exit: 0.6,
    speed_weights: &[
        (SpeedType::Normal, 2.0),
        (SpeedType::Double, 3.0),
        (SpeedType::Triple, 3.0),
        (SpeedType::Quadruple, 2.0),
    ],
};

/// Modifier table for a difficulty (tiers break at 8, 16 and 24)
pub fn modifier_table(difficulty: u8) -> &'static ModifierTable {
    match clamp_difficulty(difficulty) {
        1..=7 => &TIER_0,
        8..=15 => &TIER_1,
        16..=23 => &TIER_2,
        _ => &TIER_3,
    }
}

/// Pick a speed other than `current`, weighted by the table and the section
/// intensity (loud sections favour faster speeds, quiet ones slower).
pub fn pick_speed<R: Rng>(
    table: &ModifierTable,
    current: SpeedType,
    intensity: f64,
    rng: &mut R,
) -> Option<SpeedType> {
    let weighted: Vec<(SpeedType, f64)> = table
        .speed_weights
        .iter()
        .filter(|(speed, _)| *speed != current)
        .map(|&(speed, weight)| {
            let faster = speed.rank() > current.rank();
            let boost = if (intensity >= 0.7 && faster) || (intensity <= 0.3 && !faster) {
                2.0
            } else {
                1.0
            };
            (speed, weight * boost)
        })
        .collect();
    pick_weighted(&weighted, rng)
}

/// Weighted choice over `(item, weight)` pairs; `None` when all weights are zero
pub fn pick_weighted<T: Copy, R: Rng>(items: &[(T, f64)], rng: &mut R) -> Option<T> {
    let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.random::<f64>() * total;
    for &(item, weight) in items {
        let weight = weight.max(0.0);
        if roll < weight {
            return Some(item);
        }
        roll -= weight;
    }
    items.iter().rev().find(|(_, w)| *w > 0.0).map(|&(item, _)| item)
}

/// Gap bands: (first difficulty, last difficulty, gap at first, gap at last)
const GAP_BANDS: [(u8, u8, f64, f64); 4] = [
    (1, 7, 600.0, 480.0),
    (8, 15, 460.0, 340.0),
    (16, 23, 330.0, 250.0),
    (24, 30, 240.0, 190.0),
];

/// Mini mode widens the gap by this factor
pub const MINI_GAP_FACTOR: f64 = 1.5;

/// Vertical opening required around the path. Shrinks monotonically with
/// difficulty, scales with `safety`, and is 1.5× wider in mini mode.
pub fn calculate_gap(difficulty: u8, mini: bool, safety: f64) -> f64 {
    let d = clamp_difficulty(difficulty);
    let base = GAP_BANDS
        .iter()
        .find(|(lo, hi, _, _)| (*lo..=*hi).contains(&d))
        .map(|&(lo, hi, start, end)| {
            let span = (hi - lo) as f64;
            start + (end - start) * (d - lo) as f64 / span
        })
        .unwrap_or(GAP_BANDS[0].2);
    let gap = base * safety;
    if mini { gap * MINI_GAP_FACTOR } else { gap }
}

/// Chance that a beat column receives a hazard at multiplier 1
pub fn hazard_density(difficulty: u8) -> f64 {
    let d = clamp_difficulty(difficulty) as f64;
    (0.08 + 0.012 * d).min(0.6)
}

/// Loud sections place more hazards, quiet ones fewer (intensity 0.5 → 1.0)
pub fn intensity_factor(intensity: f64) -> f64 {
    0.6 + 0.8 * intensity.clamp(0.0, 1.0)
}

/// Where a hazard attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// On the floor or ceiling surface
    Surface,
    /// Hanging from the ceiling only
    CeilingOnly,
    /// Floating between the corridor and the terrain
    Air,
}

/// One entry of a hazard pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardSpec {
    pub kind: ObstacleKind,
    pub min_difficulty: u8,
    pub width: f64,
    pub height: f64,
    pub placement: Placement,
}

const fn hazard(
    kind: ObstacleKind,
    min_difficulty: u8,
    width: f64,
    height: f64,
    placement: Placement,
) -> HazardSpec {
    HazardSpec {
        kind,
        min_difficulty,
        width,
        height,
        placement,
    }
}

/// Floor/ceiling hazards
pub const SURFACE_POOL: &[HazardSpec] = &[
    hazard(ObstacleKind::Spike, 1, 50.0, 40.0, Placement::Surface),
    hazard(ObstacleKind::MiniSpike, 1, 30.0, 25.0, Placement::Surface),
    hazard(ObstacleKind::Saw, 4, 60.0, 60.0, Placement::Surface),
    hazard(ObstacleKind::GrowingSpike, 8, 40.0, 60.0, Placement::Surface),
    hazard(ObstacleKind::FallingSpike, 12, 40.0, 50.0, Placement::CeilingOnly),
    hazard(ObstacleKind::Hammer, 14, 30.0, 70.0, Placement::Surface),
    hazard(ObstacleKind::PistonV, 16, 40.0, 60.0, Placement::Surface),
    hazard(ObstacleKind::CrusherJaw, 20, 50.0, 50.0, Placement::Surface),
];

/// Mid-air hazards
pub const AIR_POOL: &[HazardSpec] = &[
    hazard(ObstacleKind::Orb, 1, 40.0, 40.0, Placement::Air),
    hazard(ObstacleKind::Mine, 3, 36.0, 36.0, Placement::Air),
    hazard(ObstacleKind::RotatedBlock, 5, 40.0, 40.0, Placement::Air),
    hazard(ObstacleKind::SpikeBall, 6, 40.0, 40.0, Placement::Air),
    hazard(ObstacleKind::MovingBlock, 10, 50.0, 30.0, Placement::Air),
    hazard(ObstacleKind::Laser, 12, 100.0, 20.0, Placement::Air),
    hazard(ObstacleKind::VLaser, 14, 20.0, 80.0, Placement::Air),
    hazard(ObstacleKind::LaserBeam, 16, 150.0, 16.0, Placement::Air),
    hazard(ObstacleKind::Rotor, 18, 80.0, 16.0, Placement::Air),
    hazard(ObstacleKind::SwingBlade, 18, 36.0, 36.0, Placement::Air),
    hazard(ObstacleKind::Triangle, 9, 50.0, 50.0, Placement::Air),
    hazard(ObstacleKind::Planet, 20, 40.0, 40.0, Placement::Air),
    hazard(ObstacleKind::Star, 25, 36.0, 36.0, Placement::Air),
];

/// Pool entries unlocked at `difficulty`
pub fn unlocked(pool: &[HazardSpec], difficulty: u8) -> Vec<HazardSpec> {
    let d = clamp_difficulty(difficulty);
    pool.iter()
        .copied()
        .filter(|spec| spec.min_difficulty <= d)
        .collect()
}

/// Share of hazard rolls that go to the surface pool
pub const SURFACE_SHARE: f64 = 0.6;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_gap_band_endpoints() {
        assert_eq!(calculate_gap(1, false, 1.0), 600.0);
        assert_eq!(calculate_gap(7, false, 1.0), 480.0);
        assert_eq!(calculate_gap(8, false, 1.0), 460.0);
        assert_eq!(calculate_gap(30, false, 1.0), 190.0);
        assert_eq!(calculate_gap(0, false, 1.0), 600.0);
    }

    #[test]
    fn test_gap_is_monotone_and_mini_scaled() {
        let mut prev = f64::INFINITY;
        for d in 1..=30 {
            let gap = calculate_gap(d, false, 1.0);
            assert!(gap <= prev, "gap grew at difficulty {}", d);
            prev = gap;
            assert_eq!(calculate_gap(d, true, 1.3), 1.5 * calculate_gap(d, false, 1.3));
        }
    }

    #[test]
    fn test_tiers() {
        assert_eq!(modifier_table(1).speed_change, 0.10);
        assert_eq!(modifier_table(8).speed_change, 0.18);
        assert_eq!(modifier_table(23).mini_entry, 0.04);
        assert_eq!(modifier_table(24).mini_entry, 0.08);
        assert_eq!(modifier_table(30).mini_exit, 0.6);
    }

    #[test]
    fn test_pick_speed_never_returns_current() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..200 {
            let picked = pick_speed(modifier_table(20), SpeedType::Double, 0.8, &mut rng);
            assert!(picked.is_some());
            assert_ne!(picked, Some(SpeedType::Double));
        }
    }

    #[test]
    fn test_pick_weighted_respects_zero_weights() {
        let mut rng = Pcg32::seed_from_u64(1);
        let items = [(1, 0.0), (2, 5.0), (3, 0.0)];
        for _ in 0..50 {
            assert_eq!(pick_weighted(&items, &mut rng), Some(2));
        }
        assert_eq!(pick_weighted::<i32, _>(&[(1, 0.0)], &mut rng), None);
    }

    #[test]
    fn test_pools_gate_by_difficulty() {
        let easy = unlocked(AIR_POOL, 1);
        assert!(easy.iter().all(|s| s.min_difficulty <= 1));
        assert!(!easy.is_empty());
        assert_eq!(unlocked(AIR_POOL, 30).len(), AIR_POOL.len());
        assert!(unlocked(SURFACE_POOL, 1).iter().all(|s| s.kind != ObstacleKind::FallingSpike));
    }
}
