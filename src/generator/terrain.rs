//! Terrain and hazard placement along the reference path
//!
//! Features:
//! - Blocky floor/ceiling on a 50 px grid that follows the path corridor
//! - Slope and steep connectors between columns of different depth
//! - Bag-randomised hazards on beat columns, kept only when clear of the path
//! - Block consolidation and a final corridor filter

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bag::Bag;
use super::context::MapRequest;
use super::planner::corridor;
use super::tables::{
    AIR_POOL, HazardSpec, Placement, SURFACE_POOL, SURFACE_SHARE, calculate_gap, hazard_density,
    intensity_factor, unlocked,
};
use super::timeline::event_at;
use crate::consts::*;
use crate::settings::GeneratorSettings;
use crate::sim::{
    Anchor, CustomData, Movement, MovementKind, NestedOrbit, Obstacle, ObstacleKind, OrbitData,
    PathPoint, Portal, Rect, StateEvent,
};

/// No hazards this close after spawn
const SPAWN_SAFE_DISTANCE: f64 = 300.0;
/// Steep connector: two blocks tall, one wide
const STEEP_ANGLE: f64 = 63.434_948_822_922_01;
/// Largest level change between neighbouring columns
pub const MAX_LEVEL_STEP: f64 = 2.0 * BLOCK_SIZE;

/// Per-column terrain record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainColumn {
    pub x: f64,
    /// Bottom edge of the ceiling (MIN_Y when open)
    pub ceiling: f64,
    /// Top edge of the floor (MAX_Y when open)
    pub floor: f64,
    /// Reference path y range within one hitbox of the column
    pub min_y: f64,
    pub max_y: f64,
    /// Time window the reference path spends near the column
    pub t_enter: f64,
    pub t_exit: f64,
}

impl TerrainColumn {
    pub fn gap(&self) -> f64 {
        self.floor - self.ceiling
    }
}

/// Inputs for one terrain pass
pub struct TerrainInput<'a> {
    pub request: &'a MapRequest,
    pub path: &'a [PathPoint],
    pub events: &'a [StateEvent],
    pub portals: &'a [Portal],
    pub settings: &'a GeneratorSettings,
    pub safety_multiplier: f64,
    pub hazard_multiplier: f64,
    /// Terrain pieces are emitted from this x on
    pub start_x: f64,
    /// Columns already laid before `start_x`, reused verbatim
    pub frozen_columns: &'a [TerrainColumn],
    /// Hazards are placed from this x on
    pub hazard_from_x: f64,
}

/// Output of one terrain pass (obstacles sorted by x, ids unassigned)
#[derive(Debug, Clone, Default)]
pub struct TerrainOutput {
    pub columns: Vec<TerrainColumn>,
    pub obstacles: Vec<Obstacle>,
}

/// Snap a ceiling edge up to the grid
fn quantize_ceiling(y: f64) -> f64 {
    MIN_Y + ((y - MIN_Y) / BLOCK_SIZE).floor().max(0.0) * BLOCK_SIZE
}

/// Snap a floor edge down to the grid
fn quantize_floor(y: f64) -> f64 {
    MAX_Y - ((MAX_Y - y) / BLOCK_SIZE).floor().max(0.0) * BLOCK_SIZE
}

/// Lay terrain and hazards along the path
pub fn generate_terrain<R: Rng>(input: &TerrainInput, rng: &mut R) -> TerrainOutput {
    let path = input.path;
    let (Some(first), Some(last)) = (path.first(), path.last()) else {
        log::warn!("Terrain skipped: reference path is empty");
        return TerrainOutput::default();
    };
    if path.len() < 2 || last.x - first.x <= 0.0 {
        log::warn!("Terrain skipped: degenerate reference path ({} points)", path.len());
        return TerrainOutput::default();
    }

    let columns = build_columns(input);
    let mut obstacles = Vec::new();
    for i in 0..columns.len() {
        if columns[i].x + 1e-9 < input.start_x {
            continue;
        }
        emit_column(&columns, i, &mut obstacles);
    }
    let mut obstacles = consolidate_blocks(obstacles);
    let terrain_count = obstacles.len();

    let hazards = place_hazards(input, &columns, rng);
    let placed = hazards.len();
    let hazards = filter_intruding(hazards, &columns);
    if hazards.len() < placed {
        log::debug!("Final filter dropped {} hazards", placed - hazards.len());
    }
    obstacles.extend(hazards);
    obstacles.sort_by(|a, b| a.x.total_cmp(&b.x));

    log::debug!(
        "Terrain: {} columns, {} terrain pieces, {} hazards from x={:.0}",
        columns.len(),
        terrain_count,
        obstacles.len() - terrain_count,
        input.start_x
    );
    TerrainOutput { columns, obstacles }
}

/// Corridor, time window and floor/ceiling levels for every column
fn build_columns(input: &TerrainInput) -> Vec<TerrainColumn> {
    let path = input.path;
    let difficulty = input.request.difficulty;
    let margin = PLAYER_RADIUS + input.settings.safety_pad;
    let (first, last) = (path[0], path[path.len() - 1]);
    let count = ((last.x + 2.0 * PLAYER_RADIUS) / COLUMN_WIDTH).ceil().max(1.0) as usize;

    let mut columns: Vec<TerrainColumn> = Vec::with_capacity(count);
    for i in 0..count {
        let x = i as f64 * COLUMN_WIDTH;
        if x + 1e-9 < input.start_x {
            if let Some(frozen) = input.frozen_columns.get(i).filter(|c| (c.x - x).abs() < 1e-6) {
                columns.push(*frozen);
                continue;
            }
        }
        let left = x - PLAYER_RADIUS;
        let right = x + COLUMN_WIDTH + PLAYER_RADIUS;
        let (min_y, max_y) = corridor(path, left, right).unwrap_or(if right < first.x {
            (first.y, first.y)
        } else {
            (last.y, last.y)
        });
        let enter = path.partition_point(|p| p.x < left).min(path.len() - 1);
        let exit = path.partition_point(|p| p.x <= right).clamp(1, path.len()) - 1;
        let t_enter = path[enter].time;
        let t_exit = path[exit].time.max(t_enter);
        let mini =
            event_at(input.events, t_enter).is_mini || event_at(input.events, t_exit).is_mini;

        let ceil_limit = min_y - margin;
        let floor_limit = max_y + margin;
        let gap = calculate_gap(difficulty, mini, input.safety_multiplier)
            .max(floor_limit - ceil_limit)
            .min(MAX_Y - MIN_Y);
        let center = (min_y + max_y) * 0.5;
        let mut top = center - gap * 0.5;
        let mut bottom = center + gap * 0.5;
        if top < MIN_Y {
            bottom += MIN_Y - top;
            top = MIN_Y;
        }
        if bottom > MAX_Y {
            top = (top - (bottom - MAX_Y)).max(MIN_Y);
            bottom = MAX_Y;
        }
        let desired_ceiling = top.min(ceil_limit);
        let desired_floor = bottom.max(floor_limit);
        let target_ceiling = quantize_ceiling(desired_ceiling);
        let target_floor = quantize_floor(desired_floor);

        let (ceiling, floor) = match columns.last() {
            None => (target_ceiling, target_floor),
            Some(prev) => (
                advance_level(prev.ceiling, target_ceiling, desired_ceiling - prev.ceiling),
                -advance_level(-prev.floor, -target_floor, prev.floor - desired_floor),
            ),
        };

        columns.push(TerrainColumn {
            x,
            ceiling,
            floor,
            min_y,
            max_y,
            t_enter,
            t_exit,
        });
    }

    let first_free = columns.partition_point(|c| c.x + 1e-9 < input.start_x);
    limit_widening(&mut columns, first_free);
    columns
}

/// Right-to-left pass that opens columns ahead of a wide stretch so no level
/// changes by more than `MAX_LEVEL_STEP` between neighbours. Only ever widens,
/// and leaves columns before `first_free` untouched.
fn limit_widening(columns: &mut [TerrainColumn], first_free: usize) {
    for i in (first_free..columns.len().saturating_sub(1)).rev() {
        let next = columns[i + 1];
        let col = &mut columns[i];
        col.ceiling = col.ceiling.min(next.ceiling + MAX_LEVEL_STEP);
        col.floor = col.floor.max(next.floor - MAX_LEVEL_STEP);
    }
}

/// Move a ceiling-style level (larger = narrower) toward `target`.
/// Widening snaps (`limit_widening` spreads it out later); narrowing moves one
/// or two blocks once drift passes half a block.
fn advance_level(current: f64, target: f64, drift: f64) -> f64 {
    if target < current {
        return target;
    }
    if target > current && drift > BLOCK_SIZE * 0.5 {
        let steps = ((target - current) / BLOCK_SIZE).round().clamp(1.0, 2.0);
        return (current + steps * BLOCK_SIZE).min(target);
    }
    current
}

/// Terrain pieces for column `i`
fn emit_column(columns: &[TerrainColumn], i: usize, out: &mut Vec<Obstacle>) {
    let col = columns[i];
    let left = i.checked_sub(1).map(|j| columns[j]).unwrap_or(col);
    let right = columns.get(i + 1).copied().unwrap_or(col);
    let x = col.x;

    if col.ceiling > MIN_Y {
        let deep = col.ceiling;
        let connector = if deep > left.ceiling && deep > right.ceiling {
            None
        } else if deep > left.ceiling {
            Some((left.ceiling, -1.0))
        } else if deep > right.ceiling {
            Some((right.ceiling, 1.0))
        } else {
            None
        };
        match connector.and_then(|(shallow, sign)| connector_kind(deep - shallow).map(|c| (shallow, sign, c))) {
            Some((shallow, sign, (kind, angle))) => {
                if shallow > MIN_Y {
                    out.push(Obstacle::new(0, ObstacleKind::Block, x, MIN_Y, COLUMN_WIDTH, shallow - MIN_Y));
                }
                out.push(
                    Obstacle::new(0, kind, x, shallow, COLUMN_WIDTH, deep - shallow)
                        .with_rotation(sign * angle)
                        .with_anchor(Anchor::Ceiling),
                );
            }
            None => out.push(Obstacle::new(0, ObstacleKind::Block, x, MIN_Y, COLUMN_WIDTH, deep - MIN_Y)),
        }
    }

    if col.floor < MAX_Y {
        let deep = col.floor;
        let connector = if deep < left.floor && deep < right.floor {
            None
        } else if deep < left.floor {
            Some((left.floor, 1.0))
        } else if deep < right.floor {
            Some((right.floor, -1.0))
        } else {
            None
        };
        match connector.and_then(|(shallow, sign)| connector_kind(shallow - deep).map(|c| (shallow, sign, c))) {
            Some((shallow, sign, (kind, angle))) => {
                out.push(
                    Obstacle::new(0, kind, x, deep, COLUMN_WIDTH, shallow - deep)
                        .with_rotation(sign * angle)
                        .with_anchor(Anchor::Floor),
                );
                if shallow < MAX_Y {
                    out.push(Obstacle::new(0, ObstacleKind::Block, x, shallow, COLUMN_WIDTH, MAX_Y - shallow));
                }
            }
            None => out.push(Obstacle::new(0, ObstacleKind::Block, x, deep, COLUMN_WIDTH, MAX_Y - deep)),
        }
    }
}

/// Connector for a depth difference; `None` means a full block
fn connector_kind(depth: f64) -> Option<(ObstacleKind, f64)> {
    let blocks = (depth / BLOCK_SIZE).round();
    if blocks == 1.0 {
        Some((ObstacleKind::Slope, 45.0))
    } else if blocks == 2.0 {
        Some((ObstacleKind::SteepTriangle, STEEP_ANGLE))
    } else {
        None
    }
}

/// Merge x-adjacent plain blocks with identical vertical extent
pub fn consolidate_blocks(obstacles: Vec<Obstacle>) -> Vec<Obstacle> {
    let mergeable = |o: &Obstacle| {
        o.kind == ObstacleKind::Block
            && o.rotation.is_none()
            && o.movement.is_none()
            && o.custom_data.is_none()
    };
    let (mut blocks, others): (Vec<Obstacle>, Vec<Obstacle>) =
        obstacles.into_iter().partition(|o| mergeable(o));
    blocks.sort_by(|a, b| {
        a.y.total_cmp(&b.y)
            .then(a.height.total_cmp(&b.height))
            .then(a.x.total_cmp(&b.x))
    });

    let mut merged: Vec<Obstacle> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let Some(last) = merged.last_mut() {
            if last.y == block.y
                && last.height == block.height
                && (block.x - last.right()).abs() < 1e-6
            {
                last.width = block.right() - last.x;
                continue;
            }
        }
        merged.push(block);
    }

    merged.extend(others);
    merged.sort_by(|a, b| a.x.total_cmp(&b.x));
    merged
}

/// Path time window and y range while the hitbox is within reach of `bounds`
fn path_window(path: &[PathPoint], bounds: &Rect) -> Option<(f64, f64, f64, f64)> {
    let left = bounds.left - PLAYER_RADIUS;
    let right = bounds.right + PLAYER_RADIUS;
    let start = path.partition_point(|p| p.x < left);
    let window: Vec<&PathPoint> = path[start..].iter().take_while(|p| p.x <= right).collect();
    let (first, last) = (window.first()?, window.last()?);
    let lo = window.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let hi = window.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    Some((first.time, last.time, lo, hi))
}

/// True when the hazard stays clear of the path by `margin` over the time
/// the path spends near it
pub fn hazard_is_clear(obstacle: &Obstacle, path: &[PathPoint], margin: f64) -> bool {
    match path_window(path, &obstacle.swept_bounds()) {
        None => true,
        Some((t0, t1, lo, hi)) => {
            let extent = obstacle.extent_during(t0, t1);
            extent.bottom < lo - margin || extent.top > hi + margin
        }
    }
}

fn place_hazards<R: Rng>(
    input: &TerrainInput,
    columns: &[TerrainColumn],
    rng: &mut R,
) -> Vec<Obstacle> {
    let request = input.request;
    let path = input.path;
    let margin = PLAYER_RADIUS + input.settings.safety_pad;
    let clearance = input.settings.portal_clearance;
    let mut surface = Bag::new(unlocked(SURFACE_POOL, request.difficulty));
    let mut air = Bag::new(unlocked(AIR_POOL, request.difficulty));
    let base_chance =
        hazard_density(request.difficulty) * input.hazard_multiplier * input.settings.hazard_density;

    let mut hazards = Vec::new();
    let mut last_column = None;
    for &beat in &request.beat_times {
        let tick = (beat / SIM_DT).round().max(0.0) as usize;
        let Some(point) = path.get(tick) else {
            break;
        };
        let index = (point.x / COLUMN_WIDTH).floor().max(0.0) as usize;
        if last_column == Some(index) {
            continue;
        }
        last_column = Some(index);
        let Some(&col) = columns.get(index) else {
            continue;
        };
        if col.x < input.hazard_from_x || col.x < SPAWN_X + SPAWN_SAFE_DISTANCE {
            continue;
        }
        let near_portal = input
            .portals
            .iter()
            .any(|p| p.right() > col.x - clearance && p.x < col.x + COLUMN_WIDTH + clearance);
        if near_portal {
            continue;
        }

        let chance = base_chance * intensity_factor(request.intensity_at(beat));
        if !rng.random_bool(chance.clamp(0.0, 1.0)) {
            continue;
        }
        let spec = if rng.random_bool(SURFACE_SHARE) {
            surface.draw(rng)
        } else {
            air.draw(rng)
        };
        let Some(spec) = spec else {
            continue;
        };
        let Some(mut hazard) = build_hazard(&spec, &col, margin, rng) else {
            continue;
        };
        if hazard.x < input.hazard_from_x {
            continue;
        }
        if hazard.kind == ObstacleKind::FallingSpike {
            let trigger_x = hazard.x - FALL_TRIGGER_DISTANCE;
            let idx = path.partition_point(|p| p.x < trigger_x).min(path.len() - 1);
            hazard.custom_data.get_or_insert_with(CustomData::default).trigger_time =
                Some(path[idx].time);
        }
        if hazard_is_clear(&hazard, path, margin) {
            hazards.push(hazard);
        }
    }
    hazards
}

/// Candidate hazard for a column (not yet safety-checked)
fn build_hazard<R: Rng>(
    spec: &HazardSpec,
    col: &TerrainColumn,
    margin: f64,
    rng: &mut R,
) -> Option<Obstacle> {
    let (w, h) = (spec.width, spec.height);
    let x = col.x + (COLUMN_WIDTH - w) * 0.5;

    let (y, anchor) = match spec.placement {
        Placement::CeilingOnly => (col.ceiling, Anchor::Ceiling),
        Placement::Surface => {
            if rng.random_bool(0.5) {
                (col.floor - h, Anchor::Floor)
            } else {
                (col.ceiling, Anchor::Ceiling)
            }
        }
        Placement::Air => {
            let above = (col.min_y - margin) - col.ceiling;
            let below = col.floor - (col.max_y + margin);
            if above.max(below) < h {
                return None;
            }
            if above >= below {
                (col.ceiling + (above - h) * 0.5, Anchor::Ceiling)
            } else {
                (col.max_y + margin + (below - h) * 0.5, Anchor::Floor)
            }
        }
    };

    let mut hazard = Obstacle::new(0, spec.kind, x, y, w, h).with_anchor(anchor);
    match spec.kind {
        ObstacleKind::RotatedBlock => hazard.rotation = Some(45.0),
        ObstacleKind::Triangle => {
            hazard.rotation = Some(if rng.random_bool(0.5) { 45.0 } else { -45.0 });
        }
        ObstacleKind::MovingBlock => {
            hazard.movement = Some(Movement {
                kind: MovementKind::Updown,
                speed: 2.0,
                range: 30.0,
                phase: rng.random_range(0.0..std::f64::consts::TAU),
            });
        }
        ObstacleKind::Saw
        | ObstacleKind::SpikeBall
        | ObstacleKind::SwingBlade
        | ObstacleKind::GrowingSpike
        | ObstacleKind::PistonV
        | ObstacleKind::CrusherJaw
        | ObstacleKind::Hammer => {
            hazard.movement = Some(Movement {
                kind: MovementKind::None,
                speed: 0.0,
                range: 0.0,
                phase: rng.random_range(0.0..std::f64::consts::TAU),
            });
        }
        ObstacleKind::Planet | ObstacleKind::Star => {
            let moons = if spec.kind == ObstacleKind::Star { 2 } else { rng.random_range(1..=2) };
            hazard.children = (0..moons)
                .map(|_| Obstacle::new(0, ObstacleKind::Orb, 0.0, 0.0, 14.0, 14.0))
                .collect();
            let nested_orbit = (spec.kind == ObstacleKind::Star).then_some(NestedOrbit {
                distance: 12.0,
                speed: 3.0,
                count: 2,
                radius: 4.0,
            });
            let data = hazard.custom_data.get_or_insert_with(CustomData::default);
            data.orbit = Some(OrbitData {
                orbit_distance: w * 0.5 + 18.0,
                orbit_speed: if rng.random_bool(0.5) { 1.5 } else { -1.5 },
                nested_orbit,
            });
        }
        ObstacleKind::Block
        | ObstacleKind::Spike
        | ObstacleKind::MiniSpike
        | ObstacleKind::FallingSpike
        | ObstacleKind::Slope
        | ObstacleKind::SteepTriangle
        | ObstacleKind::Mine
        | ObstacleKind::Orb
        | ObstacleKind::Laser
        | ObstacleKind::VLaser
        | ObstacleKind::LaserBeam
        | ObstacleKind::Rotor
        | ObstacleKind::Unknown => {}
    }

    // Orbiters reach past the box; re-centre so the whole system fits
    if matches!(spec.kind, ObstacleKind::Planet | ObstacleKind::Star) && spec.placement == Placement::Air {
        let reach = hazard.orbit_reach();
        let center_y = y + h * 0.5;
        let (room_top, room_bottom) = match anchor {
            Anchor::Ceiling => (col.ceiling, col.min_y - margin),
            Anchor::Floor => (col.max_y + margin, col.floor),
        };
        if room_bottom - room_top < 2.0 * reach {
            return None;
        }
        let center_y = center_y.clamp(room_top + reach, room_bottom - reach);
        hazard.y = center_y - h * 0.5;
    }
    Some(hazard)
}

/// Drop hazards whose extent reaches a column's recorded corridor
fn filter_intruding(hazards: Vec<Obstacle>, columns: &[TerrainColumn]) -> Vec<Obstacle> {
    hazards
        .into_iter()
        .filter(|hazard| {
            let swept = hazard.swept_bounds();
            let first = ((swept.left / COLUMN_WIDTH).floor().max(0.0)) as usize;
            let last = ((swept.right / COLUMN_WIDTH).floor().max(0.0)) as usize;
            columns
                .iter()
                .skip(first)
                .take(last.saturating_sub(first) + 1)
                .all(|col| {
                    let extent = hazard.extent_during(col.t_enter, col.t_exit);
                    extent.bottom < col.min_y - PLAYER_RADIUS || extent.top > col.max_y + PLAYER_RADIUS
                })
        })
        .collect()
}
