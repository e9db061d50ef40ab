//! Map generation pipeline
//!
//! `generate` runs, in order:
//! - Timeline planning (modifier events per measure, input action track)
//! - Reference simulation through the shared motion model
//! - Portal back-annotation with walls
//! - Terrain and hazard placement along the reference path
//!
//! Given a `ResumeOptions`, the history before the resume time is frozen and
//! only the tail is regenerated.

pub mod bag;
pub mod context;
pub mod planner;
pub mod tables;
pub mod terrain;
pub mod timeline;

pub use context::{GenerationContext, MapRequest, ResumeOptions, Section, Tuning};
pub use tables::calculate_gap;
pub use terrain::TerrainColumn;
pub use timeline::{build_beat_actions, plan_state_events};

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::clamp_difficulty;
use crate::consts::*;
use crate::settings::GeneratorSettings;
use crate::sim::{Obstacle, ObstacleKind, Portal, StateEvent, base_speed};
use planner::{annotate_event, simulate_reference};
use terrain::{TerrainInput, generate_terrain};

/// RNG stream for events and actions
const TIMELINE_STREAM: u64 = 1;
/// RNG stream for terrain and hazards
const TERRAIN_STREAM: u64 = 2;

/// Deterministic RNG for one stream of one attempt
pub fn stream_rng(seed: u64, attempt: u32, stream: u64) -> Pcg32 {
    let salt = (attempt as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(stream.wrapping_mul(0xD1B5_4A32_D192_ED03));
    Pcg32::seed_from_u64(seed ^ salt)
}

/// Generate a map (or regenerate its tail when `resume` is given)
pub fn generate(
    request: &MapRequest,
    settings: &GeneratorSettings,
    tuning: Tuning,
    resume: Option<&ResumeOptions>,
) -> GenerationContext {
    let difficulty = clamp_difficulty(request.difficulty);
    let base = base_speed(difficulty);
    let resume_time = resume.map(|r| r.time).unwrap_or(0.0);

    // === Timeline ===
    let mut rng = stream_rng(request.seed, tuning.attempt, TIMELINE_STREAM);
    let (mut events, mut actions) = match resume {
        Some(options) => (
            options
                .state_events
                .iter()
                .filter(|e| e.time < resume_time)
                .copied()
                .collect::<Vec<_>>(),
            options
                .beat_actions
                .iter()
                .filter(|a| a.time < resume_time)
                .copied()
                .collect::<Vec<_>>(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    let previous = events.last().copied().unwrap_or_else(StateEvent::initial);
    let holding = actions.last().map(|a| a.action.holds()).unwrap_or(false);
    events.extend(plan_state_events(request, resume_time, previous, &mut rng));
    actions.extend(build_beat_actions(
        &request.beat_times,
        resume_time,
        holding,
        &mut rng,
    ));

    // === Reference path ===
    let run = simulate_reference(&events, &actions, base, request.duration);
    let resume_point = resume.and_then(|_| {
        let idx = run.path.partition_point(|p| p.time < resume_time - 1e-9);
        run.path.get(idx).copied()
    });
    if resume.is_some() && resume_point.is_none() {
        log::warn!(
            "No path point at or after resume time {:.2}s; regenerating from the start",
            resume_time
        );
        return generate(request, settings, tuning, None);
    }
    let total_length = run.path.last().map(|p| p.x).unwrap_or(SPAWN_X);

    // === Frozen prefix ===
    let mut resume_x = resume_point.map(|p| p.x).unwrap_or(f64::NEG_INFINITY);
    for mark in run.marks.iter().rev() {
        let (left, right) = mark.group_span();
        if left < resume_x && resume_x < right {
            resume_x = left;
        }
    }
    let (mut obstacles, mut portals, start_x) = match resume {
        Some(options) => {
            // Terrain restarts on the column boundary at or before resume_x
            let start_x = (resume_x / COLUMN_WIDTH).floor().max(0.0) * COLUMN_WIDTH;
            let kept: Vec<Obstacle> = options
                .obstacles
                .iter()
                .filter_map(|o| freeze_obstacle(o, resume_x, start_x))
                .collect();
            let portals: Vec<Portal> = options
                .portals
                .iter()
                .filter(|p| p.right() <= resume_x)
                .cloned()
                .collect();
            (kept, portals, start_x)
        }
        None => (Vec::new(), Vec::new(), 0.0),
    };
    let frozen_obstacles = obstacles.len();
    let frozen_portals = portals.len();

    // === Portals ===
    let mut next_portal_id = portals.iter().map(|p| p.id).max().map_or(1, |id| id + 1);
    let mut new_obstacles = Vec::new();
    for mark in &run.marks {
        let (_, right) = mark.group_span();
        if right <= resume_x {
            continue;
        }
        let group = annotate_event(
            mark,
            &run.path,
            difficulty,
            tuning.safety_multiplier,
            settings.safety_pad,
        );
        for mut portal in group.portals {
            portal.id = next_portal_id;
            next_portal_id += 1;
            portals.push(portal);
        }
        new_obstacles.extend(group.walls);
    }
    portals.sort_by(|a, b| a.x.total_cmp(&b.x));

    // === Terrain ===
    let mut terrain_rng = stream_rng(request.seed, tuning.attempt, TERRAIN_STREAM);
    let terrain = generate_terrain(
        &TerrainInput {
            request,
            path: &run.path,
            events: &events,
            portals: &portals,
            settings,
            safety_multiplier: tuning.safety_multiplier,
            hazard_multiplier: tuning.hazard_multiplier,
            start_x,
            frozen_columns: resume.map(|r| r.columns.as_slice()).unwrap_or(&[]),
            hazard_from_x: resume_x.max(0.0),
        },
        &mut terrain_rng,
    );
    new_obstacles.extend(terrain.obstacles);
    new_obstacles.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut next_id = obstacles.iter().map(|o| o.id).max().map_or(1, |id| id + 1);
    for mut obstacle in new_obstacles {
        obstacle.id = next_id;
        next_id += 1;
        obstacles.push(obstacle);
    }
    obstacles.sort_by(|a, b| a.x.total_cmp(&b.x));

    log::info!(
        "Generated attempt {}: {} events, {} actions, {} obstacles ({} frozen), {} portals ({} frozen), length {:.0}",
        tuning.attempt,
        events.len(),
        actions.len(),
        obstacles.len(),
        frozen_obstacles,
        portals.len(),
        frozen_portals,
        total_length
    );

    GenerationContext {
        difficulty,
        base_speed: base,
        measure_duration: request.measure_duration(),
        state_events: events,
        beat_actions: actions,
        autoplay_log: run.path.clone(),
        reference_path: run.path,
        obstacles,
        portals,
        columns: terrain.columns,
        total_length,
        safety_multiplier: tuning.safety_multiplier,
        hazard_multiplier: tuning.hazard_multiplier,
        resumed_from: resume_point.map(|_| resume_time),
        frozen_until_x: resume_point.map(|_| resume_x),
    }
}

/// What survives of a previous attempt's obstacle when everything right of
/// `resume_x` is regenerated. Merged terrain blocks reaching past the
/// terrain restart column are cut back to it.
fn freeze_obstacle(obstacle: &Obstacle, resume_x: f64, start_x: f64) -> Option<Obstacle> {
    if obstacle.right() <= resume_x {
        return Some(obstacle.clone());
    }
    let plain_block = obstacle.kind == ObstacleKind::Block
        && obstacle.rotation.is_none()
        && obstacle.movement.is_none()
        && obstacle.custom_data.is_none();
    if plain_block && obstacle.x + 1e-9 < start_x {
        let mut left = obstacle.clone();
        left.width = start_x - obstacle.x;
        return Some(left);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(difficulty: u8, seed: u64) -> MapRequest {
        MapRequest {
            title: "t".into(),
            seed,
            beat_times: (1..40).map(|i| i as f64 * 0.5).collect(),
            sections: vec![Section {
                start_time: 0.0,
                end_time: 20.0,
                intensity: 0.8,
            }],
            duration: 20.0,
            bpm: 120.0,
            measure_length: 0.0,
            difficulty,
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let settings = GeneratorSettings::default();
        let a = generate(&request(18, 42), &settings, Tuning::default(), None);
        let b = generate(&request(18, 42), &settings, Tuning::default(), None);
        assert_eq!(a.obstacles, b.obstacles);
        assert_eq!(a.portals, b.portals);
        assert_eq!(a.autoplay_log, b.autoplay_log);
    }

    #[test]
    fn test_ids_unique_and_sorted() {
        let settings = GeneratorSettings::default();
        let ctx = generate(&request(25, 7), &settings, Tuning::default(), None);
        assert!(ctx.obstacles.windows(2).all(|w| w[0].x <= w[1].x));
        assert!(ctx.portals.windows(2).all(|w| w[0].x <= w[1].x));
        let mut ids: Vec<u32> = ctx.obstacles.iter().map(|o| o.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ctx.obstacles.len());
    }

    #[test]
    fn test_every_event_gets_a_portal_group() {
        let settings = GeneratorSettings::default();
        let ctx = generate(&request(30, 11), &settings, Tuning::default(), None);
        let mut previous = StateEvent::initial();
        let mut expected = 0;
        for event in &ctx.state_events {
            expected += usize::from(event.speed_type != previous.speed_type)
                + usize::from(event.is_inverted != previous.is_inverted)
                + usize::from(event.is_mini != previous.is_mini);
            previous = *event;
        }
        assert_eq!(ctx.portals.len(), expected);
    }

    #[test]
    fn test_resume_keeps_prefix() {
        let settings = GeneratorSettings::default();
        let req = request(20, 5);
        let first = generate(&req, &settings, Tuning::default(), None);
        let resume = ResumeOptions::from_context(&first, 8.0);
        let tuning = Tuning {
            attempt: 1,
            safety_multiplier: 1.15,
            hazard_multiplier: 0.7,
        };
        let second = generate(&req, &settings, tuning, Some(&resume));
        assert_eq!(second.resumed_from, Some(8.0));
        let resume_x = first.reference_path[480].x;
        let frozen_x = second.frozen_until_x.unwrap();
        assert!(frozen_x <= resume_x + 1e-9);
        // Nothing ending before the resume point is lost
        for obstacle in first.obstacles.iter().filter(|o| o.right() <= frozen_x) {
            assert!(second.obstacles.contains(obstacle), "lost obstacle {}", obstacle.id);
        }
        for portal in first.portals.iter().filter(|p| p.right() <= frozen_x) {
            assert!(second.portals.contains(portal), "lost portal {}", portal.id);
        }
        // Nothing ending before it is new, apart from blocks cut at the restart column
        for obstacle in second.obstacles.iter().filter(|o| o.right() <= frozen_x) {
            let kept = first.obstacles.iter().any(|o| {
                o.id == obstacle.id
                    && o.kind == obstacle.kind
                    && o.x == obstacle.x
                    && o.y == obstacle.y
                    && o.height == obstacle.height
                    && o.width >= obstacle.width
            });
            assert!(kept, "added obstacle {} at x={}", obstacle.id, obstacle.x);
        }
        for portal in second.portals.iter().filter(|p| p.right() <= frozen_x) {
            assert!(first.portals.contains(portal), "added portal {}", portal.id);
        }
        for event in first.state_events.iter().filter(|e| e.time < 8.0) {
            assert!(second.state_events.contains(event));
        }
        // The prefix path is reproduced exactly
        assert_eq!(&first.reference_path[..480], &second.reference_path[..480]);
    }

    #[test]
    fn test_resume_lays_terrain_from_restart_column() {
        let settings = GeneratorSettings::default();
        let req = request(24, 13);
        let first = generate(&req, &settings, Tuning::default(), None);
        let resume = ResumeOptions::from_context(&first, 6.0);
        let second = generate(&req, &settings, Tuning::default(), Some(&resume));
        let frozen_x = second.frozen_until_x.unwrap();
        let restart = (frozen_x / COLUMN_WIDTH).floor() * COLUMN_WIDTH;

        let carried = |o: &Obstacle| first.obstacles.iter().any(|f| f.id == o.id && f.x == o.x);
        for obstacle in second.obstacles.iter().filter(|o| !carried(o)) {
            assert!(obstacle.x >= restart - 1e-9, "obstacle {} at x={}", obstacle.id, obstacle.x);
            assert!(obstacle.right() > frozen_x);
        }
        for (i, a) in second.obstacles.iter().enumerate() {
            for b in &second.obstacles[i + 1..] {
                let same = a.kind == b.kind
                    && a.x == b.x
                    && a.y == b.y
                    && a.width == b.width
                    && a.height == b.height;
                assert!(!same, "obstacles {} and {} are stacked", a.id, b.id);
            }
        }
        assert_eq!(&second.columns[..10], &first.columns[..10]);
    }

    #[test]
    fn test_freeze_cuts_blocks_at_restart_column() {
        let merged = Obstacle::new(7, ObstacleKind::Block, 100.0, 0.0, 300.0, 150.0);
        let cut = freeze_obstacle(&merged, 320.0, 300.0).unwrap();
        assert_eq!(cut.id, 7);
        assert_eq!(cut.x, 100.0);
        assert_eq!(cut.width, 200.0);
        assert_eq!(cut.height, 150.0);

        let before = Obstacle::new(8, ObstacleKind::Block, 100.0, 0.0, 150.0, 150.0);
        assert_eq!(freeze_obstacle(&before, 320.0, 300.0), Some(before.clone()));

        // Blocks starting at the restart column are laid again
        let at_restart = Obstacle::new(9, ObstacleKind::Block, 300.0, 0.0, 50.0, 150.0);
        assert_eq!(freeze_obstacle(&at_restart, 320.0, 300.0), None);

        // Only plain blocks are cut
        let spike = Obstacle::new(10, ObstacleKind::Spike, 280.0, 650.0, 50.0, 40.0);
        assert_eq!(freeze_obstacle(&spike, 320.0, 300.0), None);
    }

    #[test]
    fn test_resume_past_the_end_falls_back() {
        let settings = GeneratorSettings::default();
        let req = request(5, 1);
        let first = generate(&req, &settings, Tuning::default(), None);
        let resume = ResumeOptions::from_context(&first, 500.0);
        let second = generate(&req, &settings, Tuning::default(), Some(&resume));
        assert_eq!(second.resumed_from, None);
        assert_eq!(second.obstacles, first.obstacles);
    }
}
