//! Reference simulation and portal back-annotation
//!
//! The planned timeline is played through the shared motion model to get the
//! reference path. Each field-changing event then gets a group of portals at
//! the spot the path reached when it fired, walled above and below so the
//! only way through is the portal opening.

use super::tables::calculate_gap;
use crate::consts::*;
use crate::sim::{
    ActionKind, BeatAction, Obstacle, ObstacleKind, PathPoint, PlayerState, Portal, PortalKind,
    SizeClass, StateEvent, clamp_to_lane, step,
};

/// Portal trigger width
pub const PORTAL_WIDTH: f64 = 30.0;
/// Horizontal spacing between portals of one group
pub const PORTAL_SPACING: f64 = 20.0;
/// Openings never shrink below this share of the local gap
pub const MIN_OPENING_SHARE: f64 = 0.6;

/// Where an event fired on the reference path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventMark {
    pub event: StateEvent,
    pub previous: StateEvent,
    pub x: f64,
    pub y: f64,
    /// Hitbox radius just before the event applied
    pub radius: f64,
}

impl EventMark {
    /// Portal kinds for every changed field, in contact order
    pub fn portal_kinds(&self) -> Vec<PortalKind> {
        let mut kinds = Vec::with_capacity(3);
        if self.event.speed_type != self.previous.speed_type {
            kinds.push(PortalKind::for_speed(self.event.speed_type));
        }
        if self.event.is_mini != self.previous.is_mini {
            kinds.push(PortalKind::for_size(self.event.is_mini));
        }
        if self.event.is_inverted != self.previous.is_inverted {
            kinds.push(PortalKind::for_gravity(self.event.is_inverted));
        }
        kinds
    }

    /// Horizontal span `[left, right]` of this event's portal group
    pub fn group_span(&self) -> (f64, f64) {
        let count = self.portal_kinds().len().max(1) as f64;
        let left = self.x + self.radius;
        (left, left + count * PORTAL_WIDTH + (count - 1.0) * PORTAL_SPACING)
    }
}

/// Result of the forward simulation
#[derive(Debug, Clone, Default)]
pub struct ReferenceRun {
    /// One point per tick, starting at spawn with time 0
    pub path: Vec<PathPoint>,
    pub marks: Vec<EventMark>,
}

/// Apply a modifier event directly to the player
pub fn apply_event(state: &mut PlayerState, event: &StateEvent) {
    state.speed = event.speed_type;
    state.gravity_inverted = event.is_inverted;
    state.size = SizeClass::from_mini(event.is_mini);
    state.refresh_wave_angle();
    state.y = clamp_to_lane(state.y, state.radius());
}

/// Forward-simulate the timeline from spawn until `end_time`
pub fn simulate_reference(
    events: &[StateEvent],
    actions: &[BeatAction],
    base_speed: f64,
    end_time: f64,
) -> ReferenceRun {
    let mut state = PlayerState::spawn();
    let mut current = StateEvent::initial();
    let mut holding = false;
    let mut next_event = 0;
    let mut next_action = 0;

    let ticks = (end_time / SIM_DT - 1e-9).ceil().max(0.0) as u64;
    let mut path = Vec::with_capacity(ticks as usize + 1);
    let mut marks = Vec::new();
    path.push(state.path_point(0.0));

    for tick in 0..ticks {
        let t = tick as f64 * SIM_DT;
        while let Some(event) = events.get(next_event).filter(|e| e.time <= t + 1e-9) {
            marks.push(EventMark {
                event: *event,
                previous: current,
                x: state.x,
                y: state.y,
                radius: state.radius(),
            });
            apply_event(&mut state, event);
            current = *event;
            next_event += 1;
        }
        while let Some(action) = actions.get(next_action).filter(|a| a.time <= t + 1e-9) {
            holding = action.action == ActionKind::Click;
            next_action += 1;
        }
        step(&mut state, holding, base_speed, SIM_DT);
        path.push(state.path_point((tick + 1) as f64 * SIM_DT));
    }

    ReferenceRun { path, marks }
}

/// Min/max path y over `[left, right]`
pub fn corridor(path: &[PathPoint], left: f64, right: f64) -> Option<(f64, f64)> {
    let start = path.partition_point(|p| p.x < left);
    path[start..]
        .iter()
        .take_while(|p| p.x <= right)
        .fold(None, |acc, p| match acc {
            None => Some((p.y, p.y)),
            Some((lo, hi)) => Some((f64::min(lo, p.y), f64::max(hi, p.y))),
        })
}

/// Geometry produced for one portal group
#[derive(Debug, Clone, Default)]
pub struct PortalGroup {
    pub portals: Vec<Portal>,
    pub walls: Vec<Obstacle>,
}

/// Build the portal group and its walls for one event
pub fn annotate_event(
    mark: &EventMark,
    path: &[PathPoint],
    difficulty: u8,
    safety: f64,
    pad: f64,
) -> PortalGroup {
    let kinds = mark.portal_kinds();
    if kinds.is_empty() {
        return PortalGroup::default();
    }
    let (left, right) = mark.group_span();
    let margin = PLAYER_RADIUS + pad;
    let (lo, hi) = corridor(path, left - PLAYER_RADIUS, right + PLAYER_RADIUS)
        .unwrap_or((mark.y, mark.y));

    let mut top = lo - margin;
    let mut bottom = hi + margin;
    let min_opening = calculate_gap(difficulty, mark.event.is_mini, safety) * MIN_OPENING_SHARE;
    if bottom - top < min_opening {
        let grow = (min_opening - (bottom - top)) * 0.5;
        top -= grow;
        bottom += grow;
    }
    let top = top.max(MIN_Y);
    let bottom = bottom.min(MAX_Y);

    let portals = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| {
            let x = left + i as f64 * (PORTAL_WIDTH + PORTAL_SPACING);
            Portal::new(0, kind, x, top, PORTAL_WIDTH, bottom - top)
        })
        .collect();

    let mut walls = Vec::with_capacity(2);
    if top > MIN_Y + 1.0 {
        walls.push(Obstacle::new(0, ObstacleKind::Block, left, MIN_Y, right - left, top - MIN_Y));
    }
    if bottom < MAX_Y - 1.0 {
        walls.push(Obstacle::new(0, ObstacleKind::Block, left, bottom, right - left, MAX_Y - bottom));
    }

    PortalGroup { portals, walls }
}
