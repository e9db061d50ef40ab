//! Playability proof by backtracking search
//!
//! The validator re-plays the map one tick at a time against the generated
//! geometry, branching on hold/release. It shares `step`, portal contact and
//! `collide` with replay, so a trajectory it returns is exactly the one a
//! player holding the same inputs would fly.
//!
//! The search is a polled state machine: `poll` runs until `yield_every` stack
//! pops have happened, then returns progress. A host that stops polling has
//! cancelled it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::generator::GenerationContext;
use crate::settings::GeneratorSettings;
use crate::sim::{ObstacleIndex, PathPoint, PlayerState, advance_portals, step};

/// Search budgets and pruning thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchTuning {
    pub yield_every: u64,
    pub lookahead_frames: u32,
    pub max_iterations: u64,
    pub debounce_base: f64,
    pub escape_distance: f64,
    pub bucket_x: f64,
    pub bucket_y: f64,
}

impl From<&GeneratorSettings> for SearchTuning {
    fn from(settings: &GeneratorSettings) -> Self {
        Self {
            yield_every: settings.effective_yield_every(),
            lookahead_frames: settings.lookahead_frames,
            max_iterations: settings.max_iterations.max(1),
            debounce_base: settings.debounce_base,
            escape_distance: settings.escape_distance,
            bucket_x: settings.bucket_x.max(0.1),
            bucket_y: settings.bucket_y.max(0.1),
        }
    }
}

/// Furthest point the search reached before giving up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub x: f64,
    pub y: f64,
    pub time: f64,
    /// Ids of obstacles near the frontier
    pub near_obstacles: Vec<u32>,
    /// True when the iteration cap ended the search
    pub exhausted_budget: bool,
}

/// Final result of a search
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Winning trajectory from spawn to the goal
    Success(Vec<PathPoint>),
    Failed(ValidationFailure),
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success(_))
    }
}

/// Result of one `poll`
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationPoll {
    /// Still searching; fraction of the course reached so far
    Pending { progress: f64 },
    Done(ValidationOutcome),
}

/// Memo bucket: (x, y, inverted, speed×10, mini)
type StateKey = (i64, i64, bool, i64, bool);

#[derive(Debug, Clone, Copy)]
struct Node {
    state: PlayerState,
    tick: u32,
    portal_index: usize,
    last_switch: f64,
    parent: Option<usize>,
}

/// Resumable playability search over one generation context
pub struct Validator<'a> {
    ctx: &'a GenerationContext,
    index: ObstacleIndex<'a>,
    tuning: SearchTuning,
    nodes: Vec<Node>,
    stack: Vec<usize>,
    visited: HashSet<StateKey>,
    iterations: u64,
    best: usize,
    outcome: Option<ValidationOutcome>,
    reported: bool,
}

impl<'a> Validator<'a> {
    /// Start a search from spawn
    pub fn new(ctx: &'a GenerationContext, settings: &GeneratorSettings) -> Self {
        let tuning = SearchTuning::from(settings);
        let index = ObstacleIndex::new(&ctx.obstacles);
        let root = Node {
            state: PlayerState::spawn(),
            tick: 0,
            portal_index: 0,
            last_switch: f64::NEG_INFINITY,
            parent: None,
        };
        let mut validator = Self {
            ctx,
            index,
            tuning,
            nodes: vec![root],
            stack: Vec::new(),
            visited: HashSet::new(),
            iterations: 0,
            best: 0,
            outcome: None,
            reported: false,
        };
        if !validator
            .index
            .collides(root.state.x, root.state.y, root.state.radius(), 0.0)
        {
            validator.visited.insert(validator.key(&root.state));
            validator.stack.push(0);
        }
        log::debug!(
            "Validator start: {} obstacles, {} portals, goal x={:.0}",
            ctx.obstacles.len(),
            ctx.portals.len(),
            ctx.total_length
        );
        validator
    }

    /// Stack pops so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Fraction of the course reached by the furthest state
    pub fn progress(&self) -> f64 {
        let span = self.ctx.total_length - SPAWN_X;
        if span <= 0.0 {
            return 1.0;
        }
        ((self.nodes[self.best].state.x - SPAWN_X) / span).clamp(0.0, 1.0)
    }

    /// Run up to `yield_every` pops
    pub fn poll(&mut self) -> ValidationPoll {
        if let Some(outcome) = &self.outcome {
            return ValidationPoll::Done(outcome.clone());
        }

        let mut budget = self.tuning.yield_every;
        while budget > 0 {
            budget -= 1;
            let Some(id) = self.stack.pop() else {
                return self.finish_failure(false);
            };
            self.iterations += 1;
            if self.iterations > self.tuning.max_iterations {
                return self.finish_failure(true);
            }

            let node = self.nodes[id];
            if node.state.x > self.nodes[self.best].state.x {
                self.best = id;
            }
            if node.state.x >= self.ctx.total_length {
                let log = self.trace(id);
                log::info!(
                    "Validation succeeded after {} iterations ({} ticks)",
                    self.iterations,
                    log.len()
                );
                let outcome = ValidationOutcome::Success(log);
                self.outcome = Some(outcome.clone());
                return ValidationPoll::Done(outcome);
            }
            self.expand(id);
        }

        log::trace!(
            "Validator yield: {} iterations, stack {}, progress {:.3}",
            self.iterations,
            self.stack.len(),
            self.progress()
        );
        ValidationPoll::Pending {
            progress: self.progress(),
        }
    }

    /// Drive the search to the end, reporting progress at every yield
    pub fn run(&mut self, mut on_progress: impl FnMut(f64)) -> ValidationOutcome {
        loop {
            match self.poll() {
                ValidationPoll::Pending { progress } => on_progress(progress),
                ValidationPoll::Done(outcome) => return outcome,
            }
        }
    }

    fn finish_failure(&mut self, exhausted_budget: bool) -> ValidationPoll {
        let best = self.nodes[self.best];
        let failure = ValidationFailure {
            x: best.state.x,
            y: best.state.y,
            time: best.tick as f64 * SIM_DT,
            near_obstacles: self.index.near(best.state.x, best.state.y, 150.0),
            exhausted_budget,
        };
        log::info!(
            "Validation failed at x={:.0} y={:.0} after {} iterations{}",
            failure.x,
            failure.y,
            self.iterations,
            if exhausted_budget { " (budget exhausted)" } else { "" }
        );
        let outcome = ValidationOutcome::Failed(failure);
        self.outcome = Some(outcome.clone());
        ValidationPoll::Done(outcome)
    }

    fn key(&self, state: &PlayerState) -> StateKey {
        (
            (state.x / self.tuning.bucket_x).floor() as i64,
            (state.y / self.tuning.bucket_y).floor() as i64,
            state.gravity_inverted,
            (state.speed_multiplier() * 10.0).round() as i64,
            state.size.is_mini(),
        )
    }

    /// Push surviving, unvisited successors; the preferred one is pushed last
    fn expand(&mut self, id: usize) {
        let node = self.nodes[id];
        let mut current = node.state;
        let portal_index = advance_portals(&mut current, &self.ctx.portals, node.portal_index);
        let t_now = node.tick as f64 * SIM_DT;
        let t_next = (node.tick + 1) as f64 * SIM_DT;

        let mut children: Vec<(Node, (u32, f64))> = Vec::with_capacity(2);
        for hold in [true, false] {
            let toggles = hold != current.holding;
            if toggles && !self.may_toggle(&current, node.last_switch, t_now) {
                continue;
            }
            let mut next = current;
            step(&mut next, hold, self.ctx.base_speed, SIM_DT);
            if self.hits(&current, &next, t_next) {
                continue;
            }
            if !self.visited.insert(self.key(&next)) {
                continue;
            }
            let child = Node {
                state: next,
                tick: node.tick + 1,
                portal_index,
                last_switch: if toggles { t_now } else { node.last_switch },
                parent: Some(id),
            };
            let score = self.score(&child);
            children.push((child, score));
        }

        // Fewer frames survived sorts first; closer to the gap centre wins ties
        children.sort_by(|a, b| a.1.0.cmp(&b.1.0).then(a.1.1.total_cmp(&b.1.1)));
        for (child, _) in children {
            self.nodes.push(child);
            self.stack.push(self.nodes.len() - 1);
        }
    }

    /// Input debounce with an escape valve for states drifting off centre
    fn may_toggle(&self, state: &PlayerState, last_switch: f64, t_now: f64) -> bool {
        let min_interval = self.tuning.debounce_base / state.speed_multiplier().powf(0.7);
        if t_now - last_switch >= min_interval {
            return true;
        }
        let center = self
            .ctx
            .gap_center_at(state.x)
            .unwrap_or((MIN_Y + MAX_Y) * 0.5);
        let offset = state.y - center;
        let moving_away = (offset > 0.0 && !state.rising()) || (offset < 0.0 && state.rising());
        offset.abs() > self.tuning.escape_distance && moving_away
    }

    /// Endpoint collision, plus the midpoint for large vertical moves
    fn hits(&self, from: &PlayerState, to: &PlayerState, t: f64) -> bool {
        let radius = to.radius();
        if self.index.collides(to.x, to.y, radius, t) {
            return true;
        }
        if (to.y - from.y).abs() > 0.75 * radius {
            let mx = (from.x + to.x) * 0.5;
            let my = (from.y + to.y) * 0.5;
            return self.index.collides(mx, my, radius, t - SIM_DT * 0.5);
        }
        false
    }

    /// Branch ordering: frames survived by a greedy rollout, then closeness
    /// to the upcoming gap centre
    fn score(&self, child: &Node) -> (u32, f64) {
        let target = |x: f64| {
            self.ctx
                .gap_center_at(x + 100.0)
                .unwrap_or((MIN_Y + MAX_Y) * 0.5)
        };
        let bias = -(child.state.y - target(child.state.x)).abs();

        let mut state = child.state;
        let mut portal_index = child.portal_index;
        let mut survived = 0;
        for frame in 0..self.tuning.lookahead_frames {
            if state.x >= self.ctx.total_length {
                survived = self.tuning.lookahead_frames;
                break;
            }
            portal_index = advance_portals(&mut state, &self.ctx.portals, portal_index);
            let want_up = target(state.x) < state.y;
            let hold = want_up ^ state.gravity_inverted;
            let t = (child.tick + frame + 1) as f64 * SIM_DT;
            step(&mut state, hold, self.ctx.base_speed, SIM_DT);
            if self.index.collides(state.x, state.y, state.radius(), t) {
                break;
            }
            survived = frame + 1;
        }
        (survived, bias)
    }

    fn trace(&self, id: usize) -> Vec<PathPoint> {
        let mut log = Vec::with_capacity(self.nodes[id].tick as usize + 1);
        let mut cursor = Some(id);
        while let Some(i) = cursor {
            let node = &self.nodes[i];
            log.push(node.state.path_point(node.tick as f64 * SIM_DT));
            cursor = node.parent;
        }
        log.reverse();
        log
    }
}

impl Iterator for Validator<'_> {
    type Item = ValidationPoll;

    /// Yields each `Pending` and finally one `Done`
    fn next(&mut self) -> Option<ValidationPoll> {
        if self.reported {
            return None;
        }
        let poll = self.poll();
        if matches!(poll, ValidationPoll::Done(_)) {
            self.reported = true;
        }
        Some(poll)
    }
}

/// Validate a context in one call
pub fn validate(ctx: &GenerationContext, settings: &GeneratorSettings) -> ValidationOutcome {
    Validator::new(ctx, settings).run(|_| {})
}

/// First collision when replaying a log's inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayCollision {
    pub tick: usize,
    pub x: f64,
    pub y: f64,
}

/// Replay the holding sequence of `log` from spawn through the shared motion
/// model and collision. Returns the first collision, if any.
pub fn replay_log(ctx: &GenerationContext, log: &[PathPoint]) -> Option<ReplayCollision> {
    let index = ObstacleIndex::new(&ctx.obstacles);
    let mut state = PlayerState::spawn();
    let mut portal_index = 0;
    for (tick, point) in log.iter().enumerate().skip(1) {
        portal_index = advance_portals(&mut state, &ctx.portals, portal_index);
        step(&mut state, point.holding, ctx.base_speed, SIM_DT);
        if index.collides(state.x, state.y, state.radius(), tick as f64 * SIM_DT) {
            return Some(ReplayCollision {
                tick,
                x: state.x,
                y: state.y,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Obstacle, ObstacleKind, base_speed};

    fn open_context(length: f64) -> GenerationContext {
        GenerationContext {
            difficulty: 1,
            base_speed: base_speed(1),
            total_length: length,
            ..Default::default()
        }
    }

    fn fast_settings() -> GeneratorSettings {
        GeneratorSettings {
            yield_every: 50,
            lookahead_frames: 20,
            max_iterations: 20_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_course_succeeds_from_spawn() {
        let ctx = open_context(800.0);
        let outcome = validate(&ctx, &fast_settings());
        let ValidationOutcome::Success(log) = outcome else {
            panic!("expected success");
        };
        assert_eq!(log[0].x, SPAWN_X);
        assert_eq!(log[0].y, SPAWN_Y);
        assert!(log.last().unwrap().x >= 800.0);
        assert!(replay_log(&ctx, &log).is_none());
    }

    #[test]
    fn test_search_weaves_around_a_wall() {
        let mut ctx = open_context(1200.0);
        // Wall over the upper lane with an opening at the bottom
        ctx.obstacles = vec![Obstacle::new(1, ObstacleKind::Block, 600.0, 0.0, 50.0, 400.0)];
        let outcome = validate(&ctx, &fast_settings());
        let ValidationOutcome::Success(log) = outcome else {
            panic!("expected success");
        };
        assert!(replay_log(&ctx, &log).is_none());
        let at_wall = log.iter().find(|p| p.x >= 625.0).unwrap();
        assert!(at_wall.y >= 440.0);
    }

    #[test]
    fn test_sealed_course_fails_with_frontier() {
        let mut ctx = open_context(1200.0);
        ctx.obstacles = vec![Obstacle::new(7, ObstacleKind::Block, 600.0, 0.0, 50.0, 720.0)];
        let outcome = validate(&ctx, &fast_settings());
        let ValidationOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert!(failure.x < 600.0);
        assert!(failure.x > 500.0);
        assert_eq!(failure.near_obstacles, vec![7]);
    }

    #[test]
    fn test_poll_yields_then_finishes() {
        let ctx = open_context(3000.0);
        let settings = GeneratorSettings {
            yield_every: 10,
            ..fast_settings()
        };
        let mut validator = Validator::new(&ctx, &settings);
        let polls: Vec<ValidationPoll> = validator.by_ref().collect();
        assert!(polls.len() > 1);
        let mut last_progress = 0.0;
        for poll in &polls[..polls.len() - 1] {
            let ValidationPoll::Pending { progress } = poll else {
                panic!("only the final poll is done");
            };
            assert!(*progress >= last_progress);
            last_progress = *progress;
        }
        assert!(matches!(polls.last(), Some(ValidationPoll::Done(_))));
        assert!(validator.next().is_none());
    }

    #[test]
    fn test_iteration_cap_ends_search() {
        let mut ctx = open_context(5000.0);
        ctx.obstacles = vec![Obstacle::new(1, ObstacleKind::Block, 4000.0, 0.0, 50.0, 720.0)];
        let settings = GeneratorSettings {
            max_iterations: 500,
            ..fast_settings()
        };
        let outcome = validate(&ctx, &settings);
        let ValidationOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert!(failure.exhausted_budget);
    }

    #[test]
    fn test_quick_toggle_refused_near_centre() {
        let ctx = open_context(1000.0);
        let settings = fast_settings();
        let validator = Validator::new(&ctx, &settings);
        let state = PlayerState::spawn();
        let interval = settings.debounce_base;

        assert!(!validator.may_toggle(&state, 0.0, interval * 0.5));
        assert!(validator.may_toggle(&state, 0.0, interval * 1.01));
    }

    #[test]
    fn test_quick_toggle_allowed_when_drifting_away() {
        let ctx = open_context(1000.0);
        let settings = fast_settings();
        let validator = Validator::new(&ctx, &settings);
        let t_now = settings.debounce_base * 0.5;

        // Below centre and falling further
        let mut state = PlayerState::at(SPAWN_X, SPAWN_Y + settings.escape_distance + 15.0);
        state.holding = false;
        assert!(validator.may_toggle(&state, 0.0, t_now));

        // Same offset but already heading back
        state.holding = true;
        assert!(!validator.may_toggle(&state, 0.0, t_now));

        // Drifting away but still inside the escape distance
        let mut close = PlayerState::at(SPAWN_X, SPAWN_Y + settings.escape_distance * 0.5);
        close.holding = false;
        assert!(!validator.may_toggle(&close, 0.0, t_now));
    }

    #[test]
    fn test_visited_bucket_is_not_pushed_again() {
        let ctx = open_context(1000.0);
        let settings = fast_settings();

        let mut validator = Validator::new(&ctx, &settings);
        validator.expand(0);
        assert_eq!(validator.nodes.len(), 3);
        assert_eq!(validator.stack.len(), 3);
        // Both successors of the root are already bucketed
        validator.expand(0);
        assert_eq!(validator.nodes.len(), 3);
        assert_eq!(validator.stack.len(), 3);

        let mut validator = Validator::new(&ctx, &settings);
        let mut falling = PlayerState::spawn();
        step(&mut falling, false, ctx.base_speed, SIM_DT);
        let key = validator.key(&falling);
        validator.visited.insert(key);
        validator.expand(0);
        assert_eq!(validator.nodes.len(), 2);
        assert!(validator.nodes[1].state.holding);
        assert!(validator.nodes[1].state.y < SPAWN_Y);
    }

    #[test]
    fn test_replay_reports_collision() {
        let mut ctx = open_context(1000.0);
        ctx.obstacles = vec![Obstacle::new(1, ObstacleKind::Block, 300.0, 300.0, 50.0, 300.0)];
        let log: Vec<PathPoint> = (0..60)
            .map(|i| PathPoint {
                x: 0.0,
                y: 0.0,
                holding: false,
                time: i as f64 * SIM_DT,
            })
            .collect();
        // Falling straight from spawn runs into the block
        let hit = replay_log(&ctx, &log);
        assert!(hit.is_some());
        assert!(hit.unwrap().x >= 300.0 - PLAYER_RADIUS);
    }
}
