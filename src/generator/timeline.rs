//! Musical timeline: modifier events per measure and the input action track

use rand::Rng;

use super::context::MapRequest;
use super::tables::{modifier_table, pick_speed};
use crate::sim::{ActionKind, BeatAction, StateEvent};

/// Beats closer than this toggle the input instead of click+release
pub const FAST_BEAT_INTERVAL: f64 = 0.25;
/// Actions closer than this collapse into the later one
pub const COLLAPSE_EPSILON: f64 = 0.01;
/// Same-type actions closer than this are duplicates
pub const DUPLICATE_EPSILON: f64 = 0.03;

/// Modifier state in effect at time `t`
pub fn event_at(events: &[StateEvent], t: f64) -> StateEvent {
    let idx = events.partition_point(|e| e.time <= t);
    if idx == 0 {
        StateEvent::initial()
    } else {
        events[idx - 1]
    }
}

/// Plan modifier changes on measure boundaries at or after `from_time`.
///
/// The first measure never changes anything. `previous` is the state in
/// effect when planning starts; only field-changing events are emitted.
pub fn plan_state_events<R: Rng>(
    request: &MapRequest,
    from_time: f64,
    previous: StateEvent,
    rng: &mut R,
) -> Vec<StateEvent> {
    let measure = request.measure_duration();
    let table = modifier_table(request.difficulty);
    let mut events = Vec::new();
    let mut current = previous;

    let first = ((from_time / measure) - 1e-9).ceil().max(1.0) as u64;
    let mut m = first;
    loop {
        let time = m as f64 * measure;
        if time >= request.duration {
            break;
        }
        m += 1;

        let intensity = request.intensity_at(time);
        let mut next = current;
        next.time = time;

        if rng.random_bool(table.speed_change) {
            if let Some(speed) = pick_speed(table, current.speed_type, intensity, rng) {
                next.speed_type = speed;
            }
        }
        if rng.random_bool(table.gravity_flip) {
            next.is_inverted = !current.is_inverted;
        }
        let mini_roll = if current.is_mini {
            table.mini_exit
        } else {
            table.mini_entry
        };
        if rng.random_bool(mini_roll) {
            next.is_mini = !current.is_mini;
        }

        if next.differs_from(&current) {
            events.push(next);
            current = next;
        }
    }

    log::debug!(
        "Planned {} modifier events from t={:.2}s (measure {:.3}s)",
        events.len(),
        from_time,
        measure
    );
    events
}

/// Convert beat times at or after `from_time` into a click/release track.
///
/// `holding` is the input state when the track starts. The result strictly
/// alternates starting from the opposite of `holding`.
pub fn build_beat_actions<R: Rng>(
    beats: &[f64],
    from_time: f64,
    holding: bool,
    rng: &mut R,
) -> Vec<BeatAction> {
    let beats: Vec<f64> = beats
        .iter()
        .copied()
        .filter(|b| b.is_finite() && *b >= from_time)
        .collect();

    let mut raw = Vec::with_capacity(beats.len() * 2);
    let mut state = holding;
    let mut last_interval = 0.5;
    for (i, &beat) in beats.iter().enumerate() {
        let interval = match beats.get(i + 1) {
            Some(next) => next - beat,
            None => last_interval,
        };
        last_interval = interval;

        if interval < FAST_BEAT_INTERVAL {
            state = !state;
            raw.push(BeatAction {
                time: beat,
                action: if state { ActionKind::Click } else { ActionKind::Release },
            });
        } else {
            let hold_factor = (0.5 + rng.random_range(-0.15f64..=0.15)).clamp(0.3, 0.8);
            raw.push(BeatAction {
                time: beat,
                action: ActionKind::Click,
            });
            raw.push(BeatAction {
                time: beat + interval * hold_factor,
                action: ActionKind::Release,
            });
            state = false;
        }
    }
    raw.sort_by(|a, b| a.time.total_cmp(&b.time));

    normalize_actions(raw, holding)
}

/// Collapse near-simultaneous actions, drop duplicates and enforce strict
/// alternation starting from the opposite of `holding`.
pub fn normalize_actions(raw: Vec<BeatAction>, holding: bool) -> Vec<BeatAction> {
    let mut collapsed: Vec<BeatAction> = Vec::with_capacity(raw.len());
    for action in raw {
        match collapsed.last_mut() {
            Some(last) if action.time - last.time < COLLAPSE_EPSILON => *last = action,
            Some(last)
                if action.action == last.action && action.time - last.time < DUPLICATE_EPSILON => {}
            _ => collapsed.push(action),
        }
    }

    let mut expected = if holding {
        ActionKind::Release
    } else {
        ActionKind::Click
    };
    let mut actions = Vec::with_capacity(collapsed.len());
    for action in collapsed {
        if action.action == expected {
            actions.push(action);
            expected = expected.toggled();
        }
    }
    actions
}

/// Input held at time `t` given the action track and the initial state
pub fn holding_at(actions: &[BeatAction], t: f64, initial: bool) -> bool {
    let idx = actions.partition_point(|a| a.time <= t);
    if idx == 0 {
        initial
    } else {
        actions[idx - 1].action.holds()
    }
}
