//! Player state and timeline types
//!
//! Everything the motion model reads or writes per tick lives here, plus the
//! timeline records exchanged with the planner and playback layers.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Player size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    #[default]
    Normal,
    Mini,
}

impl SizeClass {
    /// Hitbox half-extent for this size
    #[inline]
    pub fn radius(self) -> f64 {
        match self {
            SizeClass::Normal => PLAYER_RADIUS,
            SizeClass::Mini => MINI_PLAYER_RADIUS,
        }
    }

    #[inline]
    pub fn is_mini(self) -> bool {
        self == SizeClass::Mini
    }

    pub fn from_mini(mini: bool) -> Self {
        if mini { SizeClass::Mini } else { SizeClass::Normal }
    }
}

/// Speed portal selection. The multiplier is the square root of the nominal factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpeedType {
    #[serde(rename = "0.25")]
    Quarter,
    #[serde(rename = "0.5")]
    Half,
    #[default]
    #[serde(rename = "1")]
    Normal,
    #[serde(rename = "2")]
    Double,
    #[serde(rename = "3")]
    Triple,
    #[serde(rename = "4")]
    Quadruple,
}

impl SpeedType {
    pub const ALL: [SpeedType; 6] = [
        SpeedType::Quarter,
        SpeedType::Half,
        SpeedType::Normal,
        SpeedType::Double,
        SpeedType::Triple,
        SpeedType::Quadruple,
    ];

    /// Nominal factor printed on the portal
    pub fn factor(self) -> f64 {
        match self {
            SpeedType::Quarter => 0.25,
            SpeedType::Half => 0.5,
            SpeedType::Normal => 1.0,
            SpeedType::Double => 2.0,
            SpeedType::Triple => 3.0,
            SpeedType::Quadruple => 4.0,
        }
    }

    /// Horizontal speed multiplier
    #[inline]
    pub fn multiplier(self) -> f64 {
        match self {
            SpeedType::Normal => 1.0,
            other => other.factor().sqrt(),
        }
    }

    /// Parse a factor tag ("0.5", "2", ...). Unknown tags fall back to normal speed.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "0.25" => SpeedType::Quarter,
            "0.5" => SpeedType::Half,
            "2" => SpeedType::Double,
            "3" => SpeedType::Triple,
            "4" => SpeedType::Quadruple,
            _ => SpeedType::Normal,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            SpeedType::Quarter => "0.25",
            SpeedType::Half => "0.5",
            SpeedType::Normal => "1",
            SpeedType::Double => "2",
            SpeedType::Triple => "3",
            SpeedType::Quadruple => "4",
        }
    }

    /// Position in `ALL` (slowest first)
    pub fn rank(self) -> usize {
        match self {
            SpeedType::Quarter => 0,
            SpeedType::Half => 1,
            SpeedType::Normal => 2,
            SpeedType::Double => 3,
            SpeedType::Triple => 4,
            SpeedType::Quadruple => 5,
        }
    }
}

/// Per-tick player state. Copied freely; never shared between simulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub size: SizeClass,
    pub holding: bool,
    pub gravity_inverted: bool,
    pub speed: SpeedType,
    /// Wave angle in degrees, derived from size and speed
    pub wave_angle: f64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::spawn()
    }
}

impl PlayerState {
    /// Fresh state at the canonical spawn point
    pub fn spawn() -> Self {
        Self::at(SPAWN_X, SPAWN_Y)
    }

    pub fn at(x: f64, y: f64) -> Self {
        let mut state = Self {
            x,
            y,
            size: SizeClass::Normal,
            holding: false,
            gravity_inverted: false,
            speed: SpeedType::Normal,
            wave_angle: 45.0,
        };
        state.refresh_wave_angle();
        state
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.size.radius()
    }

    #[inline]
    pub fn speed_multiplier(&self) -> f64 {
        self.speed.multiplier()
    }

    /// True when the current input/gravity combination moves the player up the screen
    #[inline]
    pub fn rising(&self) -> bool {
        self.holding ^ self.gravity_inverted
    }

    /// Recompute the wave angle after a size or speed change
    pub fn refresh_wave_angle(&mut self) {
        self.wave_angle = super::physics::wave_angle(self.size, self.speed_multiplier());
    }

    /// Snapshot as an autoplay point
    pub fn path_point(&self, time: f64) -> PathPoint {
        PathPoint {
            x: self.x,
            y: self.y,
            holding: self.holding,
            time,
        }
    }
}

/// One tick of the autoplay trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    /// Input held during the tick that produced this point
    pub holding: bool,
    pub time: f64,
}

/// Gameplay modifier state from a measure boundary onward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEvent {
    pub time: f64,
    pub speed_type: SpeedType,
    pub is_inverted: bool,
    pub is_mini: bool,
}

impl StateEvent {
    /// Modifier state at time zero
    pub fn initial() -> Self {
        Self {
            time: 0.0,
            speed_type: SpeedType::Normal,
            is_inverted: false,
            is_mini: false,
        }
    }

    /// True when any modifier differs
    pub fn differs_from(&self, other: &StateEvent) -> bool {
        self.speed_type != other.speed_type
            || self.is_inverted != other.is_inverted
            || self.is_mini != other.is_mini
    }
}

/// Input transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Release,
}

impl ActionKind {
    #[inline]
    pub fn holds(self) -> bool {
        self == ActionKind::Click
    }

    pub fn toggled(self) -> Self {
        match self {
            ActionKind::Click => ActionKind::Release,
            ActionKind::Release => ActionKind::Click,
        }
    }
}

/// Timed input transition on the action track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatAction {
    pub time: f64,
    pub action: ActionKind,
}
