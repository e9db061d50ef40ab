//! Gameplay-modifier portals
//!
//! Portals are one-shot triggers. The runtime path flips `activated`; the
//! validator instead tracks a monotone index into the x-sorted portal list so
//! that branches can share one immutable array.

use serde::{Deserialize, Serialize};

use super::physics::clamp_to_lane;
use super::state::{PlayerState, SizeClass, SpeedType};

/// Portal types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortalKind {
    #[serde(rename = "gravity_yellow")]
    GravityYellow,
    #[serde(rename = "gravity_blue")]
    GravityBlue,
    #[serde(rename = "speed_0.25")]
    SpeedQuarter,
    #[serde(rename = "speed_0.5")]
    SpeedHalf,
    #[serde(rename = "speed_1")]
    SpeedNormal,
    #[serde(rename = "speed_2")]
    SpeedDouble,
    #[serde(rename = "speed_3")]
    SpeedTriple,
    #[serde(rename = "speed_4")]
    SpeedQuadruple,
    #[serde(rename = "mini_pink")]
    MiniPink,
    #[serde(rename = "mini_green")]
    MiniGreen,
    #[serde(rename = "teleport_in")]
    TeleportIn,
    #[serde(rename = "teleport_out")]
    TeleportOut,
    /// Unrecognised tag; contact has no effect
    #[serde(other)]
    Unknown,
}

impl PortalKind {
    pub fn for_speed(speed: SpeedType) -> Self {
        match speed {
            SpeedType::Quarter => PortalKind::SpeedQuarter,
            SpeedType::Half => PortalKind::SpeedHalf,
            SpeedType::Normal => PortalKind::SpeedNormal,
            SpeedType::Double => PortalKind::SpeedDouble,
            SpeedType::Triple => PortalKind::SpeedTriple,
            SpeedType::Quadruple => PortalKind::SpeedQuadruple,
        }
    }

    pub fn for_gravity(inverted: bool) -> Self {
        if inverted {
            PortalKind::GravityYellow
        } else {
            PortalKind::GravityBlue
        }
    }

    pub fn for_size(mini: bool) -> Self {
        if mini { PortalKind::MiniPink } else { PortalKind::MiniGreen }
    }
}

/// A portal trigger rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    #[serde(default)]
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: PortalKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub activated: bool,
    /// Destination y for teleports
    #[serde(default, rename = "targetY", skip_serializing_if = "Option::is_none")]
    pub target_y: Option<f64>,
}

impl Portal {
    pub fn new(id: u32, kind: PortalKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            width,
            height,
            activated: false,
            target_y: None,
        }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Hitbox (axis-aligned square of half-extent `radius`) overlaps the trigger
    pub fn touches(&self, x: f64, y: f64, radius: f64) -> bool {
        x + radius >= self.x
            && x - radius <= self.x + self.width
            && y + radius >= self.y
            && y - radius <= self.y + self.height
    }
}

/// Apply a portal's effect to the player. Returns true if any field changed.
pub fn apply_portal(state: &mut PlayerState, portal: &Portal) -> bool {
    let before = *state;
    match portal.kind {
        PortalKind::GravityYellow => state.gravity_inverted = true,
        PortalKind::GravityBlue => state.gravity_inverted = false,
        PortalKind::SpeedQuarter => state.speed = SpeedType::Quarter,
        PortalKind::SpeedHalf => state.speed = SpeedType::Half,
        PortalKind::SpeedNormal => state.speed = SpeedType::Normal,
        PortalKind::SpeedDouble => state.speed = SpeedType::Double,
        PortalKind::SpeedTriple => state.speed = SpeedType::Triple,
        PortalKind::SpeedQuadruple => state.speed = SpeedType::Quadruple,
        PortalKind::MiniPink => state.size = SizeClass::Mini,
        PortalKind::MiniGreen => state.size = SizeClass::Normal,
        PortalKind::TeleportIn | PortalKind::TeleportOut => {
            if let Some(target) = portal.target_y {
                state.y = target;
            }
        }
        PortalKind::Unknown => {}
    }
    state.refresh_wave_angle();
    state.y = clamp_to_lane(state.y, state.radius());
    *state != before
}

/// Runtime contact: apply every not-yet-activated portal the player touches
/// and mark it activated. Returns the number of portals that fired.
pub fn touch_portals(state: &mut PlayerState, portals: &mut [Portal]) -> usize {
    let radius = state.radius();
    let mut fired = 0;
    for portal in portals.iter_mut() {
        if portal.activated || !portal.touches(state.x, state.y, radius) {
            continue;
        }
        portal.activated = true;
        apply_portal(state, portal);
        fired += 1;
    }
    fired
}

/// Validator contact: consume portals in x order starting at `index`.
/// A portal the player has fully passed without touching is skipped.
/// Returns the new index.
pub fn advance_portals(state: &mut PlayerState, portals: &[Portal], mut index: usize) -> usize {
    while let Some(portal) = portals.get(index) {
        let radius = state.radius();
        if portal.touches(state.x, state.y, radius) {
            apply_portal(state, portal);
            index += 1;
        } else if state.x - radius > portal.right() {
            index += 1;
        } else {
            break;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal(kind: PortalKind) -> Portal {
        Portal::new(1, kind, 190.0, 300.0, 30.0, 120.0)
    }

    #[test]
    fn test_speed_portal_is_one_shot() {
        let mut p = PlayerState::spawn();
        let mut portals = vec![portal(PortalKind::SpeedDouble)];
        assert_eq!(touch_portals(&mut p, &mut portals), 1);
        assert_eq!(p.speed_multiplier(), 2.0_f64.sqrt());
        assert!(portals[0].activated);

        p.speed = SpeedType::Half;
        assert_eq!(touch_portals(&mut p, &mut portals), 0);
        assert_eq!(p.speed, SpeedType::Half);
    }

    #[test]
    fn test_mini_portal_changes_radius_and_angle() {
        let mut p = PlayerState::spawn();
        apply_portal(&mut p, &portal(PortalKind::MiniPink));
        assert!(p.size.is_mini());
        assert_eq!(p.wave_angle, 60.0);
        apply_portal(&mut p, &portal(PortalKind::MiniGreen));
        assert_eq!(p.wave_angle, 45.0);
    }

    #[test]
    fn test_unknown_portal_is_identity() {
        let json = r#"{"type":"warp_9","x":0,"y":0,"width":10,"height":10}"#;
        let parsed: Portal = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, PortalKind::Unknown);
        let mut p = PlayerState::spawn();
        assert!(!apply_portal(&mut p, &parsed));
    }

    #[test]
    fn test_teleport_clamps_target() {
        let mut tp = portal(PortalKind::TeleportIn);
        tp.target_y = Some(-500.0);
        let mut p = PlayerState::spawn();
        apply_portal(&mut p, &tp);
        assert_eq!(p.y, p.radius());
    }

    #[test]
    fn test_advance_portals_skips_missed() {
        let portals = vec![
            Portal::new(1, PortalKind::GravityYellow, 100.0, 0.0, 30.0, 50.0),
            Portal::new(2, PortalKind::SpeedDouble, 400.0, 300.0, 30.0, 120.0),
        ];
        let mut p = PlayerState::at(300.0, 360.0);
        let idx = advance_portals(&mut p, &portals, 0);
        assert_eq!(idx, 1);
        assert!(!p.gravity_inverted);

        p.x = 380.0;
        let idx = advance_portals(&mut p, &portals, idx);
        assert_eq!(idx, 2);
        assert_eq!(p.speed, SpeedType::Double);
    }

    #[test]
    fn test_portal_json_tags() {
        let p = portal(PortalKind::SpeedDouble);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"type\":\"speed_2\""));
    }
}
