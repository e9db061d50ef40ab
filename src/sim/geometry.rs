//! Primitive shape tests
//!
//! Point-in-shape predicates used by the collision dispatcher, plus the
//! axis-aligned `Rect` used for sweep queries and corridor checks.

use glam::DVec2;

/// Axis-aligned rectangle (screen space)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    pub fn around(center: DVec2, half_w: f64, half_h: f64) -> Self {
        Self {
            left: center.x - half_w,
            top: center.y - half_h,
            right: center.x + half_w,
            bottom: center.y + half_h,
        }
    }

    /// Smallest rect containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn expand(&self, by: f64) -> Rect {
        Rect {
            left: self.left - by,
            top: self.top - by,
            right: self.right + by,
            bottom: self.bottom + by,
        }
    }

    #[inline]
    pub fn overlaps_x(&self, left: f64, right: f64) -> bool {
        self.right >= left && self.left <= right
    }

    #[inline]
    pub fn overlaps_y(&self, top: f64, bottom: f64) -> bool {
        self.bottom >= top && self.top <= bottom
    }

    #[inline]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new((self.left + self.right) * 0.5, (self.top + self.bottom) * 0.5)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Signed area test; edges count as inside
pub fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    let cross = |o: DVec2, u: DVec2, v: DVec2| (u.x - o.x) * (v.y - o.y) - (u.y - o.y) * (v.x - o.x);
    let d1 = cross(p, a, b);
    let d2 = cross(p, b, c);
    let d3 = cross(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Point inside the axis-aligned ellipse with semi-axes `rx`, `ry`
pub fn point_in_ellipse(p: DVec2, center: DVec2, rx: f64, ry: f64) -> bool {
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let dx = (p.x - center.x) / rx;
    let dy = (p.y - center.y) / ry;
    dx * dx + dy * dy <= 1.0
}

#[inline]
pub fn point_in_circle(p: DVec2, center: DVec2, radius: f64) -> bool {
    radius > 0.0 && p.distance_squared(center) <= radius * radius
}

/// AABB of a `width`×`height` box rotated by `degrees` about its centre
pub fn rotated_bounds(rect: &Rect, degrees: f64) -> Rect {
    if degrees.rem_euclid(180.0) == 0.0 {
        return *rect;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let half_w = rect.width() * 0.5;
    let half_h = rect.height() * 0.5;
    let ext_x = half_w * cos.abs() + half_h * sin.abs();
    let ext_y = half_w * sin.abs() + half_h * cos.abs();
    Rect::around(rect.center(), ext_x, ext_y)
}
