//! 2D primitives shared by the layout engine and the hit-region resolver.
//!
//! Screen convention: x grows right, y grows down, positive angles rotate
//! clockwise on screen. Rectangles rotate about their own top-left corner.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A point (or offset) in pixels.
pub type Point = DVec2;

/// Width/height pair as reported by a size observer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both dimensions are finite and strictly positive.
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Standard rotation about the origin.
pub fn rotate_point(x: f64, y: f64, angle_rad: f64) -> (f64, f64) {
    rotate(Point::new(x, y), angle_rad).into()
}

pub fn rotate(p: Point, angle_rad: f64) -> Point {
    DVec2::from_angle(angle_rad).rotate(p)
}

/// Rectangle corner, numbered 1..=4 clockwise from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Vertex {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Vertex {
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::TopLeft),
            2 => Some(Self::TopRight),
            3 => Some(Self::BottomRight),
            4 => Some(Self::BottomLeft),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::TopLeft => 1,
            Self::TopRight => 2,
            Self::BottomRight => 3,
            Self::BottomLeft => 4,
        }
    }
}

/// Corner of an unrotated `width × height` rectangle whose top-left is the origin.
pub fn rect_vertex(width: f64, height: f64, vertex: Vertex) -> Point {
    match vertex {
        Vertex::TopLeft => Point::ZERO,
        Vertex::TopRight => Point::new(width, 0.0),
        Vertex::BottomRight => Point::new(width, height),
        Vertex::BottomLeft => Point::new(0.0, height),
    }
}

/// Axis-aligned extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min: Point,
    pub max: Point,
}

impl Extents {
    pub fn of_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(Self::at(*first), |ext, p| ext.including(*p)))
    }

    fn at(p: Point) -> Self {
        Self { min: p, max: p }
    }

    #[must_use]
    pub fn including(self, p: Point) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn translated(self, by: Point) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }
}

/// Bounding extents of a `width × height` rectangle rotated about its top-left.
pub fn rotated_extents(width: f64, height: f64, angle_deg: f64) -> Extents {
    let angle = angle_deg.to_radians();
    let corners = Vertex::ALL.map(|v| rotate(rect_vertex(width, height, v), angle));
    corners[1..]
        .iter()
        .fold(Extents::at(corners[0]), |ext, p| ext.including(*p))
}

/// Minimum y among the four rotated corners.
pub fn min_y_at_rotation(width: f64, height: f64, angle_deg: f64) -> f64 {
    rotated_extents(width, height, angle_deg).min.y
}

/// A rectangle placed at `origin` (its top-left before rotation) and rotated
/// by `rotation_deg` about that origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotatedRect {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    pub rotation_deg: f64,
}

impl RotatedRect {
    pub fn new(origin: Point, width: f64, height: f64, rotation_deg: f64) -> Self {
        Self {
            origin,
            width,
            height,
            rotation_deg,
        }
    }

    pub fn axis_aligned(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Point::new(x, y), width, height, 0.0)
    }

    /// Absolute position of one corner.
    pub fn vertex(&self, vertex: Vertex) -> Point {
        self.origin
            + rotate(
                rect_vertex(self.width, self.height, vertex),
                self.rotation_deg.to_radians(),
            )
    }

    pub fn corners(&self) -> [Point; 4] {
        Vertex::ALL.map(|v| self.vertex(v))
    }

    pub fn extents(&self) -> Extents {
        rotated_extents(self.width, self.height, self.rotation_deg).translated(self.origin)
    }

    /// Inclusive containment test, done in the rectangle's own frame.
    pub fn contains(&self, p: Point) -> bool {
        let local = rotate(p - self.origin, -self.rotation_deg.to_radians());
        local.x >= 0.0 && local.y >= 0.0 && local.x <= self.width && local.y <= self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_rotate_point_quarter_turn() {
        let (x, y) = rotate_point(1.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert!(x.abs() < EPS);
        assert!((y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_rotation_round_trip() {
        let samples = [(3.0, -4.0), (0.0, 0.0), (123.5, 77.25), (-9.0, 1e-3)];
        let mut angle = -7.0;
        while angle <= 7.0 {
            for (x, y) in samples {
                let (rx, ry) = rotate_point(x, y, angle);
                let (bx, by) = rotate_point(rx, ry, -angle);
                assert!((bx - x).abs() < 1e-9, "x drift at angle {angle}");
                assert!((by - y).abs() < 1e-9, "y drift at angle {angle}");
            }
            angle += 0.37;
        }
    }

    #[test]
    fn test_rect_vertex_clockwise() {
        assert_eq!(rect_vertex(4.0, 2.0, Vertex::TopLeft), Point::new(0.0, 0.0));
        assert_eq!(rect_vertex(4.0, 2.0, Vertex::TopRight), Point::new(4.0, 0.0));
        assert_eq!(
            rect_vertex(4.0, 2.0, Vertex::BottomRight),
            Point::new(4.0, 2.0)
        );
        assert_eq!(rect_vertex(4.0, 2.0, Vertex::BottomLeft), Point::new(0.0, 2.0));
        for v in Vertex::ALL {
            assert_eq!(Vertex::from_index(v.index()), Some(v));
        }
        assert_eq!(Vertex::from_index(0), None);
        assert_eq!(Vertex::from_index(5), None);
    }

    #[test]
    fn test_min_y_at_rotation() {
        assert!(min_y_at_rotation(10.0, 4.0, 0.0).abs() < EPS);
        // Clockwise rotation keeps every corner at or below the origin.
        assert!(min_y_at_rotation(10.0, 4.0, 30.0).abs() < EPS);
        // Counter-clockwise lifts the top-right corner by w·sin θ.
        let expected = -10.0 * 30f64.to_radians().sin();
        assert!((min_y_at_rotation(10.0, 4.0, -30.0) - expected).abs() < EPS);
    }

    #[test]
    fn test_rotated_rect_contains() {
        let rect = RotatedRect::new(Point::new(10.0, 10.0), 20.0, 10.0, 90.0);
        // Rotated 90° clockwise about (10,10): spans x in [0,10], y in [10,30].
        assert!(rect.contains(Point::new(5.0, 20.0)));
        assert!(!rect.contains(Point::new(15.0, 20.0)));
        let ext = rect.extents();
        assert!(ext.min.x.abs() < EPS);
        assert!((ext.max.y - 30.0).abs() < EPS);
    }
}
