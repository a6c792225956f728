//! Canvas math utilities
//!
//! Re-exports glam with the bounding-box type used by selection

pub use glam::*;

/// Axis-aligned bounding box in canvas space.
///
/// The empty box has `min = +inf` and `max = -inf` so that unions with it
/// are the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bbox {
    pub const EMPTY: Bbox = Bbox {
        min: Vec2::splat(f32::INFINITY),
        max: Vec2::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Smallest box containing both corners, in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_points(points: &[Vec2]) -> Self {
        points
            .iter()
            .fold(Self::EMPTY, |bbox, &p| bbox.union(Self::new(p, p)))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn union(self, other: Bbox) -> Bbox {
        Bbox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        if self.is_empty() {
            Vec2::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn contains_bbox(&self, other: &Bbox) -> bool {
        !other.is_empty() && self.contains(other.min) && self.contains(other.max)
    }
}

impl Default for Bbox {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Rotate `point` around `center` by a unit rotation vector from `Vec2::from_angle`.
#[inline]
pub fn rotate_about(point: Vec2, center: Vec2, rotation: Vec2) -> Vec2 {
    rotation.rotate(point - center) + center
}
