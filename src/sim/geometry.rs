//! Axis-aligned bounds used by every collision test

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Square box of side `size` centered on `center`
    pub fn from_center(center: Vec2, size: f32) -> Self {
        let half = Vec2::splat(size.max(0.0) / 2.0);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Overlap test (touching edges do not count)
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// True once a body has left the `arena` by more than twice its size
pub fn beyond_arena(pos: Vec2, size: f32, arena: Vec2) -> bool {
    let margin = size * 2.0;
    pos.x < -margin || pos.y < -margin || pos.x > arena.x + margin || pos.y > arena.y + margin
}
