//! Axis-aligned rectangles for hitboxes, platforms and query windows.
//!
//! Coordinates are screen-style: x grows right, y grows down, so `min_y` is the
//! top edge and `max_y` the bottom edge.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub min_x: f32,
    /// Top edge
    pub min_y: f32,
    /// Right edge
    pub max_x: f32,
    /// Bottom edge
    pub max_y: f32,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width.max(0.0),
            max_y: y + height.max(0.0),
        }
    }

    /// Creates a rectangle from its edges.
    #[must_use]
    pub const fn from_edges(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates a rectangle from center and half-extents.
    #[must_use]
    pub fn from_center(center: Vec2, half_width: f32, half_height: f32) -> Self {
        Self {
            min_x: center.x - half_width,
            min_y: center.y - half_height,
            max_x: center.x + half_width,
            max_y: center.y + half_height,
        }
    }

    /// Returns the center of the rectangle.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the top-left corner.
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.min_x, self.min_y)
    }

    /// Returns the width of the rectangle.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Returns the height of the rectangle.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Checks if this rectangle overlaps another. Touching edges do not count.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Checks if a point lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min_x && point.x < self.max_x && point.y >= self.min_y && point.y < self.max_y
    }

    /// Returns the rectangle translated by a vector.
    #[must_use]
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            min_x: self.min_x + offset.x,
            min_y: self.min_y + offset.y,
            max_x: self.max_x + offset.x,
            max_y: self.max_y + offset.y,
        }
    }

    /// Expands the rectangle by a margin on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Moves the rectangle so its center sits at `center`.
    pub fn set_center(&mut self, center: Vec2) {
        let half = Vec2::new(self.width(), self.height()) / 2.0;
        *self = Self::from_center(center, half.x, half.y);
    }

    /// Moves the rectangle horizontally so its left edge is at `x`.
    pub fn set_left(&mut self, x: f32) {
        let width = self.width();
        self.min_x = x;
        self.max_x = x + width;
    }

    /// Moves the rectangle horizontally so its right edge is at `x`.
    pub fn set_right(&mut self, x: f32) {
        let width = self.width();
        self.max_x = x;
        self.min_x = x - width;
    }

    /// Moves the rectangle vertically so its top edge is at `y`.
    pub fn set_top(&mut self, y: f32) {
        let height = self.height();
        self.min_y = y;
        self.max_y = y + height;
    }

    /// Moves the rectangle vertically so its bottom edge is at `y`.
    pub fn set_bottom(&mut self, y: f32) {
        let height = self.height();
        self.max_y = y;
        self.min_y = y - height;
    }

    /// Distance between the centers of two rectangles.
    #[must_use]
    pub fn center_distance(&self, other: &Rect) -> f32 {
        self.center().distance(other.center())
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::from_edges(0.0, 0.0, 1.0, 1.0)
    }
}
