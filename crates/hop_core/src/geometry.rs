//! Axis-aligned rectangles in global (desktop) coordinates.
//!
//! `y` grows downward. Two predicates matter to the simulation and they differ
//! on purpose:
//!
//! - [`Aabb::overlaps`] uses strict inequalities, so boxes that share an edge do
//!   not collide. Movement resolution relies on this: a mover clamped flush
//!   against a wall must not count as overlapping it on the next query.
//! - [`Aabb::touches`] is inclusive and is what "standing on" and passenger
//!   detection use.

use glam::DVec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Aabb {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box with its top-left corner at `position`.
    pub fn from_position_size(position: DVec2, size: DVec2) -> Self {
        Self {
            x1: position.x,
            y1: position.y,
            x2: position.x + size.x,
            y2: position.y + size.y,
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn top_left(&self) -> DVec2 {
        DVec2::new(self.x1, self.y1)
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    pub fn translated(&self, delta: DVec2) -> Self {
        Self {
            x1: self.x1 + delta.x,
            y1: self.y1 + delta.y,
            x2: self.x2 + delta.x,
            y2: self.y2 + delta.y,
        }
    }

    /// Strict overlap: edge contact is not an overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x1 < other.x2 && self.x2 > other.x1 && self.y1 < other.y2 && self.y2 > other.y1
    }

    /// Inclusive overlap: shared edges and corners count.
    pub fn touches(&self, other: &Aabb) -> bool {
        self.x1 <= other.x2 && self.x2 >= other.x1 && self.y1 <= other.y2 && self.y2 >= other.y1
    }

    /// True when the open horizontal intervals intersect (non-zero width in common).
    pub fn overlaps_horizontally(&self, other: &Aabb) -> bool {
        self.x1 < other.x2 && self.x2 > other.x1
    }

    /// Inclusive point containment.
    pub fn contains_point(&self, point: DVec2) -> bool {
        self.x1 <= point.x && point.x <= self.x2 && self.y1 <= point.y && point.y <= self.y2
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Envelope of every box in the iterator, or `None` when it is empty.
    pub fn envelope<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Option<Aabb> {
        boxes.into_iter().fold(None, |acc, next| match acc {
            None => Some(*next),
            Some(acc) => Some(acc.union(next)),
        })
    }
}
