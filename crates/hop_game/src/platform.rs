//! Moving platforms travel back and forth along a fixed segment and carry
//! whatever stands on them.
//!
//! Endpoint checks use the projection of the position onto the segment
//! rather than per-component comparisons, so axis-aligned paths whose minor
//! component is a rounding residue of `cos`/`sin` behave like exact ones.

use glam::DVec2;
use hop_core::geometry::Aabb;

use crate::entity::EntityId;
use crate::registry::EntityRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformPath {
    pub start: DVec2,
    pub end: DVec2,
    /// Displacement per tick when moving forward.
    pub step: DVec2,
}

impl PlatformPath {
    /// `duration_ticks` must be positive and finite; the level loader
    /// rejects anything else.
    pub fn new(start: DVec2, angle_deg: f64, distance: f64, duration_ticks: f64) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let end = start + DVec2::new(cos, sin) * distance;
        Self {
            start,
            end,
            step: (end - start) / duration_ticks,
        }
    }

    /// Where `point` projects onto the segment: 0 at `start`, 1 at `end`.
    /// `None` for a zero-length path.
    pub fn progress(&self, point: DVec2) -> Option<f64> {
        let span = self.end - self.start;
        let length_sq = span.length_squared();
        if length_sq == 0.0 {
            return None;
        }
        Some((point - self.start).dot(span) / length_sq)
    }

    pub fn translate(&mut self, delta: DVec2) {
        self.start += delta;
        self.end += delta;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformState {
    pub size: DVec2,
    pub path: PlatformPath,
    pub direction: Direction,
}

impl PlatformState {
    pub fn new(size: DVec2, path: PlatformPath) -> Self {
        Self {
            size,
            path,
            direction: Direction::Forward,
        }
    }
}

/// Advance one tick. Returns the passengers to move and by how much; the
/// caller applies those before anything else reads their positions.
pub fn update(
    id: EntityId,
    position: &mut DVec2,
    platform: &mut PlatformState,
    registry: &EntityRegistry,
) -> Vec<(EntityId, DVec2)> {
    let path = platform.path;
    let Some(t) = path.progress(*position) else {
        return Vec::new();
    };

    // Pushed past an end (e.g. by an external move): snap back and head
    // the other way.
    if t > 1.0 {
        *position = path.end;
        platform.direction = Direction::Backward;
    } else if t < 0.0 {
        *position = path.start;
        platform.direction = Direction::Forward;
    }

    let mut target = *position + path.step * platform.direction.sign();
    let target_t = path.progress(target).unwrap_or(0.0);
    match platform.direction {
        Direction::Forward if target_t >= 1.0 => {
            target = path.end;
            platform.direction = Direction::Backward;
        }
        Direction::Backward if target_t <= 0.0 => {
            target = path.start;
            platform.direction = Direction::Forward;
        }
        _ => {}
    }

    let delta = target - *position;
    let deck = Aabb::from_position_size(*position, platform.size);
    let passengers = registry
        .iter()
        .filter(|entity| entity.id != id && entity.can_be_grounded())
        .filter(|entity| {
            entity
                .collision_box()
                .is_some_and(|collision| collision.aabb.touches(&deck))
        })
        .map(|entity| (entity.id, delta))
        .collect();

    *position = target;
    passengers
}
