//! Box-against-box collision for movers.
//!
//! The core algorithm is **axis-separable move-and-slide**: resolve X movement
//! first against every obstacle, then resolve Y starting from the
//! already-corrected X position. This prevents diagonal tunneling and produces
//! the "slide along walls" behavior players expect from platformers. The
//! order is load-bearing; resolving both axes at once catches corners
//! differently.
//!
//! Movement uses strict overlap, so a mover resting exactly against a wall or
//! floor is free to move along it. Ground and passenger checks use the
//! inclusive [`Aabb::touches`] instead.

use glam::DVec2;
use hop_core::geometry::Aabb;

use crate::entity::EntityId;
use crate::registry::EntityRegistry;
use crate::viewport::ViewportId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBox {
    pub aabb: Aabb,
    /// Stops movers.
    pub blocking: bool,
    /// Reported as a contact whenever a mover overlaps it.
    pub trigger: bool,
}

impl CollisionBox {
    pub fn solid(aabb: Aabb) -> Self {
        Self {
            aabb,
            blocking: true,
            trigger: false,
        }
    }

    pub fn trigger(aabb: Aabb) -> Self {
        Self {
            aabb,
            blocking: false,
            trigger: true,
        }
    }

    /// Occupies space but neither blocks nor triggers.
    pub fn passive(aabb: Aabb) -> Self {
        Self {
            aabb,
            blocking: false,
            trigger: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub id: EntityId,
    pub collision: CollisionBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMoveResult {
    pub aabb: Aabb,
    pub velocity: DVec2,
    pub blocked_left: bool,
    pub blocked_right: bool,
    pub blocked_up: bool,
    pub blocked_down: bool,
    /// Trigger obstacles overlapped during either pass, first contact first.
    pub contacts: Vec<EntityId>,
}

impl CollisionMoveResult {
    pub fn blocked_x(&self) -> bool {
        self.blocked_left || self.blocked_right
    }

    pub fn blocked_y(&self) -> bool {
        self.blocked_up || self.blocked_down
    }
}

/// Everything `mover` can collide with: other entities that have a box and
/// the same owner. Two unowned entities collide with each other.
pub fn gather_obstacles(
    registry: &EntityRegistry,
    mover: EntityId,
    owner: Option<ViewportId>,
) -> Vec<Obstacle> {
    registry
        .iter()
        .filter(|entity| entity.id != mover && entity.owner == owner)
        .filter_map(|entity| {
            entity.collision_box().map(|collision| Obstacle {
                id: entity.id,
                collision,
            })
        })
        .collect()
}

/// True when some blocking obstacle's top edge is exactly at the bottom edge
/// of `aabb` and the two share a non-zero horizontal span.
pub fn is_grounded(aabb: &Aabb, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|obstacle| {
        let other = &obstacle.collision.aabb;
        obstacle.collision.blocking && aabb.overlaps_horizontally(other) && aabb.y2 == other.y1
    })
}

/// Move `aabb` by `velocity`, X first, then Y. An axis with zero velocity is
/// not resolved at all.
pub fn move_and_collide(
    aabb: Aabb,
    velocity: DVec2,
    obstacles: &[Obstacle],
    ledge_tolerance: f64,
) -> CollisionMoveResult {
    let mut result = CollisionMoveResult {
        aabb,
        velocity,
        blocked_left: false,
        blocked_right: false,
        blocked_up: false,
        blocked_down: false,
        contacts: Vec::new(),
    };

    if velocity.x != 0.0 {
        let blocked = resolve_axis_x(&mut result, obstacles, ledge_tolerance);
        if blocked {
            result.velocity.x = 0.0;
            result.blocked_left = velocity.x < 0.0;
            result.blocked_right = velocity.x > 0.0;
        }
    }

    if velocity.y != 0.0 {
        let blocked = resolve_axis_y(&mut result, obstacles);
        if blocked {
            result.velocity.y = 0.0;
            result.blocked_up = velocity.y < 0.0;
            result.blocked_down = velocity.y > 0.0;
        }
    }

    result
}

fn resolve_axis_x(result: &mut CollisionMoveResult, obstacles: &[Obstacle], ledge: f64) -> bool {
    let dx = result.velocity.x;
    let width = result.aabb.width();
    let height = result.aabb.height();
    let mut probe = result.aabb.translated(DVec2::new(dx, 0.0));
    let mut blocked = false;

    for obstacle in obstacles {
        let other = &obstacle.collision.aabb;
        if !probe.overlaps(other) {
            continue;
        }
        record_contact(&mut result.contacts, obstacle);
        if !obstacle.collision.blocking {
            continue;
        }
        // A low step: stand on top of it. The Y pass may not run at all.
        if probe.y2 - other.y1 < ledge {
            probe.y2 = other.y1;
            probe.y1 = probe.y2 - height;
            continue;
        }
        // Clamp direction comes from the requested move, not from whatever
        // the previous obstacle left behind.
        if dx < 0.0 {
            probe.x1 = other.x2;
            probe.x2 = probe.x1 + width;
        } else {
            probe.x2 = other.x1;
            probe.x1 = probe.x2 - width;
        }
        blocked = true;
    }

    result.aabb = probe;
    blocked
}

fn resolve_axis_y(result: &mut CollisionMoveResult, obstacles: &[Obstacle]) -> bool {
    let dy = result.velocity.y;
    let height = result.aabb.height();
    let mut probe = result.aabb.translated(DVec2::new(0.0, dy));
    let mut blocked = false;

    for obstacle in obstacles {
        let other = &obstacle.collision.aabb;
        if !probe.overlaps(other) {
            continue;
        }
        record_contact(&mut result.contacts, obstacle);
        if !obstacle.collision.blocking {
            continue;
        }
        if dy < 0.0 {
            probe.y1 = other.y2;
            probe.y2 = probe.y1 + height;
        } else {
            probe.y2 = other.y1;
            probe.y1 = probe.y2 - height;
        }
        blocked = true;
    }

    result.aabb = probe;
    blocked
}

fn record_contact(contacts: &mut Vec<EntityId>, obstacle: &Obstacle) {
    if obstacle.collision.trigger && !contacts.contains(&obstacle.id) {
        contacts.push(obstacle.id);
    }
}
