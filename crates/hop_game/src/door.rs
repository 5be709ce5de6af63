//! Doors react to their viewport changing screens.
//!
//! A [`DoorState`] shrinks away while its viewport is on a different screen
//! than where it started (or was just teleported) and grows back otherwise.
//! A [`SwapDoorState`] flashes out on every screen change or teleport and
//! only blocks once fully faded back in.

use glam::DVec2;
use hop_core::geometry::Aabb;

use crate::collision::CollisionBox;
use crate::context::TickContext;
use crate::host::ScreenId;
use crate::viewport::Viewport;

/// Per-tick change of a door's blocking height.
const DOOR_SLIDE_PER_TICK: f64 = 1.0;
/// Per-tick opacity gain of a swap door.
const SWAP_FADE_PER_TICK: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct DoorState {
    pub size: DVec2,
    /// Current blocking height, between 0 and `size.y`.
    pub height: f64,
    home_screen: Option<ScreenId>,
}

impl DoorState {
    pub fn new(size: DVec2) -> Self {
        Self {
            size,
            height: size.y,
            home_screen: None,
        }
    }

    pub fn collision_box(&self, position: DVec2) -> CollisionBox {
        CollisionBox::solid(Aabb::from_position_size(
            position,
            DVec2::new(self.size.x, self.height),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapDoorState {
    pub size: DVec2,
    /// 0 is invisible, 1 is solid.
    pub opacity: f64,
    last_screen: Option<ScreenId>,
}

impl SwapDoorState {
    pub fn new(size: DVec2) -> Self {
        Self {
            size,
            opacity: 1.0,
            last_screen: None,
        }
    }

    pub fn collision_box(&self, position: DVec2) -> CollisionBox {
        let aabb = Aabb::from_position_size(position, self.size);
        if self.opacity >= 1.0 {
            CollisionBox::solid(aabb)
        } else {
            CollisionBox::passive(aabb)
        }
    }
}

fn within_grace(viewport: &Viewport, grace_ms: u64, ctx: &TickContext<'_>) -> bool {
    viewport
        .last_teleport_tick
        .is_some_and(|at| ctx.tick.saturating_sub(at) < ctx.ticks_for(grace_ms))
}

/// Doors without an owning viewport keep their current state.
pub fn update_door(door: &mut DoorState, viewport: Option<&Viewport>, ctx: &TickContext<'_>) {
    let Some(viewport) = viewport else {
        return;
    };
    let screen = viewport.frame.screen;
    let home = *door.home_screen.get_or_insert(screen);
    if screen != home || within_grace(viewport, ctx.config.door_teleport_grace_ms, ctx) {
        door.height = (door.height - DOOR_SLIDE_PER_TICK).max(0.0);
    } else {
        door.height = (door.height + DOOR_SLIDE_PER_TICK).min(door.size.y);
    }
}

pub fn update_swap_door(
    door: &mut SwapDoorState,
    viewport: Option<&Viewport>,
    ctx: &TickContext<'_>,
) {
    let Some(viewport) = viewport else {
        return;
    };
    let screen = viewport.frame.screen;
    let previous = *door.last_screen.get_or_insert(screen);
    if screen != previous || within_grace(viewport, ctx.config.swap_door_teleport_grace_ms, ctx)
    {
        door.opacity = 0.0;
    }
    if door.opacity < 1.0 {
        door.opacity = (door.opacity + SWAP_FADE_PER_TICK).min(1.0);
    }
    door.last_screen = Some(screen);
}
