//! The level goal: pulses ripples until a player in the same viewport touches
//! it, then shows a Next/Retry modal in that viewport.

use glam::DVec2;
use hop_core::geometry::Aabb;
use hop_core::input::Key;
use hop_core::time::TimerHandle;

use crate::context::{LevelTransition, TickContext, TimerAction};
use crate::entity::EntityId;
use crate::events::GameEventKind;
use crate::ripple::RippleStyle;
use crate::viewport::{Viewport, ViewportId};

#[derive(Debug, Clone, PartialEq)]
pub struct GoalState {
    pub size: DVec2,
    pub reached: bool,
    ripple_timer: Option<TimerHandle>,
}

impl GoalState {
    pub fn new(size: DVec2) -> Self {
        Self {
            size,
            reached: false,
            ripple_timer: None,
        }
    }
}

/// Button rectangles of the goal modal, in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModalButtons {
    pub next: Aabb,
    pub retry: Aabb,
}

/// The modal covers the middle of the viewport; both buttons sit on its
/// lower quarter line.
pub fn modal_buttons(frame: &Aabb) -> ModalButtons {
    let modal_x = frame.x1 + frame.width() / 10.0;
    let modal_y = frame.y1 + frame.height() / 4.0;
    let modal_w = frame.width() * 4.0 / 5.0;
    let modal_h = frame.height() / 2.0;

    let button = DVec2::new(modal_w / 6.0, modal_h / 8.0);
    let button_y = modal_y + modal_h * 3.0 / 4.0;
    let next = Aabb::from_position_size(DVec2::new(modal_x + modal_w * 2.0 / 3.0, button_y), button);
    let retry =
        Aabb::from_position_size(DVec2::new(modal_x + modal_w / 3.0 - button.x, button_y), button);
    ModalButtons { next, retry }
}

/// Start the periodic ripple. Called once when the goal enters the registry.
pub fn arm(id: EntityId, goal: &mut GoalState, ctx: &mut TickContext<'_>) {
    let every = ctx.ticks_for(ctx.config.goal_ripple_interval_ms);
    goal.ripple_timer = Some(
        ctx.timers
            .schedule_repeating(ctx.tick, every, TimerAction::GoalRipple(id)),
    );
}

/// A mover overlapped the goal. Only counts when the mover shares the goal's
/// viewport; returns whether the goal was reached just now.
pub fn on_contact(
    position: DVec2,
    goal: &mut GoalState,
    goal_owner: Option<ViewportId>,
    actor_owner: Option<ViewportId>,
    ctx: &mut TickContext<'_>,
) -> bool {
    if goal.reached || goal_owner != actor_owner {
        return false;
    }
    if let Some(timer) = goal.ripple_timer.take() {
        ctx.timers.cancel(timer);
    }
    goal.reached = true;
    ctx.spawn_ripple(position, RippleStyle::Rainbow);
    ctx.emit(GameEventKind::GoalReached, Some(position.x));
    log::info!("goal reached");
    true
}

/// Once reached, listen for Next/Retry from the keyboard or the modal.
pub fn update(goal: &GoalState, viewport: Option<&Viewport>, ctx: &mut TickContext<'_>) {
    if !goal.reached {
        return;
    }
    if ctx.input.was_pressed(Key::Space) {
        request_next(ctx);
        return;
    }
    if ctx.input.was_pressed(Key::R) {
        ctx.request_transition(LevelTransition::Retry);
        return;
    }

    let pointer = ctx.input.pointer();
    let Some(viewport) = viewport else {
        return;
    };
    if !pointer.down {
        return;
    }
    let frame = viewport.frame.bounds();
    let at = frame.top_left() + DVec2::new(pointer.x, pointer.y);
    let buttons = modal_buttons(&frame);
    if buttons.next.contains_point(at) {
        request_next(ctx);
    } else if buttons.retry.contains_point(at) {
        ctx.request_transition(LevelTransition::Retry);
    }
}

fn request_next(ctx: &mut TickContext<'_>) {
    ctx.emit(GameEventKind::LevelComplete, None);
    ctx.request_transition(LevelTransition::Next);
}
