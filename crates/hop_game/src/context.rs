//! Per-tick state handed to entity behaviours: read access to input,
//! viewports and config, plus the buffers they write into (timers, registry
//! commands, events, transition request).

use glam::DVec2;
use hop_core::geometry::Aabb;
use hop_core::input::InputState;
use hop_core::time::TimerQueue;

use crate::config::EngineConfig;
use crate::entity::{EntityId, EntityKind, Spawn};
use crate::events::{stereo_pan, GameEvent, GameEventKind};
use crate::registry::Commands;
use crate::ripple::{RippleState, RippleStyle};
use crate::viewport::{ViewportId, ViewportSet};

/// Deferred work keyed to the tick counter. All of a level's timers are
/// dropped together when the level changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Respawn(EntityId),
    GoalRipple(EntityId),
    TeleportEcho(ViewportId),
    FinaleRipple,
    FinaleFanfare,
    FinaleEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTransition {
    Next,
    Retry,
}

pub struct TickContext<'a> {
    pub tick: u64,
    pub config: &'a EngineConfig,
    pub input: &'a InputState,
    pub viewports: &'a ViewportSet,
    /// Aggregate viewport bounds, queried once at the start of the tick.
    pub bounds: Option<Aabb>,
    pub timers: &'a mut TimerQueue<TimerAction>,
    pub commands: &'a mut Commands,
    pub events: &'a mut Vec<GameEvent>,
    pub transition: &'a mut Option<LevelTransition>,
}

impl TickContext<'_> {
    /// Record an event, panned by `x` when given.
    pub fn emit(&mut self, kind: GameEventKind, x: Option<f64>) {
        let pan = match (x, self.bounds.as_ref()) {
            (Some(x), Some(bounds)) => stereo_pan(x, bounds),
            _ => None,
        };
        self.events.push(GameEvent {
            kind,
            pan,
            tick: self.tick,
        });
    }

    pub fn spawn_ripple(&mut self, position: DVec2, style: RippleStyle) {
        let ripple = RippleState::from_config(self.config, style);
        self.commands
            .spawn(Spawn::new(position, EntityKind::Ripple(ripple)));
    }

    /// First request in a tick wins.
    pub fn request_transition(&mut self, transition: LevelTransition) {
        if self.transition.is_none() {
            *self.transition = Some(transition);
        }
    }

    pub fn ticks_for(&self, ms: u64) -> u64 {
        self.config.ticks_for(ms)
    }
}

/// Side effects an entity update hands back to the scheduler.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateEffects {
    /// Other entities to displace (platform passengers).
    pub carried: Vec<(EntityId, DVec2)>,
    /// Trigger entities the updated entity ran into.
    pub contacts: Vec<EntityId>,
}
