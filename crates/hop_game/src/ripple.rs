//! Expanding ring effect. Purely visual; it only counts down its lifetime and
//! removes itself.

use crate::config::EngineConfig;
use crate::context::TickContext;
use crate::entity::EntityId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RippleStyle {
    #[default]
    Plain,
    Rainbow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RippleState {
    pub style: RippleStyle,
    pub radius: f64,
    pub lifetime_ticks: u64,
    pub age_ticks: u64,
}

impl RippleState {
    /// Lifetime is twice the radius, in milliseconds.
    pub fn from_config(config: &EngineConfig, style: RippleStyle) -> Self {
        let lifetime_ms = (config.ripple_radius * 2.0).round().max(0.0) as u64;
        Self {
            style,
            radius: config.ripple_radius,
            lifetime_ticks: config.ticks_for(lifetime_ms),
            age_ticks: 0,
        }
    }

    /// Fraction of the lifetime elapsed, in [0, 1]. Renderers scale the ring
    /// by this.
    pub fn progress(&self) -> f64 {
        (self.age_ticks as f64 / self.lifetime_ticks.max(1) as f64).min(1.0)
    }

    pub fn is_done(&self) -> bool {
        self.age_ticks >= self.lifetime_ticks
    }
}

pub fn update(id: EntityId, ripple: &mut RippleState, ctx: &mut TickContext<'_>) {
    ripple.age_ticks += 1;
    if ripple.is_done() {
        ctx.commands.despawn(id);
    }
}
