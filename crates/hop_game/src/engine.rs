//! The tick scheduler.
//!
//! One call to [`Engine::update`] is one tick, in six phases:
//!  1. termination check, then global controls (focus loss, focus cycling,
//!     rotate, teleport);
//!  2. every viewport's intake and ownership pass, then reconciliation;
//!  3. due timers, then every live entity's update in snapshot order, then
//!     the buffered spawns/despawns;
//!  4. stable z-order sort;
//!  5. input edge-state commit;
//!  6. level transition.
//!
//! The engine never reads the wall clock. [`Engine::run`] is a convenience
//! loop that paces ticks with a [`TickPacer`].

use glam::DVec2;
use hop_core::geometry::Aabb;
use hop_core::input::{InputState, Key};
use hop_core::time::{TickPacer, TimerQueue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::context::{LevelTransition, TickContext, TimerAction, UpdateEffects};
use crate::door;
use crate::entity::{Entity, EntityId, EntityKind, EntityType};
use crate::error::{EngineError, LoadError};
use crate::events::{GameEvent, GameEventKind};
use crate::goal;
use crate::host::ViewportHost;
use crate::level::{finale_level, prepare_level, LevelSet};
use crate::platform;
use crate::player;
use crate::registry::{Commands, EntityRegistry};
use crate::ripple::{self, RippleStyle};
use crate::viewport::{ViewportId, ViewportSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSlot {
    Index(usize),
    /// Shown after the last level.
    Finale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Escape,
    ViewportClosed,
    FinaleFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    LevelStarted(LevelSlot),
    Stopped(StopReason),
}

/// Everything a [`TickContext`] writes into.
#[derive(Debug, Default)]
struct TickBuffers {
    timers: TimerQueue<TimerAction>,
    commands: Commands,
    events: Vec<GameEvent>,
    transition: Option<LevelTransition>,
}

impl TickBuffers {
    fn ctx<'a>(
        &'a mut self,
        tick: u64,
        config: &'a EngineConfig,
        input: &'a InputState,
        viewports: &'a ViewportSet,
        bounds: Option<Aabb>,
    ) -> TickContext<'a> {
        TickContext {
            tick,
            config,
            input,
            viewports,
            bounds,
            timers: &mut self.timers,
            commands: &mut self.commands,
            events: &mut self.events,
            transition: &mut self.transition,
        }
    }

    /// Drop everything tied to the current level. Events stay until drained.
    fn clear_level(&mut self) {
        self.timers.clear();
        self.commands.clear();
        self.transition = None;
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    level: LevelSlot,
    finale_done: bool,
}

pub struct Engine<H: ViewportHost> {
    host: H,
    config: EngineConfig,
    levels: LevelSet,
    input: InputState,
    registry: EntityRegistry,
    viewports: ViewportSet,
    buffers: TickBuffers,
    tick: u64,
    session: Option<Session>,
    had_focus: bool,
    player_owner: Option<ViewportId>,
    rng: StdRng,
}

impl<H: ViewportHost> Engine<H> {
    pub fn new(host: H, levels: LevelSet, config: EngineConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.finale_seed);
        Self {
            host,
            config,
            levels,
            input: InputState::new(),
            registry: EntityRegistry::new(),
            viewports: ViewportSet::default(),
            buffers: TickBuffers::default(),
            tick: 0,
            session: None,
            had_focus: false,
            player_owner: None,
            rng,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Host-side input goes here between ticks.
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn viewports(&self) -> &ViewportSet {
        &self.viewports
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn levels(&self) -> &LevelSet {
        &self.levels
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_level(&self) -> Option<LevelSlot> {
        self.session.map(|session| session.level)
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.registry
            .first_of_kind(EntityType::Player)
            .map(|entity| entity.id)
    }

    pub fn pending_timers(&self) -> usize {
        self.buffers.timers.len()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.buffers.events)
    }

    /// Load level `index` and start ticking. On failure nothing is left open.
    pub fn start(&mut self, index: usize) -> Result<(), EngineError> {
        if self.session.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        self.load(LevelSlot::Index(index))?;
        Ok(())
    }

    /// Tear the level down. Returns the level index to resume from, or
    /// `None` when the finale was showing.
    pub fn stop(&mut self) -> Result<Option<usize>, EngineError> {
        let session = self.session.ok_or(EngineError::NotRunning)?;
        self.shutdown();
        log::info!("stopped by host");
        Ok(match session.level {
            LevelSlot::Index(index) => Some(index),
            LevelSlot::Finale => None,
        })
    }

    pub fn request_next_level(&mut self) -> Result<(), EngineError> {
        self.request(LevelTransition::Next)
    }

    pub fn request_retry_level(&mut self) -> Result<(), EngineError> {
        self.request(LevelTransition::Retry)
    }

    fn request(&mut self, transition: LevelTransition) -> Result<(), EngineError> {
        if self.session.is_none() {
            return Err(EngineError::NotRunning);
        }
        self.buffers.transition.get_or_insert(transition);
        Ok(())
    }

    /// Advance one tick.
    pub fn update(&mut self) -> Result<TickOutcome, EngineError> {
        let Some(session) = self.session else {
            return Err(EngineError::NotRunning);
        };
        self.tick += 1;

        // Phase 1
        self.viewports.refresh(&self.host);
        let stop = if self.input.was_pressed(Key::Escape) {
            Some(StopReason::Escape)
        } else if self.viewports.any_closed() {
            Some(StopReason::ViewportClosed)
        } else {
            None
        };
        if let Some(reason) = stop {
            self.shutdown();
            log::info!("stopped: {reason:?}");
            return Ok(TickOutcome::Stopped(reason));
        }
        self.global_controls();

        // Phase 2
        self.viewports.update(
            &mut self.host,
            &self.input,
            &mut self.registry,
            &self.config,
        );
        self.follow_player();

        // Phase 3
        let bounds = self.host.aggregate_bounds();
        self.fire_timers(bounds);
        self.update_entities(bounds);
        let (removed, added) = self.buffers.commands.flush(&mut self.registry);
        for entity in removed {
            self.viewports.forget(entity.id, entity.owner);
        }
        self.settle_spawned(added);

        // Phase 4
        self.registry.sort_by_z_order();

        // Phase 5
        self.input.commit();

        // Phase 6
        if self.session.is_some_and(|session| session.finale_done) {
            self.shutdown();
            log::info!("finale finished");
            return Ok(TickOutcome::Stopped(StopReason::FinaleFinished));
        }
        let Some(transition) = self.buffers.transition.take() else {
            return Ok(TickOutcome::Continue);
        };
        let next = match (transition, session.level) {
            (LevelTransition::Retry, current) => current,
            (LevelTransition::Next, LevelSlot::Index(index)) if index + 1 < self.levels.len() => {
                LevelSlot::Index(index + 1)
            }
            (LevelTransition::Next, _) => LevelSlot::Finale,
        };
        log::info!("{transition:?}: loading {next:?}");
        self.load(next)?;
        Ok(TickOutcome::LevelStarted(next))
    }

    /// Tick until the engine stops, `before_tick` returns false, or an error
    /// comes back. `before_tick` runs between ticks and is where the caller
    /// feeds input and drains events. Without a pacer ticks run back to back.
    pub fn run(
        &mut self,
        mut pacer: Option<&mut TickPacer>,
        mut before_tick: impl FnMut(&mut Self) -> bool,
    ) -> Result<Option<StopReason>, EngineError> {
        loop {
            if !before_tick(self) {
                return Ok(None);
            }
            if let Some(pacer) = pacer.as_deref_mut() {
                pacer.begin_tick();
            }
            let outcome = self.update()?;
            if let Some(pacer) = pacer.as_deref_mut() {
                let wait = pacer.end_tick();
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
            if let TickOutcome::Stopped(reason) = outcome {
                return Ok(Some(reason));
            }
        }
    }

    fn global_controls(&mut self) {
        let has_focus = self.viewports.focused().is_some();
        if !has_focus && self.had_focus {
            log::debug!("all viewports lost focus; releasing keys");
            self.input.lost_focus();
        }
        self.had_focus = has_focus;

        if self.input.was_pressed(Key::BracketLeft) {
            self.viewports.cycle_focus(&mut self.host, 1);
        } else if self.input.was_pressed(Key::BracketRight) {
            self.viewports.cycle_focus(&mut self.host, -1);
        }

        if self.input.was_pressed(Key::E) {
            self.viewports.rotate_positions(&mut self.host);
        }

        if self.input.was_pressed(Key::T) {
            if let Some((id, _, after)) = self.viewports.teleport_focused(&mut self.host, self.tick) {
                let bounds = self.host.aggregate_bounds();
                let mut ctx = self.buffers.ctx(
                    self.tick,
                    &self.config,
                    &self.input,
                    &self.viewports,
                    bounds,
                );
                ctx.spawn_ripple(after, RippleStyle::Plain);
                let delay = ctx.ticks_for(ctx.config.teleport_echo_delay_ms);
                ctx.timers
                    .schedule_once(ctx.tick, delay, TimerAction::TeleportEcho(id));
            }
        }
    }

    /// Keep the player's viewport focused as the player crosses over.
    fn follow_player(&mut self) {
        let owner = self
            .registry
            .first_of_kind(EntityType::Player)
            .and_then(|player| player.owner);
        if owner == self.player_owner {
            return;
        }
        if let Some(owner) = owner {
            log::debug!("player moved to {owner}");
            self.viewports.focus(&mut self.host, owner);
        }
        self.player_owner = owner;
    }

    fn fire_timers(&mut self, bounds: Option<Aabb>) {
        for action in self.buffers.timers.take_due(self.tick) {
            let mut ctx = self.buffers.ctx(
                self.tick,
                &self.config,
                &self.input,
                &self.viewports,
                bounds,
            );
            match action {
                TimerAction::Respawn(id) => respawn(id, &mut self.registry, &mut ctx),
                TimerAction::GoalRipple(id) => {
                    if let Some(goal) = self.registry.get(id) {
                        ctx.spawn_ripple(goal.position, RippleStyle::Plain);
                    }
                }
                TimerAction::TeleportEcho(viewport) => {
                    if let Some(centre) = self.viewports.centre(&self.host, viewport) {
                        ctx.spawn_ripple(centre, RippleStyle::Plain);
                    }
                }
                TimerAction::FinaleRipple => {
                    if let Some(area) = bounds {
                        let at = DVec2::new(
                            area.x1 + (self.rng.gen::<f64>() * area.width()).round(),
                            area.y1 + (self.rng.gen::<f64>() * area.height()).round(),
                        );
                        ctx.spawn_ripple(at, RippleStyle::Rainbow);
                    }
                }
                TimerAction::FinaleFanfare => ctx.emit(GameEventKind::Fireworks, None),
                TimerAction::FinaleEnd => {
                    if let Some(session) = self.session.as_mut() {
                        session.finale_done = true;
                    }
                }
            }
        }
    }

    fn update_entities(&mut self, bounds: Option<Aabb>) {
        for id in self.registry.ids() {
            if self.buffers.commands.is_despawning(id) {
                continue;
            }
            let Some(mut entity) = self.registry.get(id).cloned() else {
                continue;
            };
            let mut ctx = self.buffers.ctx(
                self.tick,
                &self.config,
                &self.input,
                &self.viewports,
                bounds,
            );
            let effects = update_entity(&mut entity, &self.registry, &mut ctx);
            let actor_owner = entity.owner;
            self.registry.replace(entity);

            for (passenger, delta) in effects.carried {
                if let Some(passenger) = self.registry.get_mut(passenger) {
                    passenger.position += delta;
                }
            }
            for target in effects.contacts {
                dispatch_contact(target, actor_owner, &mut self.registry, &mut ctx);
            }
        }
    }

    /// Register new entities with their viewports and run their spawn hooks.
    /// Whatever the hooks spawn is flushed and settled too.
    fn settle_spawned(&mut self, mut added: Vec<EntityId>) {
        while !added.is_empty() {
            let bounds = self.host.aggregate_bounds();
            for id in &added {
                if let Some(entity) = self.registry.get_mut(*id) {
                    self.viewports.attach(entity);
                }
            }
            let mut ctx = self.buffers.ctx(
                self.tick,
                &self.config,
                &self.input,
                &self.viewports,
                bounds,
            );
            for id in &added {
                let Some(entity) = self.registry.get_mut(*id) else {
                    continue;
                };
                match &mut entity.kind {
                    EntityKind::Goal(goal) => goal::arm(*id, goal, &mut ctx),
                    EntityKind::Player(_) => ctx.spawn_ripple(entity.position, RippleStyle::Plain),
                    _ => {}
                }
            }
            let (removed, next) = self.buffers.commands.flush(&mut self.registry);
            for entity in removed {
                self.viewports.forget(entity.id, entity.owner);
            }
            added = next;
        }
    }

    fn load(&mut self, slot: LevelSlot) -> Result<(), LoadError> {
        self.shutdown();

        let descriptor = match slot {
            LevelSlot::Index(index) => self.levels.get(index)?.clone(),
            LevelSlot::Finale => finale_level(&self.host.screens()),
        };
        let prepared = prepare_level(&descriptor, &self.host.primary_screen(), &self.config)?;
        let label = prepared.id.to_string();

        let mut pending = Vec::with_capacity(prepared.windows.len());
        for (index, window) in prepared.windows.into_iter().enumerate() {
            let opened = self.host.open(&window.request).and_then(|handle| {
                let frame = self.host.frame(handle);
                if frame.is_none() {
                    self.host.close(handle);
                }
                frame.map(|frame| (handle, frame))
            });
            let Some((handle, frame)) = opened else {
                self.viewports.close_all(&mut self.host);
                log::error!("level {label}: host refused viewport {index}");
                return Err(LoadError::ViewportUnavailable {
                    level: label,
                    window: index,
                });
            };
            let viewport = self.viewports.register(
                handle,
                frame,
                window.request.allow_resize,
                window.request.fullscreen,
            );
            pending.push((viewport, window.spawns));
        }

        let mut added = Vec::new();
        for (viewport, spawns) in pending {
            for spawn in spawns {
                added.push(self.registry.add(spawn.owned_by(viewport)));
            }
        }
        self.settle_spawned(added);
        self.viewports.reconcile(&mut self.registry);
        self.registry.sort_by_z_order();

        self.session = Some(Session {
            level: slot,
            finale_done: false,
        });
        self.had_focus = self.viewports.focused().is_some();
        self.follow_player();

        let bounds = self.host.aggregate_bounds();
        let mut ctx = self.buffers.ctx(
            self.tick,
            &self.config,
            &self.input,
            &self.viewports,
            bounds,
        );
        ctx.emit(GameEventKind::LevelStart, None);
        if slot == LevelSlot::Finale {
            let config = ctx.config;
            ctx.timers.schedule_repeating(
                ctx.tick,
                config.ticks_for(config.finale_ripple_interval_ms),
                TimerAction::FinaleRipple,
            );
            ctx.timers.schedule_repeating(
                ctx.tick,
                config.ticks_for(config.finale_fanfare_interval_ms),
                TimerAction::FinaleFanfare,
            );
            ctx.timers.schedule_once(
                ctx.tick,
                config.ticks_for(config.finale_duration_ms),
                TimerAction::FinaleEnd,
            );
            ctx.emit(GameEventKind::Fireworks, None);
        }

        log::info!(
            "level {label} started with {} viewports and {} entities: {}",
            self.viewports.len(),
            self.registry.len(),
            prepared.level_text
        );
        Ok(())
    }

    /// Close the current level's viewports and forget its entities and
    /// timers.
    fn shutdown(&mut self) {
        self.viewports.teardown(&mut self.host, &mut self.registry);
        self.registry.clear();
        self.buffers.clear_level();
        self.session = None;
        self.player_owner = None;
    }
}

fn update_entity(
    entity: &mut Entity,
    registry: &EntityRegistry,
    ctx: &mut TickContext<'_>,
) -> UpdateEffects {
    let id = entity.id;
    let owner = entity.owner;
    let viewports = ctx.viewports;
    let viewport = owner.and_then(|owner| viewports.get(owner));
    let mut effects = UpdateEffects::default();
    match &mut entity.kind {
        EntityKind::Player(state) => {
            effects.contacts = player::update(id, &mut entity.position, owner, state, registry, ctx);
        }
        EntityKind::MovingPlatform(state) => {
            effects.carried = platform::update(id, &mut entity.position, state, registry);
        }
        EntityKind::Goal(state) => goal::update(state, viewport, ctx),
        EntityKind::Door(state) => door::update_door(state, viewport, ctx),
        EntityKind::SwapDoor(state) => door::update_swap_door(state, viewport, ctx),
        EntityKind::Ripple(state) => ripple::update(id, state, ctx),
        EntityKind::SolidBlock { .. } | EntityKind::RespawnPoint => {}
    }
    effects
}

fn dispatch_contact(
    target: EntityId,
    actor_owner: Option<ViewportId>,
    registry: &mut EntityRegistry,
    ctx: &mut TickContext<'_>,
) {
    let Some(entity) = registry.get_mut(target) else {
        return;
    };
    let position = entity.position;
    let goal_owner = entity.owner;
    if let EntityKind::Goal(goal) = &mut entity.kind {
        goal::on_contact(position, goal, goal_owner, actor_owner, ctx);
    }
}

/// Respawn timer fired: move the player to the first respawn point (or its
/// own spawn position) and mark the spot with a ripple.
fn respawn(id: EntityId, registry: &mut EntityRegistry, ctx: &mut TickContext<'_>) {
    let respawn_point = registry
        .first_of_kind(EntityType::RespawnPoint)
        .map(|entity| entity.position);
    let Some(entity) = registry.get_mut(id) else {
        log::debug!("respawn timer for {id}, which no longer exists");
        return;
    };
    let EntityKind::Player(state) = &mut entity.kind else {
        return;
    };
    let target = respawn_point.unwrap_or_else(|| {
        log::warn!("level has no respawn point; using spawn position of {id}");
        state.spawn_point
    });
    if player::complete_respawn(&mut entity.position, state, target) {
        ctx.spawn_ripple(target, RippleStyle::Plain);
        log::debug!("player {id} respawned at {target}");
    }
}
