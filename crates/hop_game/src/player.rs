use glam::DVec2;
use hop_core::geometry::Aabb;
use hop_core::input::Key;
use hop_core::time::TimerHandle;

use crate::collision::{self, CollisionMoveResult};
use crate::config::PhysicsConfig;
use crate::context::{TickContext, TimerAction};
use crate::entity::EntityId;
use crate::events::GameEventKind;
use crate::registry::EntityRegistry;
use crate::ripple::RippleStyle;
use crate::viewport::ViewportId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerMode {
    Active,
    /// Waiting for the respawn timer; no physics, no input.
    Respawning { timer: TimerHandle },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactState {
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub up: bool,
}

impl ContactState {
    fn from_result(result: &CollisionMoveResult) -> Self {
        Self {
            left: result.blocked_left,
            right: result.blocked_right,
            down: result.blocked_down,
            up: result.blocked_up,
        }
    }

    fn horizontal(&self) -> bool {
        self.left || self.right
    }

    fn vertical(&self) -> bool {
        self.up || self.down
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub size: DVec2,
    pub velocity: DVec2,
    pub contacts: ContactState,
    pub mode: PlayerMode,
    /// Fallback respawn target when the level has no respawn point.
    pub spawn_point: DVec2,
}

impl PlayerState {
    pub fn new(spawn_point: DVec2, physics: &PhysicsConfig) -> Self {
        Self {
            size: DVec2::new(physics.player_width, physics.player_height),
            velocity: DVec2::ZERO,
            contacts: ContactState::default(),
            mode: PlayerMode::Active,
            spawn_point,
        }
    }

    pub fn is_respawning(&self) -> bool {
        matches!(self.mode, PlayerMode::Respawning { .. })
    }

    pub fn aabb(&self, position: DVec2) -> Aabb {
        Aabb::from_position_size(position, self.size)
    }
}

/// One Active tick: ground test, input, integrate, bounds check, then X and Y
/// resolution. Returns the triggers touched while moving.
pub fn update(
    id: EntityId,
    position: &mut DVec2,
    owner: Option<ViewportId>,
    player: &mut PlayerState,
    registry: &EntityRegistry,
    ctx: &mut TickContext<'_>,
) -> Vec<EntityId> {
    if player.is_respawning() {
        return Vec::new();
    }

    let physics = ctx.config.physics;
    let obstacles = collision::gather_obstacles(registry, id, owner);
    let aabb = player.aabb(*position);
    let grounded = collision::is_grounded(&aabb, &obstacles);

    if ctx.input.was_pressed(Key::R) {
        ctx.spawn_ripple(*position, RippleStyle::Plain);
        ctx.emit(GameEventKind::Roar, Some(position.x));
    }

    let right = f64::from(u8::from(ctx.input.is_held(Key::Right)));
    let left = f64::from(u8::from(ctx.input.is_held(Key::Left)));
    let jump = ctx.input.is_held(Key::Space);

    let mut ddx = physics.move_accel * (right - left);
    if player.velocity.x != 0.0 {
        // Friction can stop the player but never reverse them.
        ddx -= player.velocity.x.signum() * physics.friction.min(player.velocity.x.abs());
    }
    let mut ddy = physics.gravity;
    if grounded && ddy > 0.0 && player.velocity.y >= 0.0 {
        ddy = 0.0;
    }

    player.velocity.x =
        (player.velocity.x + ddx).clamp(-physics.max_speed_x, physics.max_speed_x);
    player.velocity.y =
        (player.velocity.y + ddy).clamp(-physics.max_speed_y, physics.max_speed_y);

    if jump && grounded {
        player.velocity.y = physics.jump_velocity;
        ctx.emit(GameEventKind::Jump, Some(position.x));
    }

    if let Some(bounds) = ctx.bounds {
        let outside = aabb.y1 > bounds.y2
            || aabb.y2 < bounds.y1
            || aabb.x1 < bounds.x1
            || aabb.x2 > bounds.x2;
        // The player freezes here until the respawn timer fires, so this
        // tick's move is dropped.
        if outside {
            begin_respawn(id, position.x, player, ctx);
            return Vec::new();
        }
    }

    let result =
        collision::move_and_collide(aabb, player.velocity, &obstacles, physics.ledge_tolerance);
    let contacts = ContactState::from_result(&result);
    if contacts.horizontal() && !player.contacts.horizontal() {
        ctx.emit(GameEventKind::HorizontalCollision, Some(result.aabb.x1));
    }
    if contacts.vertical() && !player.contacts.vertical() {
        ctx.emit(GameEventKind::VerticalCollision, Some(result.aabb.x1));
    }

    *position = result.aabb.top_left();
    player.velocity = result.velocity;
    player.contacts = contacts;
    log::trace!("player {id} at {position} v={}", player.velocity);
    result.contacts
}

/// Enter Respawning. A second call while already respawning does nothing.
pub fn begin_respawn(id: EntityId, x: f64, player: &mut PlayerState, ctx: &mut TickContext<'_>) {
    if player.is_respawning() {
        return;
    }
    let delay = ctx.ticks_for(ctx.config.respawn_delay_ms);
    let timer = ctx
        .timers
        .schedule_once(ctx.tick, delay, TimerAction::Respawn(id));
    player.mode = PlayerMode::Respawning { timer };
    ctx.emit(GameEventKind::Fall, Some(x));
    log::debug!("player {id} fell out of bounds; respawning in {delay} ticks");
}

/// Put a respawning player back at `target` with no velocity. Returns false
/// when the player was not waiting to respawn.
pub fn complete_respawn(position: &mut DVec2, player: &mut PlayerState, target: DVec2) -> bool {
    if !player.is_respawning() {
        return false;
    }
    *position = target;
    player.velocity = DVec2::ZERO;
    player.contacts = ContactState::default();
    player.mode = PlayerMode::Active;
    true
}

/// Ground test against whatever `id` can currently collide with.
pub fn is_grounded(registry: &EntityRegistry, id: EntityId) -> bool {
    let Some(entity) = registry.get(id) else {
        return false;
    };
    let Some(player) = entity.as_player() else {
        return false;
    };
    let obstacles = collision::gather_obstacles(registry, id, entity.owner);
    collision::is_grounded(&player.aabb(entity.position), &obstacles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::Harness;
    use crate::entity::{EntityKind, Spawn};

    fn floor(registry: &mut EntityRegistry, x: f64, y: f64, w: f64, h: f64) -> EntityId {
        registry.add(Spawn::new(
            DVec2::new(x, y),
            EntityKind::SolidBlock {
                size: DVec2::new(w, h),
            },
        ))
    }

    fn spawn_player(registry: &mut EntityRegistry, x: f64, y: f64) -> EntityId {
        let state = PlayerState::new(DVec2::new(x, y), &PhysicsConfig::default());
        registry.add(Spawn::new(DVec2::new(x, y), EntityKind::Player(state)))
    }

    fn step(registry: &mut EntityRegistry, id: EntityId, harness: &mut Harness) -> Vec<EntityId> {
        let mut entity = registry.get(id).cloned().expect("player exists");
        let EntityKind::Player(state) = &mut entity.kind else {
            panic!("not a player");
        };
        let contacts = update(
            id,
            &mut entity.position,
            entity.owner,
            state,
            registry,
            &mut harness.ctx(),
        );
        registry.replace(entity);
        contacts
    }

    fn state(registry: &EntityRegistry, id: EntityId) -> PlayerState {
        registry
            .get(id)
            .and_then(|entity| entity.as_player())
            .cloned()
            .expect("player exists")
    }

    fn set_velocity(registry: &mut EntityRegistry, id: EntityId, velocity: DVec2) {
        if let Some(EntityKind::Player(state)) = registry.get_mut(id).map(|e| &mut e.kind) {
            state.velocity = velocity;
        }
    }

    #[test]
    fn jump_from_rest_sets_impulse_once() {
        let mut registry = EntityRegistry::new();
        floor(&mut registry, 0.0, 16.0, 200.0, 20.0);
        let id = spawn_player(&mut registry, 50.0, 0.0);
        let mut harness = Harness::new();
        assert!(is_grounded(&registry, id));

        harness.input.key_down(Key::Space);
        step(&mut registry, id, &mut harness);
        assert_eq!(state(&registry, id).velocity.y, -4.0);
        assert!(!is_grounded(&registry, id));
        harness.advance();

        step(&mut registry, id, &mut harness);
        let jumps = harness
            .event_kinds()
            .into_iter()
            .filter(|kind| *kind == GameEventKind::Jump)
            .count();
        assert_eq!(jumps, 1);
    }

    #[test]
    fn resting_player_stays_put() {
        let mut registry = EntityRegistry::new();
        floor(&mut registry, 0.0, 16.0, 200.0, 20.0);
        let id = spawn_player(&mut registry, 50.0, 0.0);
        let mut harness = Harness::new();
        for _ in 0..10 {
            step(&mut registry, id, &mut harness);
            harness.advance();
        }
        assert_eq!(registry.get(id).map(|e| e.position), Some(DVec2::new(50.0, 0.0)));
        assert!(harness.events.is_empty());
    }

    #[test]
    fn walking_into_wall_clamps_and_reports_once() {
        let mut registry = EntityRegistry::new();
        floor(&mut registry, 0.0, 16.0, 300.0, 20.0);
        floor(&mut registry, 100.0, -100.0, 20.0, 116.0);
        // Right edge at 99.
        let id = spawn_player(&mut registry, 83.0, 0.0);
        set_velocity(&mut registry, id, DVec2::new(3.0, 0.0));
        let mut harness = Harness::new();
        harness.input.key_down(Key::Right);

        step(&mut registry, id, &mut harness);
        let entity = registry.get(id).cloned().expect("player");
        assert_eq!(entity.position.x + 16.0, 100.0);
        assert_eq!(state(&registry, id).velocity.x, 0.0);
        harness.advance();

        for _ in 0..5 {
            step(&mut registry, id, &mut harness);
            harness.advance();
        }
        let hits = harness
            .event_kinds()
            .into_iter()
            .filter(|kind| *kind == GameEventKind::HorizontalCollision)
            .count();
        assert_eq!(hits, 1);
        assert_eq!(registry.get(id).map(|e| e.position.x), Some(84.0));
    }

    #[test]
    fn walking_onto_half_unit_step_never_sinks_into_it() {
        let mut registry = EntityRegistry::new();
        floor(&mut registry, 0.0, 16.0, 200.0, 20.0);
        floor(&mut registry, 80.0, 15.5, 60.0, 20.5);
        let step_box = Aabb::new(80.0, 15.5, 140.0, 36.0);
        let id = spawn_player(&mut registry, 50.0, 0.0);
        let mut harness = Harness::new();
        harness.input.key_down(Key::Right);

        for _ in 0..30 {
            step(&mut registry, id, &mut harness);
            harness.advance();
            let entity = registry.get(id).cloned().expect("player");
            let aabb = state(&registry, id).aabb(entity.position);
            assert!(!aabb.overlaps(&step_box), "sank into step at {}", entity.position);
        }

        let entity = registry.get(id).cloned().expect("player");
        assert!(entity.position.x + 16.0 > 80.0);
        assert_eq!(entity.position.y + 16.0, 15.5);
        assert!(is_grounded(&registry, id));
        assert!(!state(&registry, id).contacts.horizontal());
        assert!(!harness
            .event_kinds()
            .contains(&GameEventKind::HorizontalCollision));
    }

    #[test]
    fn friction_stops_without_reversing() {
        let mut registry = EntityRegistry::new();
        floor(&mut registry, -500.0, 16.0, 1000.0, 20.0);
        let id = spawn_player(&mut registry, 0.0, 0.0);
        set_velocity(&mut registry, id, DVec2::new(0.5, 0.0));
        let mut harness = Harness::new();
        step(&mut registry, id, &mut harness);
        assert!((state(&registry, id).velocity.x - 0.2).abs() < 1e-12);
        step(&mut registry, id, &mut harness);
        assert_eq!(state(&registry, id).velocity.x, 0.0);
        step(&mut registry, id, &mut harness);
        assert_eq!(state(&registry, id).velocity.x, 0.0);
    }

    #[test]
    fn speeds_are_clamped() {
        let mut registry = EntityRegistry::new();
        let id = spawn_player(&mut registry, 0.0, 0.0);
        set_velocity(&mut registry, id, DVec2::new(3.95, 14.9));
        let mut harness = Harness::new();
        harness.input.key_down(Key::Right);
        step(&mut registry, id, &mut harness);
        assert_eq!(state(&registry, id).velocity, DVec2::new(4.0, 15.0));
    }

    #[test]
    fn leaving_bounds_starts_respawn_once() {
        let mut registry = EntityRegistry::new();
        let id = spawn_player(&mut registry, 0.0, 2000.0);
        let mut harness = Harness::new();
        step(&mut registry, id, &mut harness);
        step(&mut registry, id, &mut harness);
        assert!(state(&registry, id).is_respawning());
        assert_eq!(harness.event_kinds(), vec![GameEventKind::Fall]);
        assert_eq!(harness.timers.len(), 1);
        // No physics while waiting.
        assert_eq!(registry.get(id).map(|e| e.position.y), Some(2000.0));
    }

    #[test]
    fn fall_tick_does_not_move_the_player() {
        let mut registry = EntityRegistry::new();
        let id = spawn_player(&mut registry, 0.0, 1500.0);
        set_velocity(&mut registry, id, DVec2::new(3.0, 5.0));
        let mut harness = Harness::new();
        harness.input.key_down(Key::Right);
        let contacts = step(&mut registry, id, &mut harness);
        assert!(contacts.is_empty());
        assert_eq!(registry.get(id).map(|e| e.position), Some(DVec2::new(0.0, 1500.0)));
        assert!(state(&registry, id).is_respawning());
        assert_eq!(harness.event_kinds(), vec![GameEventKind::Fall]);
    }

    #[test]
    fn complete_respawn_resets_motion() {
        let mut harness = Harness::new();
        let mut player = PlayerState::new(DVec2::ZERO, &PhysicsConfig::default());
        player.velocity = DVec2::new(2.0, 9.0);
        let mut position = DVec2::new(0.0, 5000.0);
        begin_respawn(EntityId(1), 0.0, &mut player, &mut harness.ctx());
        assert!(complete_respawn(&mut position, &mut player, DVec2::new(10.0, 20.0)));
        assert_eq!(position, DVec2::new(10.0, 20.0));
        assert_eq!(player.velocity, DVec2::ZERO);
        assert_eq!(player.mode, PlayerMode::Active);
        assert!(!complete_respawn(&mut position, &mut player, DVec2::ZERO));
    }

    #[test]
    fn other_viewports_blocks_are_ignored() {
        let mut registry = EntityRegistry::new();
        let foreign = floor(&mut registry, 0.0, 16.0, 200.0, 20.0);
        registry.get_mut(foreign).expect("floor").owner = Some(ViewportId(1));
        let id = spawn_player(&mut registry, 50.0, 0.0);
        assert!(!is_grounded(&registry, id));
        let mut harness = Harness::new();
        step(&mut registry, id, &mut harness);
        assert!(registry.get(id).map(|e| e.position.y).unwrap_or_default() > 0.0);
    }

    #[test]
    fn roar_spawns_ripple() {
        let mut registry = EntityRegistry::new();
        let id = spawn_player(&mut registry, 0.0, 0.0);
        let mut harness = Harness::new();
        harness.input.key_down(Key::R);
        step(&mut registry, id, &mut harness);
        assert_eq!(harness.event_kinds(), vec![GameEventKind::Roar]);
        assert!(!harness.commands.is_empty());
    }

    #[test]
    fn same_inputs_give_same_run() {
        let run = || {
            let mut registry = EntityRegistry::new();
            floor(&mut registry, -200.0, 16.0, 400.0, 20.0);
            floor(&mut registry, 60.0, -40.0, 20.0, 56.0);
            let id = spawn_player(&mut registry, 0.0, 0.0);
            let mut harness = Harness::new();
            for tick in 0..240 {
                harness.input.set_held(match tick {
                    0..=59 => vec![Key::Right],
                    60 => vec![Key::Right, Key::Space],
                    61..=180 => vec![Key::Right],
                    _ => vec![Key::Left],
                });
                step(&mut registry, id, &mut harness);
                harness.advance();
            }
            (registry.get(id).cloned(), harness.events)
        };
        assert_eq!(run(), run());
    }
}
