use std::path::PathBuf;

use glam::DVec2;
use hop_core::input::Key;
use hop_game::entity::{EntityId, EntityType};
use hop_game::host::ViewportHost;
use hop_game::level::{prepare_level, LevelDescriptor};
use hop_game::replay::{ReplayCursor, ReplayFrame, ReplaySequence};
use hop_game::{
    Engine, EngineConfig, GameEventKind, LevelSet, LevelSlot, SimulatedHost, StopReason,
    TickOutcome,
};

fn level(json: &str) -> LevelDescriptor {
    serde_json::from_str(json).expect("level json should parse")
}

fn engine_with(levels: &[&str]) -> Engine<SimulatedHost> {
    let mut engine = Engine::new(
        SimulatedHost::single_screen(1000.0, 800.0),
        LevelSet::new(levels.iter().map(|json| level(json)).collect()),
        EngineConfig::default(),
    );
    engine.start(0).expect("level should start");
    engine.drain_events();
    engine
}

fn position(engine: &Engine<SimulatedHost>, id: EntityId) -> DVec2 {
    engine.registry().get(id).expect("entity alive").position
}

fn first(engine: &Engine<SimulatedHost>, kind: EntityType) -> EntityId {
    engine.registry().first_of_kind(kind).expect("entity of kind").id
}

fn tick(engine: &mut Engine<SimulatedHost>) -> TickOutcome {
    engine.update().expect("tick should succeed")
}

fn assert_shared_ownership_holds(engine: &Engine<SimulatedHost>) {
    for entity in engine.registry().iter().filter(|entity| entity.is_shared()) {
        let contained = engine.viewports().containing(entity.position).is_some();
        assert_eq!(entity.owner.is_some(), contained, "entity {}", entity.id);
        let owners = engine
            .viewports()
            .iter()
            .filter(|viewport| viewport.owns(entity.id))
            .count();
        assert!(owners <= 1, "entity {} has {owners} owners", entity.id);
        if let Some(owner) = entity.owner {
            let viewport = engine.viewports().get(owner).expect("owner exists");
            assert!(viewport.contains(entity.position));
        }
    }
}

const TETHER: &str = r#"{
  "id": 1,
  "windows": [ { "x": 0, "y": 0, "width": 300, "height": 200, "entities": [
    { "type": "RespawnPointEntity", "x": 50, "y": 50, "shared": true },
    { "type": "SolidBlockEntity", "x": 0, "y": 150, "width": 300, "height": 20 }
  ] } ]
}"#;

#[test]
fn shared_entity_moves_with_dragged_viewport_in_the_same_tick() {
    let mut engine = engine_with(&[TETHER]);
    let marker = first(&engine, EntityType::RespawnPoint);
    let block = first(&engine, EntityType::SolidBlock);
    let before = position(&engine, marker);
    let block_before = position(&engine, block);

    let owner = engine.registry().get(marker).and_then(|e| e.owner).expect("owned");
    let handle = engine.viewports().get(owner).expect("viewport").handle;
    engine.host_mut().drag(handle, DVec2::new(15.0, -7.0));
    tick(&mut engine);

    assert_eq!(position(&engine, marker), before + DVec2::new(15.0, -7.0));
    assert_eq!(position(&engine, block), block_before);
    assert_shared_ownership_holds(&engine);
}

const PLATFORM_RIDE: &str = r#"{
  "id": 2,
  "windows": [ { "x": 0, "y": 0, "width": 600, "height": 400, "entities": [
    { "type": "PlayerEntity", "x": 100, "y": 184 },
    { "type": "MovingPlatformEntity", "x": 80, "y": 200, "width": 60, "height": 10,
      "angle": 0, "distance": 100, "time": 100 }
  ] } ]
}"#;

#[test]
fn platform_carries_standing_player_in_lockstep() {
    let mut engine = engine_with(&[PLATFORM_RIDE]);
    let player = first(&engine, EntityType::Player);
    let platform = first(&engine, EntityType::MovingPlatform);
    let player_start = position(&engine, player);
    let platform_start = position(&engine, platform);

    for _ in 0..50 {
        tick(&mut engine);
        let ride = position(&engine, player) - player_start;
        let travel = position(&engine, platform) - platform_start;
        assert!((ride - travel).length() < 1e-9, "ride {ride} vs travel {travel}");
    }
    assert!((position(&engine, platform).x - platform_start.x - 50.0).abs() < 1e-9);
    assert_eq!(position(&engine, player).y, player_start.y);
}

#[test]
fn platform_turns_around_at_its_far_end() {
    let mut engine = engine_with(&[PLATFORM_RIDE]);
    let platform = first(&engine, EntityType::MovingPlatform);
    let start = position(&engine, platform);
    let mut furthest: f64 = 0.0;
    for _ in 0..150 {
        tick(&mut engine);
        furthest = furthest.max(position(&engine, platform).x - start.x);
    }
    assert!((furthest - 100.0).abs() < 1e-9);
    // 100 ticks out, 50 back.
    assert!((position(&engine, platform).x - start.x - 50.0).abs() < 1e-9);
}

const FALL: &str = r#"{
  "id": 3,
  "windows": [ { "x": 0, "y": 0, "width": 400, "height": 300, "entities": [
    { "type": "PlayerEntity", "x": 300, "y": 100 },
    { "type": "SolidBlockEntity", "x": 0, "y": 200, "width": 100, "height": 20 },
    { "type": "RespawnPointEntity", "x": 40, "y": 150 }
  ] } ]
}"#;

#[test]
fn falling_out_of_bounds_respawns_once_at_respawn_point() {
    let mut engine = engine_with(&[FALL]);
    let player = first(&engine, EntityType::Player);
    let respawn_point = position(&engine, first(&engine, EntityType::RespawnPoint));

    let mut events = Vec::new();
    for _ in 0..300 {
        tick(&mut engine);
        events.extend(engine.drain_events());
    }
    let falls: Vec<_> = events
        .iter()
        .filter(|event| event.kind == GameEventKind::Fall)
        .collect();
    assert_eq!(falls.len(), 1);
    assert!(falls[0].pan.is_some());

    // Respawned onto the block under the respawn point and settled there.
    let at = position(&engine, player);
    assert_eq!(at.x, respawn_point.x);
    assert_eq!(at.y + 16.0, respawn_point.y + 50.0);
    let state = engine
        .registry()
        .get(player)
        .and_then(|entity| entity.as_player())
        .expect("player state");
    assert!(!state.is_respawning());
}

const GOAL_RUN: &str = r#"{
  "id": 4,
  "windows": [ { "x": 0, "y": 0, "width": 400, "height": 300, "entities": [
    { "type": "PlayerEntity", "x": 100, "y": 184 },
    { "type": "SolidBlockEntity", "x": 0, "y": 200, "width": 400, "height": 20 },
    { "type": "GoalEntity", "x": 200, "y": 168, "width": 32, "height": 32 }
  ] } ]
}"#;

#[test]
fn reaching_goal_then_space_loads_next_level() {
    let mut engine = engine_with(&[GOAL_RUN, TETHER]);
    engine.input_mut().key_down(Key::Right);

    let mut reached = false;
    for _ in 0..120 {
        tick(&mut engine);
        let events = engine.drain_events();
        if events.iter().any(|event| event.kind == GameEventKind::GoalReached) {
            reached = true;
            break;
        }
    }
    assert!(reached, "player never reached the goal");

    engine.input_mut().key_up(Key::Right);
    tick(&mut engine);
    engine.input_mut().key_down(Key::Space);
    assert_eq!(tick(&mut engine), TickOutcome::LevelStarted(LevelSlot::Index(1)));
    let kinds: Vec<_> = engine.drain_events().iter().map(|event| event.kind).collect();
    assert!(kinds.contains(&GameEventKind::LevelComplete));
    assert_eq!(kinds.last(), Some(&GameEventKind::LevelStart));
    assert_eq!(engine.current_level(), Some(LevelSlot::Index(1)));
}

const CROSSING: &str = r#"{
  "id": 5,
  "windows": [
    { "x": 0, "y": 0, "width": 200, "height": 200, "entities": [
      { "type": "PlayerEntity", "x": 100, "y": 134, "shared": true },
      { "type": "SolidBlockEntity", "x": 0, "y": 150, "width": 200, "height": 20 }
    ] },
    { "x": 200, "y": 0, "width": 200, "height": 200, "entities": [
      { "type": "SolidBlockEntity", "x": 200, "y": 150, "width": 200, "height": 20 }
    ] }
  ]
}"#;

#[test]
fn shared_player_changes_owner_and_focus_when_crossing() {
    let mut engine = engine_with(&[CROSSING]);
    let player = first(&engine, EntityType::Player);
    let start_owner = engine.registry().get(player).and_then(|e| e.owner);
    assert!(start_owner.is_some());
    tick(&mut engine);
    assert_eq!(engine.viewports().focused(), start_owner);

    engine.input_mut().key_down(Key::Right);
    let mut crossed = None;
    for _ in 0..120 {
        tick(&mut engine);
        assert_shared_ownership_holds(&engine);
        let owner = engine.registry().get(player).and_then(|e| e.owner);
        if owner != start_owner {
            crossed = owner;
            break;
        }
    }
    let new_owner = crossed.expect("player should cross into the second viewport");
    assert!(engine
        .viewports()
        .get(new_owner)
        .is_some_and(|viewport| viewport.contains(position(&engine, player))));

    tick(&mut engine);
    assert_eq!(engine.viewports().focused(), Some(new_owner));
    let events = engine.drain_events();
    assert!(events.iter().all(|event| event.kind != GameEventKind::Fall));
}

#[test]
fn externally_closed_viewport_stops_the_engine() {
    let mut engine = engine_with(&[CROSSING]);
    let handle = engine.viewports().iter().next().expect("viewport").handle;
    engine.host_mut().close_externally(handle);
    assert_eq!(tick(&mut engine), TickOutcome::Stopped(StopReason::ViewportClosed));
    assert!(engine.host().open_windows().is_empty());
    assert!(engine.update().is_err());
}

fn replay_run(replay: &ReplaySequence) -> Vec<hop_game::entity::Entity> {
    let mut engine = engine_with(&[GOAL_RUN]);
    let mut cursor = ReplayCursor::new(replay);
    let stopped = engine
        .run(None, |engine| {
            if cursor.is_finished() {
                return false;
            }
            cursor.apply_next(engine.input_mut());
            true
        })
        .expect("run");
    assert_eq!(stopped, None);
    engine.registry().iter().cloned().collect()
}

#[test]
fn same_replay_gives_identical_state() {
    let replay = ReplaySequence {
        frames: vec![
            ReplayFrame {
                held: vec![Key::Right],
                repeat: 20,
            },
            ReplayFrame {
                held: vec![Key::Right, Key::Space],
                repeat: 5,
            },
            ReplayFrame {
                held: vec![Key::Left],
                repeat: 30,
            },
            ReplayFrame {
                held: vec![Key::R],
                repeat: 2,
            },
        ],
    };
    let first_run = replay_run(&replay);
    let second_run = replay_run(&replay);
    assert!(!first_run.is_empty());
    assert_eq!(first_run, second_run);
}

fn shipped_levels_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/levels")
}

#[test]
fn shipped_levels_load_and_start() {
    let levels = LevelSet::load(&shipped_levels_dir()).expect("shipped levels load");
    assert!(!levels.is_empty());

    let host = SimulatedHost::dual_screen(1920.0, 1080.0);
    let primary = host.primary_screen();
    for index in 0..levels.len() {
        let level = levels.get(index).expect("level");
        prepare_level(level, &primary, &EngineConfig::default()).expect("level prepares");
    }

    let count = levels.len();
    let mut engine = Engine::new(host, levels, EngineConfig::default());
    for index in 0..count {
        engine.start(index).expect("level starts");
        assert!(engine.player_id().is_some(), "level {index} has no player");
        for _ in 0..30 {
            tick(&mut engine);
            assert_shared_ownership_holds(&engine);
        }
        engine.stop().expect("stop");
    }
}
