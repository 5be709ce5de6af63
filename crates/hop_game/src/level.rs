//! Level descriptors: JSON layout, validation, placement on a screen and
//! conversion into entity spawns.
//!
//! A level is turned into a [`PreparedLevel`] before the host is asked for a
//! single viewport, so unknown entity types and bad parameters abort the load
//! without leaving anything open.

use glam::DVec2;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::door::{DoorState, SwapDoorState};
use crate::entity::{EntityKind, EntityType, Spawn};
use crate::error::LoadError;
use crate::goal::GoalState;
use crate::host::{OpenRequest, ScreenRect};
use crate::platform::{PlatformPath, PlatformState};
use crate::player::PlayerState;
use crate::ripple::{RippleState, RippleStyle};

/// Id used for the generated end-of-game level.
pub const FINALE_LEVEL_ID: i64 = -1;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LevelDescriptor {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub level_text: String,
    pub windows: Vec<WindowSpec>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WindowSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub allow_resize: bool,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

impl WindowSpec {
    fn has_player(&self) -> bool {
        self.entities
            .iter()
            .any(|entity| entity.type_tag == EntityType::Player.tag())
    }
}

/// One entity entry. Coordinates are global, like the window's.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EntitySpec {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    /// Platform traversal time, in ticks.
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub shared: bool,
}

/// `levels.json` in a level directory: file names in play order.
#[derive(Debug, Deserialize, Clone)]
pub struct LevelManifest {
    pub levels: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LevelSet {
    levels: Vec<LevelDescriptor>,
}

impl LevelSet {
    pub fn new(levels: Vec<LevelDescriptor>) -> Self {
        Self { levels }
    }

    /// Load every level named by `<dir>/levels.json`, in order.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        let manifest_path = dir.join("levels.json");
        let manifest: LevelManifest = read_json(&manifest_path)?;
        let mut levels = Vec::with_capacity(manifest.levels.len());
        for name in &manifest.levels {
            levels.push(load_level_from_path(&dir.join(name))?);
        }
        log::info!("loaded {} levels from {}", levels.len(), dir.display());
        Ok(Self { levels })
    }

    pub fn get(&self, index: usize) -> Result<&LevelDescriptor, LoadError> {
        self.levels.get(index).ok_or(LoadError::MissingLevel {
            index,
            available: self.levels.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

pub fn load_level_from_path(path: &Path) -> Result<LevelDescriptor, LoadError> {
    let level: LevelDescriptor = read_json(path)?;
    validate_level(&level)?;
    Ok(level)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
        path: PathBuf::from(path),
        source,
    })
}

/// Structural checks that don't depend on engine config. Entity parameters
/// are checked when the level is prepared.
pub fn validate_level(level: &LevelDescriptor) -> Result<(), LoadError> {
    let label = level.id.to_string();
    if level.windows.is_empty() {
        return Err(LoadError::InvalidLevel {
            level: label,
            reason: "windows array is empty".to_string(),
        });
    }
    for (index, window) in level.windows.iter().enumerate() {
        let finite = [window.x, window.y, window.width, window.height]
            .iter()
            .all(|value| value.is_finite());
        if !finite || window.width <= 0.0 || window.height <= 0.0 {
            return Err(LoadError::InvalidLevel {
                level: label,
                reason: format!("window {index} needs a finite position and a positive size"),
            });
        }
        if window.entities.is_empty() && !window.fullscreen {
            log::warn!("level {label} window {index} has no entities");
        }
    }
    Ok(())
}

/// The end-of-game level: one empty fullscreen window per screen.
pub fn finale_level(screens: &[ScreenRect]) -> LevelDescriptor {
    LevelDescriptor {
        id: FINALE_LEVEL_ID,
        level_text: "You won!".to_string(),
        windows: screens
            .iter()
            .map(|screen| WindowSpec {
                x: screen.bounds.x1,
                y: screen.bounds.y1,
                width: screen.bounds.width(),
                height: screen.bounds.height(),
                allow_resize: false,
                fullscreen: true,
                entities: Vec::new(),
            })
            .collect(),
    }
}

/// Copy of `level` laid out on `screen`: the bounding box of the windowed
/// (non-fullscreen) windows is centred on the screen, then each window is
/// pushed back inside the screen if it sticks out. Entities move with their
/// window. Windows holding a player come last so the player's viewport opens
/// last and ends up focused.
pub fn place_on_screen(level: &LevelDescriptor, screen: &ScreenRect) -> LevelDescriptor {
    let mut placed = level.clone();
    let area = screen.bounds;

    let windowed = || placed.windows.iter().filter(|window| !window.fullscreen);
    let left = windowed().map(|w| w.x).fold(f64::INFINITY, f64::min);
    let top = windowed().map(|w| w.y).fold(f64::INFINITY, f64::min);
    let right = windowed().map(|w| w.x + w.width).fold(f64::NEG_INFINITY, f64::max);
    let bottom = windowed().map(|w| w.y + w.height).fold(f64::NEG_INFINITY, f64::max);

    if left.is_finite() {
        let offset = DVec2::new(
            (area.x1 + (area.width() - (right - left)) / 2.0 - left).round(),
            (area.y1 + (area.height() - (bottom - top)) / 2.0 - top).round(),
        );
        for window in placed.windows.iter_mut().filter(|w| !w.fullscreen) {
            let mut local = offset;
            if window.x + local.x < area.x1 {
                local.x += area.x1 - (window.x + local.x);
            }
            if window.x + window.width + local.x > area.x2 {
                local.x += area.x2 - (window.x + window.width + local.x);
            }
            if window.y + local.y < area.y1 {
                local.y += area.y1 - (window.y + local.y);
            }
            if window.y + window.height + local.y > area.y2 {
                local.y += area.y2 - (window.y + window.height + local.y);
            }
            window.x += local.x;
            window.y += local.y;
            for entity in &mut window.entities {
                entity.x += local.x;
                entity.y += local.y;
            }
        }
    }

    placed.windows.sort_by_key(WindowSpec::has_player);
    placed
}

#[derive(Debug, Clone)]
pub struct PreparedWindow {
    pub request: OpenRequest,
    pub spawns: Vec<Spawn>,
}

/// A placed level whose entities all parsed. Nothing has been opened yet.
#[derive(Debug, Clone)]
pub struct PreparedLevel {
    pub id: i64,
    pub level_text: String,
    pub windows: Vec<PreparedWindow>,
}

pub fn prepare_level(
    level: &LevelDescriptor,
    screen: &ScreenRect,
    config: &EngineConfig,
) -> Result<PreparedLevel, LoadError> {
    validate_level(level)?;
    let placed = place_on_screen(level, screen);
    let label = placed.id.to_string();
    let mut windows = Vec::with_capacity(placed.windows.len());
    for (window_index, window) in placed.windows.iter().enumerate() {
        let spawns = window
            .entities
            .iter()
            .enumerate()
            .map(|(entity_index, spec)| {
                instantiate(spec, config).map_err(|problem| match problem {
                    SpecProblem::UnknownType => LoadError::UnknownEntityType {
                        level: label.clone(),
                        window: window_index,
                        type_tag: spec.type_tag.clone(),
                    },
                    SpecProblem::Invalid(reason) => LoadError::InvalidEntity {
                        level: label.clone(),
                        window: window_index,
                        entity: entity_index,
                        reason,
                    },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        windows.push(PreparedWindow {
            request: OpenRequest {
                position: DVec2::new(window.x, window.y),
                size: DVec2::new(window.width, window.height),
                allow_resize: window.allow_resize,
                fullscreen: window.fullscreen,
            },
            spawns,
        });
    }
    Ok(PreparedLevel {
        id: placed.id,
        level_text: placed.level_text,
        windows,
    })
}

enum SpecProblem {
    UnknownType,
    Invalid(String),
}

fn required(value: Option<f64>, name: &str) -> Result<f64, SpecProblem> {
    match value {
        Some(value) if value.is_finite() => Ok(value),
        Some(value) => Err(SpecProblem::Invalid(format!("{name} must be finite (got {value})"))),
        None => Err(SpecProblem::Invalid(format!("missing {name}"))),
    }
}

fn size_of(spec: &EntitySpec) -> Result<DVec2, SpecProblem> {
    let size = DVec2::new(
        required(spec.width, "width")?,
        required(spec.height, "height")?,
    );
    if size.x <= 0.0 || size.y <= 0.0 {
        return Err(SpecProblem::Invalid(format!(
            "size must be positive (got {} x {})",
            size.x, size.y
        )));
    }
    Ok(size)
}

fn instantiate(spec: &EntitySpec, config: &EngineConfig) -> Result<Spawn, SpecProblem> {
    let position = DVec2::new(spec.x, spec.y);
    if !position.is_finite() {
        return Err(SpecProblem::Invalid("position must be finite".to_string()));
    }
    let kind_type = EntityType::from_tag(&spec.type_tag).ok_or(SpecProblem::UnknownType)?;
    let kind = match kind_type {
        EntityType::Player => EntityKind::Player(PlayerState::new(position, &config.physics)),
        EntityType::SolidBlock => EntityKind::SolidBlock {
            size: size_of(spec)?,
        },
        EntityType::Goal => EntityKind::Goal(GoalState::new(size_of(spec)?)),
        EntityType::Door => EntityKind::Door(DoorState::new(size_of(spec)?)),
        EntityType::SwapDoor => EntityKind::SwapDoor(SwapDoorState::new(size_of(spec)?)),
        EntityType::RespawnPoint => EntityKind::RespawnPoint,
        EntityType::Ripple => {
            EntityKind::Ripple(RippleState::from_config(config, RippleStyle::Plain))
        }
        EntityType::MovingPlatform => {
            let size = size_of(spec)?;
            let angle = required(spec.angle, "angle")?;
            let distance = required(spec.distance, "distance")?;
            let time = required(spec.time, "time")?;
            if time <= 0.0 {
                return Err(SpecProblem::Invalid(format!("time must be > 0 (got {time})")));
            }
            EntityKind::MovingPlatform(PlatformState::new(
                size,
                PlatformPath::new(position, angle, distance, time),
            ))
        }
    };
    Ok(Spawn::new(position, kind).shared(spec.shared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ScreenId;
    use hop_core::geometry::Aabb;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "hop_level_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn write_level_file(path: &Path, body: &str) {
        fs::write(path, body).expect("failed to write temp level file");
    }

    fn screen() -> ScreenRect {
        ScreenRect {
            id: ScreenId(0),
            bounds: Aabb::new(0.0, 0.0, 1000.0, 800.0),
        }
    }

    fn parse(json: &str) -> LevelDescriptor {
        serde_json::from_str(json).expect("level json should parse")
    }

    const TWO_WINDOWS: &str = r#"
    {
      "id": 3,
      "level_text": "Hop across",
      "windows": [
        {
          "x": 0, "y": 0, "width": 200, "height": 100,
          "entities": [
            { "type": "PlayerEntity", "x": 20, "y": 20 },
            { "type": "SolidBlockEntity", "x": 0, "y": 80, "width": 200, "height": 20 }
          ]
        },
        {
          "x": 300, "y": 100, "width": 100, "height": 100,
          "entities": [
            { "type": "GoalEntity", "x": 320, "y": 150, "width": 32, "height": 32, "shared": true }
          ]
        }
      ]
    }
    "#;

    #[test]
    fn load_level_from_path_parses_valid_level() {
        let path = temp_file_path("valid");
        write_level_file(&path, TWO_WINDOWS);
        let level = load_level_from_path(&path).expect("valid level should load");
        assert_eq!(level.id, 3);
        assert_eq!(level.level_text, "Hop across");
        assert_eq!(level.windows.len(), 2);
        assert!(!level.windows[0].allow_resize);
        assert!(level.windows[1].entities[0].shared);
        assert_eq!(level.windows[0].entities[0].width, None);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_level_from_path_rejects_empty_windows() {
        let path = temp_file_path("empty");
        write_level_file(&path, r#"{ "id": 1, "windows": [] }"#);
        let err = load_level_from_path(&path).expect_err("empty windows should fail");
        assert!(err.to_string().contains("windows array is empty"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = temp_file_path("missing");
        let err = load_level_from_path(&path).expect_err("missing file");
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let path = temp_file_path("malformed");
        write_level_file(&path, "{ \"windows\": [ ");
        let err = load_level_from_path(&path).expect_err("bad json");
        assert!(matches!(err, LoadError::Parse { .. }));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn level_set_loads_manifest_in_order() {
        let dir = temp_file_path("set");
        fs::create_dir_all(&dir).expect("create level dir");
        write_level_file(&dir.join("levels.json"), r#"{ "levels": ["b.json", "a.json"] }"#);
        write_level_file(
            &dir.join("a.json"),
            r#"{ "id": 1, "windows": [ { "x": 0, "y": 0, "width": 10, "height": 10 } ] }"#,
        );
        write_level_file(
            &dir.join("b.json"),
            r#"{ "id": 2, "windows": [ { "x": 0, "y": 0, "width": 10, "height": 10 } ] }"#,
        );

        let set = LevelSet::load(&dir).expect("level set should load");
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).expect("first").id, 2);
        assert_eq!(set.get(1).expect("second").id, 1);
        assert!(matches!(
            set.get(2),
            Err(LoadError::MissingLevel {
                index: 2,
                available: 2
            })
        ));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_entity_type_fails_preparation() {
        let level = parse(
            r#"{ "id": 7, "windows": [ { "x": 0, "y": 0, "width": 50, "height": 50,
                 "entities": [ { "type": "DragonEntity", "x": 1, "y": 1 } ] } ] }"#,
        );
        let err = prepare_level(&level, &screen(), &EngineConfig::default())
            .expect_err("unknown type should fail");
        match err {
            LoadError::UnknownEntityType { level, type_tag, .. } => {
                assert_eq!(level, "7");
                assert_eq!(type_tag, "DragonEntity");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn platform_with_zero_time_is_rejected() {
        let level = parse(
            r#"{ "id": 1, "windows": [ { "x": 0, "y": 0, "width": 50, "height": 50,
                 "entities": [ { "type": "MovingPlatformEntity", "x": 1, "y": 1,
                   "width": 20, "height": 5, "angle": 0, "distance": 100, "time": 0 } ] } ] }"#,
        );
        let err = prepare_level(&level, &screen(), &EngineConfig::default())
            .expect_err("zero time should fail");
        assert!(matches!(err, LoadError::InvalidEntity { entity: 0, .. }));
        assert!(err.to_string().contains("time must be > 0"));
    }

    #[test]
    fn block_without_size_is_rejected() {
        let level = parse(
            r#"{ "id": 1, "windows": [ { "x": 0, "y": 0, "width": 50, "height": 50,
                 "entities": [ { "type": "SolidBlockEntity", "x": 1, "y": 1, "width": 20 } ] } ] }"#,
        );
        let err = prepare_level(&level, &screen(), &EngineConfig::default())
            .expect_err("missing height should fail");
        assert!(err.to_string().contains("missing height"));
    }

    #[test]
    fn placement_centres_windows_and_moves_entities() {
        let placed = place_on_screen(&parse(TWO_WINDOWS), &screen());
        // Bounding box 400 x 200 on a 1000 x 800 screen: offset (300, 300).
        let goal_window = &placed.windows[0];
        assert_eq!((goal_window.x, goal_window.y), (600.0, 400.0));
        assert_eq!(goal_window.entities[0].x, 620.0);
        let player_window = &placed.windows[1];
        assert_eq!((player_window.x, player_window.y), (300.0, 300.0));
        assert_eq!(player_window.entities[1].y, 380.0);
    }

    #[test]
    fn placement_puts_player_windows_last() {
        let placed = place_on_screen(&parse(TWO_WINDOWS), &screen());
        assert!(!placed.windows[0].has_player());
        assert!(placed.windows[1].has_player());
    }

    #[test]
    fn placement_pushes_oversized_layout_back_on_screen() {
        let level = parse(
            r#"{ "id": 1, "windows": [
                 { "x": 0, "y": 0, "width": 300, "height": 100 },
                 { "x": 1100, "y": 0, "width": 300, "height": 100 } ] }"#,
        );
        let placed = place_on_screen(&level, &screen());
        // Layout is 1400 wide: offset -200 would push the first window off the
        // left edge and the second off the right.
        assert_eq!(placed.windows[0].x, 0.0);
        assert_eq!(placed.windows[1].x, 700.0);
    }

    #[test]
    fn placement_leaves_fullscreen_windows_alone() {
        let finale = finale_level(&[screen()]);
        let placed = place_on_screen(&finale, &screen());
        assert_eq!(placed, finale);
        assert!(placed.windows[0].fullscreen);
        assert_eq!(placed.id, FINALE_LEVEL_ID);
    }

    #[test]
    fn prepared_level_carries_shared_flags_and_requests() {
        let prepared = prepare_level(&parse(TWO_WINDOWS), &screen(), &EngineConfig::default())
            .expect("level should prepare");
        assert_eq!(prepared.windows.len(), 2);
        let goal = &prepared.windows[0].spawns[0];
        assert!(goal.shared);
        assert_eq!(goal.kind.entity_type(), EntityType::Goal);
        assert_eq!(prepared.windows[1].request.size, DVec2::new(200.0, 100.0));
    }
}
