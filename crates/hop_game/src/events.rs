//! Named gameplay events for the audio/render collaborators. The core only
//! records that something happened, where (as a stereo pan), and when.

use hop_core::geometry::Aabb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameEventKind {
    Jump,
    Fall,
    HorizontalCollision,
    VerticalCollision,
    GoalReached,
    LevelComplete,
    LevelStart,
    Roar,
    Fireworks,
}

impl GameEventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Jump => "jump",
            Self::Fall => "fall",
            Self::HorizontalCollision => "horizontal-collision",
            Self::VerticalCollision => "vertical-collision",
            Self::GoalReached => "goal-reached",
            Self::LevelComplete => "level-complete",
            Self::LevelStart => "level-start",
            Self::Roar => "roar",
            Self::Fireworks => "fireworks",
        }
    }
}

impl std::fmt::Display for GameEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameEvent {
    pub kind: GameEventKind,
    pub pan: Option<f64>,
    pub tick: u64,
}

/// Map `x` onto [-1, 1] across the horizontal extent of `bounds`.
/// `None` when the bounds have no width.
pub fn stereo_pan(x: f64, bounds: &Aabb) -> Option<f64> {
    let width = bounds.x2 - bounds.x1;
    if width.abs() < f64::EPSILON {
        return None;
    }
    let fraction = (x - bounds.x1) / width;
    Some((fraction * 2.0 - 1.0).clamp(-1.0, 1.0))
}
