//! Entity model: one struct for identity/placement/ownership, one closed enum
//! for kind-specific state.
//!
//! Level files name kinds by string tag; [`EntityType`] is the closed set of
//! accepted tags and anything else is rejected at load time.

use glam::DVec2;
use hop_core::geometry::Aabb;

use crate::collision::CollisionBox;
use crate::door::{DoorState, SwapDoorState};
use crate::goal::GoalState;
use crate::platform::PlatformState;
use crate::player::PlayerState;
use crate::ripple::RippleState;
use crate::viewport::ViewportId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Player,
    SolidBlock,
    Goal,
    Door,
    SwapDoor,
    RespawnPoint,
    Ripple,
    MovingPlatform,
}

impl EntityType {
    pub const ALL: &'static [EntityType] = &[
        EntityType::Player,
        EntityType::SolidBlock,
        EntityType::Goal,
        EntityType::Door,
        EntityType::SwapDoor,
        EntityType::RespawnPoint,
        EntityType::Ripple,
        EntityType::MovingPlatform,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Player => "PlayerEntity",
            Self::SolidBlock => "SolidBlockEntity",
            Self::Goal => "GoalEntity",
            Self::Door => "DoorEntity",
            Self::SwapDoor => "DoorEntitySwap",
            Self::RespawnPoint => "RespawnPointEntity",
            Self::Ripple => "RippleEntity",
            Self::MovingPlatform => "MovingPlatformEntity",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player(PlayerState),
    SolidBlock { size: DVec2 },
    Goal(GoalState),
    Door(DoorState),
    SwapDoor(SwapDoorState),
    RespawnPoint,
    Ripple(RippleState),
    MovingPlatform(PlatformState),
}

impl EntityKind {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Player(_) => EntityType::Player,
            Self::SolidBlock { .. } => EntityType::SolidBlock,
            Self::Goal(_) => EntityType::Goal,
            Self::Door(_) => EntityType::Door,
            Self::SwapDoor(_) => EntityType::SwapDoor,
            Self::RespawnPoint => EntityType::RespawnPoint,
            Self::Ripple(_) => EntityType::Ripple,
            Self::MovingPlatform(_) => EntityType::MovingPlatform,
        }
    }

    // Higher draws in front.
    fn default_z_order(&self) -> i32 {
        match self {
            Self::Player(_) => 2,
            Self::Goal(_) => 100,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub position: DVec2,
    pub z_order: i32,
    pub owner: Option<ViewportId>,
    pub kind: EntityKind,
    shared: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId, spawn: Spawn) -> Self {
        let z_order = spawn.kind.default_z_order();
        Self {
            id,
            position: spawn.position,
            z_order,
            owner: spawn.owner,
            kind: spawn.kind,
            shared: spawn.shared,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    /// Collision box in global coordinates, derived from current state.
    /// Entities without collision (respawn points, ripples) return `None`.
    pub fn collision_box(&self) -> Option<CollisionBox> {
        let rect = |size: DVec2| Aabb::from_position_size(self.position, size);
        match &self.kind {
            EntityKind::Player(player) => Some(CollisionBox::solid(rect(player.size))),
            EntityKind::SolidBlock { size } => Some(CollisionBox::solid(rect(*size))),
            EntityKind::Goal(goal) => Some(CollisionBox::trigger(rect(goal.size))),
            EntityKind::Door(door) => Some(door.collision_box(self.position)),
            EntityKind::SwapDoor(door) => Some(door.collision_box(self.position)),
            EntityKind::MovingPlatform(platform) => {
                Some(CollisionBox::solid(rect(platform.size)))
            }
            EntityKind::RespawnPoint | EntityKind::Ripple(_) => None,
        }
    }

    /// Entities that can stand on things; moving platforms carry these.
    pub fn can_be_grounded(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Hook for entities that keep viewport-relative state besides their
    /// position; called when a tethering viewport drags them along.
    pub(crate) fn on_viewport_moved(&mut self, delta: DVec2) {
        if let EntityKind::MovingPlatform(platform) = &mut self.kind {
            platform.path.translate(delta);
        }
    }
}

/// Everything needed to create an entity except its id, which the registry
/// assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub position: DVec2,
    pub shared: bool,
    pub owner: Option<ViewportId>,
    pub kind: EntityKind,
}

impl Spawn {
    pub fn new(position: DVec2, kind: EntityKind) -> Self {
        Self {
            position,
            shared: false,
            owner: None,
            kind,
        }
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn owned_by(mut self, owner: ViewportId) -> Self {
        self.owner = Some(owner);
        self
    }
}
