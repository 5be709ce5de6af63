//! Multi-viewport platformer simulation.
//!
//! Entities live in one [`registry::EntityRegistry`]; each is owned by at
//! most one viewport. Shared entities change owner as they cross viewport
//! edges and ride along when their owner moves. [`engine::Engine`] drives
//! everything at a fixed tick rate against a [`host::ViewportHost`].

pub mod collision;
pub mod config;
pub mod context;
pub mod door;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod goal;
pub mod host;
pub mod level;
pub mod platform;
pub mod player;
pub mod registry;
pub mod replay;
pub mod ripple;
pub mod viewport;

pub use config::{load_config_from_path, EngineConfig, PhysicsConfig, TetherPolicy};
pub use engine::{Engine, LevelSlot, StopReason, TickOutcome};
pub use error::{ConfigError, EngineError, LoadError, ReplayError};
pub use events::{GameEvent, GameEventKind};
pub use host::{SimulatedHost, ViewportHost};
pub use level::LevelSet;
