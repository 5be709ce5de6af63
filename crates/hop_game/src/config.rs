//! Engine tuning. Every field has a default so a config file only needs to
//! mention what it overrides. Durations are authored in milliseconds and turned
//! into tick counts with [`EngineConfig::ticks_for`].

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    pub move_accel: f64,
    pub friction: f64,
    pub gravity: f64,
    pub jump_velocity: f64,
    pub max_speed_x: f64,
    pub max_speed_y: f64,
    pub player_width: f64,
    pub player_height: f64,
    /// A wall whose top is this close to the mover's feet is stepped onto
    /// instead of blocking horizontal motion. 0 disables stepping.
    pub ledge_tolerance: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            move_accel: 0.4,
            friction: 0.3,
            gravity: 0.2,
            jump_velocity: -4.0,
            max_speed_x: 4.0,
            max_speed_y: 15.0,
            player_width: 16.0,
            player_height: 16.0,
            ledge_tolerance: 1.0,
        }
    }
}

/// Which owned entities follow their viewport when it moves.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TetherPolicy {
    /// Only shared entities ride along with their owner.
    #[default]
    SharedOnly,
    /// The whole local set rides along, level geometry included.
    AllOwned,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_hz: f64,
    pub physics: PhysicsConfig,
    pub tether: TetherPolicy,
    pub viewport_nudge: f64,
    pub respawn_delay_ms: u64,
    pub ripple_radius: f64,
    pub goal_ripple_interval_ms: u64,
    pub door_teleport_grace_ms: u64,
    pub swap_door_teleport_grace_ms: u64,
    pub teleport_echo_delay_ms: u64,
    pub finale_duration_ms: u64,
    pub finale_ripple_interval_ms: u64,
    pub finale_fanfare_interval_ms: u64,
    pub finale_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_hz: 120.0,
            physics: PhysicsConfig::default(),
            tether: TetherPolicy::default(),
            viewport_nudge: 5.0,
            respawn_delay_ms: 1000,
            ripple_radius: 1000.0,
            goal_ripple_interval_ms: 3000,
            door_teleport_grace_ms: 1500,
            swap_door_teleport_grace_ms: 1000,
            teleport_echo_delay_ms: 100,
            finale_duration_ms: 12_000,
            finale_ripple_interval_ms: 100,
            finale_fanfare_interval_ms: 1500,
            finale_seed: 0x5eed,
        }
    }
}

impl EngineConfig {
    /// Whole ticks covering `ms` at the configured rate, never less than one.
    pub fn ticks_for(&self, ms: u64) -> u64 {
        ((ms as f64 * self.tick_hz / 1000.0).round() as u64).max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_hz.is_finite() && self.tick_hz > 0.0) {
            return Err(ConfigError::Invalid("tick_hz must be > 0".to_string()));
        }
        let p = &self.physics;
        let non_negative = [
            ("move_accel", p.move_accel),
            ("friction", p.friction),
            ("gravity", p.gravity),
            ("max_speed_x", p.max_speed_x),
            ("max_speed_y", p.max_speed_y),
            ("ledge_tolerance", p.ledge_tolerance),
            ("viewport_nudge", self.viewport_nudge),
            ("ripple_radius", self.ripple_radius),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and >= 0 (got {value})"
                )));
            }
        }
        if !p.jump_velocity.is_finite() {
            return Err(ConfigError::Invalid("jump_velocity must be finite".to_string()));
        }
        if !(p.player_width > 0.0 && p.player_height > 0.0) {
            return Err(ConfigError::Invalid(
                "player_width and player_height must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
