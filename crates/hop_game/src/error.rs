use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning level files into a running level. None of these
/// leave a partial level behind.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("level {index} does not exist ({available} levels loaded)")]
    MissingLevel { index: usize, available: usize },
    #[error("level '{level}' window {window}: unknown entity type '{type_tag}'")]
    UnknownEntityType {
        level: String,
        window: usize,
        type_tag: String,
    },
    #[error("level '{level}' window {window} entity {entity}: {reason}")]
    InvalidEntity {
        level: String,
        window: usize,
        entity: usize,
        reason: String,
    },
    #[error("level '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },
    #[error("viewport {window} of level '{level}' could not be opened by the host")]
    ViewportUnavailable { level: String, window: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config validation failed: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("engine is not running")]
    NotRunning,
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("replay validation failed: {0}")]
    Invalid(String),
}
