use hop_core::input::{InputState, Key};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ReplayError;

/// Scripted keyboard input: each frame holds a key set for `repeat` ticks.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(default)]
    pub held: Vec<Key>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ReplaySequence {
    /// One held-key set per tick.
    pub fn expanded_inputs(&self) -> Vec<Vec<Key>> {
        let mut out = Vec::new();
        for frame in &self.frames {
            for _ in 0..frame.repeat.max(1) {
                out.push(frame.held.clone());
            }
        }
        out
    }

    pub fn tick_count(&self) -> usize {
        self.frames
            .iter()
            .map(|frame| frame.repeat.max(1) as usize)
            .sum()
    }
}

/// Feeds an expanded replay into an [`InputState`], one tick at a time.
/// Once the script runs out every key is released.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    inputs: Vec<Vec<Key>>,
    next: usize,
}

impl ReplayCursor {
    pub fn new(replay: &ReplaySequence) -> Self {
        Self {
            inputs: replay.expanded_inputs(),
            next: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.inputs.len()
    }

    pub fn apply_next(&mut self, input: &mut InputState) {
        match self.inputs.get(self.next) {
            Some(keys) => input.set_held(keys.iter().copied()),
            None => input.set_held(std::iter::empty()),
        }
        self.next += 1;
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, ReplayError> {
    let raw = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let replay: ReplaySequence = serde_json::from_str(&raw).map_err(|source| ReplayError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_replay(&replay)?;
    Ok(replay)
}

fn validate_replay(replay: &ReplaySequence) -> Result<(), ReplayError> {
    if replay.frames.is_empty() {
        return Err(ReplayError::Invalid("frames list is empty".to_string()));
    }
    Ok(())
}

const fn default_repeat() -> u32 {
    1
}
