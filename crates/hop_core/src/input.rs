//! Input state tracking with both edge-triggered and level-triggered queries.
//!
//! - **Level-triggered (held):** `is_held(key)` returns true every tick the key
//!   is down. Used for continuous actions like movement and jumping.
//!
//! - **Edge-triggered (was_pressed):** true when the key is down now but was not
//!   down at the previous commit. The "previous" snapshot is taken by
//!   `commit()`, which the scheduler calls once per tick strictly after every
//!   entity has read the input. Host events arriving between ticks only touch
//!   the held set, so a press is visible to exactly one tick's worth of
//!   `was_pressed` queries.

use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Space,
    Escape,
    W,
    A,
    S,
    D,
    E,
    R,
    T,
    BracketLeft,
    BracketRight,
}

/// Pointer state in viewport-local coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub down: bool,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<Key>,
    previously_held: HashSet<Key>,
    pointer: PointerState,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: Key) {
        self.held.insert(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.held.remove(&key);
    }

    /// Replace the held set wholesale (replays, scripted hosts).
    pub fn set_held(&mut self, keys: impl IntoIterator<Item = Key>) {
        self.held = keys.into_iter().collect();
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.pointer = PointerState { down: true, x, y };
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) {
        self.pointer = PointerState { down: false, x, y };
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.held.contains(&key) && !self.previously_held.contains(&key)
    }

    /// All viewports lost focus: no key-up events will arrive, so treat every
    /// key as released.
    pub fn lost_focus(&mut self) {
        self.held.clear();
    }

    /// Remember this tick's held set for next tick's edge detection.
    pub fn commit(&mut self) {
        self.previously_held.clone_from(&self.held);
    }
}
