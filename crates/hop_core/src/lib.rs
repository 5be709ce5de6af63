//! Engine-agnostic building blocks shared by the simulation crate: rectangle
//! math, input state with edge/level queries, tick pacing and tick-keyed
//! timers.

pub mod geometry;
pub mod input;
pub mod time;
