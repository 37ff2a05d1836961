// src/core/state/mod.rs

//! Defines the central `ServerState` struct and all related state components.

mod core;
mod stats;

pub use core::ServerState;
pub use stats::StatsState;
