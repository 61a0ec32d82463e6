//! Simulation kernel: the per-tick update step.
//!
//! # Invariants
//! - All mutable state lives in one [`Simulation`] value passed to callers; no globals.
//! - The update step is a pure function of its inputs and the elapsed delta.
//! - While the menu is open the world keeps spinning but the player is frozen.

pub mod movement;
pub mod simulation;

pub use movement::{displacement, integrate};
pub use simulation::Simulation;
