//! Input State Tracker: raw key/pointer events in, queryable hold state out.
//!
//! # Invariants
//! - Event handlers only write fields; they never trigger a frame.
//! - Losing focus clears every held key and raises the menu signal.
//! - Vertical pointer offset never exceeds the configured bound.

pub mod action;
pub mod state;

pub use action::{HeldKeys, HoldKey, InputEvent};
pub use state::{InputState, PointerMode};
