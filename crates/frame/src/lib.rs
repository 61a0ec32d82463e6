//! Frame scheduling: one logical tick per display refresh plus a rolling FPS
//! estimate.
//!
//! The host (a window event loop or [`FrameScheduler::run_paced`]) supplies
//! timestamps; the scheduler turns them into deltas, invokes the
//! [`FrameHandler`] and reports the FPS estimate afterwards.

pub mod scheduler;
pub mod tracker;

pub use scheduler::{CancelHandle, FrameHandler, FrameOutcome, FrameScheduler, SchedulerState};
pub use tracker::{FPS_WINDOW_MS, FrameTracker};
