use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::tracker::FrameTracker;

/// Callbacks driven once per tick.
pub trait FrameHandler {
    /// Run the simulation update and render for one frame.
    fn tick(&mut self, delta_ms: f64);

    /// Receive the FPS estimate for the frame just completed.
    fn report_fps(&mut self, fps: Option<f64>);
}

/// Shared cancellation flag. Cloning is cheap; any clone can stop the scheduler.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Cancelled,
}

/// What happened when the host offered a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The handler ran and the FPS estimate was reported.
    Ticked { delta_ms: f64, fps: Option<f64> },
    /// The handler ran but cancelled during its tick; nothing was reported.
    Finished { delta_ms: f64 },
    /// Already cancelled; the handler was not invoked.
    Cancelled,
}

#[derive(Debug)]
pub struct FrameScheduler {
    state: SchedulerState,
    cancel: CancelHandle,
    last_ms: Option<f64>,
    tracker: FrameTracker,
    frames: u64,
}

impl FrameScheduler {
    /// A scheduler in the running state. The first frame has a zero delta.
    pub fn start() -> Self {
        tracing::debug!("frame scheduler started");
        Self {
            state: SchedulerState::Running,
            cancel: CancelHandle::default(),
            last_ms: None,
            tracker: FrameTracker::default(),
            frames: 0,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stop scheduling. Calling it again has no further effect.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.sync_state();
    }

    pub fn state(&mut self) -> SchedulerState {
        self.sync_state();
        self.state
    }

    pub fn is_running(&mut self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Frames whose handler actually ran.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Drive one frame at host timestamp `now_ms`.
    pub fn on_frame(&mut self, now_ms: f64, handler: &mut impl FrameHandler) -> FrameOutcome {
        if !self.is_running() {
            return FrameOutcome::Cancelled;
        }

        let delta_ms = match self.last_ms {
            Some(prev) => (now_ms - prev).max(0.0),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        self.frames += 1;
        handler.tick(delta_ms);

        if !self.is_running() {
            return FrameOutcome::Finished { delta_ms };
        }

        let fps = self.tracker.push(now_ms);
        handler.report_fps(fps);
        FrameOutcome::Ticked { delta_ms, fps }
    }

    /// Drive frames from the calling thread every `interval` until cancelled.
    ///
    /// Timestamps come from a monotonic clock started at the first frame.
    /// Returns the number of frames whose handler ran.
    pub fn run_paced(&mut self, handler: &mut impl FrameHandler, interval: Duration) -> u64 {
        let origin = Instant::now();
        let mut next = origin;
        let first = self.frames;
        tracing::info!(interval_ms = interval.as_secs_f64() * 1000.0, "paced loop running");

        while self.is_running() {
            let now_ms = origin.elapsed().as_secs_f64() * 1000.0;
            self.on_frame(now_ms, handler);

            next += interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                // fell behind; don't try to catch up with a burst of frames
                next = now;
            }
        }

        let ran = self.frames - first;
        tracing::info!(frames = ran, "paced loop stopped");
        ran
    }

    fn sync_state(&mut self) {
        if self.state == SchedulerState::Running && self.cancel.is_cancelled() {
            self.state = SchedulerState::Cancelled;
            tracing::debug!(frames = self.frames, "frame scheduler cancelled");
        }
    }
}
