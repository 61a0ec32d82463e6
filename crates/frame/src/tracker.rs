use std::collections::VecDeque;

/// Trailing window the FPS estimate is computed over.
pub const FPS_WINDOW_MS: f64 = 2000.0;

/// Ordered frame timestamps inside the trailing window.
#[derive(Debug, Clone)]
pub struct FrameTracker {
    samples: VecDeque<f64>,
    window_ms: f64,
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self::new(FPS_WINDOW_MS)
    }
}

impl FrameTracker {
    pub fn new(window_ms: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_ms,
        }
    }

    /// Record a frame at `now_ms` and return the FPS estimate.
    ///
    /// Entries at or before `now_ms - window` are evicted first. Returns
    /// `None` when the window spans zero time (a single sample, or repeated
    /// timestamps).
    pub fn push(&mut self, now_ms: f64) -> Option<f64> {
        let cutoff = now_ms - self.window_ms;
        while self.samples.front().is_some_and(|&t| t <= cutoff) {
            self.samples.pop_front();
        }
        self.samples.push_back(now_ms);
        self.fps(now_ms)
    }

    /// FPS estimate as of `now_ms` without recording a frame.
    pub fn fps(&self, now_ms: f64) -> Option<f64> {
        let oldest = *self.samples.front()?;
        let elapsed = now_ms - oldest;
        if elapsed <= 0.0 {
            return None;
        }
        Some(1000.0 * self.samples.len() as f64 / elapsed)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
