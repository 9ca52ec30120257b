//! Frame clock

use crate::system::FrameInfo;
use std::time::Instant;

/// Longest frame delta handed to systems, in seconds
const MAX_DELTA: f64 = 0.25;

/// Tracks wall-clock frame time for the schedule
pub struct FrameClock {
    /// Total elapsed time in seconds
    pub total_time: f64,
    /// Time since last frame in seconds
    pub delta_time: f64,
    /// Frames ticked so far
    pub frame: u64,
    last_instant: Instant,
    first_tick: bool,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            frame: 0,
            last_instant: Instant::now(),
            first_tick: true,
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance using the wall clock. Call once per frame.
    pub fn tick(&mut self) {
        let now = Instant::now();

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            self.advance(0.0);
            return;
        }

        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.advance(elapsed);
    }

    /// Advance by an explicit delta (clamped), bypassing the wall clock
    pub fn advance(&mut self, delta: f64) {
        self.delta_time = delta.clamp(0.0, MAX_DELTA);
        self.total_time += self.delta_time;
        self.frame += 1;
    }

    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            frame: self.frame,
            delta_time: self.delta_time,
            total_time: self.total_time,
        }
    }
}
