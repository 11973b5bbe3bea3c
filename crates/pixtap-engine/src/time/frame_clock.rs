use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous tick, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Tick number, starting at 1 for the first tick.
    pub frame_index: u64,
}

/// Display-paced clock producing `FrameTime` snapshots.
///
/// Delta time is clamped so a stalled window (debugger, minimised) does not
/// report a pathological frame time.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    ticks: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(start: Instant) -> Self {
        Self {
            last: start,
            ticks: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
        }
    }

    /// Number of ticks produced so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock as if the tick happened at `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);

        self.last = now;
        self.ticks = self.ticks.wrapping_add(1);

        FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.ticks,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
