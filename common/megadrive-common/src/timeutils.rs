use std::thread;
use std::time::{Duration, SystemTime};

/// Read the time since the Unix epoch in nanoseconds. Will return 0 if the system-reported time is
/// somehow before the Unix epoch.
#[must_use]
pub fn current_time_nanos() -> u128 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
}

/// Sleep until at least the specified time. Returns the current time in nanoseconds after sleeping.
///
/// Sleeps until 1ms before the target time and then busy waits, since `thread::sleep()` only
/// guarantees a minimum duration.
///
/// If the current time is already past the target time, this function will return immediately
/// without sleeping.
#[inline]
#[allow(clippy::must_use_candidate)]
pub fn sleep_until(time_nanos: u128) -> u128 {
    loop {
        let now = current_time_nanos();
        if now >= time_nanos {
            return now;
        }

        let duration = Duration::from_nanos((time_nanos - now) as u64);
        if duration > Duration::from_millis(1) {
            thread::sleep(duration - Duration::from_millis(1));
        }
    }
}

/// Paces emulated frames against the wall clock.
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame_interval_nanos: u128,
    next_frame_nanos: u128,
}

impl FramePacer {
    #[must_use]
    pub fn new(frame_interval_nanos: u64) -> Self {
        Self {
            frame_interval_nanos: frame_interval_nanos.into(),
            next_frame_nanos: current_time_nanos() + u128::from(frame_interval_nanos),
        }
    }

    #[must_use]
    pub fn frame_interval_nanos(&self) -> u128 {
        self.frame_interval_nanos
    }

    /// Block until the current frame's deadline. Returns how long the frame took in nanoseconds,
    /// measured from the previous deadline.
    pub fn wait_for_next_frame(&mut self) -> u128 {
        let frame_start = self.next_frame_nanos - self.frame_interval_nanos;
        let now = sleep_until(self.next_frame_nanos);

        // Don't try to catch up if the host fell more than a frame behind
        self.next_frame_nanos = if now > self.next_frame_nanos + self.frame_interval_nanos {
            log::debug!("Frame pacing fell behind by {}ns", now - self.next_frame_nanos);
            now + self.frame_interval_nanos
        } else {
            self.next_frame_nanos + self.frame_interval_nanos
        };

        now - frame_start
    }
}
