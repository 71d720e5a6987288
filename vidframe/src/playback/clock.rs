use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct ClockState {
    /// Position accumulated up to `running_since`.
    base: Duration,
    /// Set while the clock runs.
    running_since: Option<Instant>,
}

/**
    Playback position driven by the system's monotonic clock.
*/
pub struct WallClock {
    state: Mutex<ClockState>,
}

impl WallClock {
    /// A running clock starting at zero.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                base: Duration::ZERO,
                running_since: Some(Instant::now()),
            }),
        }
    }

    /// A paused clock at `position`.
    pub fn paused_at(position: Duration) -> Self {
        Self {
            state: Mutex::new(ClockState {
                base: position,
                running_since: None,
            }),
        }
    }

    pub fn position(&self) -> Duration {
        let state = self.state.lock();
        match state.running_since {
            Some(since) => state.base + since.elapsed(),
            None => state.base,
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if let Some(since) = state.running_since.take() {
            state.base += since.elapsed();
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if state.running_since.is_none() {
            state.running_since = Some(Instant::now());
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().running_since.is_none()
    }

    /// Jump to `position`, keeping the running/paused state.
    pub fn reset_to(&self, position: Duration) {
        let mut state = self.state.lock();
        state.base = position;
        if state.running_since.is_some() {
            state.running_since = Some(Instant::now());
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WallClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallClock")
            .field("position", &self.position())
            .field("paused", &self.is_paused())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_clock_does_not_move() {
        let clock = WallClock::paused_at(Duration::from_secs(3));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.position(), Duration::from_secs(3));
        assert!(clock.is_paused());
    }

    #[test]
    fn running_clock_advances() {
        let clock = WallClock::new();
        let before = clock.position();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.position() > before);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let clock = WallClock::new();
        std::thread::sleep(Duration::from_millis(2));
        clock.pause();
        let frozen = clock.position();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.position(), frozen);

        clock.resume();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.position() > frozen);
    }

    #[test]
    fn reset_keeps_pause_state() {
        let clock = WallClock::paused_at(Duration::ZERO);
        clock.reset_to(Duration::from_millis(500));
        assert_eq!(clock.position(), Duration::from_millis(500));
        assert!(clock.is_paused());

        clock.resume();
        clock.reset_to(Duration::from_secs(2));
        assert!(clock.position() >= Duration::from_secs(2));
        assert!(!clock.is_paused());
    }
}
