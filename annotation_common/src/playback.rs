//! Cooperative playback timer.
//!
//! The caller's event loop polls the timer and advances the session itself;
//! nothing here runs on another thread.

use std::time::{Duration, Instant};

const FALLBACK_FPS: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct Playback {
    interval: Duration,
    next_tick: Option<Instant>,
}

impl Playback {
    /// Timer ticking once per source frame.
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            log::warn!("Unusable frame rate {fps}, playing back at {FALLBACK_FPS} fps");
            FALLBACK_FPS
        };
        Self {
            interval: Duration::from_secs_f64(1.0 / fps),
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_playing(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_playing() {
            self.stop();
        } else {
            self.start(now);
        }
    }

    /// True once per elapsed interval while playing.
    ///
    /// A slow caller gets one tick per poll rather than a burst of catch-up ticks.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_tick {
            Some(due) if now >= due => {
                self.next_tick = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    /// Time until the next tick, if playing.
    pub fn time_to_next(&self, now: Instant) -> Option<Duration> {
        self.next_tick.map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_once_per_interval() {
        let start = Instant::now();
        let mut playback = Playback::new(10.0);
        assert_eq!(playback.interval(), Duration::from_millis(100));
        assert!(!playback.poll(start + Duration::from_secs(1)));

        playback.start(start);
        assert!(!playback.poll(start + Duration::from_millis(50)));
        assert!(playback.poll(start + Duration::from_millis(100)));
        assert!(!playback.poll(start + Duration::from_millis(150)));
        // Late poll yields a single tick.
        assert!(playback.poll(start + Duration::from_millis(900)));
        assert!(!playback.poll(start + Duration::from_millis(950)));
    }

    #[test]
    fn toggle_stops_ticks() {
        let now = Instant::now();
        let mut playback = Playback::new(30.0);
        playback.toggle(now);
        assert!(playback.is_playing());
        playback.toggle(now);
        assert!(!playback.is_playing());
        assert!(!playback.poll(now + Duration::from_secs(5)));
    }

    #[test]
    fn bad_fps_falls_back() {
        assert_eq!(Playback::new(0.0).interval(), Duration::from_millis(40));
        assert_eq!(Playback::new(f64::NAN).interval(), Duration::from_millis(40));
    }
}
