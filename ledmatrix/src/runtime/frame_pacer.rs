use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Best-effort pacing for the scheduler loop. The target rate is passed in
/// on every call rather than stored, so a rate change takes effect on the
/// very next tick.
#[derive(Debug)]
pub struct FramePacer {
    last_tick: Instant,
    last_present: Option<Instant>,
    frame_count: u64,
    frame_intervals: VecDeque<Duration>,
    max_intervals: usize,
}

impl FramePacer {
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    pub fn with_start(now: Instant) -> Self {
        Self {
            last_tick: now,
            last_present: None,
            frame_count: 0,
            frame_intervals: VecDeque::new(),
            max_intervals: 90,
        }
    }

    pub fn frame_duration(fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }

    /// Time elapsed since the previous tick started.
    pub fn begin_tick(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        delta
    }

    /// `max(0, frame_duration(fps) - work)`.
    pub fn sleep_duration(fps: u32, work: Duration) -> Duration {
        Self::frame_duration(fps).saturating_sub(work)
    }

    pub fn record_present(&mut self, now: Instant) {
        self.frame_count += 1;

        let Some(last_present) = self.last_present else {
            self.last_present = Some(now);
            return;
        };

        let interval = now.saturating_duration_since(last_present);
        self.last_present = Some(now);
        self.frame_intervals.push_back(interval);
        if self.frame_intervals.len() > self.max_intervals {
            self.frame_intervals.pop_front();
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn average_fps(&self) -> f32 {
        if self.frame_intervals.is_empty() {
            return 0.0;
        }

        let sum: Duration = self.frame_intervals.iter().copied().sum();
        let avg = sum / self.frame_intervals.len() as u32;

        if avg.is_zero() {
            return 0.0;
        }

        1.0 / avg.as_secs_f32()
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_measures_time_between_ticks() {
        let start = Instant::now();
        let mut pacer = FramePacer::with_start(start);

        assert_eq!(pacer.begin_tick(start), Duration::ZERO);
        let later = start + Duration::from_millis(40);
        assert_eq!(pacer.begin_tick(later), Duration::from_millis(40));
        assert_eq!(
            pacer.begin_tick(later + Duration::from_millis(5)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn sleep_fills_the_rest_of_the_frame() {
        assert_eq!(
            FramePacer::sleep_duration(10, Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(
            FramePacer::sleep_duration(10, Duration::from_millis(150)),
            Duration::ZERO
        );
    }

    #[test]
    fn rate_changes_apply_immediately() {
        let at_10 = FramePacer::sleep_duration(10, Duration::ZERO);
        let at_30 = FramePacer::sleep_duration(30, Duration::ZERO);

        assert_eq!(at_10, Duration::from_millis(100));
        assert!(at_30 > Duration::from_millis(33));
        assert!(at_30 < Duration::from_millis(34));
    }

    #[test]
    fn zero_fps_is_clamped() {
        assert_eq!(FramePacer::frame_duration(0), Duration::from_secs(1));
    }

    #[test]
    fn average_fps_over_recorded_presents() {
        let start = Instant::now();
        let mut pacer = FramePacer::with_start(start);
        assert_eq!(pacer.average_fps(), 0.0);

        for i in 0..=10 {
            pacer.record_present(start + Duration::from_millis(50) * i);
        }

        assert_eq!(pacer.frame_count(), 11);
        assert!((pacer.average_fps() - 20.0).abs() < 0.01);
    }
}
