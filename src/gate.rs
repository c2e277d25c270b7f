//! Frame-rate gate.
//!
//! Live capture delivers frames faster than inference can keep up with. A
//! frame that has already waited longer than one frame interval is stale and
//! is dropped before it reaches the inference queue. Dropped frames are gone;
//! the gate never buffers or reorders.

use std::time::{Duration, Instant};

/// `false` when the frame is older than `frame_interval` at `now`.
///
/// A delay exactly equal to the interval is still processed.
pub fn should_process(captured_at: Instant, now: Instant, frame_interval: Duration) -> bool {
    now.saturating_duration_since(captured_at) <= frame_interval
}

/// Frame interval for a nominal capture rate (`1 / fps`).
pub fn frame_interval_for_fps(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}

/// Admission counters for the live capture path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateStats {
    pub admitted: u64,
    /// Stale on arrival.
    pub dropped: u64,
    /// Fresh, but the inference queue was full.
    pub busy: u64,
}

/// Stateful gate owned by the capture callback.
#[derive(Debug)]
pub struct FrameGate {
    frame_interval: Duration,
    stats: GateStats,
}

impl FrameGate {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            stats: GateStats::default(),
        }
    }

    pub fn for_fps(fps: u32) -> Self {
        Self::new(frame_interval_for_fps(fps))
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Decide against the wall clock.
    pub fn admit(&mut self, captured_at: Instant) -> bool {
        self.admit_at(captured_at, Instant::now())
    }

    /// Decide against an explicit `now`.
    pub fn admit_at(&mut self, captured_at: Instant, now: Instant) -> bool {
        let keep = should_process(captured_at, now, self.frame_interval);
        if keep {
            self.stats.admitted += 1;
        } else {
            self.stats.dropped += 1;
            log::debug!(
                "dropping stale frame ({} ms late, interval {} ms)",
                now.saturating_duration_since(captured_at).as_millis(),
                self.frame_interval.as_millis()
            );
        }
        keep
    }

    /// Take back an admission whose frame found the inference queue full.
    pub fn record_busy(&mut self) {
        self.stats.admitted = self.stats.admitted.saturating_sub(1);
        self.stats.busy += 1;
    }

    pub fn stats(&self) -> GateStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_frame_is_dropped() {
        let t = Instant::now();
        let now = t + Duration::from_millis(600);
        assert!(!should_process(t, now, Duration::from_millis(500)));
    }

    #[test]
    fn fresh_frame_is_processed() {
        let t = Instant::now();
        assert!(should_process(t, t, Duration::from_millis(500)));
        assert!(should_process(
            t,
            t + Duration::from_millis(499),
            Duration::from_millis(500)
        ));
    }

    #[test]
    fn delay_equal_to_interval_is_processed() {
        let t = Instant::now();
        let interval = Duration::from_millis(500);
        assert!(should_process(t, t + interval, interval));
        assert!(!should_process(t, t + interval + Duration::from_nanos(1), interval));
    }

    #[test]
    fn clock_skew_counts_as_fresh() {
        let now = Instant::now();
        let captured = now + Duration::from_millis(10);
        assert!(should_process(captured, now, Duration::from_millis(1)));
    }

    #[test]
    fn interval_derives_from_fps() {
        assert_eq!(frame_interval_for_fps(2), Duration::from_millis(500));
        assert_eq!(frame_interval_for_fps(0), Duration::from_secs(1));
        assert_eq!(FrameGate::for_fps(4).frame_interval(), Duration::from_millis(250));
    }

    #[test]
    fn gate_counts_decisions() {
        let mut gate = FrameGate::for_fps(2);
        let t = Instant::now();
        assert!(gate.admit_at(t, t + Duration::from_millis(100)));
        assert!(!gate.admit_at(t, t + Duration::from_millis(600)));
        assert!(!gate.admit_at(t, t + Duration::from_secs(3)));
        assert_eq!(
            gate.stats(),
            GateStats {
                admitted: 1,
                dropped: 2,
                busy: 0,
            }
        );

        gate.record_busy();
        assert_eq!(gate.stats().admitted, 0);
        assert_eq!(gate.stats().busy, 1);
    }
}
