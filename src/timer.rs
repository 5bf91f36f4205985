use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// highest frequency with a non-zero period
pub const MAX_HZ: u32 = 1_000_000_000;

/// convert a frequency into the period between two events of that frequency.
///
/// the period is `1s / hz` computed in whole nanoseconds, truncating toward
/// zero: 60 Hz gives 16_666_666ns (~16_667us), 380 Hz gives 2_631_578ns.
pub fn hz_to_duration(hz: u32) -> Duration {
    assert!(hz > 0, "frequency must be greater than 0 Hz");
    assert!(hz <= MAX_HZ, "frequency must be at most {} Hz", MAX_HZ);
    Duration::from_nanos(1_000_000_000 / u64::from(hz))
}

/// source of monotonic time for the scheduler, plus the only way it may block
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// real time: `Instant` for reading, spin_sleep for accurate short sleeps
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}

/// virtual time which only moves when slept on or advanced by hand. clones
/// share the same timeline, so a test can keep one and hand one to the
/// emulator.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
    last_sleep: Rc<Cell<Option<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
            last_sleep: Rc::new(Cell::new(None)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// virtual time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    /// duration of the most recent `sleep` call, if any
    pub fn last_sleep(&self) -> Option<Duration> {
        self.last_sleep.get()
    }

    pub fn take_last_sleep(&self) -> Option<Duration> {
        self.last_sleep.take()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.last_sleep.set(Some(duration));
        self.advance(duration);
    }
}

/// restartable countdown towards a target duration.
///
/// the timer never reads a clock on its own; callers pass `now` so the same
/// timer works against real and virtual time.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyTimer {
    start: Instant,
    target: Duration,
}

impl FrequencyTimer {
    pub fn new(target: Duration, now: Instant) -> Self {
        let mut t = FrequencyTimer { start: now, target };
        t.arm(target);
        t
    }

    pub fn from_hz(hz: u32, now: Instant) -> Self {
        Self::new(hz_to_duration(hz), now)
    }

    /// set the pacing interval; the reference instant is left alone
    pub fn arm(&mut self, target: Duration) {
        assert!(target > Duration::ZERO, "timer target must be non-zero");
        self.target = target;
    }

    pub fn arm_hz(&mut self, hz: u32) {
        self.arm(hz_to_duration(hz));
    }

    pub fn restart(&mut self, now: Instant) {
        self.start = now;
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    /// whole events per second this timer paces, rounded down
    pub fn target_hz(&self) -> u64 {
        (1_000_000_000 / self.target.as_nanos().max(1)) as u64
    }

    /// time left until the target elapses, zero once it has
    pub fn remaining(&self, now: Instant) -> Duration {
        self.target
            .saturating_sub(now.saturating_duration_since(self.start))
    }

    pub fn elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_conversion_truncates() {
        assert_eq!(hz_to_duration(60), Duration::from_nanos(16_666_666));
        assert_eq!(hz_to_duration(60).as_micros(), 16_666);
        assert_eq!(hz_to_duration(380), Duration::from_nanos(2_631_578));
        assert_eq!(hz_to_duration(1), Duration::from_secs(1));
    }

    #[test]
    fn test_highest_frequency_is_one_ns() {
        assert_eq!(hz_to_duration(MAX_HZ), Duration::from_nanos(1));
    }

    #[test]
    #[should_panic(expected = "at most")]
    fn test_frequency_above_max_rejected() {
        hz_to_duration(2_000_000_000);
    }

    #[test]
    #[should_panic]
    fn test_zero_hz_rejected() {
        let _ = hz_to_duration(0);
    }

    #[test]
    #[should_panic]
    fn test_zero_target_rejected() {
        let clock = ManualClock::new();
        let mut t = FrequencyTimer::from_hz(60, clock.now());
        t.arm(Duration::ZERO);
    }

    #[test]
    fn test_remaining_counts_down_to_zero() {
        let clock = ManualClock::new();
        let t = FrequencyTimer::new(Duration::from_millis(10), clock.now());
        assert_eq!(t.remaining(clock.now()), Duration::from_millis(10));
        clock.advance(Duration::from_millis(4));
        assert_eq!(t.remaining(clock.now()), Duration::from_millis(6));
        clock.advance(Duration::from_millis(50));
        assert_eq!(t.remaining(clock.now()), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_at_exact_target() {
        let clock = ManualClock::new();
        let t = FrequencyTimer::new(Duration::from_millis(10), clock.now());
        clock.advance(Duration::from_nanos(9_999_999));
        assert!(!t.elapsed(clock.now()));
        clock.advance(Duration::from_nanos(1));
        assert!(t.elapsed(clock.now()));
    }

    #[test]
    fn test_restart_rearms() {
        let clock = ManualClock::new();
        let mut t = FrequencyTimer::from_hz(100, clock.now());
        clock.advance(Duration::from_millis(15));
        assert!(t.elapsed(clock.now()));
        t.restart(clock.now());
        assert!(!t.elapsed(clock.now()));
        assert_eq!(t.remaining(clock.now()), Duration::from_millis(10));
    }

    #[test]
    fn test_target_hz() {
        let clock = ManualClock::new();
        let t = FrequencyTimer::from_hz(60, clock.now());
        assert_eq!(t.target_hz(), 60);
    }

    #[test]
    fn test_manual_clock_records_sleep() {
        let clock = ManualClock::new();
        let shared = clock.clone();
        shared.sleep(Duration::from_millis(3));
        assert_eq!(clock.elapsed(), Duration::from_millis(3));
        assert_eq!(clock.take_last_sleep(), Some(Duration::from_millis(3)));
        assert_eq!(clock.last_sleep(), None);
    }
}
