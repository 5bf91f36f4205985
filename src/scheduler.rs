use crate::flags::{FlagRegister, Flags};
use crate::timer::{Clock, FrequencyTimer};
use log::trace;
use std::time::Duration;

/// frequencies of the three independently paced activities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rates {
    pub instr_hz: u32,
    pub frame_hz: u32,
    pub countdown_hz: u32,
}

impl Default for Rates {
    fn default() -> Self {
        Rates {
            instr_hz: 380,
            frame_hz: 60,
            countdown_hz: 60,
        }
    }
}

/// paces instruction execution, frame redraw and the countdown register
/// against the flag register, without a thread of its own.
///
/// the host loop calls `tick` every iteration and `idle_wait` when it has
/// nothing to do. `idle_wait` is the only place the host blocks.
#[derive(Debug)]
pub struct Scheduler<C: Clock> {
    clock: C,
    instr: FrequencyTimer,
    draw: FrequencyTimer,
    countdown: FrequencyTimer,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C, rates: Rates) -> Self {
        let now = clock.now();
        Scheduler {
            instr: FrequencyTimer::from_hz(rates.instr_hz, now),
            draw: FrequencyTimer::from_hz(rates.frame_hz, now),
            countdown: FrequencyTimer::from_hz(rates.countdown_hz, now),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// rearm all three timers from now
    pub fn restart(&mut self) {
        let now = self.clock.now();
        self.instr.restart(now);
        self.draw.restart(now);
        self.countdown.restart(now);
    }

    pub fn set_instr_hz(&mut self, hz: u32) {
        self.instr.arm_hz(hz);
    }

    pub fn set_frame_hz(&mut self, hz: u32) {
        self.draw.arm_hz(hz);
    }

    pub fn instr_timer(&self) -> &FrequencyTimer {
        &self.instr
    }

    pub fn draw_timer(&self) -> &FrequencyTimer {
        &self.draw
    }

    /// raise INSTR / DRAW for each domain whose timer elapsed (unless already
    /// pending) and decrement `countdown` when its own timer elapsed.
    pub fn tick(&mut self, flags: &mut FlagRegister, countdown: &mut u8) {
        let now = self.clock.now();

        if !flags.test(Flags::INSTR) && self.instr.elapsed(now) {
            flags.set(Flags::INSTR);
            self.instr.restart(now);
        }

        if !flags.test(Flags::DRAW) && self.draw.elapsed(now) {
            flags.set(Flags::DRAW);
            self.draw.restart(now);
        }

        // independent of the other two domains
        if self.countdown.elapsed(now) {
            *countdown = countdown.saturating_sub(1);
            self.countdown.restart(now);
        }
    }

    /// sleep until the nearer of the instruction and frame deadlines, unless
    /// work is already pending. returns how long it slept.
    pub fn idle_wait(&self, flags: &FlagRegister) -> Duration {
        if flags.test(Flags::PENDING) {
            return Duration::ZERO;
        }
        let now = self.clock.now();
        let wait = self.instr.remaining(now).min(self.draw.remaining(now));
        if !wait.is_zero() {
            trace!("idle for {:?}", wait);
            self.clock.sleep(wait);
        }
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;

    fn scheduler() -> (ManualClock, Scheduler<ManualClock>) {
        let clock = ManualClock::new();
        let s = Scheduler::new(clock.clone(), Rates::default());
        (clock, s)
    }

    #[test]
    fn test_nothing_due_at_start() {
        let (_clock, mut s) = scheduler();
        let mut flags = FlagRegister::new();
        let mut countdown = 10;
        s.tick(&mut flags, &mut countdown);
        assert_eq!(flags.bits(), Flags::empty());
        assert_eq!(countdown, 10);
    }

    #[test]
    fn test_instr_due_before_draw() {
        let (clock, mut s) = scheduler();
        let mut flags = FlagRegister::new();
        let mut countdown = 0;
        clock.advance(Duration::from_millis(3));
        s.tick(&mut flags, &mut countdown);
        assert!(flags.test(Flags::INSTR));
        assert!(!flags.test(Flags::DRAW));
    }

    #[test]
    fn test_pending_flags_accumulate() {
        let (clock, mut s) = scheduler();
        let mut flags = FlagRegister::new();
        let mut countdown = 0;
        for _ in 0..10 {
            clock.advance(Duration::from_millis(20));
            s.tick(&mut flags, &mut countdown);
        }
        // nobody consumed them, so they are still there
        assert!(flags.test(Flags::INSTR));
        assert!(flags.test(Flags::DRAW));
    }

    #[test]
    fn test_countdown_floors_at_zero() {
        let (clock, mut s) = scheduler();
        let mut flags = FlagRegister::new();
        let mut countdown = 2;
        for _ in 0..5 {
            clock.advance(Duration::from_millis(17));
            s.tick(&mut flags, &mut countdown);
        }
        assert_eq!(countdown, 0);
    }

    #[test]
    fn test_countdown_ignores_pending_work() {
        let (clock, mut s) = scheduler();
        let mut flags = FlagRegister::new();
        flags.set(Flags::INSTR | Flags::DRAW);
        let mut countdown = 5;
        clock.advance(Duration::from_millis(17));
        s.tick(&mut flags, &mut countdown);
        assert_eq!(countdown, 4);
    }

    #[test]
    fn test_idle_wait_sleeps_to_nearest_deadline() {
        let (clock, s) = scheduler();
        let flags = FlagRegister::new();
        let slept = s.idle_wait(&flags);
        assert_eq!(slept, Duration::from_nanos(2_631_578));
        assert_eq!(clock.elapsed(), slept);
    }

    #[test]
    fn test_idle_wait_noop_when_work_pending() {
        let (clock, s) = scheduler();
        let mut flags = FlagRegister::new();
        flags.set(Flags::DRAW);
        assert_eq!(s.idle_wait(&flags), Duration::ZERO);
        assert_eq!(clock.last_sleep(), None);
    }

    #[test]
    fn test_rate_change() {
        let (clock, mut s) = scheduler();
        s.set_instr_hz(1000);
        let flags = FlagRegister::new();
        s.idle_wait(&flags);
        assert_eq!(clock.elapsed(), Duration::from_millis(1));
    }

    #[test]
    fn test_one_virtual_second() {
        let (clock, mut s) = scheduler();
        let mut flags = FlagRegister::new();
        let mut countdown = 255u8;
        let (mut instrs, mut frames) = (0, 0);

        while clock.elapsed() < Duration::from_secs(1) {
            s.idle_wait(&flags);
            s.tick(&mut flags, &mut countdown);
            if flags.test(Flags::INSTR) {
                instrs += 1;
                flags.clear(Flags::INSTR);
            }
            if flags.test(Flags::DRAW) {
                frames += 1;
                flags.clear(Flags::DRAW);
            }
        }

        assert!((379..=381).contains(&instrs), "instrs = {}", instrs);
        assert!((59..=61).contains(&frames), "frames = {}", frames);
        assert!((194..=196).contains(&countdown), "countdown = {}", countdown);
    }
}
