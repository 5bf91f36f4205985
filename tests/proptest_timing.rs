//! Property-based tests for the flag register and the scheduler.

use chip8_vm::flags::{FlagRegister, Flags};
use chip8_vm::scheduler::{Rates, Scheduler};
use chip8_vm::timer::{Clock, ManualClock};
use proptest::prelude::*;
use std::time::Duration;

fn scheduler(rates: Rates) -> (ManualClock, Scheduler<ManualClock>) {
    let clock = ManualClock::new();
    let s = Scheduler::new(clock.clone(), rates);
    (clock, s)
}

fn rates() -> impl Strategy<Value = Rates> {
    (1u32..=2000, 1u32..=240, 1u32..=240).prop_map(|(instr_hz, frame_hz, countdown_hz)| Rates {
        instr_hz,
        frame_hz,
        countdown_hz,
    })
}

proptest! {
    /// cleaning keeps exactly the sticky bits, whatever was set
    #[test]
    fn prop_clean_keeps_sticky_bits(bits in any::<u8>()) {
        let set = Flags::from_bits_truncate(bits);
        let mut flags = FlagRegister::new();
        flags.set(set);
        flags.clean_keeping_faults();
        prop_assert_eq!(flags.bits(), set & Flags::STICKY);
        prop_assert!(!flags.test(Flags::PENDING));
    }

    /// the countdown never goes up and never drops by more than one per
    /// elapsed countdown period
    #[test]
    fn prop_countdown_non_increasing(
        start in any::<u8>(),
        steps in prop::collection::vec(0u64..50_000_000, 1..200),
    ) {
        let (clock, mut s) = scheduler(Rates::default());
        let mut flags = FlagRegister::new();
        let mut countdown = start;
        let mut total = Duration::ZERO;
        for nanos in steps {
            let before = countdown;
            clock.advance(Duration::from_nanos(nanos));
            total += Duration::from_nanos(nanos);
            s.tick(&mut flags, &mut countdown);
            prop_assert!(countdown <= before);
            prop_assert!(before - countdown <= 1);
        }
        let periods = total.as_nanos() / Duration::from_nanos(1_000_000_000 / 60).as_nanos();
        prop_assert!(u128::from(start - countdown) <= periods);
    }

    /// with nothing pending the idle wait lasts until the nearer of the two
    /// deadlines, and not at all once either is pending
    #[test]
    fn prop_idle_wait_is_min_remaining(r in rates(), offset in 0u64..20_000_000) {
        let (clock, mut s) = scheduler(r);
        let mut flags = FlagRegister::new();
        let mut countdown = 0;
        clock.advance(Duration::from_nanos(offset));
        s.tick(&mut flags, &mut countdown);
        flags.clear(Flags::PENDING);

        let now = clock.now();
        let expected = s.instr_timer().remaining(now).min(s.draw_timer().remaining(now));
        let waited = s.idle_wait(&flags);
        prop_assert_eq!(waited, expected);

        flags.set(Flags::DRAW);
        prop_assert_eq!(s.idle_wait(&flags), Duration::ZERO);
    }
}
