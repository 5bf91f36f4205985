use bitflags::bitflags;

bitflags! {
    /// pending-work, fault and control bits of the machine.
    ///
    /// `INSTR` and `DRAW` are consumed by whoever dispatches the work. the
    /// `BAD_*` faults and `EXIT` are sticky: routine cleaning never drops them.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const INSTR      = 0b0000_0001;
        const DRAW       = 0b0000_0010;
        const BAD_RENDER = 0b0000_0100;
        const BAD_INPUT  = 0b0000_1000;
        const BAD_SOUND  = 0b0001_0000;
        const EXIT       = 0b0010_0000;
    }
}

impl Flags {
    pub const PENDING: Flags = Flags::INSTR.union(Flags::DRAW);
    pub const FAULTS: Flags = Flags::BAD_RENDER
        .union(Flags::BAD_INPUT)
        .union(Flags::BAD_SOUND);
    pub const STICKY: Flags = Flags::FAULTS.union(Flags::EXIT);

    /// faults which make instruction dispatch a programming error
    pub const FATAL: Flags = Flags::BAD_RENDER.union(Flags::BAD_INPUT);

    pub fn is_sticky(self) -> bool {
        Flags::STICKY.contains(self)
    }
}

/// the machine's interrupt-pending style register. many producers set bits,
/// the host loop drains them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlagRegister {
    bits: Flags,
}

impl FlagRegister {
    pub fn new() -> Self {
        FlagRegister {
            bits: Flags::empty(),
        }
    }

    pub fn set(&mut self, mask: Flags) {
        self.bits.insert(mask);
    }

    /// explicit clear; this is the only way a sticky bit goes away
    pub fn clear(&mut self, mask: Flags) {
        self.bits.remove(mask);
    }

    /// true iff any bit of `mask` is set
    pub fn test(&self, mask: Flags) -> bool {
        self.bits.intersects(mask)
    }

    /// drop every non-sticky bit; faults and EXIT are kept as they were
    pub fn clean_keeping_faults(&mut self) {
        self.bits &= Flags::STICKY;
    }

    /// zero the whole register, sticky bits included
    pub fn wipe(&mut self) {
        self.bits = Flags::empty();
    }

    pub fn faults(&self) -> Flags {
        self.bits & Flags::FAULTS
    }

    pub fn bits(&self) -> Flags {
        self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zeroed() {
        let f = FlagRegister::new();
        assert_eq!(f.bits(), Flags::empty());
        assert!(!f.test(Flags::all()));
    }

    #[test]
    fn test_test_is_any_bit() {
        let mut f = FlagRegister::new();
        f.set(Flags::DRAW);
        assert!(f.test(Flags::DRAW | Flags::INSTR));
        assert!(!f.test(Flags::INSTR));
    }

    #[test]
    fn test_clear_only_named_bits() {
        let mut f = FlagRegister::new();
        f.set(Flags::INSTR | Flags::DRAW | Flags::BAD_SOUND);
        f.clear(Flags::INSTR | Flags::BAD_SOUND);
        assert_eq!(f.bits(), Flags::DRAW);
    }

    #[test]
    fn test_clean_keeps_faults_and_exit() {
        let mut f = FlagRegister::new();
        f.set(Flags::all());
        f.clean_keeping_faults();
        assert_eq!(f.bits(), Flags::STICKY);
        assert!(!f.test(Flags::PENDING));
    }

    #[test]
    fn test_sticky_classification() {
        assert!(Flags::EXIT.is_sticky());
        assert!(Flags::FAULTS.is_sticky());
        assert!(!Flags::INSTR.is_sticky());
        assert!(!(Flags::DRAW | Flags::EXIT).is_sticky());
    }

    #[test]
    fn test_wipe() {
        let mut f = FlagRegister::new();
        f.set(Flags::EXIT | Flags::BAD_INPUT);
        f.wipe();
        assert_eq!(f.bits(), Flags::empty());
    }
}
