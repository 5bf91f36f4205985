use crate::display::{RenderConfig, Resolution};
use crate::scheduler::Rates;
use crate::sound::{DEFAULT_SAMPLE_RATE, DEFAULT_TONE_HZ};

/// everything the emulator needs to know before it starts
#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorConfig {
    pub rates: Rates,
    pub render: RenderConfig,
    /// internal resolution of the machine
    pub gfx: Resolution,
    pub tone_hz: f32,
    pub sample_rate: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            rates: Rates::default(),
            render: RenderConfig::default(),
            gfx: Resolution::mono(64, 32),
            tone_hz: DEFAULT_TONE_HZ,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EmulatorConfig::default();
        assert_eq!(c.rates.instr_hz, 380);
        assert_eq!(c.rates.frame_hz, 60);
        assert_eq!(c.rates.countdown_hz, 60);
        assert_eq!(c.render.window.width, 512);
        assert_eq!(c.render.window.height, 256);
        assert_eq!(c.gfx.byte_count(), 256);
    }
}
