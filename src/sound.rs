use crate::config::EmulatorConfig;
use crate::plugin::{Plugin, PluginError};
use beep::beep;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sound backends play the machine's buzzer. `play(level)` is given the value
/// of the sound timer and is expected to sound for `level` countdown ticks,
/// whose rate the core hands over once through `set_countdown_freq`.
pub trait SoundPlugin: Plugin {
    fn initialize(&mut self) -> Result<(), PluginError>;

    fn set_countdown_freq(&mut self, hz: f32);

    fn play(&mut self, level: u8);

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// called from every `update_systems`
    fn update(&mut self) {}
}

pub const DEFAULT_TONE_HZ: f32 = 2093.0; // C
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const AMPLITUDE: f32 = 16_000.0;

#[derive(Debug)]
struct ToneState {
    /// cycles per sample
    freq: f32,
    /// samples left before the fade out
    remaining: i64,
    pos: u64,
    /// samples per countdown tick
    cycle_samples: f32,
    playing: bool,
}

/// the tone shared between the core and an audio device callback.
///
/// every access, from `play`/`stop` and from `fill` on the device thread,
/// holds the same lock, and only for the duration of that one update.
#[derive(Debug, Clone)]
pub struct ToneStream {
    state: Arc<Mutex<ToneState>>,
    sample_rate: u32,
}

impl ToneStream {
    pub fn new(sample_rate: u32) -> Self {
        ToneStream {
            state: Arc::new(Mutex::new(ToneState {
                freq: 0.0,
                remaining: 0,
                pos: 0,
                cycle_samples: sample_rate as f32 / 60.0,
                playing: false,
            })),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_countdown_freq(&self, hz: f32) {
        self.state.lock().cycle_samples = self.sample_rate as f32 / hz;
    }

    /// sound `pitch_hz` for `level` countdown ticks
    pub fn play(&self, pitch_hz: f32, level: u8) {
        let mut s = self.state.lock();
        s.freq = pitch_hz / self.sample_rate as f32;
        s.remaining = (s.cycle_samples * f32::from(level)) as i64;
        s.playing = true;
    }

    pub fn stop(&self) {
        self.state.lock().remaining = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// device callback: render the next block of mono samples. once the tone
    /// runs out the block fades to silence and the stream pauses itself.
    pub fn fill(&self, out: &mut [i16]) {
        let mut s = self.state.lock();
        if !s.playing {
            out.fill(0);
            return;
        }

        let freq = s.freq;
        let mut pos = s.pos;
        if s.remaining > 0 {
            for sample in out.iter_mut() {
                *sample = (AMPLITUDE * (2.0 * PI * freq * pos as f32).sin()) as i16;
                pos += 1;
            }
            s.pos = pos;
            s.remaining -= out.len() as i64;
        } else {
            // ramp down rather than cut, to avoid a click
            let mut ampl = AMPLITUDE;
            for sample in out.iter_mut() {
                *sample = (ampl * (2.0 * PI * freq * pos as f32).sin()) as i16;
                pos += 1;
                ampl = if ampl > 100.0 { ampl - 60.0 } else { 0.0 };
            }
            s.pos = 0;
            s.playing = false;
        }
    }
}

/// generates the buzzer as samples for whatever audio device the host runs;
/// the device pulls them with `ToneStream::fill`
pub struct SynthSound {
    sample_rate: u32,
    tone_hz: f32,
    stream: Option<ToneStream>,
}

impl SynthSound {
    pub fn new(sample_rate: u32, tone_hz: f32) -> Self {
        SynthSound {
            sample_rate,
            tone_hz,
            stream: None,
        }
    }

    /// pitch and sample rate from the emulator config
    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::new(config.sample_rate, config.tone_hz)
    }

    /// handle for the device callback; None until initialized
    pub fn stream(&self) -> Option<ToneStream> {
        self.stream.clone()
    }
}

impl Default for SynthSound {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_TONE_HZ)
    }
}

impl Plugin for SynthSound {
    fn name(&self) -> &str {
        "synth sound"
    }

    fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    fn dispose(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
    }
}

impl SoundPlugin for SynthSound {
    fn initialize(&mut self) -> Result<(), PluginError> {
        if self.sample_rate == 0 {
            return Err(PluginError::Device("sample rate must be non-zero".to_string()));
        }
        self.stream = Some(ToneStream::new(self.sample_rate));
        info!("synth sound initialized at {} Hz", self.sample_rate);
        Ok(())
    }

    fn set_countdown_freq(&mut self, hz: f32) {
        if let Some(stream) = &self.stream {
            stream.set_countdown_freq(hz);
        }
    }

    fn play(&mut self, level: u8) {
        if let Some(stream) = &self.stream {
            stream.play(self.tone_hz + 2.0 * f32::from(level), level);
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            stream.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.stream.as_ref().map_or(false, ToneStream::is_playing)
    }
}

/// the PC speaker, through the beep crate
pub struct SimpleBeep {
    initialized: bool,
    pitch: u16,
    countdown_hz: f32,
    until: Option<Instant>,
}

impl SimpleBeep {
    pub fn new(pitch: u16) -> Self {
        SimpleBeep {
            initialized: false,
            pitch,
            countdown_hz: 60.0,
            until: None,
        }
    }

    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::new(config.tone_hz as u16)
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new(DEFAULT_TONE_HZ as u16)
    }
}

impl Plugin for SimpleBeep {
    fn name(&self) -> &str {
        "pc speaker"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn dispose(&mut self) {
        if self.initialized {
            self.stop();
        }
        self.initialized = false;
    }
}

impl SoundPlugin for SimpleBeep {
    fn initialize(&mut self) -> Result<(), PluginError> {
        // silence doubles as a check for access to the speaker
        beep(0).map_err(|e| PluginError::Device(e.to_string()))?;
        self.initialized = true;
        info!("pc speaker initialized");
        Ok(())
    }

    fn set_countdown_freq(&mut self, hz: f32) {
        self.countdown_hz = hz;
    }

    fn play(&mut self, level: u8) {
        if level == 0 {
            self.stop();
            return;
        }
        let pitch = self.pitch.saturating_add(2 * u16::from(level));
        match beep(pitch) {
            Ok(_) => {
                let secs = f32::from(level) / self.countdown_hz;
                self.until = Some(Instant::now() + Duration::from_secs_f32(secs));
            }
            Err(e) => warn!("failed to beep: {e}"),
        }
    }

    fn stop(&mut self) {
        if self.until.take().is_some() {
            if let Err(e) = beep(0) {
                warn!("failed to silence speaker: {e}");
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.until.is_some()
    }

    fn update(&mut self) {
        if matches!(self.until, Some(t) if Instant::now() >= t) {
            debug!("beep finished");
            self.stop();
        }
    }
}

/// no sound at all
#[derive(Default)]
pub struct Mute {
    initialized: bool,
}

impl Mute {
    pub fn new() -> Self {
        Mute { initialized: false }
    }
}

impl Plugin for Mute {
    fn name(&self) -> &str {
        "mute"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn dispose(&mut self) {
        self.initialized = false;
    }
}

impl SoundPlugin for Mute {
    fn initialize(&mut self) -> Result<(), PluginError> {
        self.initialized = true;
        Ok(())
    }

    fn set_countdown_freq(&mut self, _hz: f32) {}

    fn play(&mut self, _level: u8) {}

    fn stop(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }
}
