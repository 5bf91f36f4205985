//! # emulator
//!
//! Owns the machine state, the three plugin slots and the scheduler, and
//! exposes the host loop surface:
//!
//! ```text
//! while !emulator.exit_flag() {
//!     emulator.halt_for_next_flag();
//!     emulator.update_systems();
//!     if emulator.instr_flag() { emulator.execute_instr(&mut processor); }
//!     if emulator.draw_flag() { emulator.draw(); }
//! }
//! ```
//!
//! Plugins talk back only through the event bus, which is drained right
//! after their pump calls. The wait-key opcode re-enters the same
//! pump/tick/draw/idle steps from inside `execute_instr`, so frames and the
//! countdown keep going while the program is blocked.
use crate::config::EmulatorConfig;
use crate::cpu::CpuState;
use crate::display::{Color, RenderPlugin, WindowSize};
use crate::error::EmulatorError;
use crate::events::{CoreEvent, EventBus};
use crate::flags::{FlagRegister, Flags};
use crate::input::InputPlugin;
use crate::memory::{Chip8MemoryMap, CHIP8_PROGRAM_ADDR};
use crate::plugin::{PluginError, PluginKind, Slot, SlotState};
use crate::scheduler::Scheduler;
use crate::sound::SoundPlugin;
use crate::timer::{Clock, MonotonicClock};
use log::{debug, error, info, warn};
use std::io;

/// how a wait-key session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKey {
    Key(u8),
    /// exit or reset was requested; the instruction must not complete
    Cancelled,
}

/// outcome of one instruction, for the host's benefit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Cancelled,
}

/// what an executing instruction may ask of the machine
pub trait Machine {
    fn cpu(&mut self) -> &mut CpuState;

    /// block until a key arrives, keeping redraw and timers alive
    fn wait_key(&mut self) -> WaitKey;

    fn is_key_pressed(&self, key: u8) -> bool;

    fn play_sound(&mut self, level: u8);

    fn stop_sound(&mut self);
}

/// the opcode table: fetches, decodes and executes one instruction
pub trait Processor {
    fn step(&mut self, machine: &mut dyn Machine) -> Step;
}

impl<F> Processor for F
where
    F: FnMut(&mut dyn Machine) -> Step,
{
    fn step(&mut self, machine: &mut dyn Machine) -> Step {
        self(machine)
    }
}

#[derive(Debug, Default)]
struct Drained {
    key: Option<u8>,
    reset: bool,
}

pub struct Emulator<C: Clock = MonotonicClock> {
    config: EmulatorConfig,
    cpu: CpuState,
    flags: FlagRegister,
    scheduler: Scheduler<C>,
    render: Slot<dyn RenderPlugin>,
    input: Slot<dyn InputPlugin>,
    sound: Slot<dyn SoundPlugin>,
    bus: EventBus,
    initialized: bool,
}

impl Emulator<MonotonicClock> {
    pub fn new(config: EmulatorConfig) -> Self {
        Self::with_clock(config, MonotonicClock)
    }
}

impl Default for Emulator<MonotonicClock> {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

impl<C: Clock> Emulator<C> {
    pub fn with_clock(config: EmulatorConfig, clock: C) -> Self {
        info!("creating emulator");
        let mut flags = FlagRegister::new();
        // every slot starts empty
        flags.set(Flags::FAULTS);
        Emulator {
            cpu: CpuState::new(config.gfx),
            scheduler: Scheduler::new(clock, config.rates),
            config,
            flags,
            render: Slot::new(),
            input: Slot::new(),
            sound: Slot::new(),
            bus: EventBus::new(),
            initialized: false,
        }
    }

    /// power the machine on: fresh memory and registers, timers restarted,
    /// EXIT dropped. installed plugins stay where they are.
    pub fn initialize(&mut self) {
        self.cpu.memory = Chip8MemoryMap::new();
        self.reset_cpu();
        self.scheduler.restart();
        self.flags.wipe();
        for (kind, ready) in [
            (PluginKind::Render, self.render.is_ready()),
            (PluginKind::Input, self.input.is_ready()),
            (PluginKind::Sound, self.sound.is_ready()),
        ] {
            if !ready {
                self.flags.set(kind.fault());
            }
        }
        self.initialized = true;
        info!("emulator initialized");
    }

    /// initialize with a full set of plugins. every plugin is attempted;
    /// without a working render and input the emulator is disposed again.
    /// a missing sound only leaves BAD_SOUND raised.
    pub fn initialize_with(
        &mut self,
        render: Option<Box<dyn RenderPlugin>>,
        input: Option<Box<dyn InputPlugin>>,
        sound: Option<Box<dyn SoundPlugin>>,
    ) -> Result<(), EmulatorError> {
        if self.initialized {
            self.dispose();
        }
        self.initialize();
        let r = self.set_render(render);
        let i = self.set_input(input);
        let s = self.set_sound(sound);

        if !(r && i) {
            let faults = self.flags.faults();
            error!("cannot run without render and input");
            self.dispose();
            return Err(EmulatorError::Unavailable { faults });
        }
        if !s {
            warn!("running without sound");
        }
        self.clean_flags();
        Ok(())
    }

    /// dispose every plugin and empty the slots
    pub fn dispose(&mut self) {
        if let Some(plugin) = self.render.take_disposed() {
            debug!("disposed {}", plugin.name());
        }
        if let Some(plugin) = self.input.take_disposed() {
            debug!("disposed {}", plugin.name());
        }
        if let Some(sound) = self.sound.get_mut() {
            sound.stop();
        }
        if let Some(plugin) = self.sound.take_disposed() {
            debug!("disposed {}", plugin.name());
        }
        self.flags.set(Flags::FAULTS);
        self.initialized = false;
        info!("emulator disposed");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        self.scheduler.clock()
    }

    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, EmulatorError> {
        let len = self.cpu.load_program(reader)?;
        info!("loaded {} byte program", len);
        Ok(len)
    }

    pub fn set_instr_hz(&mut self, hz: u32) {
        self.config.rates.instr_hz = hz;
        self.scheduler.set_instr_hz(hz);
    }

    pub fn set_frame_hz(&mut self, hz: u32) {
        self.config.rates.frame_hz = hz;
        self.scheduler.set_frame_hz(hz);
    }

    // window

    /// resize the render window; the config follows on success
    pub fn set_window_size(&mut self, window: WindowSize) -> Result<(), PluginError> {
        let render = self
            .render
            .get_mut()
            .ok_or(PluginError::NotInitialized(PluginKind::Render))?;
        render.set_resolution(window)?;
        self.config.render.window = window;
        Ok(())
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PluginError> {
        let render = self
            .render
            .get_mut()
            .ok_or(PluginError::NotInitialized(PluginKind::Render))?;
        render.set_fullscreen(fullscreen)?;
        self.config.render.fullscreen = fullscreen;
        Ok(())
    }

    /// foreground colour of lit pixels
    pub fn set_color_filter(&mut self, color: Color) -> Result<(), PluginError> {
        let render = self
            .render
            .get_mut()
            .ok_or(PluginError::NotInitialized(PluginKind::Render))?;
        render.set_color_filter(color)?;
        self.config.render.foreground = color;
        Ok(())
    }

    // host loop

    /// sleep until the next instruction or frame is due; returns at once if
    /// either is already pending
    pub fn halt_for_next_flag(&self) {
        self.scheduler.idle_wait(&self.flags);
    }

    /// pump every plugin, act on what they posted, then tick the timers
    pub fn update_systems(&mut self) {
        assert!(!self.flags.test(Flags::BAD_RENDER), "BAD RENDER");
        assert!(!self.flags.test(Flags::BAD_INPUT), "BAD INPUT");
        self.pump_plugins();
        self.process_events();
        self.update_timers();
    }

    pub fn update_timers(&mut self) {
        self.scheduler
            .tick(&mut self.flags, &mut self.cpu.delay_timer);
    }

    /// consume INSTR and run one instruction. dispatching while render or
    /// input is faulted is a usage error.
    pub fn execute_instr(&mut self, processor: &mut dyn Processor) -> Step {
        assert!(!self.flags.test(Flags::BAD_RENDER), "BAD RENDER");
        assert!(!self.flags.test(Flags::BAD_INPUT), "BAD INPUT");
        self.flags.clear(Flags::INSTR);
        processor.step(self)
    }

    /// consume DRAW and present the graphics buffer
    pub fn draw(&mut self) {
        self.flags.clear(Flags::DRAW);
        if let Some(render) = self.render.get_mut() {
            if let Err(e) = render.draw_buffer() {
                warn!("failed to draw: {e}");
            }
        }
    }

    /// run until EXIT
    pub fn run(&mut self, processor: &mut dyn Processor) {
        while !self.exit_flag() {
            self.halt_for_next_flag();
            self.update_systems();
            if self.instr_flag() {
                self.execute_instr(processor);
            }
            if self.draw_flag() {
                self.draw();
            }
        }
        info!("exit requested");
    }

    /// drop pending work, keep faults and EXIT
    pub fn clean_flags(&mut self) {
        self.flags.clean_keeping_faults();
    }

    pub fn reset(&mut self) {
        info!("resetting machine");
        if !self.flags.test(Flags::BAD_SOUND) {
            if let Some(sound) = self.sound.get_mut() {
                sound.stop();
            }
        }
        self.clean_flags();
        self.reset_cpu();
    }

    fn reset_cpu(&mut self) {
        self.cpu.clean_gfx();
        self.cpu.clean_stack();
        self.cpu.clean_registers();
        self.cpu.set_pc(CHIP8_PROGRAM_ADDR);
    }

    pub fn exit_flag(&self) -> bool {
        self.flags.test(Flags::EXIT)
    }

    pub fn draw_flag(&self) -> bool {
        self.flags.test(Flags::DRAW)
    }

    pub fn instr_flag(&self) -> bool {
        self.flags.test(Flags::INSTR)
    }

    pub fn flags(&self) -> Flags {
        self.flags.bits()
    }

    pub fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    pub fn slot_state(&self, kind: PluginKind) -> SlotState {
        match kind {
            PluginKind::Render => self.render.state(),
            PluginKind::Input => self.input.state(),
            PluginKind::Sound => self.sound.state(),
        }
    }

    fn epoch(&self, kind: PluginKind) -> u64 {
        match kind {
            PluginKind::Render => self.render.epoch(),
            PluginKind::Input => self.input.epoch(),
            PluginKind::Sound => self.sound.epoch(),
        }
    }

    fn pump_plugins(&mut self) {
        if let Some(render) = self.render.get_mut() {
            render.update_events();
        }
        if let Some(input) = self.input.get_mut() {
            input.update_keys();
        }
        if let Some(sound) = self.sound.get_mut() {
            sound.update();
        }
    }

    fn process_events(&mut self) -> Drained {
        let mut drained = Drained::default();
        for envelope in self.bus.drain() {
            if envelope.epoch != self.epoch(envelope.source) {
                warn!(
                    "dropping {:?} from a detached {} plugin",
                    envelope.event, envelope.source
                );
                continue;
            }
            match envelope.event {
                CoreEvent::ExitRequested => {
                    info!("{} plugin requested exit", envelope.source);
                    self.flags.set(Flags::EXIT);
                }
                CoreEvent::ResetRequested => {
                    self.reset();
                    drained.reset = true;
                }
                CoreEvent::KeyPressed(key) => {
                    drained.key.get_or_insert(key);
                }
            }
        }
        drained
    }

    // plugin lifecycle

    /// replace the render plugin; the previous one is disposed
    pub fn set_render(&mut self, render: Option<Box<dyn RenderPlugin>>) -> bool {
        info!("setting new render plugin");
        drop(self.render.take_disposed());
        self.install_render(render)
    }

    /// install `render` and hand the previous plugin back as it was. with
    /// None the previous plugin is disposed before it is handed back.
    pub fn swap_render(
        &mut self,
        render: Option<Box<dyn RenderPlugin>>,
    ) -> Option<Box<dyn RenderPlugin>> {
        if render.is_some() {
            info!("swapping render plugin");
            let old = self.render.take();
            self.install_render(render);
            old
        } else {
            info!("swapping render plugin to none");
            self.flags.set(Flags::BAD_RENDER);
            self.render.take_disposed()
        }
    }

    fn install_render(&mut self, render: Option<Box<dyn RenderPlugin>>) -> bool {
        self.flags.set(Flags::BAD_RENDER);
        let mut render = match render {
            Some(r) => r,
            None => {
                warn!("no render plugin given; running without one");
                return false;
            }
        };
        if !render.is_initialized() {
            if let Err(e) = render.initialize(&self.config.render, self.cpu.gfx_resolution()) {
                error!("cannot initialize {}: {e}", render.name());
                return false;
            }
        }
        render.set_buffer(self.cpu.gfx());
        render.attach(self.bus.sink(PluginKind::Render, self.render.epoch()));
        self.render.put(render);
        self.flags.clear(Flags::BAD_RENDER);
        true
    }

    /// replace the input plugin; the previous one is disposed
    pub fn set_input(&mut self, input: Option<Box<dyn InputPlugin>>) -> bool {
        info!("setting new input plugin");
        drop(self.input.take_disposed());
        self.install_input(input)
    }

    pub fn swap_input(&mut self, input: Option<Box<dyn InputPlugin>>) -> Option<Box<dyn InputPlugin>> {
        if input.is_some() {
            info!("swapping input plugin");
            let old = self.input.take();
            self.install_input(input);
            old
        } else {
            info!("swapping input plugin to none");
            self.flags.set(Flags::BAD_INPUT);
            self.input.take_disposed()
        }
    }

    fn install_input(&mut self, input: Option<Box<dyn InputPlugin>>) -> bool {
        self.flags.set(Flags::BAD_INPUT);
        let mut input = match input {
            Some(i) => i,
            None => {
                warn!("no input plugin given; running without one");
                return false;
            }
        };
        if !input.is_initialized() {
            if let Err(e) = input.initialize() {
                error!("cannot initialize {}: {e}", input.name());
                return false;
            }
        }
        input.attach(self.bus.sink(PluginKind::Input, self.input.epoch()));
        self.input.put(input);
        self.flags.clear(Flags::BAD_INPUT);
        true
    }

    /// replace the sound plugin; the previous one is disposed
    pub fn set_sound(&mut self, sound: Option<Box<dyn SoundPlugin>>) -> bool {
        info!("setting new sound plugin");
        drop(self.sound.take_disposed());
        self.install_sound(sound)
    }

    pub fn swap_sound(&mut self, sound: Option<Box<dyn SoundPlugin>>) -> Option<Box<dyn SoundPlugin>> {
        if sound.is_some() {
            info!("swapping sound plugin");
            let old = self.sound.take();
            self.install_sound(sound);
            old
        } else {
            info!("swapping sound plugin to none");
            self.flags.set(Flags::BAD_SOUND);
            self.sound.take_disposed()
        }
    }

    fn install_sound(&mut self, sound: Option<Box<dyn SoundPlugin>>) -> bool {
        self.flags.set(Flags::BAD_SOUND);
        let mut sound = match sound {
            Some(s) => s,
            None => {
                warn!("no sound plugin given; running without one");
                return false;
            }
        };
        if !sound.is_initialized() {
            if let Err(e) = sound.initialize() {
                error!("cannot initialize {}: {e}", sound.name());
                return false;
            }
        }
        sound.set_countdown_freq(self.config.rates.countdown_hz as f32);
        self.sound.put(sound);
        self.flags.clear(Flags::BAD_SOUND);
        true
    }
}

impl<C: Clock> Machine for Emulator<C> {
    fn cpu(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    fn wait_key(&mut self) -> WaitKey {
        debug!("waiting for a key");
        loop {
            self.pump_plugins();
            let drained = self.process_events();
            self.update_timers();
            // the blocked instruction owns every slot that comes due
            self.flags.clear(Flags::INSTR);

            if self.exit_flag() {
                debug!("wait for key cancelled by exit");
                return WaitKey::Cancelled;
            }
            if drained.reset {
                debug!("wait for key cancelled by reset");
                return WaitKey::Cancelled;
            }
            if let Some(key) = drained.key {
                debug!("key 0x{:x} received", key);
                return WaitKey::Key(key);
            }
            if self.draw_flag() {
                self.draw();
            }
            self.halt_for_next_flag();
        }
    }

    fn is_key_pressed(&self, key: u8) -> bool {
        self.input.get().map_or(false, |i| i.is_key_pressed(key))
    }

    fn play_sound(&mut self, level: u8) {
        if let Some(sound) = self.sound.get_mut() {
            sound.play(level);
        }
    }

    fn stop_sound(&mut self) {
        if let Some(sound) = self.sound.get_mut() {
            sound.stop();
        }
    }
}

impl<C: Clock> Drop for Emulator<C> {
    fn drop(&mut self) {
        if self.initialized {
            self.dispose();
        }
        debug!("destroying emulator");
    }
}
