use crate::events::{CoreEvent, EventSink};
use crate::plugin::{Plugin, PluginError};
use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use log::{info, warn};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// map of async bytes read from the keyboard to what the chip8 might expect
/// where '1' => 0x01 and 'a' => 0x0a
pub const CHIP8_LITERAL_KEYMAP: [(char, u8); 16] = [
    ('0', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x04),
    ('5', 0x05),
    ('6', 0x06),
    ('7', 0x07),
    ('8', 0x08),
    ('9', 0x09),
    ('a', 0x0a),
    ('b', 0x0b),
    ('c', 0x0c),
    ('d', 0x0d),
    ('e', 0x0e),
    ('f', 0x0f),
];

/// ditto using left-hand side of qwerty keyboard
pub const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00), // x
    ('1', 0x01), // 1
    ('2', 0x02), // 2
    ('3', 0x03), // 3
    ('q', 0x04), // q
    ('w', 0x05), // w
    ('e', 0x06), // e
    ('a', 0x07), // a
    ('s', 0x08), // s
    ('d', 0x09), // d
    ('z', 0x0a), // z
    ('c', 0x0b), // c
    ('4', 0x0c), // 4
    ('r', 0x0d), // r
    ('f', 0x0e), // f
    ('v', 0x0f), // v
];

/// reads keypresses.
///
/// once attached, the backend reports escape (`ExitRequested`), the reset key
/// (`ResetRequested`) and every newly pressed mapped key (`KeyPressed`) to its
/// sink during `update_keys`. the latter is what ends a wait-key session.
pub trait InputPlugin: Plugin {
    fn initialize(&mut self) -> Result<(), PluginError>;

    fn attach(&mut self, sink: EventSink);

    /// pump the keyboard; keys seen now replace the previous update's
    fn update_keys(&mut self);

    fn is_key_pressed(&self, key: u8) -> bool;
}

/// terminal keyboard via crossterm raw mode. esc or ctrl-c quits, F5 resets.
pub struct TermInput {
    initialized: bool,
    buffer: Vec<u8>,
    keymap: HashMap<char, u8>,
    sink: Option<EventSink>,
}

impl TermInput {
    pub fn new() -> Self {
        Self::with_keymap(&CHIP8_CONVENTIONAL_KEYMAP)
    }

    pub fn with_keymap(keymap: &[(char, u8)]) -> Self {
        TermInput {
            initialized: false,
            buffer: Vec::new(),
            keymap: keymap.iter().copied().collect(),
            sink: None,
        }
    }

    fn post(&self, event: CoreEvent) {
        if let Some(sink) = &self.sink {
            sink.post(event);
        }
    }

    fn read_stdin(&mut self) -> Result<(), PluginError> {
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                match evt.code {
                    KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.post(CoreEvent::ExitRequested)
                    }
                    KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                        Some(&mapped_key) => {
                            if !self.buffer.contains(&mapped_key) {
                                self.buffer.push(mapped_key);
                                self.post(CoreEvent::KeyPressed(mapped_key));
                            }
                        }
                        None => warn!("can't map {:?} to a COSMAC key", key),
                    },
                    KeyCode::Esc => self.post(CoreEvent::ExitRequested),
                    KeyCode::F(5) => self.post(CoreEvent::ResetRequested),
                    _ => warn!("unknown key event received"),
                }
            }
        }
        Ok(())
    }
}

impl Default for TermInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TermInput {
    fn name(&self) -> &str {
        "terminal input"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn dispose(&mut self) {
        if self.initialized {
            let _ = terminal::disable_raw_mode();
        }
        self.initialized = false;
        self.buffer.clear();
        self.sink = None;
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl InputPlugin for TermInput {
    fn initialize(&mut self) -> Result<(), PluginError> {
        if self.initialized {
            self.dispose();
        }
        terminal::enable_raw_mode()?;
        self.initialized = true;
        info!("terminal input initialized");
        Ok(())
    }

    fn attach(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn update_keys(&mut self) {
        self.buffer.clear();
        if let Err(e) = self.read_stdin() {
            warn!("failed to read keyboard: {e}");
        }
    }

    fn is_key_pressed(&self, key: u8) -> bool {
        self.buffer.contains(&key)
    }
}

/// one scripted `update_keys` of a DummyInput
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Idle,
    Key(u8),
    Escape,
    Reset,
}

/// dummy Input implementation for testing; replays one action per update
pub struct DummyInput {
    initialized: bool,
    script: VecDeque<InputAction>,
    pressed: Option<u8>,
    sink: Option<EventSink>,
}

impl DummyInput {
    pub fn new(script: &[InputAction]) -> Self {
        DummyInput {
            initialized: false,
            script: script.iter().copied().collect(),
            pressed: None,
            sink: None,
        }
    }

    /// never presses anything
    pub fn idle() -> Self {
        Self::new(&[])
    }
}

impl Plugin for DummyInput {
    fn name(&self) -> &str {
        "dummy input"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn dispose(&mut self) {
        self.initialized = false;
        self.sink = None;
    }
}

impl InputPlugin for DummyInput {
    fn initialize(&mut self) -> Result<(), PluginError> {
        self.initialized = true;
        Ok(())
    }

    fn attach(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn update_keys(&mut self) {
        self.pressed = None;
        let action = self.script.pop_front().unwrap_or(InputAction::Idle);
        let event = match action {
            InputAction::Idle => None,
            InputAction::Key(k) => {
                self.pressed = Some(k);
                Some(CoreEvent::KeyPressed(k))
            }
            InputAction::Escape => Some(CoreEvent::ExitRequested),
            InputAction::Reset => Some(CoreEvent::ResetRequested),
        };
        if let (Some(sink), Some(event)) = (&self.sink, event) {
            sink.post(event);
        }
    }

    fn is_key_pressed(&self, key: u8) -> bool {
        self.pressed == Some(key)
    }
}
