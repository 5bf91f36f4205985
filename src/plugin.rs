use crate::flags::Flags;
use std::fmt;
use std::io;
use thiserror::Error;

/// which capability a backend provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Render,
    Input,
    Sound,
}

impl PluginKind {
    /// the sticky fault bit raised while this capability is unavailable
    pub fn fault(self) -> Flags {
        match self {
            PluginKind::Render => Flags::BAD_RENDER,
            PluginKind::Input => Flags::BAD_INPUT,
            PluginKind::Sound => Flags::BAD_SOUND,
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Render => "render",
            PluginKind::Input => "input",
            PluginKind::Sound => "sound",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("device error: {0}")]
    Device(String),
    #[error("{0} plugin is not initialized")]
    NotInitialized(PluginKind),
}

/// lifecycle every backend shares. initialization takes kind-specific
/// arguments, so it lives on the capability traits.
pub trait Plugin {
    fn name(&self) -> &str;
    fn is_initialized(&self) -> bool;
    /// release the backend's resources; calling it twice is harmless
    fn dispose(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Absent,
    Uninitialized,
    Ready,
}

/// owns at most one backend of a capability.
///
/// the epoch moves on every time an instance leaves the slot, so event sinks
/// issued to an earlier occupant can be told apart from the current one.
pub struct Slot<P: ?Sized> {
    plugin: Option<Box<P>>,
    epoch: u64,
}

impl<P: ?Sized + Plugin> Slot<P> {
    pub fn new() -> Self {
        Slot {
            plugin: None,
            epoch: 0,
        }
    }

    pub fn state(&self) -> SlotState {
        match &self.plugin {
            None => SlotState::Absent,
            Some(p) if p.is_initialized() => SlotState::Ready,
            Some(_) => SlotState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SlotState::Ready
    }

    pub fn is_empty(&self) -> bool {
        self.plugin.is_none()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn get(&self) -> Option<&P> {
        self.plugin.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut P> {
        self.plugin.as_deref_mut()
    }

    /// place a plugin into an empty slot
    pub fn put(&mut self, plugin: Box<P>) {
        assert!(self.plugin.is_none(), "slot already holds a plugin");
        self.plugin = Some(plugin);
    }

    /// hand the current occupant back untouched
    pub fn take(&mut self) -> Option<Box<P>> {
        let plugin = self.plugin.take();
        if plugin.is_some() {
            self.epoch += 1;
        }
        plugin
    }

    /// dispose the current occupant, then hand it back
    pub fn take_disposed(&mut self) -> Option<Box<P>> {
        let mut plugin = self.take()?;
        if plugin.is_initialized() {
            plugin.dispose();
        }
        Some(plugin)
    }
}

impl<P: ?Sized + Plugin> Default for Slot<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePlugin {
        initialized: bool,
    }

    impl Plugin for FakePlugin {
        fn name(&self) -> &str {
            "fake"
        }
        fn is_initialized(&self) -> bool {
            self.initialized
        }
        fn dispose(&mut self) {
            self.initialized = false;
        }
    }

    #[test]
    fn test_slot_states() {
        let mut slot: Slot<dyn Plugin> = Slot::new();
        assert_eq!(slot.state(), SlotState::Absent);
        slot.put(Box::new(FakePlugin { initialized: false }));
        assert_eq!(slot.state(), SlotState::Uninitialized);
        let _ = slot.take();
        slot.put(Box::new(FakePlugin { initialized: true }));
        assert_eq!(slot.state(), SlotState::Ready);
    }

    #[test]
    fn test_take_keeps_plugin_alive() {
        let mut slot: Slot<dyn Plugin> = Slot::new();
        slot.put(Box::new(FakePlugin { initialized: true }));
        let p = slot.take().unwrap();
        assert!(p.is_initialized());
        assert!(slot.is_empty());
        assert_eq!(slot.epoch(), 1);
    }

    #[test]
    fn test_take_disposed() {
        let mut slot: Slot<dyn Plugin> = Slot::new();
        slot.put(Box::new(FakePlugin { initialized: true }));
        let p = slot.take_disposed().unwrap();
        assert!(!p.is_initialized());
        assert_eq!(slot.state(), SlotState::Absent);
    }

    #[test]
    fn test_take_empty_keeps_epoch() {
        let mut slot: Slot<dyn Plugin> = Slot::new();
        assert!(slot.take().is_none());
        assert_eq!(slot.epoch(), 0);
    }

    #[test]
    #[should_panic]
    fn test_one_plugin_per_slot() {
        let mut slot: Slot<dyn Plugin> = Slot::new();
        slot.put(Box::new(FakePlugin { initialized: true }));
        slot.put(Box::new(FakePlugin { initialized: true }));
    }

    #[test]
    fn test_fault_bits() {
        assert_eq!(PluginKind::Render.fault(), Flags::BAD_RENDER);
        assert_eq!(PluginKind::Input.fault(), Flags::BAD_INPUT);
        assert_eq!(PluginKind::Sound.fault(), Flags::BAD_SOUND);
        assert_eq!(PluginKind::Sound.to_string(), "sound");
    }
}
