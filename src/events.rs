//! Backend callbacks, as messages.
//!
//! Backends never call into the core directly. Each one is handed an
//! [`EventSink`] when it is wired in and posts [`CoreEvent`]s to it from inside
//! its event-pump call; the core drains the bus right after pumping. A sink is
//! stamped with the slot epoch it was issued for, so once a plugin has been
//! detached anything it still posts is recognisably stale.

use crate::plugin::PluginKind;
use log::{error, trace};

/// what a backend can ask of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    /// window closed or escape pressed
    ExitRequested,
    /// reset key pressed
    ResetRequested,
    /// a mapped CHIP-8 key (0x0..=0xf) went down
    KeyPressed(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub source: PluginKind,
    pub epoch: u64,
    pub event: CoreEvent,
}

/// the sending half given to one plugin instance
#[derive(Debug, Clone)]
pub struct EventSink {
    source: PluginKind,
    epoch: u64,
    sender: flume::Sender<Envelope>,
}

impl EventSink {
    pub fn post(&self, event: CoreEvent) {
        trace!("{} posted {:?}", self.source, event);
        let envelope = Envelope {
            source: self.source,
            epoch: self.epoch,
            event,
        };
        if let Err(e) = self.sender.send(envelope) {
            error!("failed to post {:?}: {e}; core has gone away", event);
        }
    }

    pub fn source(&self) -> PluginKind {
        self.source
    }
}

/// unbounded channel owned by the core
#[derive(Debug)]
pub struct EventBus {
    sender: flume::Sender<Envelope>,
    receiver: flume::Receiver<Envelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        EventBus { sender, receiver }
    }

    pub fn sink(&self, source: PluginKind, epoch: u64) -> EventSink {
        EventSink {
            source,
            epoch,
            sender: self.sender.clone(),
        }
    }

    /// everything posted so far, in posting order, without blocking
    pub fn drain(&self) -> Vec<Envelope> {
        self.receiver.try_iter().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_in_order() {
        let bus = EventBus::new();
        let sink = bus.sink(PluginKind::Input, 3);
        sink.post(CoreEvent::KeyPressed(0x0a));
        sink.post(CoreEvent::ExitRequested);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, CoreEvent::KeyPressed(0x0a));
        assert_eq!(events[0].epoch, 3);
        assert_eq!(events[1].source, PluginKind::Input);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_sinks_are_stamped() {
        let bus = EventBus::new();
        let sink = bus.sink(PluginKind::Render, 1);
        assert_eq!(sink.source(), PluginKind::Render);
        sink.post(CoreEvent::ExitRequested);
        bus.sink(PluginKind::Render, 2).post(CoreEvent::ExitRequested);
        let epochs: Vec<u64> = bus.drain().iter().map(|e| e.epoch).collect();
        assert_eq!(epochs, vec![1, 2]);
    }
}
