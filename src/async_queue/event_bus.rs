//! Minimal event bus (§6 "Events emitted"), built on an unbounded
//! `flume` channel rather than [`super::CommandBuffer`]'s swap-under-lock
//! `Vec`: events are produced from arbitrary threads (resize callbacks,
//! async resource loads) and drained once per frame by the host
//! application, which is exactly the MPSC handoff `flume` is for.

use crate::handles::ResourceId;

/// Events the render pipeline emits for host-application consumption.
#[derive(Debug, Clone)]
pub enum Event {
    RenderingWindowResized { width: u32, height: u32 },
    RenderTargetLost { id: ResourceId },
    ResourceDestroyed { id: ResourceId },
}

pub struct EventBus {
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Enqueues an event. Cloning the returned sender lets other threads
    /// push events without sharing `&EventBus` directly.
    pub fn push(&self, event: Event) {
        // The receiver is held by `self` for the bus's whole lifetime, so
        // the channel is never disconnected.
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn sender(&self) -> flume::Sender<Event> {
        self.sender.clone()
    }

    /// Drains every event queued since the last call, in send order.
    pub fn drain(&self) -> Vec<Event> {
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
    fn drain_empties_the_queue_and_preserves_order() {
        let bus = EventBus::new();
        bus.push(Event::RenderingWindowResized {
            width: 800,
            height: 600,
        });
        bus.push(Event::ResourceDestroyed { id: ResourceId(1) });

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Event::RenderingWindowResized { .. }));
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn events_can_be_pushed_from_a_cloned_sender() {
        let bus = EventBus::new();
        let sender = bus.sender();
        std::thread::spawn(move || {
            let _ = sender.send(Event::RenderTargetLost { id: ResourceId(7) });
        })
        .join()
        .unwrap();

        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
    }
}
