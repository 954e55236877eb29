//! A deferred queue of closures, drained under a lock held only long enough
//! to swap the pending queue out (§4.3, §5).
//!
//! Mirrors `CommandBuffer.cpp`'s `_process`: take the
//! mutex, `std::mem::take` the queue into a local, drop the lock, then run
//! every closure. Callers pushing from another thread never block behind a
//! closure's own execution time.

use parking_lot::Mutex;

type Command = Box<dyn FnOnce() + Send + 'static>;

pub struct CommandBuffer {
    queue: Mutex<Vec<Command>>,
}

impl CommandBuffer {
    #[must_use]
    pub fn new(reserved_capacity: usize) -> Self {
        Self {
            queue: Mutex::new(Vec::with_capacity(reserved_capacity)),
        }
    }

    /// Enqueues a closure to run on the next [`CommandBuffer::process`] call.
    pub fn push(&self, command: impl FnOnce() + Send + 'static) {
        self.queue.lock().push(Box::new(command));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Swaps the pending queue out under the lock, then runs every queued
    /// closure outside of it.
    pub fn process(&self) {
        let pending = std::mem::take(&mut *self.queue.lock());
        for command in pending {
            command();
        }
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn process_runs_every_queued_command_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let buffer = CommandBuffer::new(4);
        for _ in 0..5 {
            let counter = counter.clone();
            buffer.push(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        buffer.process();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert!(buffer.is_empty());

        // A second process with nothing queued is a no-op, not a panic.
        buffer.process();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
