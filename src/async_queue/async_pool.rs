//! Background task pool that reaps finished handles each frame and joins the
//! rest on drop (§4.3).
//!
//! Mirrors `AsyncPool.cpp`'s `_process`/destructor: sweep finished handles
//! out of the pool on every tick, block joining whatever remains when the
//! pool itself goes away.

use std::thread::JoinHandle;

#[derive(Default)]
pub struct AsyncPool {
    tasks: Vec<JoinHandle<()>>,
}

impl AsyncPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, task: impl FnOnce() + Send + 'static) {
        self.tasks.push(std::thread::spawn(task));
    }

    /// Removes handles for tasks that have already finished. Called once per
    /// frame from the render loop so the pool does not grow unboundedly
    /// across the lifetime of the engine.
    pub fn reap_finished(&mut self) {
        self.tasks.retain(|handle| !handle.is_finished());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for AsyncPool {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn reap_finished_drops_completed_handles() {
        let mut pool = AsyncPool::new();
        pool.spawn(|| {});
        std::thread::sleep(Duration::from_millis(20));
        pool.reap_finished();
        assert!(pool.is_empty());
    }

    #[test]
    fn drop_joins_outstanding_tasks() {
        let ran = Arc::new(AtomicBool::new(false));
        {
            let mut pool = AsyncPool::new();
            let ran = ran.clone();
            pool.spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                ran.store(true, Ordering::SeqCst);
            });
        }
        assert!(ran.load(Ordering::SeqCst));
    }
}
