//! Deferred command buffer and background task pool (§4.3).
//!
//! Grounded in `src/utils/CommandBuffer.cpp` and `src/utils/AsyncPool.cpp`'s
//! swap-under-lock discipline, with `flume`-based channels for cross-thread
//! event handoff.

mod async_pool;
mod command_buffer;
mod event_bus;

pub use async_pool::AsyncPool;
pub use command_buffer::CommandBuffer;
pub use event_bus::{Event, EventBus};
