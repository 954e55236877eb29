//! Slab allocator over a GPU-resident buffer (§4.1).
//!
//! A [`DeviceMemoryArray`] is the building block every shared GPU-resident
//! table (vertices, indices, surfaces, mesh-instance data, per-pipeline
//! instance data) is built from: a CPU staging mirror, a first-fit free
//! list, and a lazily (re)created `wgpu::Buffer`.

use std::ops::Range;

use crate::backend::{CommandList, ResourceState};
use crate::errors::{RenderError, Result};

/// A contiguous slab inside a [`DeviceMemoryArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub instance_index: u32,
    pub count: u32,
}

impl MemoryBlock {
    #[must_use]
    pub fn range(self) -> Range<u32> {
        self.instance_index..self.instance_index + self.count
    }
}

/// Fixed-capacity staging+device buffer pair with first-fit slab allocation.
pub struct DeviceMemoryArray {
    label: String,
    stride: usize,
    capacity: u32,
    usage: wgpu::BufferUsages,
    staging: Vec<u8>,
    /// Free slabs, kept sorted by `start` and coalesced on `free`.
    free_list: Vec<Range<u32>>,
    /// Smallest byte range touched by `write` since the last `flush`.
    dirty: Option<Range<usize>>,
    device_buffer: Option<wgpu::Buffer>,
    resource_id: u64,
}

impl DeviceMemoryArray {
    #[must_use]
    pub fn new(label: impl Into<String>, stride: usize, capacity: u32, usage: wgpu::BufferUsages) -> Self {
        Self {
            label: label.into(),
            stride,
            capacity,
            usage,
            staging: vec![0u8; stride * capacity as usize],
            free_list: vec![0..capacity],
            dirty: None,
            device_buffer: None,
            resource_id: crate::handles::generate_resource_id().0,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// First-fit allocation of `count` contiguous slots.
    pub fn alloc(&mut self, count: u32) -> Result<MemoryBlock> {
        if count == 0 {
            return Ok(MemoryBlock {
                instance_index: 0,
                count: 0,
            });
        }
        let pos = self
            .free_list
            .iter()
            .position(|r| r.end - r.start >= count)
            .ok_or_else(|| {
                RenderError::OutOfCapacity(format!(
                    "{} has no free slab of size {count} (capacity {})",
                    self.label, self.capacity
                ))
            })?;

        let slab = self.free_list[pos].clone();
        let block = MemoryBlock {
            instance_index: slab.start,
            count,
        };

        let remaining = slab.start + count..slab.end;
        if remaining.is_empty() {
            self.free_list.remove(pos);
        } else {
            self.free_list[pos] = remaining;
        }

        Ok(block)
    }

    /// Returns `block` to the free list, coalescing with adjacent slabs.
    /// No GPU synchronization is performed; the caller must ensure no frame
    /// still in flight reads the freed range.
    pub fn free(&mut self, block: MemoryBlock) {
        if block.count == 0 {
            return;
        }
        let freed = block.range();
        let pos = self
            .free_list
            .partition_point(|r| r.start < freed.start);
        self.free_list.insert(pos, freed);

        // Coalesce with the following neighbor first, then the preceding one,
        // keeping indices valid either way.
        if pos + 1 < self.free_list.len() && self.free_list[pos].end == self.free_list[pos + 1].start
        {
            self.free_list[pos].end = self.free_list[pos + 1].end;
            self.free_list.remove(pos + 1);
        }
        if pos > 0 && self.free_list[pos - 1].end == self.free_list[pos].start {
            self.free_list[pos - 1].end = self.free_list[pos].end;
            self.free_list.remove(pos);
        }
    }

    /// Writes `src` into the staging mirror at `block.instance_index * stride`.
    pub fn write(&mut self, block: MemoryBlock, src: &[u8]) {
        debug_assert_eq!(src.len(), self.stride * block.count as usize);
        let start = block.instance_index as usize * self.stride;
        let end = start + src.len();
        self.staging[start..end].copy_from_slice(src);

        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(start)..range.end.max(end),
            None => start..end,
        });
    }

    /// Reads back the staging mirror for `block` (debug/test path, §8
    /// property 2 — slab round-trip).
    #[must_use]
    pub fn read_staging(&self, block: MemoryBlock) -> &[u8] {
        let start = block.instance_index as usize * self.stride;
        let end = start + self.stride * block.count as usize;
        &self.staging[start..end]
    }

    /// Copies dirty staging ranges to the device buffer, (re)creating it on
    /// first use. Returns `true` if any bytes were uploaded.
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let buffer = self.device_buffer.get_or_insert_with(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: self.staging.len() as u64,
                usage: self.usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let Some(range) = self.dirty.take() else {
            return false;
        };
        queue.write_buffer(buffer, range.start as u64, &self.staging[range]);
        true
    }

    /// Inserts the `COPY_DST -> SHADER_READ/STORAGE` barrier after a flush.
    /// `storage` selects between a read-only and read/write destination
    /// state depending on whether the buffer backs an SSBO written by a
    /// compute pass (culled draw buffers) or read-only scene data.
    pub fn post_barrier(&self, cmd: &mut CommandList, storage: bool) {
        let to = if storage {
            ResourceState::StorageReadWrite
        } else {
            ResourceState::ShaderRead
        };
        cmd.record_transition(self.resource_id, ResourceState::CopyDst, to);
    }

    #[must_use]
    pub fn device_buffer(&self) -> Option<&wgpu::Buffer> {
        self.device_buffer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array() -> DeviceMemoryArray {
        DeviceMemoryArray::new("test", 4, 16, wgpu::BufferUsages::STORAGE)
    }

    #[test]
    fn alloc_is_first_fit_and_tracks_capacity() {
        let mut arr = array();
        let a = arr.alloc(4).unwrap();
        let b = arr.alloc(4).unwrap();
        assert_eq!(a.instance_index, 0);
        assert_eq!(b.instance_index, 4);
        assert_eq!(arr.capacity(), 16);
    }

    #[test]
    fn alloc_fails_when_exhausted() {
        let mut arr = array();
        arr.alloc(16).unwrap();
        assert!(matches!(arr.alloc(1), Err(RenderError::OutOfCapacity(_))));
    }

    #[test]
    fn free_returns_slab_to_availability() {
        let mut arr = array();
        let a = arr.alloc(8).unwrap();
        let _b = arr.alloc(8).unwrap();
        assert!(arr.alloc(1).is_err());

        arr.free(a);
        let c = arr.alloc(8).unwrap();
        assert_eq!(c.instance_index, 0);
    }

    #[test]
    fn free_coalesces_adjacent_slabs() {
        let mut arr = array();
        let a = arr.alloc(4).unwrap();
        let b = arr.alloc(4).unwrap();
        arr.free(a);
        arr.free(b);
        // Both slabs plus the never-allocated tail should merge into one.
        let whole = arr.alloc(16).unwrap();
        assert_eq!(whole.instance_index, 0);
        assert_eq!(whole.count, 16);
    }

    #[test]
    fn write_then_read_staging_round_trips() {
        let mut arr = array();
        let block = arr.alloc(2).unwrap();
        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        arr.write(block, &payload);
        assert_eq!(arr.read_staging(block), &payload);
    }
}
