//! Stable resource handles and the generic resource pool.
//!
//! Every scene resource (mesh, material, image, mesh instance) is addressed
//! by a [`ResourceId`]: a 64-bit monotone counter that is never reused, unlike
//! a generational `slotmap` key. This matches the handle-stability invariant
//! in the data model — a destroyed id must fail deterministically forever,
//! not be silently handed to a new resource.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::errors::{RenderError, Result};

/// Reserved id meaning "no resource". `ResourceId::INVALID.0 == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub const INVALID: ResourceId = ResourceId(0);

    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Global monotone id generator shared by every manager.
///
/// A single counter (rather than one per manager) means ids are unique
/// across resource kinds too, which simplifies logging and the deferred
/// command buffer (a single `ResourceId` is enough to unambiguously name
/// "the thing that was removed").
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[must_use]
pub fn generate_resource_id() -> ResourceId {
    ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Bounded, handle-stable pool of resources of type `T` (§4.2).
///
/// `create` hands back a [`ResourceId`] that remains valid until the matching
/// `destroy`; after that, `get` fails deterministically rather than aliasing
/// a later resource, since ids are never recycled.
pub struct ResourceManager<T> {
    label: &'static str,
    capacity: usize,
    entries: FxHashMap<ResourceId, T>,
}

impl<T> ResourceManager<T> {
    #[must_use]
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            capacity,
            entries: FxHashMap::default(),
        }
    }

    /// Inserts `value`, returning its freshly minted, never-reused id.
    pub fn create(&mut self, value: T) -> Result<ResourceId> {
        if self.entries.len() >= self.capacity {
            return Err(RenderError::OutOfCapacity(format!(
                "{} manager is full (capacity {})",
                self.label, self.capacity
            )));
        }
        let id = generate_resource_id();
        self.entries.insert(id, value);
        Ok(id)
    }

    pub fn get(&self, id: ResourceId) -> Result<&T> {
        self.entries.get(&id).ok_or_else(|| {
            RenderError::InvalidHandle(format!("{} id {} does not exist", self.label, id.0))
        })
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Result<&mut T> {
        let label = self.label;
        self.entries.get_mut(&id).ok_or_else(|| {
            RenderError::InvalidHandle(format!("{label} id {} does not exist", id.0))
        })
    }

    /// Removes and returns the resource, if it existed. Does not reuse `id`.
    pub fn destroy(&mut self, id: ResourceId) -> Option<T> {
        self.entries.remove(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every live entry. Callers on the render thread may
    /// assume no concurrent mutation for the current frame (§5).
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &T)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ResourceId, &mut T)> {
        self.entries.iter_mut().map(|(id, v)| (*id, v))
    }
}

/// Lifecycle hooks shared by every domain manager, used by the central
/// registry to drive per-frame bookkeeping without the registry knowing the
/// concrete manager type (the `ManagerKind` tagged-union design from §9).
pub trait ManagerBase {
    /// Human-readable tag used in error messages and logging.
    fn kind(&self) -> &'static str;

    /// Opportunistically flush any deferred GPU work. Returns `true` if the
    /// flush fully completed (mirrors the `try_to_lock` discipline of §5 —
    /// a manager may decline to flush if internally contended and retry next
    /// frame).
    fn flush(&mut self) -> bool {
        true
    }
}

/// Central type-tagged registry so the render thread can look up a manager
/// by kind without holding a back-pointer from the resource to its manager
/// (§9 "cyclic/backref ownership").
#[derive(Default)]
pub struct ManagerRegistry {
    managers: HashMap<&'static str, ()>,
}

impl ManagerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a manager kind so other systems can assert it has been
    /// enrolled (e.g. before wiring descriptor sets that depend on it).
    pub fn enroll<M: ManagerBase>(&mut self, manager: &M) {
        self.managers.insert(manager.kind(), ());
    }

    #[must_use]
    pub fn is_enrolled(&self, kind: &str) -> bool {
        self.managers.contains_key(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotone() {
        let a = generate_resource_id();
        let b = generate_resource_id();
        assert!(a.0 < b.0);
        assert_ne!(a, b);
    }

    #[test]
    fn handle_stability_across_destroy() {
        let mut mgr: ResourceManager<&'static str> = ResourceManager::new("test", 4);
        let id = mgr.create("hello").unwrap();
        assert_eq!(*mgr.get(id).unwrap(), "hello");

        mgr.destroy(id);
        assert!(mgr.get(id).is_err());

        // A later create must never reuse `id`.
        let id2 = mgr.create("world").unwrap();
        assert_ne!(id, id2);
        assert!(mgr.get(id).is_err());
        assert_eq!(*mgr.get(id2).unwrap(), "world");
    }

    #[test]
    fn capacity_is_enforced() {
        let mut mgr: ResourceManager<u32> = ResourceManager::new("test", 2);
        mgr.create(1).unwrap();
        mgr.create(2).unwrap();
        assert!(matches!(
            mgr.create(3),
            Err(RenderError::OutOfCapacity(_))
        ));
    }
}
