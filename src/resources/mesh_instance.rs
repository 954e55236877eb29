//! Mesh instance resources: a placement of a [`crate::resources::Mesh`] in
//! the scene, with optional per-surface material overrides (§3, §4.4).
//!
//! The override-then-fallback surface material resolution and the
//! `u32`-encoded `visible`/`cast_shadows` flags in the packed GPU instance
//! data mirror `src/resources/MeshInstance.cpp`'s `getSurfaceMaterial`.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::handles::{ManagerBase, ResourceId, ResourceManager};

#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh: ResourceId,
    pub world_transform: Mat4,
    pub world_aabb_min: [f32; 3],
    pub world_aabb_max: [f32; 3],
    pub visible: bool,
    pub cast_shadows: bool,
    /// Per-surface material overrides, keyed by surface index. A surface
    /// index absent from this map falls back to the mesh's own surface
    /// material.
    pub materials_override: FxHashMap<u32, ResourceId>,
    /// Total pending dirty-flag updates accepted for this instance this
    /// frame, bounded by `max_updates` to avoid a single hot instance
    /// starving the deferred update queue (§4.4 "maxUpdates").
    pub pending_updates: u32,
    pub max_updates: u32,
}

impl MeshInstance {
    #[must_use]
    pub fn surface_material(&self, surface_index: u32, mesh: &crate::resources::Mesh) -> ResourceId {
        self.materials_override
            .get(&surface_index)
            .copied()
            .unwrap_or_else(|| mesh.surface_material(surface_index as usize))
    }

    /// Packs this instance's world-space data the way the culling compute
    /// shader and draw-command generation expect it (§4.4).
    #[must_use]
    pub fn gpu_data(&self) -> MeshInstanceData {
        MeshInstanceData {
            transform: self.world_transform.to_cols_array(),
            aabb_min: self.world_aabb_min,
            _pad0: 0.0,
            aabb_max: self.world_aabb_max,
            visible: u32::from(self.visible),
            cast_shadows: u32::from(self.cast_shadows),
            _pad1: [0; 2],
        }
    }

    /// Records a pending update, returning `false` once `max_updates` is
    /// exhausted for the frame (back-pressure on hot instances).
    #[must_use]
    pub fn record_update(&mut self) -> bool {
        if self.pending_updates >= self.max_updates {
            return false;
        }
        self.pending_updates += 1;
        true
    }

    pub fn reset_pending_updates(&mut self) {
        self.pending_updates = 0;
    }
}

/// GPU-layout mirror of [`MeshInstance`], written into the shared
/// mesh-instance-data `DeviceMemoryArray` (§4.1, §4.4).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshInstanceData {
    pub transform: [f32; 16],
    pub aabb_min: [f32; 3],
    _pad0: f32,
    pub aabb_max: [f32; 3],
    pub visible: u32,
    pub cast_shadows: u32,
    _pad1: [u32; 2],
}

pub struct MeshInstanceManager {
    pool: ResourceManager<MeshInstance>,
}

impl MeshInstanceManager {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: ResourceManager::new("mesh_instance", capacity),
        }
    }

    pub fn create(&mut self, instance: MeshInstance) -> crate::errors::Result<ResourceId> {
        self.pool.create(instance)
    }

    pub fn get(&self, id: ResourceId) -> crate::errors::Result<&MeshInstance> {
        self.pool.get(id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> crate::errors::Result<&mut MeshInstance> {
        self.pool.get_mut(id)
    }

    pub fn destroy(&mut self, id: ResourceId) -> Option<MeshInstance> {
        self.pool.destroy(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &MeshInstance)> {
        self.pool.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ResourceId, &mut MeshInstance)> {
        self.pool.iter_mut()
    }
}

impl ManagerBase for MeshInstanceManager {
    fn kind(&self) -> &'static str {
        "mesh_instance"
    }
}

/// Legacy alias kept only so call sites that still speak in terms of a plain
/// `HashMap<ResourceId, MemoryBlock>` (the per-mesh-instance memory blocks
/// the pipeline data structures key their updates by, §4.1) type-check
/// without importing `rustc_hash` directly.
pub type MeshInstanceMemoryBlocks = HashMap<ResourceId, crate::memory::MemoryBlock>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlock;
    use crate::resources::{Mesh, MeshSurface};

    fn mesh_with_material(id: u64) -> Mesh {
        Mesh {
            vertices: MemoryBlock {
                instance_index: 0,
                count: 4,
            },
            indices: MemoryBlock {
                instance_index: 0,
                count: 6,
            },
            surfaces: smallvec::smallvec![MeshSurface {
                first_index: 0,
                index_count: 6,
                material: ResourceId(id),
            }],
            surfaces_block: MemoryBlock {
                instance_index: 0,
                count: 1,
            },
        }
    }

    fn instance(mesh: ResourceId) -> MeshInstance {
        MeshInstance {
            mesh,
            world_transform: Mat4::IDENTITY,
            world_aabb_min: [0.0; 3],
            world_aabb_max: [1.0; 3],
            visible: true,
            cast_shadows: true,
            materials_override: FxHashMap::default(),
            pending_updates: 0,
            max_updates: 2,
        }
    }

    #[test]
    fn override_takes_precedence_over_mesh_material() {
        let mesh = mesh_with_material(1);
        let mut inst = instance(ResourceId(99));
        assert_eq!(inst.surface_material(0, &mesh), ResourceId(1));

        inst.materials_override.insert(0, ResourceId(42));
        assert_eq!(inst.surface_material(0, &mesh), ResourceId(42));
    }

    #[test]
    fn gpu_data_packs_bools_as_u32() {
        let mut inst = instance(ResourceId(1));
        inst.visible = false;
        inst.cast_shadows = true;
        let data = inst.gpu_data();
        assert_eq!(data.visible, 0);
        assert_eq!(data.cast_shadows, 1);
    }

    #[test]
    fn record_update_respects_max_updates() {
        let mut inst = instance(ResourceId(1));
        assert!(inst.record_update());
        assert!(inst.record_update());
        assert!(!inst.record_update());
        inst.reset_pending_updates();
        assert!(inst.record_update());
    }
}
