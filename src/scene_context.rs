//! Per-frame fan-out of scene mutations across frames-in-flight (§4.6).
//!
//! Grounded in `src/resources/SceneContext.cpp`: `add_instance`/
//! `remove_instance` push onto every frame's pending lists under one lock;
//! `process_deferred_operations` drains them in a fixed order — immediate
//! removes, then bounded async removes, then immediate adds, then bounded
//! async adds, then updates — so a node added and removed in the same frame
//! never briefly appears in the renderer, and async batches cannot starve
//! the frame loop.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::errors::Result;
use crate::handles::ResourceId;
use crate::resources::{MaterialManager, Mesh, MeshInstanceManager};
use crate::scene_render_context::SceneRenderContext;

#[derive(Default)]
struct FrameDeltas {
    added_nodes: Vec<ResourceId>,
    added_nodes_async: VecDeque<ResourceId>,
    removed_nodes: Vec<ResourceId>,
    removed_nodes_async: VecDeque<ResourceId>,
    updated_nodes: Vec<ResourceId>,
}

/// Owns one [`SceneRenderContext`] per frame-in-flight and the deferred
/// add/remove/update queues that keep each frame's GPU-resident view of the
/// scene consistent without the render thread blocking on scene-tree
/// mutations from other threads.
pub struct SceneContext {
    frames: Vec<SceneRenderContext>,
    deltas: Mutex<Vec<FrameDeltas>>,
    max_async_nodes_updated_per_frame: usize,
}

impl SceneContext {
    #[must_use]
    pub fn new(
        frames_in_flight: u32,
        max_mesh_instances_per_scene: u32,
        max_mesh_surface_per_pipeline: u32,
        max_async_nodes_updated_per_frame: usize,
    ) -> Self {
        let frames = (0..frames_in_flight)
            .map(|_| SceneRenderContext::new(max_mesh_instances_per_scene, max_mesh_surface_per_pipeline))
            .collect();
        let deltas = (0..frames_in_flight).map(|_| FrameDeltas::default()).collect();
        Self {
            frames,
            deltas: Mutex::new(deltas),
            max_async_nodes_updated_per_frame,
        }
    }

    /// Queues `mesh_instance_id` for addition in every frame-in-flight.
    /// `async_` routes the add onto the bounded async queue instead of the
    /// unbounded immediate one (§4.6 "async flag").
    pub fn add_instance(&self, mesh_instance_id: ResourceId, async_: bool) {
        let mut deltas = self.deltas.lock();
        for frame in deltas.iter_mut() {
            if async_ {
                frame.added_nodes_async.push_back(mesh_instance_id);
            } else {
                frame.added_nodes.push(mesh_instance_id);
            }
        }
    }

    pub fn remove_instance(&self, mesh_instance_id: ResourceId, async_: bool) {
        let mut deltas = self.deltas.lock();
        for frame in deltas.iter_mut() {
            if async_ {
                frame.removed_nodes_async.push_back(mesh_instance_id);
            } else {
                frame.removed_nodes.push(mesh_instance_id);
            }
        }
    }

    pub fn update_instance(&self, mesh_instance_id: ResourceId) {
        let mut deltas = self.deltas.lock();
        for frame in deltas.iter_mut() {
            frame.updated_nodes.push(mesh_instance_id);
        }
    }

    /// Drains `frame_index`'s pending deltas into its [`SceneRenderContext`],
    /// in the fixed order: immediate removes, bounded async removes,
    /// immediate adds, bounded async adds, updates. A node present in both
    /// `updated_nodes` and a remove/add list is deduplicated by removing it
    /// from `updated_nodes` as each remove/add is applied, mirroring
    /// `SceneContext.cpp`'s `updatedNodes.remove(mi)` calls.
    pub fn process_deferred_operations(
        &mut self,
        frame_index: usize,
        instances: &MeshInstanceManager,
        meshes: &impl Fn(ResourceId) -> Option<Mesh>,
        materials: &MaterialManager,
    ) -> Result<()> {
        let mut deltas = self.deltas.lock();
        let data = &mut deltas[frame_index];
        let scene = &mut self.frames[frame_index];

        let dedup_updated = |updated: &mut Vec<ResourceId>, id: ResourceId| {
            updated.retain(|&u| u != id);
        };

        for id in data.removed_nodes.drain(..) {
            scene.remove_instance(id);
            dedup_updated(&mut data.updated_nodes, id);
        }

        let mut async_removed = 0;
        while async_removed < self.max_async_nodes_updated_per_frame {
            let Some(id) = data.removed_nodes_async.pop_front() else {
                break;
            };
            scene.remove_instance(id);
            dedup_updated(&mut data.updated_nodes, id);
            async_removed += 1;
        }

        for id in data.added_nodes.drain(..) {
            if let (Ok(instance), Some(mesh)) = (instances.get(id), meshes(id)) {
                scene.add_instance(id, instance, &mesh, materials)?;
            }
            dedup_updated(&mut data.updated_nodes, id);
        }

        let mut async_added = 0;
        while async_added < self.max_async_nodes_updated_per_frame {
            let Some(id) = data.added_nodes_async.pop_front() else {
                break;
            };
            if let (Ok(instance), Some(mesh)) = (instances.get(id), meshes(id)) {
                scene.add_instance(id, instance, &mesh, materials)?;
            }
            dedup_updated(&mut data.updated_nodes, id);
            async_added += 1;
        }

        for id in data.updated_nodes.drain(..) {
            if let (Ok(instance), Some(mesh)) = (instances.get(id), meshes(id)) {
                scene.remove_instance(id);
                scene.add_instance(id, instance, &mesh, materials)?;
            }
        }

        Ok(())
    }

    pub fn frame(&self, frame_index: usize) -> &SceneRenderContext {
        &self.frames[frame_index]
    }

    pub fn frame_mut(&mut self, frame_index: usize) -> &mut SceneRenderContext {
        &mut self.frames[frame_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{MaterialVariant, MeshInstance, MeshSurface};

    fn block(i: u32, c: u32) -> crate::memory::MemoryBlock {
        crate::memory::MemoryBlock {
            instance_index: i,
            count: c,
        }
    }

    fn mesh_with(mat_id: ResourceId) -> Mesh {
        Mesh {
            vertices: block(0, 4),
            indices: block(0, 6),
            surfaces: smallvec::smallvec![MeshSurface {
                first_index: 0,
                index_count: 6,
                material: mat_id,
            }],
            surfaces_block: block(0, 1),
        }
    }

    #[test]
    fn add_then_remove_same_frame_nets_to_nothing() {
        let mut ctx = SceneContext::new(1, 64, 64, 8);
        let mut instances = MeshInstanceManager::new(8);
        let mut materials = MaterialManager::new(8);
        let mat_id = materials
            .create(MaterialVariant::Standard {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 1.0,
                albedo_texture: None,
            })
            .unwrap();
        let instance = MeshInstance {
            mesh: ResourceId(1),
            world_transform: glam::Mat4::IDENTITY,
            world_aabb_min: [0.0; 3],
            world_aabb_max: [1.0; 3],
            visible: true,
            cast_shadows: false,
            materials_override: rustc_hash::FxHashMap::default(),
            pending_updates: 0,
            max_updates: 4,
        };
        let id = instances.create(instance).unwrap();
        let mesh = mesh_with(mat_id);

        ctx.add_instance(id, false);
        ctx.remove_instance(id, false);

        ctx.process_deferred_operations(0, &instances, &|i| {
            if i == id {
                Some(mesh_with(mat_id))
            } else {
                None
            }
        }, &materials)
        .unwrap();

        assert_eq!(ctx.frame(0).opaque_draw_count(), 0);
        let _ = mesh;
    }

    #[test]
    fn async_removes_are_bounded_per_frame() {
        let mut ctx = SceneContext::new(1, 64, 64, 1);
        let instances = MeshInstanceManager::new(8);
        let materials = MaterialManager::new(8);
        ctx.remove_instance(ResourceId(1), true);
        ctx.remove_instance(ResourceId(2), true);
        ctx.process_deferred_operations(0, &instances, &|_| None, &materials)
            .unwrap();
        // Only one of the two async removes should have been drained.
        let remaining = ctx.deltas.lock()[0].removed_nodes_async.len();
        assert_eq!(remaining, 1);
    }
}
