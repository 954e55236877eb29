//! Per-pipeline draw-command generation (§4.4).
//!
//! Grounded directly in `src/renderers/GraphicPipelineData.cpp`: every
//! material that hashes to the same `pipeline_id` (§3, `resources::material`)
//! shares one [`GraphicPipelineData`], which owns the instance-data slab,
//! the CPU-built draw-command list, and the GPU-side culled-draw buffers the
//! compute culling pass writes into.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::backend::CommandList;
use crate::errors::Result;
use crate::handles::ResourceId;
use crate::memory::{DeviceMemoryArray, MemoryBlock};
use crate::resources::{MaterialManager, Mesh};

/// Per-surface instance data uploaded to the GPU (Set 4 "SceneOpt1" binding,
/// §4.5); indexes back into the mesh-instance and material tables.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceData {
    pub mesh_instance_index: u32,
    pub mesh_surface_index: u32,
    pub material_index: u32,
    pub mesh_surface_material_index: u32,
}

/// Indirect draw command, laid out for `multi_draw_indexed_indirect_count`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

#[derive(Debug, Clone, Copy)]
struct DrawCommand {
    instance_index: u32,
    command: DrawIndexedIndirect,
}

/// Owns every surface whose material's `pipeline_id` matches `pipeline_id`:
/// the instance-data slab, the CPU-authored draw command list, and the
/// device buffers the culling compute pass reads from / writes into.
pub struct GraphicPipelineData {
    pipeline_id: u32,
    /// Set from the first `Shader` material routed into this pipeline, used
    /// by the shader-material/transparency passes to load the right custom
    /// shader module (§4.7). `None` for the standard PBR pipeline.
    shader_name: Option<String>,
    instances_array: DeviceMemoryArray,
    instances_memory_blocks: FxHashMap<ResourceId, MemoryBlock>,
    draw_commands: Vec<DrawCommand>,
    draw_commands_count: u32,
    instances_dirty: bool,
    instances_removed: bool,
    draw_commands_buffer: DeviceMemoryArray,
    culled_draw_commands_buffer: DeviceMemoryArray,
    culled_draw_commands_count_buffer: DeviceMemoryArray,
}

impl GraphicPipelineData {
    #[must_use]
    pub fn new(pipeline_id: u32, max_mesh_surfaces_per_pipeline: u32, shader_name: Option<String>) -> Self {
        let tag = format!("pipeline:{pipeline_id}");
        Self {
            pipeline_id,
            shader_name,
            instances_array: DeviceMemoryArray::new(
                format!("instances:{pipeline_id}"),
                std::mem::size_of::<InstanceData>(),
                max_mesh_surfaces_per_pipeline,
                wgpu::BufferUsages::STORAGE,
            ),
            instances_memory_blocks: FxHashMap::default(),
            draw_commands: Vec::with_capacity(max_mesh_surfaces_per_pipeline as usize),
            draw_commands_count: 0,
            instances_dirty: false,
            instances_removed: false,
            draw_commands_buffer: DeviceMemoryArray::new(
                format!("draw_commands:{tag}"),
                std::mem::size_of::<DrawIndexedIndirect>(),
                max_mesh_surfaces_per_pipeline,
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
            ),
            culled_draw_commands_buffer: DeviceMemoryArray::new(
                format!("culled_draw_commands:{tag}"),
                std::mem::size_of::<DrawIndexedIndirect>(),
                max_mesh_surfaces_per_pipeline,
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
            ),
            culled_draw_commands_count_buffer: DeviceMemoryArray::new(
                format!("culled_draw_commands_count:{tag}"),
                std::mem::size_of::<u32>(),
                1,
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
            ),
        }
    }

    #[inline]
    #[must_use]
    pub fn pipeline_id(&self) -> u32 {
        self.pipeline_id
    }

    #[must_use]
    pub fn shader_name(&self) -> Option<&str> {
        self.shader_name.as_deref()
    }

    /// Adds every surface of `mesh_instance`'s mesh whose material hashes to
    /// this pipeline's id, writing their packed instance data and appending
    /// their draw commands.
    pub fn add_instance(
        &mut self,
        mesh_instance_id: ResourceId,
        mesh_instance: &crate::resources::MeshInstance,
        mesh: &Mesh,
        materials: &MaterialManager,
        mesh_instance_data_block: MemoryBlock,
    ) -> Result<()> {
        let instance_block = self.instances_array.alloc(mesh.surfaces.len() as u32)?;
        self.instances_memory_blocks
            .insert(mesh_instance_id, instance_block);
        self.write_instance(
            mesh_instance,
            mesh,
            materials,
            instance_block,
            mesh_instance_data_block,
        );
        Ok(())
    }

    fn write_instance(
        &mut self,
        mesh_instance: &crate::resources::MeshInstance,
        mesh: &Mesh,
        materials: &MaterialManager,
        instance_block: MemoryBlock,
        mesh_instance_data_block: MemoryBlock,
    ) {
        let mut packed = Vec::new();
        for (i, surface) in mesh.surfaces.iter().enumerate() {
            let material_id = mesh_instance.surface_material(i as u32, mesh);
            let Ok(material) = materials.get(material_id) else {
                continue;
            };
            if material.pipeline_id() != self.pipeline_id {
                continue;
            }
            let id = instance_block.instance_index + packed.len() as u32;
            self.draw_commands.push(DrawCommand {
                instance_index: id,
                command: DrawIndexedIndirect {
                    index_count: surface.index_count,
                    instance_count: 1,
                    first_index: surface.first_index,
                    vertex_offset: mesh.vertices.instance_index as i32,
                    first_instance: id,
                },
            });
            self.draw_commands_count += 1;

            let Ok(surface_material) = materials.get(mesh.surface_material(i)) else {
                continue;
            };
            packed.push(InstanceData {
                mesh_instance_index: mesh_instance_data_block.instance_index,
                mesh_surface_index: mesh.surfaces_block.instance_index + i as u32,
                material_index: material.index,
                mesh_surface_material_index: surface_material.index,
            });
        }
        if !packed.is_empty() {
            self.instances_array
                .write(instance_block, bytemuck::cast_slice(&packed));
            self.instances_dirty = true;
        }
    }

    /// Frees the instance slab for `mesh_instance_id`. Per §4.4, removal does
    /// not immediately recompact the draw command list — the next
    /// `update_data` call rebuilds it from the surviving instances — so a
    /// remove is O(1) even under a high-churn scene.
    pub fn remove_instance(&mut self, mesh_instance_id: ResourceId) {
        if let Some(block) = self.instances_memory_blocks.remove(&mesh_instance_id) {
            self.instances_array.free(block);
            self.draw_commands.clear();
            self.draw_commands_count = 0;
            self.instances_removed = true;
        }
    }

    /// Rebuilds the draw command list after a removal (since removal
    /// invalidates every previously recorded `first_instance`/index), then
    /// flushes the instance-data slab to the device and records its
    /// post-copy barrier.
    pub fn update_data(
        &mut self,
        rebuild: impl Fn(ResourceId, MemoryBlock) -> Option<(crate::resources::MeshInstance, Mesh, MemoryBlock)>,
        materials: &MaterialManager,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cmd: &mut CommandList,
    ) {
        if self.instances_removed {
            let ids: Vec<_> = self.instances_memory_blocks.keys().copied().collect();
            for id in ids {
                let block = self.instances_memory_blocks[&id];
                if let Some((instance, mesh, data_block)) = rebuild(id, block) {
                    self.write_instance(&instance, &mesh, materials, block, data_block);
                }
            }
            self.instances_removed = false;
        }
        if self.instances_dirty {
            self.instances_array.flush(device, queue);
            self.instances_array.post_barrier(cmd, false);

            let mut raw = Vec::with_capacity(self.draw_commands.len());
            for dc in &self.draw_commands {
                raw.push(dc.command);
            }
            if !raw.is_empty() {
                let block = self
                    .draw_commands_buffer
                    .alloc(raw.len() as u32)
                    .unwrap_or(MemoryBlock {
                        instance_index: 0,
                        count: 0,
                    });
                self.draw_commands_buffer
                    .write(block, bytemuck::cast_slice(&raw));
                self.draw_commands_buffer.flush(device, queue);
                self.draw_commands_buffer.post_barrier(cmd, false);
            }
            self.instances_dirty = false;
        }
    }

    #[inline]
    #[must_use]
    pub fn draw_commands_count(&self) -> u32 {
        self.draw_commands_count
    }

    #[must_use]
    pub fn culled_draw_commands_buffer(&self) -> Option<&wgpu::Buffer> {
        self.culled_draw_commands_buffer.device_buffer()
    }

    #[must_use]
    pub fn culled_draw_commands_count_buffer(&self) -> Option<&wgpu::Buffer> {
        self.culled_draw_commands_count_buffer.device_buffer()
    }

    #[must_use]
    pub fn instances_buffer(&self) -> Option<&wgpu::Buffer> {
        self.instances_array.device_buffer()
    }

    /// The pre-cull draw-command buffer the culling compute pass reads as
    /// input (§4.5 `compute`).
    #[must_use]
    pub fn draw_commands_buffer(&self) -> Option<&wgpu::Buffer> {
        self.draw_commands_buffer.device_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Material, MaterialVariant, Mesh, MeshSurface};

    fn block(i: u32, c: u32) -> MemoryBlock {
        MemoryBlock {
            instance_index: i,
            count: c,
        }
    }

    fn simple_material(index: u32) -> Material {
        Material::new(
            MaterialVariant::Standard {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 0.5,
                albedo_texture: None,
            },
            index,
        )
    }

    #[test]
    fn remove_instance_frees_its_slab_and_marks_removed() {
        let mut materials = MaterialManager::new(8);
        let mat_id = materials.create(simple_material(0).variant).unwrap();
        let pipeline_id = materials.get(mat_id).unwrap().pipeline_id();

        let mesh = Mesh {
            vertices: block(0, 4),
            indices: block(0, 6),
            surfaces: smallvec::smallvec![MeshSurface {
                first_index: 0,
                index_count: 6,
                material: mat_id,
            }],
            surfaces_block: block(0, 1),
        };
        let instance = crate::resources::MeshInstance {
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
        let mesh_instance_id = ResourceId(10);

        let mut data = GraphicPipelineData::new(pipeline_id, 64, None);
        data.add_instance(mesh_instance_id, &instance, &mesh, &materials, block(0, 1))
            .unwrap();
        assert_eq!(data.draw_commands_count(), 1);

        data.remove_instance(mesh_instance_id);
        assert_eq!(data.draw_commands_count(), 0);
        assert!(data.instances_removed);
    }
}
