//! Per-frame scene GPU state: mesh-instance data, lights, shadow-map
//! descriptor slots, and the three pipeline-data buckets (§4.5).
//!
//! Grounded in `src/renderers/SceneRenderContext.cpp`: instances are routed
//! into one of three buckets by their surface material's kind (opaque
//! standard materials, custom shader materials, transparent), each bucket
//! keyed by `pipeline_id` so every distinct shader/blend-state combination
//! gets its own [`GraphicPipelineData`]. `compute`/`draw_*_models` iterate
//! the buckets in a fixed order so the three render passes each see only
//! their bucket.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::backend::CommandList;
use crate::errors::Result;
use crate::handles::ResourceId;
use crate::memory::{DeviceMemoryArray, MemoryBlock};
use crate::pipeline_data::GraphicPipelineData;
use crate::resources::{MaterialManager, MaterialVariant, Mesh, MeshInstance, MeshInstanceManager};

/// GPU-layout per-view uniform data (Set 2 "Scene" binding, §4.5).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneData {
    pub view: [f32; 16],
    pub projection: [f32; 16],
    pub camera_position: [f32; 3],
    pub light_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightData {
    pub kind: u32,
    pub _pad: [u32; 3],
    pub position: [f32; 4],
    pub direction: [f32; 4],
    pub color_and_intensity: [f32; 4],
}

fn which_bucket(material: &crate::resources::Material) -> Bucket {
    match &material.variant {
        MaterialVariant::Standard { .. } => Bucket::Opaque,
        MaterialVariant::Shader { transparent, .. } => {
            if *transparent {
                Bucket::Transparent
            } else {
                Bucket::ShaderMaterial
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    Opaque,
    ShaderMaterial,
    Transparent,
}

/// Owns the scene-wide GPU-resident state shared by every render pass that
/// draws this scene: the per-instance data slab, the lights UBO, and the
/// three pipeline-data buckets (§4.5).
pub struct SceneRenderContext {
    mesh_instances_data_array: DeviceMemoryArray,
    mesh_instances_data_blocks: FxHashMap<ResourceId, MemoryBlock>,
    opaque: FxHashMap<u32, GraphicPipelineData>,
    shader_material: FxHashMap<u32, GraphicPipelineData>,
    transparent: FxHashMap<u32, GraphicPipelineData>,
    max_mesh_surface_per_pipeline: u32,
    /// Set 2 "Scene" `BINDING_SCENE` UBO: one `SceneData` row, rewritten
    /// every frame by `write_frame_uniforms`.
    scene_uniform: DeviceMemoryArray,
    /// Set 2 "Scene" `BINDING_LIGHTS` UBO.
    lights_uniform: DeviceMemoryArray,
}

impl SceneRenderContext {
    #[must_use]
    pub fn new(max_mesh_instances_per_scene: u32, max_mesh_surface_per_pipeline: u32) -> Self {
        Self::with_light_capacity(max_mesh_instances_per_scene, max_mesh_surface_per_pipeline, 256)
    }

    #[must_use]
    pub fn with_light_capacity(
        max_mesh_instances_per_scene: u32,
        max_mesh_surface_per_pipeline: u32,
        max_lights: u32,
    ) -> Self {
        Self {
            mesh_instances_data_array: DeviceMemoryArray::new(
                "mesh_instances_data",
                std::mem::size_of::<crate::resources::MeshInstanceData>(),
                max_mesh_instances_per_scene,
                wgpu::BufferUsages::STORAGE,
            ),
            mesh_instances_data_blocks: FxHashMap::default(),
            opaque: FxHashMap::default(),
            shader_material: FxHashMap::default(),
            transparent: FxHashMap::default(),
            max_mesh_surface_per_pipeline,
            scene_uniform: DeviceMemoryArray::new(
                "scene_uniform",
                std::mem::size_of::<SceneData>(),
                1,
                wgpu::BufferUsages::UNIFORM,
            ),
            lights_uniform: DeviceMemoryArray::new(
                "lights_uniform",
                std::mem::size_of::<LightData>(),
                max_lights.max(1),
                wgpu::BufferUsages::UNIFORM,
            ),
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut FxHashMap<u32, GraphicPipelineData> {
        match bucket {
            Bucket::Opaque => &mut self.opaque,
            Bucket::ShaderMaterial => &mut self.shader_material,
            Bucket::Transparent => &mut self.transparent,
        }
    }

    /// Allocates a mesh-instance-data slab for `mesh_instance_id` and routes
    /// every surface of `mesh` into the pipeline-data bucket its material
    /// kind and `pipeline_id` select (§4.5).
    pub fn add_instance(
        &mut self,
        mesh_instance_id: ResourceId,
        mesh_instance: &MeshInstance,
        mesh: &Mesh,
        materials: &MaterialManager,
    ) -> Result<()> {
        let data_block = self.mesh_instances_data_array.alloc(1)?;
        self.mesh_instances_data_blocks
            .insert(mesh_instance_id, data_block);
        self.mesh_instances_data_array
            .write(data_block, bytemuck::bytes_of(&mesh_instance.gpu_data()));

        let max_per_pipeline = self.max_mesh_surface_per_pipeline;
        let mut routed: FxHashMap<(Bucket, u32), Option<String>> = FxHashMap::default();
        for (i, _surface) in mesh.surfaces.iter().enumerate() {
            let material_id = mesh_instance.surface_material(i as u32, mesh);
            let Ok(material) = materials.get(material_id) else {
                continue;
            };
            let bucket = which_bucket(material);
            let shader_name = match &material.variant {
                MaterialVariant::Shader { shader_name, .. } => Some(shader_name.clone()),
                MaterialVariant::Standard { .. } => None,
            };
            routed.insert((bucket, material.pipeline_id()), shader_name);
        }

        for ((bucket, pipeline_id), shader_name) in routed {
            let entry = self
                .bucket_mut(bucket)
                .entry(pipeline_id)
                .or_insert_with(|| GraphicPipelineData::new(pipeline_id, max_per_pipeline, shader_name));
            entry.add_instance(mesh_instance_id, mesh_instance, mesh, materials, data_block)?;
        }
        Ok(())
    }

    /// Removes `mesh_instance_id` from every bucket it was routed into and
    /// frees its mesh-instance-data slab.
    pub fn remove_instance(&mut self, mesh_instance_id: ResourceId) {
        for bucket in [&mut self.opaque, &mut self.shader_material, &mut self.transparent] {
            for pipeline in bucket.values_mut() {
                pipeline.remove_instance(mesh_instance_id);
            }
        }
        if let Some(block) = self.mesh_instances_data_blocks.remove(&mesh_instance_id) {
            self.mesh_instances_data_array.free(block);
        }
    }

    /// Flushes the shared mesh-instance-data slab to the device, rebuilds
    /// and flushes every pipeline bucket's draw commands (§4.4 `updateData`),
    /// and records their post-copy barriers on `cmd`.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        instances: &MeshInstanceManager,
        mesh_lookup: &dyn Fn(ResourceId) -> Option<Mesh>,
        materials: &MaterialManager,
        cmd: &mut CommandList,
    ) {
        self.mesh_instances_data_array.flush(device, queue);
        self.mesh_instances_data_array.post_barrier(cmd, false);

        let data_blocks = self.mesh_instances_data_blocks.clone();
        let rebuild = |id: ResourceId, _block: MemoryBlock| -> Option<(MeshInstance, Mesh, MemoryBlock)> {
            let instance = instances.get(id).ok()?.clone();
            let mesh = mesh_lookup(instance.mesh)?;
            let data_block = *data_blocks.get(&id)?;
            Some((instance, mesh, data_block))
        };

        for bucket in [&mut self.opaque, &mut self.shader_material, &mut self.transparent] {
            for pipeline in bucket.values_mut() {
                pipeline.update_data(&rebuild, materials, device, queue, cmd);
            }
        }
    }

    /// Rewrites the Set 2 "Scene" UBOs for the current view and light list.
    pub fn write_frame_uniforms(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene_data: SceneData, lights: &[LightData]) {
        self.scene_uniform.write(
            MemoryBlock {
                instance_index: 0,
                count: 1,
            },
            bytemuck::bytes_of(&scene_data),
        );
        self.scene_uniform.flush(device, queue);

        let count = lights.len().min(self.lights_uniform.capacity() as usize) as u32;
        if count > 0 {
            self.lights_uniform.write(
                MemoryBlock {
                    instance_index: 0,
                    count,
                },
                bytemuck::cast_slice(&lights[..count as usize]),
            );
            self.lights_uniform.flush(device, queue);
        }
    }

    #[must_use]
    pub fn scene_uniform_buffer(&self) -> Option<&wgpu::Buffer> {
        self.scene_uniform.device_buffer()
    }

    #[must_use]
    pub fn lights_uniform_buffer(&self) -> Option<&wgpu::Buffer> {
        self.lights_uniform.device_buffer()
    }

    #[must_use]
    pub fn mesh_instances_data_buffer(&self) -> Option<&wgpu::Buffer> {
        self.mesh_instances_data_array.device_buffer()
    }

    /// Draw-command counts per bucket, used by the frustum-culling compute
    /// dispatch (§4.6) to size its workgroup count.
    #[must_use]
    pub fn opaque_draw_count(&self) -> u32 {
        self.opaque.values().map(GraphicPipelineData::draw_commands_count).sum()
    }

    pub fn opaque_pipelines(&self) -> impl Iterator<Item = &GraphicPipelineData> {
        self.opaque.values()
    }

    pub fn shader_material_pipelines(&self) -> impl Iterator<Item = &GraphicPipelineData> {
        self.shader_material.values()
    }

    pub fn transparent_pipelines(&self) -> impl Iterator<Item = &GraphicPipelineData> {
        self.transparent.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{MaterialVariant, MeshSurface};

    fn block(i: u32, c: u32) -> MemoryBlock {
        MemoryBlock {
            instance_index: i,
            count: c,
        }
    }

    #[test]
    fn add_instance_routes_opaque_material_into_opaque_bucket() {
        let mut ctx = SceneRenderContext::new(64, 64);
        let mut materials = MaterialManager::new(8);
        let mat_id = materials
            .create(MaterialVariant::Standard {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 1.0,
                albedo_texture: None,
            })
            .unwrap();

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

        ctx.add_instance(ResourceId(10), &instance, &mesh, &materials).unwrap();
        assert_eq!(ctx.opaque_draw_count(), 1);
        assert_eq!(ctx.shader_material_pipelines().count(), 0);
    }

    #[test]
    fn remove_instance_clears_every_bucket() {
        let mut ctx = SceneRenderContext::new(64, 64);
        let mut materials = MaterialManager::new(8);
        let mat_id = materials
            .create(MaterialVariant::Standard {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 1.0,
                albedo_texture: None,
            })
            .unwrap();
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
        let id = ResourceId(10);
        ctx.add_instance(id, &instance, &mesh, &materials).unwrap();
        ctx.remove_instance(id);
        assert_eq!(ctx.opaque_draw_count(), 0);
    }
}
