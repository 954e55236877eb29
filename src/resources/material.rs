//! Material resources and pipeline-id hashing (§3, §4.2).
//!
//! Every material resolves to a `pipeline_id`: an XXH32 hash of the
//! shader/blend-state identity that buckets mesh-instance surfaces into the
//! right [`crate::pipeline_data::GraphicPipelineData`] (§4.4), following the
//! same newtype-handle and hashable-mirror-type patterns as
//! `renderer/pipeline/pipeline_id.rs` and `pipeline_key.rs`.

use bytemuck::{Pod, Zeroable};
use xxhash_rust::xxh32::xxh32;

use crate::backend::CommandList;
use crate::handles::{ManagerBase, ResourceId, ResourceManager};
use crate::memory::{DeviceMemoryArray, MemoryBlock};

/// Material variants: the "Standard" PBR parameterization vs. a custom
/// "Shader" material (§3).
#[derive(Debug, Clone)]
pub enum MaterialVariant {
    Standard {
        albedo: [f32; 4],
        metallic: f32,
        roughness: f32,
        albedo_texture: Option<ResourceId>,
    },
    Shader {
        shader_name: String,
        transparent: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Material {
    pub variant: MaterialVariant,
    pub index: u32,
    pipeline_id: u32,
}

impl Material {
    #[must_use]
    pub fn new(variant: MaterialVariant, index: u32) -> Self {
        let pipeline_id = compute_pipeline_id(&variant);
        Self {
            variant,
            index,
            pipeline_id,
        }
    }

    #[inline]
    #[must_use]
    pub fn pipeline_id(&self) -> u32 {
        self.pipeline_id
    }

    #[must_use]
    pub fn is_transparent(&self) -> bool {
        matches!(
            self.variant,
            MaterialVariant::Shader {
                transparent: true,
                ..
            }
        )
    }
}

/// Hashes the identity-relevant bytes of a material variant into a stable
/// 32-bit pipeline bucket id. Two materials with the same shader/texture
/// shape (but different numeric parameters) hash to the same id, since only
/// the pipeline *shape* — not per-instance parameters — determines which
/// `wgpu::RenderPipeline` is needed.
#[must_use]
pub fn compute_pipeline_id(variant: &MaterialVariant) -> u32 {
    let mut key = Vec::with_capacity(32);
    match variant {
        MaterialVariant::Standard {
            albedo_texture, ..
        } => {
            key.push(0u8);
            key.push(u8::from(albedo_texture.is_some()));
        }
        MaterialVariant::Shader {
            shader_name,
            transparent,
        } => {
            key.push(1u8);
            key.push(u8::from(*transparent));
            key.extend_from_slice(shader_name.as_bytes());
        }
    }
    xxh32(&key, 0)
}

/// GPU-layout mirror of a material, one row per `Material::index` in the
/// shared materials table (Set 0 "Global" `BINDING_MATERIALS`, §4.5).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialGpuData {
    pub albedo: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Bindless texture-array index, or `u32::MAX` if untextured.
    pub albedo_texture_index: u32,
    /// Bit 0: this material is a custom-shader material (no PBR params).
    pub flags: u32,
}

impl MaterialGpuData {
    fn from_variant(variant: &MaterialVariant) -> Self {
        match variant {
            MaterialVariant::Standard {
                albedo,
                metallic,
                roughness,
                albedo_texture,
            } => Self {
                albedo: *albedo,
                metallic: *metallic,
                roughness: *roughness,
                albedo_texture_index: albedo_texture.map_or(u32::MAX, |id| id.0 as u32),
                flags: 0,
            },
            MaterialVariant::Shader { .. } => Self {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 1.0,
                albedo_texture_index: u32::MAX,
                flags: 1,
            },
        }
    }
}

/// Owns the material pool plus its GPU-resident mirror table: every material
/// is written into `table` at its own `index` slot (not first-fit allocated —
/// the slot is fixed for the material's lifetime, matching `Material::index`
/// as used by `InstanceData::material_index`, §4.4).
pub struct MaterialManager {
    pool: ResourceManager<Material>,
    table: DeviceMemoryArray,
}

impl MaterialManager {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: ResourceManager::new("material", capacity),
            table: DeviceMemoryArray::new(
                "materials",
                std::mem::size_of::<MaterialGpuData>(),
                capacity as u32,
                wgpu::BufferUsages::STORAGE,
            ),
        }
    }

    pub fn create(&mut self, variant: MaterialVariant) -> crate::errors::Result<ResourceId> {
        let index = self.pool.len() as u32;
        let gpu_data = MaterialGpuData::from_variant(&variant);
        let id = self.pool.create(Material::new(variant, index))?;
        self.table.write(
            MemoryBlock {
                instance_index: index,
                count: 1,
            },
            bytemuck::bytes_of(&gpu_data),
        );
        Ok(id)
    }

    pub fn get(&self, id: ResourceId) -> crate::errors::Result<&Material> {
        self.pool.get(id)
    }

    pub fn destroy(&mut self, id: ResourceId) -> Option<Material> {
        self.pool.destroy(id)
    }

    /// Flushes dirty rows of the materials table to the device, recording its
    /// post-copy barrier on `cmd`.
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, cmd: &mut CommandList) {
        if self.table.flush(device, queue) {
            self.table.post_barrier(cmd, false);
        }
    }

    /// The materials SSBO backing `BINDING_MATERIALS` (Set 0, §4.5), once at
    /// least one [`MaterialManager::flush`] has run.
    #[must_use]
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.table.device_buffer()
    }
}

impl ManagerBase for MaterialManager {
    fn kind(&self) -> &'static str {
        "material"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_shape_materials_share_a_pipeline_id() {
        let a = MaterialVariant::Standard {
            albedo: [1.0, 0.0, 0.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            albedo_texture: None,
        };
        let b = MaterialVariant::Standard {
            albedo: [0.0, 1.0, 0.0, 1.0],
            metallic: 1.0,
            roughness: 0.1,
            albedo_texture: None,
        };
        assert_eq!(compute_pipeline_id(&a), compute_pipeline_id(&b));
    }

    #[test]
    fn textured_and_untextured_standard_materials_diverge() {
        let untextured = MaterialVariant::Standard {
            albedo: [1.0; 4],
            metallic: 0.0,
            roughness: 0.5,
            albedo_texture: None,
        };
        let textured = MaterialVariant::Standard {
            albedo: [1.0; 4],
            metallic: 0.0,
            roughness: 0.5,
            albedo_texture: Some(ResourceId(3)),
        };
        assert_ne!(
            compute_pipeline_id(&untextured),
            compute_pipeline_id(&textured)
        );
    }
}
