//! Mesh and mesh-surface resources (§3, §4.2).
//!
//! `MeshManager` owns the shared vertex/index/surface `DeviceMemoryArray`s
//! every `Mesh`'s `MemoryBlock`s are slabs into (§4.1, §4.7 step 1:
//! `bindVertexBuffer + bindIndexBuffer` from `MeshManager`).

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

use crate::backend::CommandList;
use crate::errors::Result;
use crate::handles::{ManagerBase, ResourceId, ResourceManager};
use crate::memory::{DeviceMemoryArray, MemoryBlock};
use crate::resources::MaterialManager;

/// One shared-vertex-buffer vertex: position, normal, and a single UV set.
/// The engine-defined layout every mesh's geometry is uploaded in.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VertexData {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// GPU-layout mirror of [`MeshSurface`], one row per surface in the shared
/// surface table (Set 0 "Global" `BINDING_SURFACES`, §4.5).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshSurfaceGpuData {
    pub first_index: u32,
    pub index_count: u32,
    pub material_index: u32,
    _pad: u32,
}

/// One drawable surface within a mesh, addressed by its material.
#[derive(Debug, Clone, Copy)]
pub struct MeshSurface {
    pub first_index: u32,
    pub index_count: u32,
    pub material: ResourceId,
}

/// Most meshes have only a handful of surfaces (one per material); inlining
/// up to four avoids a heap allocation per mesh in the common case.
pub type MeshSurfaces = SmallVec<[MeshSurface; 4]>;

/// A shared-vertex-buffer mesh: a slab of the vertex/index
/// [`crate::memory::DeviceMemoryArray`]s plus its per-surface material
/// assignment.
#[derive(Clone)]
pub struct Mesh {
    pub vertices: MemoryBlock,
    pub indices: MemoryBlock,
    pub surfaces: MeshSurfaces,
    /// Slab inside the shared surface table; `surfaces_block.instance_index`
    /// is the base offset draw commands reference.
    pub surfaces_block: MemoryBlock,
}

impl Mesh {
    #[must_use]
    pub fn surface_material(&self, surface_index: usize) -> ResourceId {
        self.surfaces[surface_index].material
    }
}

pub struct MeshManager {
    pool: ResourceManager<Mesh>,
    vertices: DeviceMemoryArray,
    indices: DeviceMemoryArray,
    surfaces: DeviceMemoryArray,
}

impl MeshManager {
    #[must_use]
    pub fn new(capacity: usize, max_vertices: u32, max_indices: u32, max_surfaces: u32) -> Self {
        Self {
            pool: ResourceManager::new("mesh", capacity),
            vertices: DeviceMemoryArray::new(
                "mesh_vertices",
                std::mem::size_of::<VertexData>(),
                max_vertices,
                wgpu::BufferUsages::VERTEX,
            ),
            indices: DeviceMemoryArray::new(
                "mesh_indices",
                std::mem::size_of::<u32>(),
                max_indices,
                wgpu::BufferUsages::INDEX,
            ),
            surfaces: DeviceMemoryArray::new(
                "mesh_surfaces",
                std::mem::size_of::<MeshSurfaceGpuData>(),
                max_surfaces,
                wgpu::BufferUsages::STORAGE,
            ),
        }
    }

    /// Allocates vertex/index/surface slabs, uploads their staging data, and
    /// creates the mesh. `surfaces` is `(first_index, index_count, material)`
    /// per surface, in the same order as the index data's draw ranges.
    pub fn create_mesh(
        &mut self,
        vertex_data: &[VertexData],
        index_data: &[u32],
        surfaces: &[(u32, u32, ResourceId)],
        materials: &MaterialManager,
    ) -> Result<ResourceId> {
        let vertices = self.vertices.alloc(vertex_data.len() as u32)?;
        self.vertices.write(vertices, bytemuck::cast_slice(vertex_data));

        let indices = self.indices.alloc(index_data.len() as u32)?;
        self.indices.write(indices, bytemuck::cast_slice(index_data));

        let surfaces_block = self.surfaces.alloc(surfaces.len() as u32)?;
        let mut mesh_surfaces = MeshSurfaces::new();
        let mut gpu_rows = Vec::with_capacity(surfaces.len());
        for &(first_index, index_count, material) in surfaces {
            let material_index = materials.get(material).map(|m| m.index).unwrap_or(0);
            mesh_surfaces.push(MeshSurface {
                first_index,
                index_count,
                material,
            });
            gpu_rows.push(MeshSurfaceGpuData {
                first_index,
                index_count,
                material_index,
                _pad: 0,
            });
        }
        if !gpu_rows.is_empty() {
            self.surfaces
                .write(surfaces_block, bytemuck::cast_slice(&gpu_rows));
        }

        self.pool.create(Mesh {
            vertices,
            indices,
            surfaces: mesh_surfaces,
            surfaces_block,
        })
    }

    pub fn create(&mut self, mesh: Mesh) -> crate::errors::Result<ResourceId> {
        self.pool.create(mesh)
    }

    pub fn get(&self, id: ResourceId) -> crate::errors::Result<&Mesh> {
        self.pool.get(id)
    }

    pub fn destroy(&mut self, id: ResourceId) -> Option<Mesh> {
        self.pool.destroy(id)
    }

    /// Flushes the shared vertex/index/surface tables to the device,
    /// recording their post-copy barriers on `cmd`.
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, cmd: &mut CommandList) {
        if self.vertices.flush(device, queue) {
            self.vertices.post_barrier(cmd, false);
        }
        if self.indices.flush(device, queue) {
            self.indices.post_barrier(cmd, false);
        }
        if self.surfaces.flush(device, queue) {
            self.surfaces.post_barrier(cmd, false);
        }
    }

    /// The shared vertex buffer bound once per frame (§4.7 step 1), once at
    /// least one mesh has been flushed.
    #[must_use]
    pub fn vertex_buffer(&self) -> Option<&wgpu::Buffer> {
        self.vertices.device_buffer()
    }

    /// The shared index buffer bound once per frame (§4.7 step 1).
    #[must_use]
    pub fn index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.indices.device_buffer()
    }

    /// The surfaces SSBO backing `BINDING_SURFACES` (Set 0, §4.5).
    #[must_use]
    pub fn surfaces_buffer(&self) -> Option<&wgpu::Buffer> {
        self.surfaces.device_buffer()
    }
}

impl ManagerBase for MeshManager {
    fn kind(&self) -> &'static str {
        "mesh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(i: u32, c: u32) -> MemoryBlock {
        MemoryBlock {
            instance_index: i,
            count: c,
        }
    }

    #[test]
    fn surface_material_resolves_by_index() {
        let mesh = Mesh {
            vertices: block(0, 4),
            indices: block(0, 6),
            surfaces: smallvec::smallvec![MeshSurface {
                first_index: 0,
                index_count: 6,
                material: ResourceId(7),
            }],
            surfaces_block: block(0, 1),
        };
        assert_eq!(mesh.surface_material(0), ResourceId(7));
    }

    #[test]
    fn destroy_invalidates_handle() {
        let mut mgr = MeshManager::new(4, 64, 64, 16);
        let id = mgr
            .create(Mesh {
                vertices: block(0, 4),
                indices: block(0, 6),
                surfaces: smallvec::smallvec![],
                surfaces_block: block(0, 0),
            })
            .unwrap();
        mgr.destroy(id);
        assert!(mgr.get(id).is_err());
    }
}
