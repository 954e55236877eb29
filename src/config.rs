//! Engine configuration
//!
//! Gathers everything the `Context` constructor needs: manager capacities,
//! frames-in-flight, shadow/light limits, GPU adapter preferences, and the
//! shader/image loader collaborators (§6 "Shader loader" / "Image loader").

use bitflags::bitflags;

use crate::errors::Result;

bitflags! {
    /// Optional debug/diagnostic render features, toggleable without a
    /// recompile (§6 ambient configuration surface). None of these affect
    /// the scene data model — only what the render passes additionally draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderFeatures: u32 {
        /// Draw mesh-instance AABBs as wireframe boxes.
        const SHOW_BOUNDS = 1 << 0;
        /// Tint draws by which pipeline bucket they belong to.
        const SHOW_PIPELINE_BUCKETS = 1 << 1;
        /// Skip the frustum-culling compute dispatch and draw everything.
        const DISABLE_CULLING = 1 << 2;
    }
}

/// Bounded capacities for the resource managers (§4.2).
///
/// Every manager is a fixed-capacity pool; exceeding these limits surfaces
/// [`crate::errors::RenderError::OutOfCapacity`] rather than growing
/// unboundedly.
#[derive(Debug, Clone, Copy)]
pub struct ManagerCapacities {
    pub max_meshes: usize,
    pub max_materials: usize,
    pub max_images: usize,
    pub max_mesh_instances: usize,
    /// Vertex count budget for the shared vertex `DeviceMemoryArray`.
    pub max_vertices: usize,
    /// Index count budget for the shared index `DeviceMemoryArray`.
    pub max_indices: usize,
    /// Surface-table budget for the shared surface `DeviceMemoryArray`.
    pub max_surfaces: usize,
}

impl Default for ManagerCapacities {
    fn default() -> Self {
        Self {
            max_meshes: 4096,
            max_materials: 4096,
            max_images: 2048,
            max_mesh_instances: 65536,
            max_vertices: 4_000_000,
            max_indices: 12_000_000,
            max_surfaces: 65536,
        }
    }
}

/// Top-level engine configuration, mirroring §6's
/// `Context(backend, capacities, vfs_cfg, framesInFlight)`.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Number of frames the CPU may race ahead of the GPU.
    pub frames_in_flight: u32,
    pub capacities: ManagerCapacities,
    /// Hard cap on simultaneously visible lights in the lights UBO.
    pub max_lights: usize,
    /// Hard cap on shadow-casting lights; each consumes 6 descriptor slots
    /// (cube faces), so the descriptor array is sized `max_shadow_maps * 6`.
    pub max_shadow_maps: usize,
    /// Upper bound on async adds/removes drained per frame by
    /// `SceneContext::process_deferred_operations` (back-pressure).
    pub max_async_nodes_updated_per_frame: usize,
    pub power_preference: wgpu::PowerPreference,
    pub render_features: RenderFeatures,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            capacities: ManagerCapacities::default(),
            max_lights: 256,
            max_shadow_maps: 8,
            max_async_nodes_updated_per_frame: 64,
            power_preference: wgpu::PowerPreference::HighPerformance,
            render_features: RenderFeatures::empty(),
        }
    }
}

/// Shader loader collaborator (§6): names are engine-internal, not file paths.
pub trait ShaderLoader: Send + Sync {
    fn load_shader(&self, name: &str) -> Result<Vec<u8>>;
}

/// Image loader collaborator (§6): decodes an on-disk/network asset into raw
/// pixels. `destroy_image` exists for parity with the collaborator contract;
/// in Rust the pixel buffer is simply dropped.
pub trait ImageLoader: Send + Sync {
    fn load_image(&self, path: &str) -> Result<(Vec<u8>, u32, u32)>;
}

/// The pair of loader collaborators, analogous to a `vfs_cfg`
/// asset-reader configuration.
pub struct VfsConfig {
    pub shader_loader: Box<dyn ShaderLoader>,
    pub image_loader: Box<dyn ImageLoader>,
}
