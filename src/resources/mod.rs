//! Scene resources: meshes, materials, images, mesh instances, lights,
//! cameras (§3 DATA MODEL, §4.2).
//!
//! Each resource kind gets its own [`crate::handles::ResourceManager`]
//! instantiation and a newtype id: one manager type per resource kind,
//! sharing a single generic pool implementation.

mod camera;
mod image;
mod light;
mod material;
mod mesh;
mod mesh_instance;

pub use camera::{Camera, CameraManager};
pub use image::{Image, ImageManager};
pub use light::{Light, LightKind, LightManager};
pub use material::{Material, MaterialGpuData, MaterialManager, MaterialVariant};
pub use mesh::{Mesh, MeshManager, MeshSurface, MeshSurfaceGpuData, VertexData};
pub use mesh_instance::{MeshInstance, MeshInstanceData, MeshInstanceManager};
