//! Camera resources (§3, §4.5 "per-view data").

use glam::Mat4;

use crate::handles::{ManagerBase, ResourceId, ResourceManager};

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    /// World-space position, used by the culling compute shader (§4.6) for
    /// distance-based LOD selection — currently unused by culling itself but
    /// kept for parity with the per-view data the shaders expect.
    pub position: [f32; 3],
}

impl Camera {
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

pub struct CameraManager {
    pool: ResourceManager<Camera>,
}

impl CameraManager {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: ResourceManager::new("camera", capacity),
        }
    }

    pub fn create(&mut self, camera: Camera) -> crate::errors::Result<ResourceId> {
        self.pool.create(camera)
    }

    pub fn get(&self, id: ResourceId) -> crate::errors::Result<&Camera> {
        self.pool.get(id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> crate::errors::Result<&mut Camera> {
        self.pool.get_mut(id)
    }

    pub fn destroy(&mut self, id: ResourceId) -> Option<Camera> {
        self.pool.destroy(id)
    }
}

impl ManagerBase for CameraManager {
    fn kind(&self) -> &'static str {
        "camera"
    }
}
