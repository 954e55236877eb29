//! Light resources (§3, §4.2, §6 "Global descriptor set" lights UBO).

use crate::handles::{ManagerBase, ResourceId, ResourceManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub kind: LightKind,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    pub casts_shadows: bool,
    /// Index into the shadow-map descriptor array (§4.5), or `None` if this
    /// light does not cast shadows. Allocated by the shadow-map pass, which
    /// fails with [`crate::errors::RenderError::OutOfCapacity`] once
    /// `EngineConfig::max_shadow_maps` is exhausted.
    pub shadow_map_slot: Option<u32>,
}

pub struct LightManager {
    pool: ResourceManager<Light>,
    max_shadow_maps: usize,
    shadow_slots_used: usize,
}

impl LightManager {
    #[must_use]
    pub fn new(capacity: usize, max_shadow_maps: usize) -> Self {
        Self {
            pool: ResourceManager::new("light", capacity),
            max_shadow_maps,
            shadow_slots_used: 0,
        }
    }

    pub fn create(&mut self, mut light: Light) -> crate::errors::Result<ResourceId> {
        if light.casts_shadows {
            if self.shadow_slots_used >= self.max_shadow_maps {
                return Err(crate::errors::RenderError::OutOfCapacity(format!(
                    "shadow map slots exhausted (max {})",
                    self.max_shadow_maps
                )));
            }
            light.shadow_map_slot = Some(self.shadow_slots_used as u32);
            self.shadow_slots_used += 1;
        }
        self.pool.create(light)
    }

    pub fn get(&self, id: ResourceId) -> crate::errors::Result<&Light> {
        self.pool.get(id)
    }

    pub fn destroy(&mut self, id: ResourceId) -> Option<Light> {
        if let Some(light) = self.pool.destroy(id) {
            if light.shadow_map_slot.is_some() {
                self.shadow_slots_used = self.shadow_slots_used.saturating_sub(1);
            }
            Some(light)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Light)> {
        self.pool.iter()
    }
}

impl ManagerBase for LightManager {
    fn kind(&self) -> &'static str {
        "light"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow_light() -> Light {
        Light {
            kind: LightKind::Spot,
            position: [0.0; 3],
            direction: [0.0, -1.0, 0.0],
            color: [1.0; 3],
            intensity: 1.0,
            casts_shadows: true,
            shadow_map_slot: None,
        }
    }

    #[test]
    fn shadow_slots_are_bounded() {
        let mut mgr = LightManager::new(8, 1);
        mgr.create(shadow_light()).unwrap();
        assert!(matches!(
            mgr.create(shadow_light()),
            Err(crate::errors::RenderError::OutOfCapacity(_))
        ));
    }

    #[test]
    fn destroying_a_shadow_light_frees_its_slot() {
        let mut mgr = LightManager::new(8, 1);
        let id = mgr.create(shadow_light()).unwrap();
        mgr.destroy(id);
        assert!(mgr.create(shadow_light()).is_ok());
    }
}
