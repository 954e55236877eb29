//! Image resources and the bindless descriptor array (§3, §4.2, §6).

use crate::errors::Result;
use crate::handles::{ManagerBase, ResourceId, ResourceManager};

pub struct Image {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    /// Index into the bindless `texture_array` binding (Set 0, §4.5).
    pub bindless_index: u32,
}

pub struct ImageManager {
    pool: ResourceManager<Image>,
    next_bindless_index: u32,
    /// Ids of the 1x1 white fallback image and fallback cube map, once
    /// [`ImageManager::ensure_blank_images`] has run. Every descriptor slot a
    /// bind group pads out falls back to the first of these (§3 "every
    /// descriptor slot is either a specific image or the singleton
    /// blankImage").
    blank: Option<(ResourceId, ResourceId)>,
}

impl ImageManager {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: ResourceManager::new("image", capacity),
            next_bindless_index: 0,
            blank: None,
        }
    }

    /// Creates the blank image and blank cube map as ordinary bindless images
    /// (indices 0 and 1) if they don't already exist. Idempotent.
    pub fn ensure_blank_images(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<(ResourceId, ResourceId)> {
        if let Some(ids) = self.blank {
            return Ok(ids);
        }
        let image_id = self.create_solid_white(device, queue, "blank_image")?;
        let cube_id = self.create_solid_white(device, queue, "blank_cube_map")?;
        self.blank = Some((image_id, cube_id));
        Ok((image_id, cube_id))
    }

    fn create_solid_white(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, label: &str) -> Result<ResourceId> {
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            texture.as_image_copy(),
            &[255, 255, 255, 255],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.create(texture, view, 1, 1)
    }

    /// The blank image's view, for padding a bind group's texture array out
    /// to its fixed capacity, once [`ImageManager::ensure_blank_images`] has
    /// run.
    #[must_use]
    pub fn blank_view(&self) -> Option<&wgpu::TextureView> {
        let (id, _) = self.blank?;
        self.get(id).ok().map(|img| &img.view)
    }

    pub fn create(
        &mut self,
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> crate::errors::Result<ResourceId> {
        let bindless_index = self.next_bindless_index;
        self.next_bindless_index += 1;
        self.pool.create(Image {
            texture,
            view,
            width,
            height,
            bindless_index,
        })
    }

    pub fn get(&self, id: ResourceId) -> crate::errors::Result<&Image> {
        self.pool.get(id)
    }

    pub fn destroy(&mut self, id: ResourceId) -> Option<Image> {
        self.pool.destroy(id)
    }

    /// Views suitable for rebuilding the bindless descriptor array's
    /// texture-view list (Set 0, §4.5), ordered by bindless index.
    pub fn bindless_views(&self) -> Vec<(u32, &wgpu::TextureView)> {
        let mut views: Vec<_> = self
            .pool
            .iter()
            .map(|(_, img)| (img.bindless_index, &img.view))
            .collect();
        views.sort_by_key(|(idx, _)| *idx);
        views
    }
}

impl ManagerBase for ImageManager {
    fn kind(&self) -> &'static str {
        "image"
    }
}
