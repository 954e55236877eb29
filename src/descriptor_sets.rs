//! The five-set descriptor cascade every draw binds (§4.5).
//!
//! Grounded in `src/renderers/SceneRenderContext.cpp`'s descriptor-layout
//! construction: Set 0 "Global" (materials/surfaces/textures, shared by
//! every pipeline), Set 1 "Samplers", Set 2 "Scene" (per-view uniform data,
//! models, lights, shadow maps), Set 3 "Pipeline" (the per-`pipeline_id`
//! instance-data SSBO), Set 4 "SceneOpt1" (shadow-map-transparency color,
//! used only by the transparency pass). Binding numbers are load-bearing:
//! shaders compiled against this layout address these exact slots.

pub const BINDING_MATERIALS: u32 = 0;
pub const BINDING_SURFACES: u32 = 1;
pub const BINDING_TEXTURES: u32 = 2;

pub const BINDING_SCENE: u32 = 0;
pub const BINDING_MODELS: u32 = 1;
pub const BINDING_LIGHTS: u32 = 2;
pub const BINDING_SHADOW_MAPS: u32 = 3;

pub const BINDING_INSTANCES: u32 = 0;

pub const BINDING_SHADOW_MAP_TRANSPARENCY_COLOR: u32 = 0;

fn storage_entry(binding: u32, read_only: bool, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_array_entry(binding: u32, count: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: std::num::NonZeroU32::new(count),
    }
}

/// The five `wgpu::BindGroupLayout`s, sized against `ManagerCapacities`
/// (texture/shadow-map array lengths are fixed at layout-creation time —
/// every bind group built against this layout must supply exactly that many
/// views, padded with the blank fallback image where the scene has fewer).
pub struct DescriptorSetLayouts {
    pub global: wgpu::BindGroupLayout,
    pub samplers: wgpu::BindGroupLayout,
    pub scene: wgpu::BindGroupLayout,
    pub pipeline_data: wgpu::BindGroupLayout,
    pub scene_opt1: wgpu::BindGroupLayout,
    pub image_capacity: u32,
    pub shadow_map_slots: u32,
}

impl DescriptorSetLayouts {
    #[must_use]
    pub fn new(device: &wgpu::Device, image_capacity: u32, max_shadow_maps: u32) -> Self {
        let shadow_map_slots = max_shadow_maps * 6;
        let global = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global"),
            entries: &[
                storage_entry(BINDING_MATERIALS, true, wgpu::ShaderStages::VERTEX_FRAGMENT),
                storage_entry(BINDING_SURFACES, true, wgpu::ShaderStages::VERTEX_FRAGMENT),
                texture_array_entry(BINDING_TEXTURES, image_capacity.max(1)),
            ],
        });
        let samplers = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("samplers"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            }],
        });
        let scene = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene"),
            entries: &[
                uniform_entry(BINDING_SCENE, wgpu::ShaderStages::VERTEX_FRAGMENT),
                storage_entry(BINDING_MODELS, true, wgpu::ShaderStages::VERTEX),
                uniform_entry(BINDING_LIGHTS, wgpu::ShaderStages::FRAGMENT),
                texture_array_entry(BINDING_SHADOW_MAPS, shadow_map_slots.max(1)),
            ],
        });
        let pipeline_data = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pipeline_data"),
            entries: &[storage_entry(BINDING_INSTANCES, true, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let scene_opt1 = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_opt1"),
            entries: &[texture_array_entry(
                BINDING_SHADOW_MAP_TRANSPARENCY_COLOR,
                shadow_map_slots.max(1),
            )],
        });

        Self {
            global,
            samplers,
            scene,
            pipeline_data,
            scene_opt1,
            image_capacity,
            shadow_map_slots,
        }
    }

    /// The shared pipeline layout every render pipeline is built against:
    /// Sets 0..4 in the fixed cascade order (§4.5).
    #[must_use]
    pub fn pipeline_layout(&self, device: &wgpu::Device, label: &str) -> wgpu::PipelineLayout {
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[
                &self.global,
                &self.samplers,
                &self.scene,
                &self.pipeline_data,
                &self.scene_opt1,
            ],
            push_constant_ranges: &[],
        })
    }

    /// Pads `views` up to `count` entries by repeating `fallback`, since a
    /// bind group built against a fixed-size texture array must supply
    /// exactly that many views.
    fn padded<'a>(views: &[&'a wgpu::TextureView], count: u32, fallback: &'a wgpu::TextureView) -> Vec<&'a wgpu::TextureView> {
        let mut out: Vec<&wgpu::TextureView> = views.iter().copied().take(count as usize).collect();
        while out.len() < count as usize {
            out.push(fallback);
        }
        out
    }

    pub fn build_global(
        &self,
        device: &wgpu::Device,
        materials: &wgpu::Buffer,
        surfaces: &wgpu::Buffer,
        texture_views: &[&wgpu::TextureView],
        blank: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        let views = Self::padded(texture_views, self.image_capacity.max(1), blank);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global"),
            layout: &self.global,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: BINDING_MATERIALS,
                    resource: materials.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_SURFACES,
                    resource: surfaces.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_TEXTURES,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
            ],
        })
    }

    pub fn build_samplers(&self, device: &wgpu::Device, sampler: &wgpu::Sampler) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("samplers"),
            layout: &self.samplers,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(sampler),
            }],
        })
    }

    pub fn build_scene(
        &self,
        device: &wgpu::Device,
        scene_uniform: &wgpu::Buffer,
        models: &wgpu::Buffer,
        lights_uniform: &wgpu::Buffer,
        shadow_map_views: &[&wgpu::TextureView],
        blank: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        let views = Self::padded(shadow_map_views, self.shadow_map_slots.max(1), blank);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene"),
            layout: &self.scene,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: BINDING_SCENE,
                    resource: scene_uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_MODELS,
                    resource: models.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_LIGHTS,
                    resource: lights_uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_SHADOW_MAPS,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
            ],
        })
    }

    pub fn build_pipeline_data(&self, device: &wgpu::Device, instances: &wgpu::Buffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pipeline_data"),
            layout: &self.pipeline_data,
            entries: &[wgpu::BindGroupEntry {
                binding: BINDING_INSTANCES,
                resource: instances.as_entire_binding(),
            }],
        })
    }

    pub fn build_scene_opt1(
        &self,
        device: &wgpu::Device,
        shadow_transparency_views: &[&wgpu::TextureView],
        blank: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        let views = Self::padded(shadow_transparency_views, self.shadow_map_slots.max(1), blank);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_opt1"),
            layout: &self.scene_opt1,
            entries: &[wgpu::BindGroupEntry {
                binding: BINDING_SHADOW_MAP_TRANSPARENCY_COLOR,
                resource: wgpu::BindingResource::TextureViewArray(&views),
            }],
        })
    }
}

/// Bind groups for Sets 0/1/2/4, rebuilt once per frame by
/// [`crate::context::Context`] and shared by every render pass; Set 3
/// (`BINDING_INSTANCES`) is built per `pipeline_id` inside each pass.
pub struct FrameBindGroups {
    pub global: wgpu::BindGroup,
    pub samplers: wgpu::BindGroup,
    pub scene: wgpu::BindGroup,
    pub scene_opt1: wgpu::BindGroup,
}
