//! Shadow-map pass: renders depth-only views from each shadow-casting
//! light's perspective into its slot of the shadow-map descriptor array
//! (§3, §4.5 "maxShadowMaps * 6" sizing, §4.7).

use crate::backend::{CommandList, GpuContext, ResourceState};
use crate::handles::{generate_resource_id, ResourceId};
use crate::resources::LightManager;
use crate::scene_render_context::SceneRenderContext;

use super::{compile_pipeline_for_material, load_shader_module, FrameResources, RenderPass, STANDARD_SHADER_NAME};

const SHADOW_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADOW_MAP_SIZE: u32 = 1024;

struct ShadowTarget {
    resource: u64,
    view: wgpu::TextureView,
}

pub struct ShadowMapPass {
    /// One real depth target per `max_shadow_maps * 6` cube-face slot,
    /// matching the descriptor array sizing in §4.5.
    targets: Vec<ShadowTarget>,
    pipeline: Option<wgpu::RenderPipeline>,
}

impl ShadowMapPass {
    #[must_use]
    pub fn new(max_shadow_maps: usize, backend: &GpuContext) -> Self {
        let targets = (0..max_shadow_maps * 6)
            .map(|_| {
                let texture = backend.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("shadow_map"),
                    size: wgpu::Extent3d {
                        width: SHADOW_MAP_SIZE,
                        height: SHADOW_MAP_SIZE,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: SHADOW_MAP_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                ShadowTarget {
                    resource: generate_resource_id().0,
                    view,
                }
            })
            .collect();
        Self { targets, pipeline: None }
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, frame: &FrameResources) {
        if self.pipeline.is_some() {
            return;
        }
        let Ok(shader) = load_shader_module(device, frame.loader, STANDARD_SHADER_NAME) else {
            return;
        };
        let layout = frame.descriptor_sets.pipeline_layout(device, "shadow_map_pass");
        self.pipeline = Some(compile_pipeline_for_material(
            device,
            &layout,
            &shader,
            frame.color_format,
            SHADOW_MAP_FORMAT,
            None,
            true,
            "shadow_map_pass",
        ));
    }

    /// The shadow-map view assigned to slot `slot`'s first cube face, for
    /// wiring into Set 2 `BINDING_SHADOW_MAPS` / Set 4
    /// `BINDING_SHADOW_MAP_TRANSPARENCY_COLOR`.
    #[must_use]
    pub fn views(&self) -> Vec<&wgpu::TextureView> {
        self.targets.iter().map(|t| &t.view).collect()
    }

    /// Renders the shadow map for `light` into its assigned slot, skipping
    /// lights with no `shadow_map_slot` (not shadow-casting) or whose slot
    /// falls outside this pass's target array (defensive against a
    /// misconfigured `max_shadow_maps`).
    pub fn render_light(
        &mut self,
        light_id: ResourceId,
        lights: &LightManager,
        scene: &SceneRenderContext,
        device: &wgpu::Device,
        frame: &FrameResources,
        cmd: &mut CommandList,
    ) {
        let Ok(light) = lights.get(light_id) else {
            return;
        };
        let Some(slot) = light.shadow_map_slot else {
            return;
        };
        let Some(target) = self.targets.get(slot as usize * 6) else {
            return;
        };
        let resource = target.resource;
        cmd.record_transition(resource, ResourceState::Undefined, ResourceState::RenderTargetDepth);

        self.ensure_pipeline(device, frame);
        if let Some(pipeline) = &self.pipeline {
            let bind_groups: Vec<_> = scene
                .opaque_pipelines()
                .filter(|p| p.draw_commands_count() > 0)
                .filter_map(|p| frame.pipeline_bind_group(device, p).map(|bg| (p, bg)))
                .collect();

            let view = &self.targets[slot as usize * 6].view;
            let encoder = cmd.encoder_mut();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_map_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            frame.bind_shared(&mut pass);
            for (pipeline_data, bind_group) in &bind_groups {
                pass.set_bind_group(3, bind_group, &[]);
                frame.record_indirect_draw(&mut pass, pipeline_data);
            }
        }

        cmd.record_transition(resource, ResourceState::RenderTargetDepth, ResourceState::ShaderRead);
    }
}

impl RenderPass for ShadowMapPass {
    fn name(&self) -> &'static str {
        "shadow_map_pass"
    }

    fn render(&mut self, _device: &wgpu::Device, _scene: &SceneRenderContext, _frame: &FrameResources, _cmd: &mut CommandList) {
        // Driven per-light via `render_light` from the renderer orchestration
        // (§4.7), since each shadow-casting light needs its own view/
        // projection and target slot rather than one shared draw.
    }
}
