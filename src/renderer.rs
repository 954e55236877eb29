//! Render orchestration (§4.7).
//!
//! Grounded in `src/renderers/Renderer.cpp`: `prepare` dispatches frustum
//! culling for every pipeline bucket, renders every shadow map, then the
//! depth pre-pass; `render` binds the shared vertex/index buffers and runs
//! color, shader-material, and transparency passes in that order. Splitting
//! `prepare`/`render` into two command lists (rather than one) lets the
//! swap-chain acquire happen between them without stalling shadow/depth
//! work that does not depend on the swap-chain image (§4.8).

use crate::backend::{CommandList, GpuContext};
use crate::culling::CullingPass;
use crate::errors::Result;
use crate::renderpasses::{DepthPrepass, ForwardColor, FrameResources, RenderPass, ShaderMaterialPass, ShadowMapPass, TransparencyPass};
use crate::resources::LightManager;
use crate::scene_render_context::SceneRenderContext;

pub struct Renderer {
    culling: CullingPass,
    depth_prepass: DepthPrepass,
    shadow_map_pass: ShadowMapPass,
    forward_color: ForwardColor,
    shader_material_pass: ShaderMaterialPass,
    transparency_pass: TransparencyPass,
}

impl Renderer {
    #[must_use]
    pub fn new(backend: &GpuContext, depth_resource: u64, color_resource: u64, max_shadow_maps: usize, clear_color: wgpu::Color) -> Self {
        Self {
            culling: CullingPass::new(&backend.device),
            depth_prepass: DepthPrepass::new(depth_resource),
            shadow_map_pass: ShadowMapPass::new(max_shadow_maps, backend),
            forward_color: ForwardColor::new(color_resource, clear_color),
            shader_material_pass: ShaderMaterialPass::new(),
            transparency_pass: TransparencyPass::new(),
        }
    }

    /// The shadow-map pass's real depth views, for wiring Set 2
    /// `BINDING_SHADOW_MAPS` / Set 4 `BINDING_SHADOW_MAP_TRANSPARENCY_COLOR`.
    #[must_use]
    pub fn shadow_map_views(&self) -> Vec<&wgpu::TextureView> {
        self.shadow_map_pass.views()
    }

    /// Dispatches frustum culling for every pipeline bucket, renders every
    /// shadow-casting light, then the depth pre-pass. Run before the
    /// swap-chain image is acquired, since none of these steps touch it
    /// (§4.8) — `frame.color_view` must be `None` here.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &SceneRenderContext, lights: &LightManager, frame: &FrameResources, cmd: &mut CommandList) -> Result<()> {
        for pipeline in scene
            .opaque_pipelines()
            .chain(scene.shader_material_pipelines())
            .chain(scene.transparent_pipelines())
        {
            self.culling.dispatch(device, queue, pipeline, cmd);
        }

        for (light_id, _light) in lights.iter() {
            self.shadow_map_pass.render_light(light_id, lights, scene, device, frame, cmd);
        }
        self.depth_prepass.render(device, scene, frame, cmd);
        Ok(())
    }

    /// Renders into the acquired swap-chain image: color, then
    /// shader-material, then transparency. `frame.color_view` must be
    /// `Some` here; the shared vertex/index buffers (§4.7 step 1) are bound
    /// by each pass via [`FrameResources::bind_shared`].
    pub fn render(&mut self, device: &wgpu::Device, scene: &SceneRenderContext, frame: &FrameResources, cmd: &mut CommandList) -> Result<()> {
        self.forward_color.render(device, scene, frame, cmd);
        self.shader_material_pass.render(device, scene, frame, cmd);
        self.transparency_pass.render(device, scene, frame, cmd);
        Ok(())
    }
}
