//! Depth pre-pass: draws every opaque pipeline's indirect commands into the
//! depth attachment only, ahead of color passes (§4.7).
//!
//! Grounded in `src/renderers/renderpasses/DepthPrepass.cpp`.

use crate::backend::{CommandList, ResourceState};
use crate::scene_render_context::SceneRenderContext;

use super::{compile_pipeline_for_material, load_shader_module, FrameResources, RenderPass, STANDARD_SHADER_NAME};

pub struct DepthPrepass {
    depth_resource: u64,
    pipeline: Option<wgpu::RenderPipeline>,
}

impl DepthPrepass {
    #[must_use]
    pub fn new(depth_resource: u64) -> Self {
        Self {
            depth_resource,
            pipeline: None,
        }
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, frame: &FrameResources) {
        if self.pipeline.is_some() {
            return;
        }
        let Ok(shader) = load_shader_module(device, frame.loader, STANDARD_SHADER_NAME) else {
            return;
        };
        let layout = frame.descriptor_sets.pipeline_layout(device, "depth_prepass");
        self.pipeline = Some(compile_pipeline_for_material(
            device,
            &layout,
            &shader,
            frame.color_format,
            frame.depth_format,
            None,
            true,
            "depth_prepass",
        ));
    }
}

impl RenderPass for DepthPrepass {
    fn name(&self) -> &'static str {
        "depth_prepass"
    }

    fn render(&mut self, device: &wgpu::Device, scene: &SceneRenderContext, frame: &FrameResources, cmd: &mut CommandList) {
        cmd.record_transition(self.depth_resource, ResourceState::Undefined, ResourceState::RenderTargetDepth);
        self.ensure_pipeline(device, frame);
        let Some(pipeline) = &self.pipeline else {
            return;
        };

        let bind_groups: Vec<_> = scene
            .opaque_pipelines()
            .filter(|p| p.draw_commands_count() > 0)
            .filter_map(|p| frame.pipeline_bind_group(device, p).map(|bg| (p, bg)))
            .collect();

        let encoder = cmd.encoder_mut();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depth_prepass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: frame.depth_view,
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
}
