//! Custom-shader material pass: draws the `shader_material` bucket with
//! per-material custom shaders rather than the standard PBR pipeline
//! (§3 "Shader" material variant, §4.7).

use rustc_hash::FxHashMap;

use crate::backend::CommandList;
use crate::scene_render_context::SceneRenderContext;

use super::{compile_pipeline_for_material, load_shader_module, FrameResources, RenderPass};

/// Caches one `wgpu::RenderPipeline` per `pipeline_id`, since every distinct
/// custom shader module gets its own pipeline (unlike the single shared
/// pipeline the standard PBR passes use).
#[derive(Default)]
pub struct ShaderMaterialPass {
    pipelines: FxHashMap<u32, wgpu::RenderPipeline>,
}

impl ShaderMaterialPass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, frame: &FrameResources, pipeline_id: u32, shader_name: &str) {
        if self.pipelines.contains_key(&pipeline_id) {
            return;
        }
        let Ok(shader) = load_shader_module(device, frame.loader, shader_name) else {
            return;
        };
        let layout = frame.descriptor_sets.pipeline_layout(device, "shader_material_pass");
        let pipeline = compile_pipeline_for_material(
            device,
            &layout,
            &shader,
            frame.color_format,
            frame.depth_format,
            None,
            false,
            shader_name,
        );
        self.pipelines.insert(pipeline_id, pipeline);
    }
}

impl RenderPass for ShaderMaterialPass {
    fn name(&self) -> &'static str {
        "shader_material_pass"
    }

    fn render(&mut self, device: &wgpu::Device, scene: &SceneRenderContext, frame: &FrameResources, cmd: &mut CommandList) {
        for pipeline in scene.shader_material_pipelines() {
            if pipeline.draw_commands_count() == 0 {
                continue;
            }
            let Some(shader_name) = pipeline.shader_name() else {
                continue;
            };
            self.ensure_pipeline(device, frame, pipeline.pipeline_id(), shader_name);
        }

        let Some(color_view) = frame.color_view else {
            return;
        };
        let bind_groups: Vec<_> = scene
            .shader_material_pipelines()
            .filter(|p| p.draw_commands_count() > 0 && self.pipelines.contains_key(&p.pipeline_id()))
            .filter_map(|p| frame.pipeline_bind_group(device, p).map(|bg| (p, bg)))
            .collect();
        if bind_groups.is_empty() {
            return;
        }

        let encoder = cmd.encoder_mut();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shader_material_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
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
        frame.bind_shared(&mut pass);
        for (pipeline_data, bind_group) in &bind_groups {
            let Some(render_pipeline) = self.pipelines.get(&pipeline_data.pipeline_id()) else {
                continue;
            };
            pass.set_pipeline(render_pipeline);
            pass.set_bind_group(3, bind_group, &[]);
            frame.record_indirect_draw(&mut pass, pipeline_data);
        }
    }
}
