//! Render passes (§4.7, §9 trait-based redesign).
//!
//! Grounded in `src/renderers/renderpasses/Renderpass.cpp`/`DepthPrepass.cpp`/
//! `ForwardColor.cpp`: a small base ("load my shaders, know my name") plus
//! one struct per pass. Whether render passes should share one monomorphic
//! struct or be trait objects is resolved here (§9 Decision) as a
//! [`RenderPass`] trait with one impl per pass, driven directly by
//! [`crate::renderer::Renderer`] rather than boxed, since the set of passes
//! is fixed at construction time.

mod depth_prepass;
mod forward_color;
mod shader_material_pass;
mod shadow_map_pass;
mod transparency_pass;

pub use depth_prepass::DepthPrepass;
pub use forward_color::ForwardColor;
pub use shader_material_pass::ShaderMaterialPass;
pub use shadow_map_pass::ShadowMapPass;
pub use transparency_pass::TransparencyPass;

use crate::backend::CommandList;
use crate::config::ShaderLoader;
use crate::descriptor_sets::{DescriptorSetLayouts, FrameBindGroups};
use crate::pipeline_data::GraphicPipelineData;
use crate::resources::MeshManager;
use crate::scene_render_context::SceneRenderContext;

/// Built-in shader name every opaque (Standard-material) pipeline is built
/// against, resolved through the configured [`ShaderLoader`] the same way a
/// custom `Shader` material's name is.
pub const STANDARD_SHADER_NAME: &str = "standard_pbr";

/// Per-frame resources every render pass needs beyond the scene state: the
/// attachments to draw into, the shared descriptor-set layouts and their
/// per-frame bind groups, the shader loader, and the mesh manager owning
/// the shared vertex/index buffers (§4.7 step 1). Bundled so passes don't
/// each carry a growing parameter list as they pick up more GPU state.
pub struct FrameResources<'a> {
    /// `None` during `Renderer::prepare` (shadow maps + depth pre-pass),
    /// since neither touches the swap-chain image and it may not be
    /// acquired yet (§4.8); always `Some` during `Renderer::render`.
    pub color_view: Option<&'a wgpu::TextureView>,
    pub depth_view: &'a wgpu::TextureView,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub descriptor_sets: &'a DescriptorSetLayouts,
    pub frame_bindings: &'a FrameBindGroups,
    pub loader: &'a dyn ShaderLoader,
    pub meshes: &'a MeshManager,
    pub supports_indirect_count: bool,
}

impl FrameResources<'_> {
    /// Binds the shared vertex/index buffers and Sets 0/1/2/4 (every set
    /// except Set 3, which is per-`pipeline_id`), mirroring §4.7 step 1.
    pub fn bind_shared<'p>(&'p self, pass: &mut wgpu::RenderPass<'p>) {
        if let Some(vertices) = self.meshes.vertex_buffer() {
            pass.set_vertex_buffer(0, vertices.slice(..));
        }
        if let Some(indices) = self.meshes.index_buffer() {
            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        }
        pass.set_bind_group(0, &self.frame_bindings.global, &[]);
        pass.set_bind_group(1, &self.frame_bindings.samplers, &[]);
        pass.set_bind_group(2, &self.frame_bindings.scene, &[]);
        pass.set_bind_group(4, &self.frame_bindings.scene_opt1, &[]);
    }

    /// Builds the Set 3 "Pipeline" bind group for one pipeline bucket, or
    /// `None` if it has no GPU-resident instance data yet.
    #[must_use]
    pub fn pipeline_bind_group(&self, device: &wgpu::Device, pipeline: &GraphicPipelineData) -> Option<wgpu::BindGroup> {
        let instances = pipeline.instances_buffer()?;
        Some(self.descriptor_sets.build_pipeline_data(device, instances))
    }

    /// Records the indirect draw for one pipeline bucket's culled commands
    /// (Set 3 must already be bound), falling back to
    /// `multi_draw_indexed_indirect` against the pre-cull count when the
    /// adapter lacks `MULTI_DRAW_INDIRECT_COUNT` (§4.6).
    pub fn record_indirect_draw<'p>(&self, pass: &mut wgpu::RenderPass<'p>, pipeline: &'p GraphicPipelineData) {
        let count = pipeline.draw_commands_count();
        if count == 0 {
            return;
        }
        let Some(draws) = pipeline.culled_draw_commands_buffer() else {
            return;
        };
        if self.supports_indirect_count {
            if let Some(count_buffer) = pipeline.culled_draw_commands_count_buffer() {
                pass.multi_draw_indexed_indirect_count(draws, 0, count_buffer, 0, count);
                return;
            }
        }
        pass.multi_draw_indexed_indirect(draws, 0, count);
    }
}

/// Shared contract every render pass implements (§4.7). `render` is given
/// the scene state and per-frame GPU resources for the current frame and
/// records its draws (and any bracketing barriers) onto `cmd`.
pub trait RenderPass {
    fn name(&self) -> &'static str;

    fn render(&mut self, device: &wgpu::Device, scene: &SceneRenderContext, frame: &FrameResources, cmd: &mut CommandList);
}

/// Loads a compiled shader module by engine-internal name via the
/// configured [`ShaderLoader`], mirroring `Renderpass::loadShader`.
pub fn load_shader_module(device: &wgpu::Device, loader: &dyn ShaderLoader, name: &str) -> crate::errors::Result<wgpu::ShaderModule> {
    let bytes = loader.load_shader(name)?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::util::make_spirv(&bytes),
    }))
}

/// The shared-vertex-buffer layout every render pipeline built by this
/// module reads from, matching [`crate::resources::VertexData`].
#[must_use]
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<crate::resources::VertexData>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRS,
    }
}

/// Builds a `wgpu::RenderPipeline` for a material's shader, shared by
/// [`ShaderMaterialPass`] and [`TransparencyPass`] per the §9 Decision: both
/// passes draw custom-shader materials and would otherwise duplicate
/// pipeline construction. Also used by [`DepthPrepass`]/[`ForwardColor`] to
/// build the single shared pipeline for [`STANDARD_SHADER_NAME`].
/// `depth_only` skips the fragment stage (used by `DepthPrepass` and the
/// shadow-map pass).
pub fn compile_pipeline_for_material(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_only: bool,
    label: &str,
) -> wgpu::RenderPipeline {
    let vertex_layout = vertex_buffer_layout();
    let color_targets = [Some(wgpu::ColorTargetState {
        format: color_format,
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    })];
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: std::slice::from_ref(&vertex_layout),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: if depth_only {
            None
        } else {
            Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            })
        },
        primitive: wgpu::PrimitiveState {
            cull_mode: Some(wgpu::Face::Back),
            ..wgpu::PrimitiveState::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: blend.is_none(),
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
