//! Per-window swap-chain frame loop: acquire, prepare, render, present
//! (§4.8).
//!
//! Grounded in `src/resources/RenderTarget.cpp`'s `render`: acquire the
//! swap-chain image, submit a "prepare" command list (shadow maps + depth
//! pre-pass, independent of the swap-chain image), then a "render" command
//! list that draws color/shader-material/transparency directly into the
//! acquired swap-chain image's view, bracketed by `Undefined -> RenderTarget
//! -> Present`-equivalent barriers (§4.7, §4.8).

use crate::backend::{CommandList, Fence, GpuContext};
use crate::descriptor_sets::{DescriptorSetLayouts, FrameBindGroups};
use crate::errors::{RenderError, Result};
use crate::renderer::Renderer;
use crate::renderpasses::FrameResources;
use crate::resources::{LightManager, MeshManager};
use crate::scene_render_context::SceneRenderContext;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct FrameData {
    in_flight_fence: Option<Fence>,
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("render_target_depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Owns one `wgpu::Surface`, its depth attachment, and its
/// per-frame-in-flight bookkeeping. Created per rendering window (§3
/// "RenderingWindow").
pub struct RenderTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    frames: Vec<FrameData>,
    paused: bool,
}

impl RenderTarget {
    #[must_use]
    pub fn new(device: &wgpu::Device, surface: wgpu::Surface<'static>, config: wgpu::SurfaceConfiguration, frames_in_flight: u32) -> Self {
        let depth_view = create_depth_view(device, config.width, config.height);
        let frames = (0..frames_in_flight)
            .map(|_| FrameData { in_flight_fence: None })
            .collect();
        Self {
            surface,
            config,
            depth_view,
            frames,
            paused: false,
        }
    }

    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Recreates the swap-chain (and depth attachment) at `width`x`height`.
    /// Idempotent: calling this with the surface's current size is a
    /// harmless no-op (testable property 8), since `wgpu` surface
    /// reconfiguration is itself idempotent for an unchanged size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if self.config.width == width && self.config.height == height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
        self.depth_view = create_depth_view(device, width, height);
    }

    /// Runs one full frame: acquire, prepare, render, present. Returns
    /// `Ok(())` on a transient acquire failure too — the frame loop is
    /// expected to retry on the next tick rather than treat it as fatal
    /// (§7 error handling policy for swap-chain out-of-date).
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        backend: &GpuContext,
        frame_index: usize,
        renderer: &mut Renderer,
        scene: &SceneRenderContext,
        lights: &LightManager,
        meshes: &MeshManager,
        descriptor_sets: &DescriptorSetLayouts,
        frame_bindings: &FrameBindGroups,
        loader: &dyn crate::config::ShaderLoader,
    ) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let frame = &mut self.frames[frame_index];
        if let Some(fence) = frame.in_flight_fence.take() {
            fence.wait(&backend.device);
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost | wgpu::SurfaceError::Timeout) => {
                return Err(RenderError::TransientAcquireFailure("swap chain image not ready".into()));
            }
            Err(other) => {
                return Err(RenderError::BackendFailure(other.to_string()));
            }
        };
        let color_view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let prepare_frame = FrameResources {
            color_view: None,
            depth_view: &self.depth_view,
            color_format: self.config.format,
            depth_format: DEPTH_FORMAT,
            descriptor_sets,
            frame_bindings,
            loader,
            meshes,
            supports_indirect_count: backend.supports_indirect_count,
        };
        let mut prepare_cmd = CommandList::new(&backend.device, "prepare");
        renderer.prepare(&backend.device, &backend.queue, scene, lights, &prepare_frame, &mut prepare_cmd)?;
        let prepare_submission = backend.queue.submit(std::iter::once(prepare_cmd.finish()));

        let render_frame = FrameResources {
            color_view: Some(&color_view),
            ..prepare_frame
        };
        let mut render_cmd = CommandList::new(&backend.device, "render");
        renderer.render(&backend.device, scene, &render_frame, &mut render_cmd)?;
        let submission = backend.queue.submit(std::iter::once(render_cmd.finish()));

        let _ = prepare_submission;
        surface_texture.present();
        self.frames[frame_index].in_flight_fence = Some(Fence::from_submission(submission));
        Ok(())
    }
}
