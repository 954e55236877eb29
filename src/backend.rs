//! GPU backend wrapper.
//!
//! The scene render pipeline is built against `wgpu` as the concrete
//! Vulkan/D3D12-style backend (§6): `wgpu::Device`/`wgpu::Queue` stand in for
//! "the GPU backend", `wgpu::CommandEncoder` for a command list, and
//! `wgpu::SubmissionIndex` (waited on via `Device::poll`) for a fence.
//!
//! wgpu tracks most resource-state transitions for you, but the scene render
//! pipeline still needs to *reason about* barrier ordering (testable
//! property 7: every render-target write is bracketed by a transition out of
//! `Undefined` and into `CopySrc`/`Present`). [`CommandList`] records the
//! transitions it issues into a small log so tests can assert on ordering
//! without a real adapter.

use crate::errors::{RenderError, Result};

/// Coarse resource states relevant to the barriers this crate issues. Not an
/// exhaustive mirror of a Vulkan/D3D12 state enum — only what the scene
/// render pipeline's own barrier sites need to express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Undefined,
    CopyDst,
    CopySrc,
    ShaderRead,
    StorageReadWrite,
    IndirectDrawSrc,
    RenderTargetColor,
    RenderTargetDepth,
    Present,
}

/// One recorded transition, kept for test assertions and trace logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierRecord {
    pub resource: u64,
    pub from: ResourceState,
    pub to: ResourceState,
}

/// A single command list plus its barrier log, wrapping one
/// `wgpu::CommandEncoder`.
///
/// One `CommandList` is opened per logical command buffer (the "prepare"
/// list and the "render" list, per §4.8) and submitted once `finish` is
/// called.
pub struct CommandList {
    encoder: wgpu::CommandEncoder,
    barriers: Vec<BarrierRecord>,
}

impl CommandList {
    #[must_use]
    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });
        Self {
            encoder,
            barriers: Vec::new(),
        }
    }

    #[must_use]
    pub fn encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    /// Records a logical state transition. wgpu performs the actual resource
    /// tracking; this call exists so the engine's own invariants (barrier
    /// correctness) remain checkable.
    pub fn record_transition(&mut self, resource: u64, from: ResourceState, to: ResourceState) {
        self.barriers.push(BarrierRecord { resource, from, to });
    }

    #[must_use]
    pub fn barriers(&self) -> &[BarrierRecord] {
        &self.barriers
    }

    #[must_use]
    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }
}

/// A GPU submission fence: a `wgpu::SubmissionIndex` that can be waited on.
#[derive(Debug, Clone)]
pub struct Fence {
    submission: Option<wgpu::SubmissionIndex>,
}

impl Fence {
    #[must_use]
    pub fn signalled() -> Self {
        Self { submission: None }
    }

    #[must_use]
    pub fn from_submission(index: wgpu::SubmissionIndex) -> Self {
        Self {
            submission: Some(index),
        }
    }

    /// Blocks the calling thread until this fence signals.
    pub fn wait(&self, device: &wgpu::Device) {
        if let Some(index) = &self.submission {
            let _ = device.poll(wgpu::Maintain::WaitForSubmissionIndex(index.clone()));
        } else {
            let _ = device.poll(wgpu::Maintain::Wait);
        }
    }
}

/// Owns the `wgpu::Device`/`wgpu::Queue` pair shared by every window's
/// `RenderTarget`. Analogous to a `WgpuContext`, minus the surface (each
/// `RenderTarget` owns its own).
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub supports_indirect_count: bool,
}

impl GpuContext {
    /// Requests an adapter/device pair compatible with `compatible_surface`
    /// (pass `None` for headless/compute-only use).
    pub async fn new(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                RenderError::AdapterRequestFailed("no compatible GPU adapter found".into())
            })?;

        let supports_indirect_count = adapter
            .features()
            .contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT);

        let mut required_features = wgpu::Features::INDIRECT_FIRST_INSTANCE
            | wgpu::Features::MULTI_DRAW_INDIRECT
            | wgpu::Features::TEXTURE_BINDING_ARRAY;
        if supports_indirect_count {
            required_features |= wgpu::Features::MULTI_DRAW_INDIRECT_COUNT;
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vantage-render device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        log::info!(
            "GPU context initialized (indirect-count support: {supports_indirect_count})"
        );

        Ok(Self {
            device,
            queue,
            supports_indirect_count,
        })
    }

    /// Blocks until every submitted command has completed. Used by
    /// destructors and the resize path (§4.8) to guarantee no dangling GPU
    /// references.
    pub fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}
