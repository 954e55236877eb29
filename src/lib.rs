#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

//! A scene render pipeline for real-time rendering engines.
//!
//! Owns the GPU-resident representation of a scene (meshes, materials,
//! images, mesh instances, lights) and the per-frame pipeline that turns
//! scene deltas into compute-culled, indirect-drawn GPU commands: fan scene
//! mutations out across frames-in-flight, generate and cull draw commands on
//! the GPU, and run the depth/color/shader-material/transparency/shadow-map
//! passes against an acquired swap-chain image.

pub mod async_queue;
pub mod backend;
pub mod config;
pub mod context;
pub mod culling;
pub mod descriptor_sets;
pub mod errors;
pub mod handles;
pub mod memory;
pub mod pipeline_data;
pub mod render_target;
pub mod renderer;
pub mod renderpasses;
pub mod resources;
pub mod scene_context;
pub mod scene_render_context;

pub use async_queue::{AsyncPool, CommandBuffer, Event, EventBus};
pub use backend::{BarrierRecord, CommandList, Fence, GpuContext, ResourceState};
pub use config::{EngineConfig, ImageLoader, ManagerCapacities, ShaderLoader, VfsConfig};
pub use context::Context;
pub use culling::{Aabb, CullingPass, FrustumPlanes};
pub use descriptor_sets::{DescriptorSetLayouts, FrameBindGroups};
pub use errors::{RenderError, Result};
pub use handles::{ManagerBase, ManagerRegistry, ResourceId, ResourceManager};
pub use memory::{DeviceMemoryArray, MemoryBlock};
pub use render_target::RenderTarget;
pub use renderer::Renderer;
pub use scene_context::SceneContext;
pub use scene_render_context::SceneRenderContext;
