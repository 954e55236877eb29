//! Top-level assembly: owns the GPU backend, every resource manager, the
//! per-frame-in-flight scene state, and every open rendering window (§6).
//!
//! Grounded in `src/Context.cpp`: a single owning root that wires the
//! `GpuContext`, the domain managers, `SceneContext`, and one
//! `RenderTarget`+`Renderer` pair per window, driving the §4.8 frame loop
//! end to end. `advance_frame` covers the device-only half of that loop
//! (deferred scene mutations, table flushes, per-view uniforms) so it can run
//! without a platform swap chain; `render` adds the per-window half.

use rustc_hash::FxHashMap;

use crate::async_queue::{AsyncPool, CommandBuffer, EventBus};
use crate::backend::{CommandList, GpuContext};
use crate::config::{EngineConfig, VfsConfig};
use crate::descriptor_sets::{DescriptorSetLayouts, FrameBindGroups};
use crate::errors::{RenderError, Result};
use crate::handles::{generate_resource_id, ResourceId};
use crate::render_target::RenderTarget;
use crate::renderer::Renderer;
use crate::resources::{
    Camera, CameraManager, ImageManager, Light, LightKind, LightManager, MaterialManager,
    MaterialVariant, Mesh, MeshInstance, MeshInstanceManager, MeshManager, VertexData,
};
use crate::scene_context::SceneContext;
use crate::scene_render_context::{LightData, SceneData, SceneRenderContext};

/// One window's swap-chain frame loop plus the render passes that draw into
/// it (§3 "RenderingWindow"). Every window shares the scene and resource
/// managers but owns its own `Renderer`, since each window's shadow maps and
/// compiled pipelines are independent, and its own `RenderTarget`, since
/// each window owns its own swap chain.
struct RenderingWindow {
    target: RenderTarget,
    renderer: Renderer,
}

/// Looks up a rendering window by field reference rather than through a
/// `&mut self` method, so a caller that also needs `&self.backend` (or any
/// other field) alongside the returned `&mut RenderingWindow` borrows only
/// `self.windows`, not all of `self`.
fn window_lookup(windows: &mut FxHashMap<ResourceId, RenderingWindow>, id: ResourceId) -> Result<&mut RenderingWindow> {
    windows
        .get_mut(&id)
        .ok_or_else(|| RenderError::InvalidHandle(format!("rendering window {} does not exist", id.0)))
}

fn light_gpu_data(light: &Light) -> LightData {
    LightData {
        kind: match light.kind {
            LightKind::Directional => 0,
            LightKind::Point => 1,
            LightKind::Spot => 2,
        },
        _pad: [0; 3],
        position: [light.position[0], light.position[1], light.position[2], 0.0],
        direction: [light.direction[0], light.direction[1], light.direction[2], 0.0],
        color_and_intensity: [light.color[0], light.color[1], light.color[2], light.intensity],
    }
}

/// Builds the per-frame Set 0/1/2/4 bind groups from the managers' current
/// GPU tables and a window's shadow-map views. A free function rather than a
/// `Context` method, so it borrows only the fields it needs and leaves
/// `self.windows` free for the caller to hold mutably at the same time
/// (needed since the shadow-map views themselves borrow a window's
/// `Renderer`).
#[allow(clippy::too_many_arguments)]
fn build_frame_bindings(
    device: &wgpu::Device,
    descriptor_sets: &DescriptorSetLayouts,
    sampler: &wgpu::Sampler,
    materials: &MaterialManager,
    meshes: &MeshManager,
    images: &ImageManager,
    scene_frame: &SceneRenderContext,
    shadow_map_views: &[&wgpu::TextureView],
) -> Result<FrameBindGroups> {
    let missing = |what: &str| RenderError::UploadPrecondition(format!("{what} has not been flushed to the device yet"));

    let blank = images
        .blank_view()
        .ok_or_else(|| RenderError::UploadPrecondition("blank image has not been created yet".into()))?;
    let materials_buffer = materials.buffer().ok_or_else(|| missing("materials table"))?;
    let surfaces_buffer = meshes.surfaces_buffer().ok_or_else(|| missing("surfaces table"))?;
    let texture_views: Vec<_> = images.bindless_views().into_iter().map(|(_, view)| view).collect();

    let scene_buffer = scene_frame.scene_uniform_buffer().ok_or_else(|| missing("scene uniform"))?;
    let models_buffer = scene_frame.mesh_instances_data_buffer().ok_or_else(|| missing("mesh instance data"))?;
    let lights_buffer = scene_frame.lights_uniform_buffer().ok_or_else(|| missing("lights uniform"))?;

    Ok(FrameBindGroups {
        global: descriptor_sets.build_global(device, materials_buffer, surfaces_buffer, &texture_views, blank),
        samplers: descriptor_sets.build_samplers(device, sampler),
        scene: descriptor_sets.build_scene(device, scene_buffer, models_buffer, lights_buffer, shadow_map_views, blank),
        scene_opt1: descriptor_sets.build_scene_opt1(device, shadow_map_views, blank),
    })
}

/// Owns everything the frame loop needs: the GPU backend, every resource
/// manager, the per-frame-in-flight scene state, and every open window.
/// Mirrors §6's `Context(backend, capacities, vfs_cfg, framesInFlight)`,
/// bundled here as `(backend, config, vfs)` since `EngineConfig` carries
/// both the capacities and the frame count.
pub struct Context {
    backend: GpuContext,
    config: EngineConfig,
    vfs: VfsConfig,
    descriptor_sets: DescriptorSetLayouts,
    sampler: wgpu::Sampler,

    meshes: MeshManager,
    materials: MaterialManager,
    images: ImageManager,
    lights: LightManager,
    cameras: CameraManager,
    mesh_instances: MeshInstanceManager,

    scene: SceneContext,
    active_camera: Option<ResourceId>,

    event_bus: EventBus,
    command_buffer: CommandBuffer,
    async_pool: AsyncPool,

    windows: FxHashMap<ResourceId, RenderingWindow>,
    frame_counter: u64,
}

impl Context {
    /// Builds every resource manager at the capacities configured in
    /// `config`, creates the descriptor-set layouts and default sampler, and
    /// bootstraps the blank fallback image/cube map so the very first frame
    /// already has something to pad the bindless arrays with.
    pub fn new(backend: GpuContext, config: EngineConfig, vfs: VfsConfig) -> Result<Self> {
        let caps = config.capacities;
        let descriptor_sets = DescriptorSetLayouts::new(&backend.device, caps.max_images as u32, config.max_shadow_maps as u32);
        let sampler = backend.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("default_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..wgpu::SamplerDescriptor::default()
        });

        let mut images = ImageManager::new(caps.max_images);
        images.ensure_blank_images(&backend.device, &backend.queue)?;

        let scene = SceneContext::new(
            config.frames_in_flight,
            caps.max_mesh_instances as u32,
            caps.max_surfaces as u32,
            config.max_async_nodes_updated_per_frame,
        );

        Ok(Self {
            backend,
            config,
            vfs,
            descriptor_sets,
            sampler,
            meshes: MeshManager::new(caps.max_meshes, caps.max_vertices as u32, caps.max_indices as u32, caps.max_surfaces as u32),
            materials: MaterialManager::new(caps.max_materials),
            images,
            lights: LightManager::new(config.max_lights, config.max_shadow_maps),
            cameras: CameraManager::new(64),
            mesh_instances: MeshInstanceManager::new(caps.max_mesh_instances),
            scene,
            active_camera: None,
            event_bus: EventBus::new(),
            command_buffer: CommandBuffer::default(),
            async_pool: AsyncPool::new(),
            windows: FxHashMap::default(),
            frame_counter: 0,
        })
    }

    #[must_use]
    pub fn backend(&self) -> &GpuContext {
        &self.backend
    }

    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    #[must_use]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[must_use]
    pub fn async_pool_mut(&mut self) -> &mut AsyncPool {
        &mut self.async_pool
    }

    /// Creates a rendering window from an already-configured swap chain
    /// surface. `depth_resource`/`color_resource` are the logical barrier-log
    /// ids `CommandList::record_transition` tags this window's attachments
    /// with (§4.7, §4.8).
    pub fn add_window(
        &mut self,
        surface: wgpu::Surface<'static>,
        surface_config: wgpu::SurfaceConfiguration,
        depth_resource: u64,
        color_resource: u64,
        clear_color: wgpu::Color,
    ) -> ResourceId {
        let target = RenderTarget::new(&self.backend.device, surface, surface_config, self.config.frames_in_flight);
        let renderer = Renderer::new(&self.backend, depth_resource, color_resource, self.config.max_shadow_maps, clear_color);
        let id = generate_resource_id();
        self.windows.insert(id, RenderingWindow { target, renderer });
        id
    }

    pub fn remove_window(&mut self, id: ResourceId) {
        self.windows.remove(&id);
    }

    pub fn resize_window(&mut self, id: ResourceId, width: u32, height: u32) -> Result<()> {
        window_lookup(&mut self.windows, id)?.target.resize(&self.backend.device, width, height);
        self.event_bus.push(crate::async_queue::Event::RenderingWindowResized { width, height });
        Ok(())
    }

    pub fn pause_window(&mut self, id: ResourceId, paused: bool) -> Result<()> {
        window_lookup(&mut self.windows, id)?.target.pause(paused);
        Ok(())
    }

    pub fn create_mesh(&mut self, vertex_data: &[VertexData], index_data: &[u32], surfaces: &[(u32, u32, ResourceId)]) -> Result<ResourceId> {
        self.meshes.create_mesh(vertex_data, index_data, surfaces, &self.materials)
    }

    pub fn create_material(&mut self, variant: MaterialVariant) -> Result<ResourceId> {
        self.materials.create(variant)
    }

    pub fn create_light(&mut self, light: Light) -> Result<ResourceId> {
        self.lights.create(light)
    }

    pub fn destroy_light(&mut self, id: ResourceId) {
        self.lights.destroy(id);
    }

    pub fn create_camera(&mut self, camera: Camera) -> Result<ResourceId> {
        self.cameras.create(camera)
    }

    /// Selects `id` as the active camera every subsequent `advance_frame`
    /// writes Set 2's `SceneData` uniform from. Fails if `id` is not a live
    /// camera handle.
    pub fn activate_camera(&mut self, id: ResourceId) -> Result<()> {
        self.cameras.get(id)?;
        self.active_camera = Some(id);
        Ok(())
    }

    #[must_use]
    pub fn mesh_instance(&self, id: ResourceId) -> Result<&MeshInstance> {
        self.mesh_instances.get(id)
    }

    /// Creates a mesh instance and queues it for addition into every
    /// frame-in-flight's scene state (§4.6). The instance only becomes
    /// drawable once a subsequent `advance_frame` drains the queue.
    pub fn add_mesh_instance(&mut self, instance: MeshInstance, async_: bool) -> Result<ResourceId> {
        let id = self.mesh_instances.create(instance)?;
        self.scene.add_instance(id, async_);
        Ok(id)
    }

    /// Queues `id` for removal from every frame-in-flight's scene state.
    /// The mesh instance itself is destroyed immediately; its GPU-resident
    /// slabs are freed lazily as each frame processes the queue.
    pub fn remove_mesh_instance(&mut self, id: ResourceId, async_: bool) {
        self.scene.remove_instance(id, async_);
        self.mesh_instances.destroy(id);
    }

    /// Marks `id` dirty for re-upload on the next `advance_frame`, bounded by
    /// the instance's own `max_updates` (§4.4 "maxUpdates"). Returns `false`
    /// without error if the instance has already hit its per-frame update
    /// budget.
    pub fn update_mesh_instance(&mut self, id: ResourceId) -> Result<bool> {
        let instance = self.mesh_instances.get_mut(id)?;
        let accepted = instance.record_update();
        if accepted {
            self.scene.update_instance(id);
        }
        Ok(accepted)
    }

    #[must_use]
    pub fn scene_frame(&self, frame_index: usize) -> &SceneRenderContext {
        self.scene.frame(frame_index)
    }

    #[inline]
    fn frame_index(&self) -> usize {
        (self.frame_counter % u64::from(self.config.frames_in_flight)) as usize
    }

    /// Runs the device-only half of the frame loop (§4.8 steps that don't
    /// touch a swap chain): drains the deferred command buffer and reaped
    /// async tasks, drains this frame-in-flight's pending scene mutations,
    /// flushes the mesh/material tables, and rewrites the Set 2 "Scene"
    /// uniforms from the active camera and live lights. Returns the
    /// frame-in-flight index just processed, for `render` to reuse.
    pub fn advance_frame(&mut self) -> Result<usize> {
        self.command_buffer.process();
        self.async_pool.reap_finished();

        let frame_index = self.frame_index();
        {
            let mesh_lookup = |id: ResourceId| -> Option<Mesh> { self.meshes.get(id).ok().cloned() };
            self.scene
                .process_deferred_operations(frame_index, &self.mesh_instances, &mesh_lookup, &self.materials)?;
        }

        let mut upload_cmd = CommandList::new(&self.backend.device, "upload");
        self.meshes.flush(&self.backend.device, &self.backend.queue, &mut upload_cmd);
        self.materials.flush(&self.backend.device, &self.backend.queue, &mut upload_cmd);
        let mesh_lookup = |id: ResourceId| -> Option<Mesh> { self.meshes.get(id).ok().cloned() };
        self.scene.frame_mut(frame_index).update(
            &self.backend.device,
            &self.backend.queue,
            &self.mesh_instances,
            &mesh_lookup,
            &self.materials,
            &mut upload_cmd,
        );
        self.backend.queue.submit(std::iter::once(upload_cmd.finish()));

        if let Some(camera_id) = self.active_camera {
            let camera = self.cameras.get(camera_id)?;
            let scene_data = SceneData {
                view: camera.view.to_cols_array(),
                projection: camera.projection.to_cols_array(),
                camera_position: camera.position,
                light_count: self.lights.iter().count() as u32,
            };
            let light_rows: Vec<LightData> = self.lights.iter().map(|(_, light)| light_gpu_data(light)).collect();
            self.scene
                .frame_mut(frame_index)
                .write_frame_uniforms(&self.backend.device, &self.backend.queue, scene_data, &light_rows);
        }

        for (_, instance) in self.mesh_instances.iter_mut() {
            instance.reset_pending_updates();
        }

        self.frame_counter += 1;
        Ok(frame_index)
    }

    /// Runs one full frame for `window_id`: `advance_frame`, then builds the
    /// per-frame bind groups from this window's shadow maps and hands off to
    /// `RenderTarget::render` for the acquire/prepare/render/present sequence
    /// (§4.8).
    pub fn render(&mut self, window_id: ResourceId) -> Result<()> {
        let frame_index = self.advance_frame()?;

        let window = window_lookup(&mut self.windows, window_id)?;
        let shadow_map_views = window.renderer.shadow_map_views();
        let frame_bindings = build_frame_bindings(
            &self.backend.device,
            &self.descriptor_sets,
            &self.sampler,
            &self.materials,
            &self.meshes,
            &self.images,
            self.scene.frame(frame_index),
            &shadow_map_views,
        )?;

        window.target.render(
            &self.backend,
            frame_index,
            &mut window.renderer,
            self.scene.frame(frame_index),
            &self.lights,
            &self.meshes,
            &self.descriptor_sets,
            &frame_bindings,
            self.vfs.shader_loader.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullShaderLoader;
    impl crate::config::ShaderLoader for NullShaderLoader {
        fn load_shader(&self, name: &str) -> Result<Vec<u8>> {
            Err(RenderError::UploadPrecondition(format!("no shader named {name} in this test fixture")))
        }
    }
    struct NullImageLoader;
    impl crate::config::ImageLoader for NullImageLoader {
        fn load_image(&self, path: &str) -> Result<(Vec<u8>, u32, u32)> {
            Err(RenderError::UploadPrecondition(format!("no image at {path} in this test fixture")))
        }
    }

    /// Requests a headless device the same way every other adapter-backed
    /// test in this crate would, skipping rather than failing when no
    /// adapter is available (CI runners without a GPU). Unlike the rest of
    /// the crate's tests, these genuinely drive a live device, since
    /// `Context::new` cannot exist without one.
    fn test_context(config: EngineConfig) -> Option<Context> {
        let instance = wgpu::Instance::default();
        let backend = pollster::block_on(GpuContext::new(&instance, None, wgpu::PowerPreference::default())).ok()?;
        let vfs = VfsConfig {
            shader_loader: Box::new(NullShaderLoader),
            image_loader: Box::new(NullImageLoader),
        };
        Some(Context::new(backend, config, vfs).expect("context construction with a live device must succeed"))
    }

    fn quad_mesh(ctx: &mut Context, material: ResourceId) -> ResourceId {
        let vertices = [
            VertexData { position: [-0.5, -0.5, 0.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 0.0] },
            VertexData { position: [0.5, -0.5, 0.0], normal: [0.0, 0.0, 1.0], uv: [1.0, 0.0] },
            VertexData { position: [0.5, 0.5, 0.0], normal: [0.0, 0.0, 1.0], uv: [1.0, 1.0] },
            VertexData { position: [-0.5, 0.5, 0.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 1.0] },
        ];
        let indices = [0u32, 1, 2, 0, 2, 3];
        ctx.create_mesh(&vertices, &indices, &[(0, 6, material)]).unwrap()
    }

    fn identity_instance(mesh: ResourceId) -> MeshInstance {
        MeshInstance {
            mesh,
            world_transform: glam::Mat4::IDENTITY,
            world_aabb_min: [-0.5, -0.5, 0.0],
            world_aabb_max: [0.5, 0.5, 0.0],
            visible: true,
            cast_shadows: false,
            materials_override: rustc_hash::FxHashMap::default(),
            pending_updates: 0,
            max_updates: 4,
        }
    }

    /// Empty scene, two frames in flight, two `advance_frame` calls: no
    /// instances means no draws and nothing should error. This exercises S1's
    /// "empty frame" intent at the device-only half of the frame loop, since
    /// a real swap chain needs a platform window handle this test has no
    /// access to.
    #[test]
    fn advancing_an_empty_scene_issues_no_draws() {
        let Some(mut ctx) = test_context(EngineConfig {
            frames_in_flight: 2,
            ..EngineConfig::default()
        }) else {
            return;
        };

        let first = ctx.advance_frame().unwrap();
        assert_eq!(ctx.scene_frame(first).opaque_draw_count(), 0);
        let second = ctx.advance_frame().unwrap();
        assert_eq!(ctx.scene_frame(second).opaque_draw_count(), 0);
        assert_ne!(first, second);
    }

    /// One quad with a default standard material becomes exactly one opaque
    /// draw command after the add is drained, and stays there across further
    /// frames (S2's steady-state shape, minus the per-view uniform rewrite
    /// count, which needs an active camera to observe).
    #[test]
    fn single_quad_instance_produces_one_opaque_draw_command() {
        let Some(mut ctx) = test_context(EngineConfig {
            frames_in_flight: 2,
            ..EngineConfig::default()
        }) else {
            return;
        };

        let material = ctx
            .create_material(MaterialVariant::Standard {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 1.0,
                albedo_texture: None,
            })
            .unwrap();
        let mesh = quad_mesh(&mut ctx, material);
        let instance_id = ctx.add_mesh_instance(identity_instance(mesh), false).unwrap();

        let frame_a = ctx.advance_frame().unwrap();
        assert_eq!(ctx.scene_frame(frame_a).opaque_draw_count(), 1);

        let frame_b = ctx.advance_frame().unwrap();
        assert_eq!(ctx.scene_frame(frame_b).opaque_draw_count(), 1);

        assert!(ctx.update_mesh_instance(instance_id).unwrap());
    }

    /// Adding then immediately removing an instance in the same tick must
    /// never let it become drawable in any frame-in-flight, across
    /// `framesInFlight` frames (S3).
    #[test]
    fn add_then_remove_same_tick_never_becomes_drawable() {
        let Some(mut ctx) = test_context(EngineConfig {
            frames_in_flight: 3,
            ..EngineConfig::default()
        }) else {
            return;
        };

        let material = ctx
            .create_material(MaterialVariant::Standard {
                albedo: [1.0; 4],
                metallic: 0.0,
                roughness: 1.0,
                albedo_texture: None,
            })
            .unwrap();
        let mesh = quad_mesh(&mut ctx, material);
        let instance_id = ctx.add_mesh_instance(identity_instance(mesh), false).unwrap();
        ctx.remove_mesh_instance(instance_id, false);

        for _ in 0..3 {
            let frame = ctx.advance_frame().unwrap();
            assert_eq!(ctx.scene_frame(frame).opaque_draw_count(), 0);
        }
    }
}
