//! Deferred scene-mutation fan-out tests.
//!
//! Covers the add/remove ordering and async back-pressure behavior of
//! `SceneContext::process_deferred_operations`.

use glam::Mat4;
use rustc_hash::FxHashMap;

use vantage_render::resources::{MaterialManager, MaterialVariant, Mesh, MeshInstance, MeshInstanceManager, MeshSurface};
use vantage_render::scene_context::SceneContext;
use vantage_render::{MemoryBlock, ResourceId};

fn block(i: u32, c: u32) -> MemoryBlock {
    MemoryBlock {
        instance_index: i,
        count: c,
    }
}

fn opaque_material(materials: &mut MaterialManager) -> ResourceId {
    materials
        .create(MaterialVariant::Standard {
            albedo: [1.0; 4],
            metallic: 0.0,
            roughness: 1.0,
            albedo_texture: None,
        })
        .unwrap()
}

fn single_surface_mesh(material: ResourceId) -> Mesh {
    Mesh {
        vertices: block(0, 4),
        indices: block(0, 6),
        surfaces: smallvec::smallvec![MeshSurface {
            first_index: 0,
            index_count: 6,
            material,
        }],
        surfaces_block: block(0, 1),
    }
}

fn default_instance() -> MeshInstance {
    MeshInstance {
        mesh: ResourceId(1),
        world_transform: Mat4::IDENTITY,
        world_aabb_min: [0.0; 3],
        world_aabb_max: [1.0; 3],
        visible: true,
        cast_shadows: false,
        materials_override: FxHashMap::default(),
        pending_updates: 0,
        max_updates: 4,
    }
}

#[test]
fn added_instance_appears_after_processing_deferred_operations() {
    let mut ctx = SceneContext::new(1, 64, 64, 8);
    let mut instances = MeshInstanceManager::new(8);
    let mut materials = MaterialManager::new(8);
    let mat = opaque_material(&mut materials);
    let mesh = single_surface_mesh(mat);
    let id = instances.create(default_instance()).unwrap();

    ctx.add_instance(id, false);
    ctx.process_deferred_operations(0, &instances, &|i| (i == id).then(|| single_surface_mesh(mat)), &materials)
        .unwrap();

    assert_eq!(ctx.frame(0).opaque_draw_count(), 1);
    let _ = mesh;
}

#[test]
fn removed_instance_disappears_after_processing() {
    let mut ctx = SceneContext::new(1, 64, 64, 8);
    let mut instances = MeshInstanceManager::new(8);
    let mut materials = MaterialManager::new(8);
    let mat = opaque_material(&mut materials);
    let id = instances.create(default_instance()).unwrap();

    ctx.add_instance(id, false);
    ctx.process_deferred_operations(0, &instances, &|i| (i == id).then(|| single_surface_mesh(mat)), &materials)
        .unwrap();
    assert_eq!(ctx.frame(0).opaque_draw_count(), 1);

    ctx.remove_instance(id, false);
    ctx.process_deferred_operations(0, &instances, &|i| (i == id).then(|| single_surface_mesh(mat)), &materials)
        .unwrap();
    assert_eq!(ctx.frame(0).opaque_draw_count(), 0);
}

#[test]
fn each_frame_in_flight_gets_an_independent_delta_queue() {
    let mut ctx = SceneContext::new(2, 64, 64, 8);
    let mut instances = MeshInstanceManager::new(8);
    let mut materials = MaterialManager::new(8);
    let mat = opaque_material(&mut materials);
    let id = instances.create(default_instance()).unwrap();

    ctx.add_instance(id, false);
    ctx.process_deferred_operations(0, &instances, &|i| (i == id).then(|| single_surface_mesh(mat)), &materials)
        .unwrap();

    // Frame 1's queue is untouched by frame 0's processing.
    assert_eq!(ctx.frame(0).opaque_draw_count(), 1);
    assert_eq!(ctx.frame(1).opaque_draw_count(), 0);

    ctx.process_deferred_operations(1, &instances, &|i| (i == id).then(|| single_surface_mesh(mat)), &materials)
        .unwrap();
    assert_eq!(ctx.frame(1).opaque_draw_count(), 1);
}
