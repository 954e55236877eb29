//! End-to-end coverage for mesh-instance -> pipeline-bucket routing and
//! capacity enforcement across the public resource API.

use glam::Mat4;
use rustc_hash::FxHashMap;

use vantage_render::resources::{MaterialManager, MaterialVariant, Mesh, MeshInstance, MeshSurface};
use vantage_render::scene_render_context::SceneRenderContext;
use vantage_render::{RenderError, ResourceId};

fn block(i: u32, c: u32) -> vantage_render::MemoryBlock {
    vantage_render::MemoryBlock {
        instance_index: i,
        count: c,
    }
}

#[test]
fn opaque_and_shader_material_surfaces_route_to_different_buckets() {
    let mut materials = MaterialManager::new(8);
    let opaque_mat = materials
        .create(MaterialVariant::Standard {
            albedo: [1.0; 4],
            metallic: 0.0,
            roughness: 1.0,
            albedo_texture: None,
        })
        .unwrap();
    let shader_mat = materials
        .create(MaterialVariant::Shader {
            shader_name: "toon".into(),
            transparent: false,
        })
        .unwrap();

    let mesh = Mesh {
        vertices: block(0, 8),
        indices: block(0, 12),
        surfaces: smallvec::smallvec![
            MeshSurface {
                first_index: 0,
                index_count: 6,
                material: opaque_mat,
            },
            MeshSurface {
                first_index: 6,
                index_count: 6,
                material: shader_mat,
            },
        ],
        surfaces_block: block(0, 2),
    };

    let instance = MeshInstance {
        mesh: ResourceId(1),
        world_transform: Mat4::IDENTITY,
        world_aabb_min: [0.0; 3],
        world_aabb_max: [1.0; 3],
        visible: true,
        cast_shadows: true,
        materials_override: FxHashMap::default(),
        pending_updates: 0,
        max_updates: 4,
    };

    let mut scene = SceneRenderContext::new(64, 64);
    scene
        .add_instance(ResourceId(10), &instance, &mesh, &materials)
        .unwrap();

    assert_eq!(scene.opaque_draw_count(), 1);
    assert_eq!(scene.shader_material_pipelines().count(), 1);
}

#[test]
fn material_manager_enforces_its_capacity() {
    let mut materials = MaterialManager::new(1);
    materials
        .create(MaterialVariant::Standard {
            albedo: [1.0; 4],
            metallic: 0.0,
            roughness: 1.0,
            albedo_texture: None,
        })
        .unwrap();

    let result = materials.create(MaterialVariant::Standard {
        albedo: [0.0; 4],
        metallic: 1.0,
        roughness: 0.0,
        albedo_texture: None,
    });
    assert!(matches!(result, Err(RenderError::OutOfCapacity(_))));
}

#[test]
fn surface_material_override_is_respected_end_to_end() {
    let mut materials = MaterialManager::new(8);
    let base_mat = materials
        .create(MaterialVariant::Standard {
            albedo: [1.0; 4],
            metallic: 0.0,
            roughness: 1.0,
            albedo_texture: None,
        })
        .unwrap();
    let override_mat = materials
        .create(MaterialVariant::Shader {
            shader_name: "glow".into(),
            transparent: false,
        })
        .unwrap();

    let mesh = Mesh {
        vertices: block(0, 4),
        indices: block(0, 6),
        surfaces: smallvec::smallvec![MeshSurface {
            first_index: 0,
            index_count: 6,
            material: base_mat,
        }],
        surfaces_block: block(0, 1),
    };

    let mut instance = MeshInstance {
        mesh: ResourceId(1),
        world_transform: Mat4::IDENTITY,
        world_aabb_min: [0.0; 3],
        world_aabb_max: [1.0; 3],
        visible: true,
        cast_shadows: false,
        materials_override: FxHashMap::default(),
        pending_updates: 0,
        max_updates: 4,
    };
    instance.materials_override.insert(0, override_mat);

    let mut scene = SceneRenderContext::new(64, 64);
    scene
        .add_instance(ResourceId(11), &instance, &mesh, &materials)
        .unwrap();

    // The override routes this surface into the shader-material bucket
    // instead of opaque, since its resolved material is a Shader variant.
    assert_eq!(scene.opaque_draw_count(), 0);
    assert_eq!(scene.shader_material_pipelines().count(), 1);
}
