use glam::Vec3;

use tiled_deferred::geom::Aabb;
use tiled_deferred::renderer::{
    BackendCall, Material, RecordingBackend, Renderer, StageKind,
};
use tiled_deferred::scene::{Geometry, Light, Mesh, RenderItem, Scene, Transform};
use tiled_deferred::settings::{RenderSettings, Resolution};

fn cube_geometry() -> Geometry {
    Geometry {
        vertex_buffer: 100,
        index_buffer: 101,
        index_count: 36,
        bounds: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
    }
}

fn test_scene() -> Scene {
    let mut scene = Scene::new();

    let node = scene.add_node(None, Transform::from_translation(Vec3::new(0.0, 0.0, -5.0)));
    let mut mesh = Mesh::new(node);
    mesh.add_item(RenderItem {
        material: Material::colored([0.8, 0.2, 0.2, 1.0]),
        geometry: cube_geometry(),
    });
    mesh.add_item(RenderItem {
        material: Material::colored([0.2, 0.8, 0.2, 1.0]),
        geometry: cube_geometry(),
    });
    scene.add_mesh(mesh);

    scene.add_light(
        Light::directional(Vec3::new(-0.3, -1.0, -0.2).normalize(), Vec3::ONE)
            .with_shadows(0.002),
    );
    scene.add_light(Light::point(Vec3::new(1.0, 1.0, -4.0), Vec3::new(1.0, 0.8, 0.6), 8.0));
    scene.set_global_ambient(Vec3::splat(0.05));
    scene.set_skybox(vec![0u8; 4 * 4 * 6 * 4], 4);
    scene
}

fn renderer() -> Renderer<RecordingBackend> {
    Renderer::with_default_pipeline(RecordingBackend::new(), RenderSettings::default())
        .expect("worker pool")
}

#[test]
fn default_pipeline_builds_all_four_stages_in_order() {
    let renderer = renderer();
    assert_eq!(
        renderer.stage_kinds(),
        vec![
            StageKind::Shadow,
            StageKind::Deferred,
            StageKind::Lighting,
            StageKind::PostProcess
        ]
    );
    assert!(renderer.target_handle("gbuffer").is_some());
    assert!(renderer.target_handle("shadow_occlusion").is_some());
    assert!(renderer.target_handle("scene").is_some());
}

#[test]
fn frame_submits_stages_in_shadow_deferred_lighting_postprocess_order() {
    let mut renderer = renderer();
    let mut scene = test_scene();
    renderer.render_frame(&mut scene);

    let occlusion = renderer.target_handle("shadow_occlusion").unwrap();
    let gbuffer = renderer.target_handle("gbuffer").unwrap();
    let lit = renderer.target_handle("scene").unwrap();

    let calls = &renderer.backend().calls;
    let position = |call: &BackendCall| calls.iter().position(|c| c == call).unwrap();

    let occlusion_at = position(&BackendCall::SetOfflineTarget(occlusion));
    let gbuffer_at = position(&BackendCall::SetOfflineTarget(gbuffer));
    let lighting_at = position(&BackendCall::SetOfflineTarget(lit));
    let main_at = position(&BackendCall::SetMainTarget);

    assert!(occlusion_at < gbuffer_at, "shadow resolve before geometry");
    assert!(gbuffer_at < lighting_at, "geometry before lighting");
    assert!(lighting_at < main_at, "lighting before the final pass");

    // Shadow depth maps render before the occlusion resolve.
    let first_offline = calls
        .iter()
        .position(|c| matches!(c, BackendCall::SetOfflineTarget(_)))
        .unwrap();
    assert!(first_offline < occlusion_at);
}

#[test]
fn frame_carries_the_packed_parameter_blocks() {
    let mut renderer = renderer();
    let mut scene = test_scene();
    renderer.render_frame(&mut scene);

    let blocks: Vec<(String, usize)> = renderer
        .backend()
        .calls
        .iter()
        .filter_map(|call| match call {
            BackendCall::SetParameterBlock(name, len) => Some((name.clone(), *len)),
            _ => None,
        })
        .collect();

    // Two distinct materials at 48 bytes each.
    assert!(blocks.contains(&("Materials".to_owned(), 96)));
    // Light buffer: header vec4 plus four vec4s for each of the two lights.
    assert!(blocks.contains(&("Lights".to_owned(), (1 + 4 * 2) * 16)));
    // One shadow caster with four cascades.
    assert!(blocks.contains(&("ShadowData".to_owned(), (4 + 4 + 4 * 16) * 4)));
}

#[test]
fn frame_draws_geometry_and_uploads_the_tile_texture() {
    let mut renderer = renderer();
    let mut scene = test_scene();
    renderer.render_frame(&mut scene);

    // At minimum: the G-buffer items, the three fullscreen passes and the
    // cascade depth draws.
    assert!(renderer.backend().draw_count() >= 5);

    let tile_upload = renderer
        .backend()
        .calls
        .iter()
        .find_map(|call| match call {
            BackendCall::UpdateTexture(_, width, height, _) if *height > 1 => {
                Some((*width, *height))
            }
            _ => None,
        })
        .expect("tile texture upload");
    // 1280x720 at 64px tiles: 20 x 12 tiles, one texel per light.
    assert_eq!(tile_upload, (2, 240));
}

#[test]
fn identical_scenes_submit_identical_call_streams() {
    let mut first = renderer();
    let mut second = renderer();
    let mut scene_a = test_scene();
    let mut scene_b = test_scene();

    first.render_frame(&mut scene_a);
    second.render_frame(&mut scene_b);

    assert_eq!(first.backend().calls, second.backend().calls);
}

#[test]
fn steady_state_frames_are_reproducible() {
    let mut renderer = renderer();
    let mut scene = test_scene();

    // First frame uploads the skybox; later frames are steady state.
    renderer.render_frame(&mut scene);
    renderer.backend_mut().calls.clear();
    renderer.render_frame(&mut scene);
    let frame_two = renderer.backend().calls.clone();

    renderer.backend_mut().calls.clear();
    renderer.render_frame(&mut scene);
    assert_eq!(renderer.backend().calls, frame_two);
}

#[test]
fn resize_rescales_the_tile_grid() {
    let settings = RenderSettings {
        resolution: Resolution {
            width: 1280,
            height: 720,
        },
        ..RenderSettings::default()
    };
    let mut renderer =
        Renderer::with_default_pipeline(RecordingBackend::new(), settings).expect("worker pool");
    let mut scene = test_scene();

    renderer.render_frame(&mut scene);
    renderer.resize(1920, 1080);
    renderer.backend_mut().calls.clear();
    renderer.render_frame(&mut scene);

    let tile_upload = renderer
        .backend()
        .calls
        .iter()
        .find_map(|call| match call {
            BackendCall::UpdateTexture(_, width, height, _) if *height > 1 => {
                Some((*width, *height))
            }
            _ => None,
        })
        .expect("tile texture upload");
    // 1920x1080 at 64px tiles: 30 x 17 tiles.
    assert_eq!(tile_upload, (2, 510));
}

#[test]
fn empty_scene_still_renders_the_fullscreen_chain() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    renderer.render_frame(&mut scene);

    // Occlusion resolve, lighting and tonemap still run.
    assert_eq!(renderer.backend().draw_count(), 3);
    assert!(renderer
        .backend()
        .calls
        .iter()
        .any(|c| matches!(c, BackendCall::SetMainTarget)));
}
