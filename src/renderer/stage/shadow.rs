use crate::geom::Frustum;
use crate::renderer::stage::{InitContext, PassTemplate, RenderStage, StageKind};
use crate::renderer::{
    assign_occlusion_masks, cull_lights, cull_scene, project_directional, project_point,
    project_spot, ClearFlags, ParameterBlock, RenderPass, RenderTargetBinding, ShaderKey,
    ShaderPass, ShaderValue, ShadowInputs, ShadowOcclusionData, StageConfig, TextureBinding,
    Viewport, DEPTH_ATTACHMENT,
};
use crate::scene::{FrameSnapshot, Geometry, LightKind};

const DEPTH_VERTEX_SHADER: &str = "shadow_depth.vert";
const DEPTH_FRAGMENT_SHADER: &str = "shadow_depth.frag";

/// Fixed pool of depth-only shadow map targets. Each cascade and each cube
/// face consumes one; overflowing the pool degrades (remaining maps are
/// skipped with a warning) rather than reallocating mid-frame.
const DEPTH_TARGET_POOL: usize = 64;

/// First texture slot for shadow maps in the occlusion pass, above the
/// configured G-buffer bindings.
const SHADOW_MAP_BASE_SLOT: u32 = 8;

/// Shadow stage: renders depth maps for every shadow-casting light in the
/// frame (cascades for directional, one map for spot, six cube faces for
/// point), then resolves them against the G-buffer depth into a
/// screen-space occlusion mask texture.
pub struct ShadowStage {
    config: StageConfig,
    shadow_map_size: u32,
    cascade_count: u32,
    depth_targets: Vec<u32>,
    depth_textures: Vec<u32>,
    occlusion_templates: Vec<PassTemplate>,
    passes: Vec<RenderPass>,
    fullscreen: Geometry,
}

impl ShadowStage {
    pub fn new(config: &StageConfig, ctx: &mut InitContext<'_>) -> Self {
        let size = ctx.settings.shadow_map_size;
        let mut depth_targets = Vec::with_capacity(DEPTH_TARGET_POOL);
        let mut depth_textures = Vec::with_capacity(DEPTH_TARGET_POOL);
        for _ in 0..DEPTH_TARGET_POOL {
            let target = ctx.backend.create_render_target(size, size, 0);
            depth_targets.push(target);
            depth_textures.push(ctx.backend.render_target_texture(target, DEPTH_ATTACHMENT));
        }

        let occlusion_templates = config
            .passes
            .iter()
            .map(|pass| PassTemplate::from_config(pass, ctx))
            .collect();

        Self {
            config: config.clone(),
            shadow_map_size: size,
            cascade_count: ctx.settings.cascade_count,
            depth_targets,
            depth_textures,
            occlusion_templates,
            passes: Vec::new(),
            fullscreen: ctx.fullscreen_geometry,
        }
    }

    /// Depth pass for one light-space matrix: the scene culled against the
    /// light's frustum, drawn into a pooled depth target.
    fn depth_pass(
        &self,
        frame: &FrameSnapshot,
        view_proj: glam::Mat4,
        pool_index: usize,
    ) -> RenderPass {
        let mut pass = RenderPass::new(
            format!("shadow_depth_{pool_index}"),
            RenderTargetBinding::Offline(self.depth_targets[pool_index]),
            Viewport::full(self.shadow_map_size, self.shadow_map_size),
        )
        .with_clear(ClearFlags::DEPTH, [1.0; 4]);
        pass.color_write = false;

        let frustum = Frustum::from_view_proj(view_proj);
        for item in cull_scene(&frame.meshes, &frustum) {
            pass.shader_passes.push(ShaderPass {
                program: ShaderKey::new(DEPTH_VERTEX_SHADER, DEPTH_FRAGMENT_SHADER, Vec::new()),
                vertex_buffer: item.geometry.vertex_buffer,
                index_buffer: item.geometry.index_buffer,
                index_count: item.geometry.index_count,
                raster: crate::renderer::RasterState {
                    color_write: false,
                    ..Default::default()
                },
                textures: Vec::new(),
                blocks: Vec::new(),
                params: vec![
                    (
                        "u_model".to_owned(),
                        ShaderValue::Mat4(item.world_from_local.to_cols_array_2d()),
                    ),
                    (
                        "u_light_view_proj".to_owned(),
                        ShaderValue::Mat4(view_proj.to_cols_array_2d()),
                    ),
                ],
            });
        }
        pass
    }
}

impl RenderStage for ShadowStage {
    fn kind(&self) -> StageKind {
        StageKind::Shadow
    }

    fn clear_stage(&mut self) {
        self.passes.clear();
    }

    fn update(&mut self, frame: &FrameSnapshot) {
        let mut lights = cull_lights(&frame.lights, &frame.camera.frustum);
        assign_occlusion_masks(&mut lights);

        let inputs =
            ShadowInputs::from_camera(&frame.camera, self.shadow_map_size, self.cascade_count);

        let mut occlusion: Vec<ShadowOcclusionData> = Vec::new();
        let mut used_targets: Vec<u32> = Vec::new();
        let mut next_target = 0usize;
        let mut overflowed = 0usize;

        for light in lights.iter().filter(|l| l.cast_shadows) {
            let single = std::slice::from_ref(light);
            let (depth, mut occ) = match light.kind {
                LightKind::Directional => project_directional(single, &inputs),
                LightKind::Spot => project_spot(single, &inputs),
                LightKind::Point => project_point(single, &inputs),
            };

            if next_target + depth[0].view_proj.len() > self.depth_targets.len() {
                overflowed += 1;
                continue;
            }

            for &view_proj in &depth[0].view_proj {
                let pass = self.depth_pass(frame, view_proj, next_target);
                self.passes.push(pass);
                used_targets.push(self.depth_textures[next_target]);
                next_target += 1;
            }
            occlusion.push(occ.remove(0));
        }

        if overflowed > 0 {
            log::warn!(
                "{} shadow-casting lights skipped; depth target pool of {} exhausted",
                overflowed,
                self.depth_targets.len()
            );
        }

        // Fullscreen resolve: camera depth reconstructed per pixel, tested
        // against every shadow map, result packed as per-light mask bits.
        for template in &self.occlusion_templates {
            let mut pass = template.instantiate(&self.fullscreen);
            if let Some(first) = pass.shader_passes.first_mut() {
                for (i, &texture) in used_targets.iter().enumerate() {
                    first.textures.push(TextureBinding {
                        slot: SHADOW_MAP_BASE_SLOT + i as u32,
                        texture,
                    });
                }
                first.blocks.push(ParameterBlock {
                    name: "ShadowData".to_owned(),
                    data: pack_occlusion_block(&occlusion),
                });
                first.params.push((
                    "u_inv_proj".to_owned(),
                    ShaderValue::Mat4(frame.camera.proj.inverse().to_cols_array_2d()),
                ));
            }
            self.passes.push(pass);
        }
    }

    fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    fn resize_resources(&mut self, ctx: &mut InitContext<'_>) {
        // Shadow maps are screen-size independent; only the occlusion
        // target and its G-buffer bindings change.
        self.occlusion_templates = self
            .config
            .passes
            .iter()
            .map(|pass| PassTemplate::from_config(pass, ctx))
            .collect();
    }
}

/// Packs the per-light occlusion records into one parameter block:
/// a header vec4 holding the light count, one vec4 per light with
/// [matrix_count, mask, bias, first_matrix_index], then all view-to-light
/// matrices in order.
fn pack_occlusion_block(occlusion: &[ShadowOcclusionData]) -> Vec<u8> {
    let mut floats: Vec<f32> = vec![occlusion.len() as f32, 0.0, 0.0, 0.0];
    let mut matrix_base = 0usize;
    for data in occlusion {
        floats.extend_from_slice(&[
            data.view_to_light.len() as f32,
            data.occlusion_mask as f32,
            data.bias,
            matrix_base as f32,
        ]);
        matrix_base += data.view_to_light.len();
    }
    for data in occlusion {
        for matrix in &data.view_to_light {
            floats.extend_from_slice(&matrix.to_cols_array());
        }
    }
    bytemuck::cast_slice(&floats).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Aabb;
    use crate::renderer::{GraphicsBackend, Material, PipelineConfig, RecordingBackend, ShaderCache};
    use crate::scene::{Geometry, Light, Mesh, RenderItem, Scene, Transform};
    use crate::settings::RenderSettings;
    use glam::{Mat4, Vec3};
    use std::collections::HashMap;

    fn cube_geometry() -> Geometry {
        Geometry {
            vertex_buffer: 1,
            index_buffer: 2,
            index_count: 36,
            bounds: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
        }
    }

    fn build_stage(backend: &mut RecordingBackend) -> ShadowStage {
        let mut cache = ShaderCache::new();
        let mut targets = HashMap::new();
        let mut textures = HashMap::new();
        // The occlusion pass samples the G-buffer depth, which the
        // geometry stage's target provides.
        targets.insert("gbuffer".to_owned(), backend.create_render_target(1280, 720, 3));
        let settings = RenderSettings::default();
        let mut ctx = InitContext {
            backend,
            cache: &mut cache,
            targets: &mut targets,
            textures: &mut textures,
            settings: &settings,
            screen: (1280, 720),
            fullscreen_geometry: cube_geometry(),
        };
        let config = PipelineConfig::standard_deferred();
        ShadowStage::new(config.stage("shadow").unwrap(), &mut ctx)
    }

    fn lit_scene(light: Light) -> Scene {
        let mut scene = Scene::new();
        let node = scene.add_node(None, Transform::from_translation(Vec3::new(0.0, 0.0, -5.0)));
        let mut mesh = Mesh::new(node);
        mesh.add_item(RenderItem {
            material: Material::default(),
            geometry: cube_geometry(),
        });
        scene.add_mesh(mesh);
        scene.add_light(light);
        scene
    }

    #[test]
    fn directional_caster_builds_one_pass_per_cascade_plus_resolve() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = lit_scene(
            Light::directional(Vec3::new(-0.3, -1.0, -0.2).normalize(), Vec3::ONE)
                .with_shadows(0.002),
        );
        stage.update(&scene.snapshot());

        // Four cascades plus the fullscreen occlusion resolve.
        assert_eq!(stage.passes.len(), 5);
        for pass in &stage.passes[..4] {
            assert!(matches!(pass.target, RenderTargetBinding::Offline(_)));
            assert!(!pass.color_write);
            assert_eq!(pass.clear_flags, ClearFlags::DEPTH);
        }
    }

    #[test]
    fn point_caster_builds_six_face_passes() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene =
            lit_scene(Light::point(Vec3::new(0.0, 2.0, -5.0), Vec3::ONE, 20.0).with_shadows(0.002));
        stage.update(&scene.snapshot());
        assert_eq!(stage.passes.len(), 7);
    }

    #[test]
    fn non_casting_lights_produce_only_the_resolve_pass() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = lit_scene(Light::point(Vec3::ZERO, Vec3::ONE, 5.0));
        stage.update(&scene.snapshot());

        assert_eq!(stage.passes.len(), 1);
        assert_eq!(stage.passes[0].label, "shadow_occlusion");
    }

    #[test]
    fn resolve_pass_carries_masks_and_matrices() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = lit_scene(
            Light::spot(Vec3::new(0.0, 5.0, -5.0), Vec3::NEG_Y, Vec3::ONE, 30.0, 0.3, 0.6)
                .with_shadows(0.001),
        );
        stage.update(&scene.snapshot());

        let resolve = stage.passes.last().unwrap();
        let block = &resolve.shader_passes[0].blocks[0];
        assert_eq!(block.name, "ShadowData");

        let floats: &[f32] = bytemuck::cast_slice(&block.data);
        // Header + one light record + one matrix.
        assert_eq!(floats.len(), 4 + 4 + 16);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[4], 1.0); // one matrix
        assert_eq!(floats[5], 1.0); // mask bit 0
        // The spot shadow map is bound above the configured slots.
        assert!(resolve.shader_passes[0]
            .textures
            .iter()
            .any(|t| t.slot == SHADOW_MAP_BASE_SLOT));
    }

    #[test]
    fn depth_passes_only_draw_what_the_light_sees() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        // Narrow spot ahead of the camera pointing away from the cube:
        // its frustum sees nothing, so the depth pass carries no draws.
        let mut scene = lit_scene(
            Light::spot(Vec3::new(0.0, 0.0, -50.0), Vec3::NEG_Z, Vec3::ONE, 10.0, 0.2, 0.4)
                .with_shadows(0.001),
        );
        stage.update(&scene.snapshot());

        let depth_pass = &stage.passes[0];
        assert!(depth_pass.label.starts_with("shadow_depth"));
        assert!(depth_pass.shader_passes.is_empty());
    }

    #[test]
    fn occlusion_block_layout_is_header_records_matrices() {
        let data = vec![
            ShadowOcclusionData {
                view_to_light: vec![Mat4::IDENTITY; 2],
                occlusion_mask: 1,
                bias: 0.001,
            },
            ShadowOcclusionData {
                view_to_light: vec![Mat4::IDENTITY],
                occlusion_mask: 2,
                bias: 0.002,
            },
        ];
        let bytes = pack_occlusion_block(&data);
        let floats: &[f32] = bytemuck::cast_slice(&bytes);

        assert_eq!(floats[0], 2.0);
        assert_eq!(&floats[4..8], &[2.0, 1.0, 0.001, 0.0]);
        assert_eq!(&floats[8..12], &[1.0, 2.0, 0.002, 2.0]);
        assert_eq!(floats.len(), 4 + 2 * 4 + 3 * 16);
    }
}
