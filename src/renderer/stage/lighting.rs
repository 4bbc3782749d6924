use crate::renderer::stage::{InitContext, PassTemplate, RenderStage, StageKind};
use crate::renderer::{
    assign_occlusion_masks, cull_lights, LightTileGrid, ParameterBlock, RenderPass, ShaderValue,
    StageConfig, TextureUpdate,
};
use crate::scene::{FrameSnapshot, Geometry, MAX_LIGHTS};

/// Name the tile-light-index texture is registered under for pipeline
/// texture bindings.
const TILE_INFO_TEXTURE: &str = "tile_info";

/// Tiled lighting stage: bins the frame's lights into screen tiles, packs
/// the light parameter buffer and draws the fullscreen shading pass over
/// the G-buffer.
pub struct LightingStage {
    config: StageConfig,
    templates: Vec<PassTemplate>,
    grid: LightTileGrid,
    tile_width: u32,
    tile_height: u32,
    tile_texture: u32,
    fullscreen: Geometry,
    passes: Vec<RenderPass>,
}

impl LightingStage {
    pub fn new(config: &StageConfig, ctx: &mut InitContext<'_>) -> Self {
        let mut grid = LightTileGrid::new(ctx.settings.max_lights_per_tile as usize);
        grid.set_grid_dimensions(
            ctx.settings.tile_width,
            ctx.settings.tile_height,
            ctx.screen.0,
            ctx.screen.1,
        );

        // Sized for the worst case once; per-frame content shrinks to the
        // actual light count via the update dimensions.
        let tile_texture = ctx
            .backend
            .create_texture(MAX_LIGHTS as u32, grid.tile_count() as u32);
        ctx.textures.insert(TILE_INFO_TEXTURE.to_owned(), tile_texture);

        let templates = config
            .passes
            .iter()
            .map(|pass| PassTemplate::from_config(pass, ctx))
            .collect();

        Self {
            config: config.clone(),
            templates,
            grid,
            tile_width: ctx.settings.tile_width,
            tile_height: ctx.settings.tile_height,
            tile_texture,
            fullscreen: ctx.fullscreen_geometry,
            passes: Vec::new(),
        }
    }
}

impl RenderStage for LightingStage {
    fn kind(&self) -> StageKind {
        StageKind::Lighting
    }

    fn clear_stage(&mut self) {
        self.passes.clear();
    }

    fn update(&mut self, frame: &FrameSnapshot) {
        // Same cull and mask assignment as the shadow stage, so the mask
        // bits in the light buffer line up with the occlusion texture.
        let mut lights = cull_lights(&frame.lights, &frame.camera.frustum);
        assign_occlusion_masks(&mut lights);
        self.grid.bin_lights(&lights, &frame.camera, frame.global_ambient);

        let (tiles_x, tiles_y) = self.grid.grid_size();
        for template in &self.templates {
            let mut pass = template.instantiate(&self.fullscreen);

            let (width, height, data) = self.grid.tile_texture_data();
            if width > 0 {
                pass.texture_updates.push(TextureUpdate {
                    texture: self.tile_texture,
                    width,
                    height,
                    data: bytemuck::cast_slice(&data).to_vec(),
                });
            }

            if let Some(first) = pass.shader_passes.first_mut() {
                for name in template
                    .shader_passes
                    .first()
                    .map(|sp| sp.block_names.as_slice())
                    .unwrap_or(&[])
                {
                    first.blocks.push(ParameterBlock {
                        name: name.clone(),
                        data: self.grid.light_buffer_bytes().to_vec(),
                    });
                }
                first.params.push(("u_tiles_x".to_owned(), ShaderValue::Int(tiles_x as i32)));
                first.params.push(("u_tiles_y".to_owned(), ShaderValue::Int(tiles_y as i32)));
                first.params.push((
                    "u_tile_size".to_owned(),
                    ShaderValue::Vec4([
                        self.tile_width as f32,
                        self.tile_height as f32,
                        0.0,
                        0.0,
                    ]),
                ));
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
        self.grid.set_grid_dimensions(
            self.tile_width,
            self.tile_height,
            ctx.screen.0,
            ctx.screen.1,
        );

        ctx.backend.remove_resource(self.tile_texture);
        self.tile_texture = ctx
            .backend
            .create_texture(MAX_LIGHTS as u32, self.grid.tile_count() as u32);
        ctx.textures.insert(TILE_INFO_TEXTURE.to_owned(), self.tile_texture);

        self.templates = self
            .config
            .passes
            .iter()
            .map(|pass| PassTemplate::from_config(pass, ctx))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Aabb;
    use crate::renderer::{
        GraphicsBackend, PipelineConfig, RecordingBackend, RenderTargetBinding, ShaderCache,
    };
    use crate::scene::{Light, Scene};
    use crate::settings::RenderSettings;
    use glam::Vec3;
    use std::collections::HashMap;

    fn fullscreen_geometry() -> Geometry {
        Geometry {
            vertex_buffer: 1,
            index_buffer: 2,
            index_count: 3,
            bounds: Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
        }
    }

    fn build_stage(backend: &mut RecordingBackend) -> LightingStage {
        let mut cache = ShaderCache::new();
        let mut targets = HashMap::new();
        let mut textures = HashMap::new();
        targets.insert("gbuffer".to_owned(), backend.create_render_target(1280, 720, 3));
        targets.insert(
            "shadow_occlusion".to_owned(),
            backend.create_render_target(1280, 720, 1),
        );
        let settings = RenderSettings::default();
        let mut ctx = InitContext {
            backend,
            cache: &mut cache,
            targets: &mut targets,
            textures: &mut textures,
            settings: &settings,
            screen: (1280, 720),
            fullscreen_geometry: fullscreen_geometry(),
        };
        let config = PipelineConfig::standard_deferred();
        LightingStage::new(config.stage("lighting").unwrap(), &mut ctx)
    }

    fn scene_with_lights(lights: Vec<Light>) -> Scene {
        let mut scene = Scene::new();
        for light in lights {
            scene.add_light(light);
        }
        scene
    }

    #[test]
    fn builds_one_fullscreen_pass_with_the_light_buffer() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = scene_with_lights(vec![
            Light::point(Vec3::new(0.0, 0.0, -2.0), Vec3::ONE, 5.0),
            Light::directional(Vec3::NEG_Y, Vec3::ONE),
        ]);
        scene.set_global_ambient(Vec3::splat(0.1));
        stage.update(&scene.snapshot());

        assert_eq!(stage.passes.len(), 1);
        let pass = &stage.passes[0];
        assert!(matches!(pass.target, RenderTargetBinding::Offline(_)));

        let block = &pass.shader_passes[0].blocks[0];
        assert_eq!(block.name, "Lights");
        // Header vec4 plus four vec4s per light.
        assert_eq!(block.data.len(), (1 + 4 * 2) * 16);
    }

    #[test]
    fn tile_texture_update_matches_the_light_count() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = scene_with_lights(vec![Light::directional(Vec3::NEG_Y, Vec3::ONE)]);
        stage.update(&scene.snapshot());

        let update = &stage.passes[0].texture_updates[0];
        assert_eq!(update.texture, stage.tile_texture);
        assert_eq!(update.width, 1);
        assert_eq!(update.height, stage.grid.tile_count() as u32);
    }

    #[test]
    fn no_lights_means_no_tile_upload_but_still_a_pass() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = scene_with_lights(Vec::new());
        stage.update(&scene.snapshot());

        assert_eq!(stage.passes.len(), 1);
        assert!(stage.passes[0].texture_updates.is_empty());
    }

    #[test]
    fn offscreen_lights_are_culled_before_binning() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let mut scene = scene_with_lights(vec![
            Light::point(Vec3::new(0.0, 0.0, -2.0), Vec3::ONE, 5.0),
            Light::point(Vec3::new(0.0, 0.0, 500.0), Vec3::ONE, 5.0),
        ]);
        stage.update(&scene.snapshot());

        let block = &stage.passes[0].shader_passes[0].blocks[0];
        let floats: &[f32] = bytemuck::cast_slice(&block.data);
        assert_eq!(floats[0], 1.0);
    }

    #[test]
    fn resize_recreates_the_tile_texture() {
        let mut backend = RecordingBackend::new();
        let mut stage = build_stage(&mut backend);
        let before = stage.tile_texture;

        let mut cache = ShaderCache::new();
        let mut targets = HashMap::new();
        let mut textures = HashMap::new();
        targets.insert("gbuffer".to_owned(), backend.create_render_target(1920, 1080, 3));
        targets.insert(
            "shadow_occlusion".to_owned(),
            backend.create_render_target(1920, 1080, 1),
        );
        let settings = RenderSettings::default();
        let mut ctx = InitContext {
            backend: &mut backend,
            cache: &mut cache,
            targets: &mut targets,
            textures: &mut textures,
            settings: &settings,
            screen: (1920, 1080),
            fullscreen_geometry: fullscreen_geometry(),
        };
        stage.resize_resources(&mut ctx);

        assert_ne!(stage.tile_texture, before);
        assert_eq!(stage.grid.grid_size(), (30, 17));
        assert_eq!(textures[TILE_INFO_TEXTURE], stage.tile_texture);
    }
}
