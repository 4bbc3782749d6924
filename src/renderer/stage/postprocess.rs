use crate::renderer::stage::{InitContext, PassTemplate, RenderStage, StageKind};
use crate::renderer::{RenderPass, StageConfig, TextureUpdate};
use crate::scene::{FrameSnapshot, Geometry};

/// Name the skybox cubemap texture is registered under for pipeline
/// texture bindings.
const SKYBOX_TEXTURE: &str = "skybox";

/// Post-process stage: the configured fullscreen passes that turn the lit
/// scene into the final image on the main target. Also owns the skybox
/// texture and re-uploads it when the scene swaps cubemaps.
pub struct PostProcessStage {
    config: StageConfig,
    templates: Vec<PassTemplate>,
    skybox_texture: u32,
    uploaded_skybox_version: u64,
    fullscreen: Geometry,
    passes: Vec<RenderPass>,
}

impl PostProcessStage {
    pub fn new(config: &StageConfig, ctx: &mut InitContext<'_>) -> Self {
        // Placeholder until the scene provides pixels.
        let skybox_texture = ctx.backend.create_texture(1, 1);
        ctx.textures.insert(SKYBOX_TEXTURE.to_owned(), skybox_texture);

        let templates = config
            .passes
            .iter()
            .map(|pass| PassTemplate::from_config(pass, ctx))
            .collect();

        Self {
            config: config.clone(),
            templates,
            skybox_texture,
            uploaded_skybox_version: 0,
            fullscreen: ctx.fullscreen_geometry,
            passes: Vec::new(),
        }
    }
}

impl RenderStage for PostProcessStage {
    fn kind(&self) -> StageKind {
        StageKind::PostProcess
    }

    fn clear_stage(&mut self) {
        self.passes.clear();
    }

    fn update(&mut self, frame: &FrameSnapshot) {
        for template in &self.templates {
            self.passes.push(template.instantiate(&self.fullscreen));
        }

        let Some(skybox) = &frame.skybox else {
            return;
        };
        if skybox.version == self.uploaded_skybox_version {
            return;
        }
        if let Some(first) = self.passes.first_mut() {
            // Cubemap faces stacked vertically in one upload.
            first.texture_updates.push(TextureUpdate {
                texture: self.skybox_texture,
                width: skybox.face_size,
                height: skybox.face_size * 6,
                data: skybox.pixels.as_ref().clone(),
            });
            self.uploaded_skybox_version = skybox.version;
        }
    }

    fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    fn resize_resources(&mut self, ctx: &mut InitContext<'_>) {
        self.templates = self
            .config
            .passes
            .iter()
            .map(|pass| PassTemplate::from_config(pass, ctx))
            .collect();
    }
}
