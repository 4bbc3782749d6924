use std::collections::HashMap;

use crate::renderer::stage::{InitContext, PassTemplate, RenderStage, StageKind};
use crate::renderer::{
    cull_scene, MaterialBlock, MaterialFlags, ParameterBlock, RenderPass, ShaderKey, ShaderPass,
    ShaderValue, StageConfig,
};
use crate::scene::FrameSnapshot;

/// Geometry stage: draws every camera-visible item into the G-buffer.
/// Opaque geometry first, then blended items with depth writes off.
pub struct DeferredStage {
    config: StageConfig,
    template: PassTemplate,
    passes: Vec<RenderPass>,
}

impl DeferredStage {
    pub fn new(config: &StageConfig, ctx: &mut InitContext<'_>) -> Self {
        Self {
            config: config.clone(),
            template: Self::build_template(config, ctx),
            passes: Vec::new(),
        }
    }

    fn build_template(config: &StageConfig, ctx: &mut InitContext<'_>) -> PassTemplate {
        if let Some(pass) = config.passes.first() {
            PassTemplate::from_config(pass, ctx)
        } else {
            log::error!("Deferred stage configured without a geometry pass");
            PassTemplate {
                label: "gbuffer".to_owned(),
                target: crate::renderer::RenderTargetBinding::Main,
                viewport: crate::renderer::Viewport::full(ctx.screen.0, ctx.screen.1),
                color_write: true,
                depth_write: true,
                clear_flags: crate::renderer::ClearFlags::COLOR | crate::renderer::ClearFlags::DEPTH,
                clear_color: [0.0; 4],
                shader_passes: Vec::new(),
            }
        }
    }
}

impl RenderStage for DeferredStage {
    fn kind(&self) -> StageKind {
        StageKind::Deferred
    }

    fn clear_stage(&mut self) {
        self.passes.clear();
    }

    fn update(&mut self, frame: &FrameSnapshot) {
        let mut items = cull_scene(&frame.meshes, &frame.camera.frustum);
        // Stable partition: opaque items keep scene order, blended items
        // draw last with depth writes off.
        items.sort_by_key(|item| item.material.flags.contains(MaterialFlags::ALPHA_BLEND));

        let Some(base) = self.template.shader_passes.first() else {
            return;
        };

        let mut pass = self.template.instantiate_empty();

        // Deduplicate material content: identical materials share one slot
        // in the packed parameter buffer.
        let mut slots: HashMap<u64, i32> = HashMap::new();
        let mut blocks: Vec<MaterialBlock> = Vec::new();

        for item in &items {
            let hash = item.material.content_hash();
            let slot = *slots.entry(hash).or_insert_with(|| {
                blocks.push(item.material.packed_block());
                blocks.len() as i32 - 1
            });

            let mut defines = base.program.defines.clone();
            defines.extend(item.material.shader_defines());

            let mut raster = base.raster;
            if item.material.flags.contains(MaterialFlags::ALPHA_BLEND) {
                raster.alpha_blend = true;
                raster.depth_write = false;
            }
            if item.material.flags.contains(MaterialFlags::DOUBLE_SIDED) {
                raster.cull_backfaces = false;
            }

            let mut textures = base.textures.clone();
            if item.material.flags.contains(MaterialFlags::USE_BASE_COLOR_TEXTURE) {
                textures.push(crate::renderer::TextureBinding {
                    slot: 0,
                    texture: item.material.base_color_texture,
                });
            }
            if item.material.flags.contains(MaterialFlags::USE_NORMAL_TEXTURE) {
                textures.push(crate::renderer::TextureBinding {
                    slot: 1,
                    texture: item.material.normal_texture,
                });
            }
            if item.material.flags.contains(MaterialFlags::USE_SPECULAR_TEXTURE) {
                textures.push(crate::renderer::TextureBinding {
                    slot: 2,
                    texture: item.material.specular_texture,
                });
            }

            pass.shader_passes.push(ShaderPass {
                program: ShaderKey::new(
                    base.program.vertex_file.clone(),
                    base.program.fragment_file.clone(),
                    defines,
                ),
                vertex_buffer: item.geometry.vertex_buffer,
                index_buffer: item.geometry.index_buffer,
                index_count: item.geometry.index_count,
                raster,
                textures,
                blocks: Vec::new(),
                params: vec![
                    (
                        "u_model".to_owned(),
                        ShaderValue::Mat4(item.world_from_local.to_cols_array_2d()),
                    ),
                    (
                        "u_view_proj".to_owned(),
                        ShaderValue::Mat4(frame.camera.view_proj.to_cols_array_2d()),
                    ),
                    ("u_material_index".to_owned(), ShaderValue::Int(slot)),
                ],
            });
        }

        if let Some(first) = pass.shader_passes.first_mut() {
            for name in &base.block_names {
                first.blocks.push(ParameterBlock {
                    name: name.clone(),
                    data: bytemuck::cast_slice(&blocks).to_vec(),
                });
            }
        }

        self.passes.push(pass);
    }

    fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    fn resize_resources(&mut self, ctx: &mut InitContext<'_>) {
        let config = self.config.clone();
        self.template = Self::build_template(&config, ctx);
    }
}

impl PassTemplate {
    /// Like `instantiate` but with no prebuilt shader passes; the deferred
    /// stage emits one per visible item instead.
    fn instantiate_empty(&self) -> RenderPass {
        let mut pass = RenderPass::new(self.label.clone(), self.target, self.viewport)
            .with_clear(self.clear_flags, self.clear_color);
        pass.color_write = self.color_write;
        pass.depth_write = self.depth_write;
        pass
    }
}
