mod deferred;
mod lighting;
mod postprocess;
mod shadow;

pub use deferred::DeferredStage;
pub use lighting::LightingStage;
pub use postprocess::PostProcessStage;
pub use shadow::ShadowStage;

use std::collections::HashMap;

use crate::renderer::{
    ClearFlags, GraphicsBackend, PassConfig, RasterState, RenderPass, RenderTargetBinding,
    ShaderCache, ShaderKey, ShaderPass, StageConfig, TextureBinding, Viewport, DEPTH_ATTACHMENT,
};
use crate::scene::{FrameSnapshot, Geometry};
use crate::settings::RenderSettings;

/// The closed set of render stage kinds, in fixed submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    Shadow,
    Deferred,
    Lighting,
    PostProcess,
}

impl StageKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "shadow" => Some(Self::Shadow),
            "deferred" => Some(Self::Deferred),
            "lighting" => Some(Self::Lighting),
            "postprocess" => Some(Self::PostProcess),
            _ => None,
        }
    }
}

/// Shared resources handed to stages while they create their GPU-side
/// resources. Only used at init and resize; during per-frame updates the
/// stages touch nothing but their own state and the frame snapshot.
pub struct InitContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub cache: &'a mut ShaderCache,
    /// Named offline render targets shared across stages.
    pub targets: &'a mut HashMap<String, u32>,
    /// Named standalone textures shared across stages.
    pub textures: &'a mut HashMap<String, u32>,
    pub settings: &'a RenderSettings,
    pub screen: (u32, u32),
    pub fullscreen_geometry: Geometry,
}

impl InitContext<'_> {
    /// Creates (or reuses) the offline target a pass config names, and
    /// returns the binding for the pass. `None` target config means the
    /// main target.
    pub fn resolve_target(&mut self, pass: &PassConfig) -> RenderTargetBinding {
        let Some(name) = pass.target.offline.as_deref() else {
            return RenderTargetBinding::Main;
        };
        if let Some(&handle) = self.targets.get(name) {
            return RenderTargetBinding::Offline(handle);
        }
        let (width, height) = match pass.target.size {
            Some([w, h]) => (w, h),
            None => (
                (self.screen.0 as f32 * pass.target.scale) as u32,
                (self.screen.1 as f32 * pass.target.scale) as u32,
            ),
        };
        let handle = self
            .backend
            .create_render_target(width.max(1), height.max(1), pass.target.buffer_count);
        self.targets.insert(name.to_owned(), handle);
        RenderTargetBinding::Offline(handle)
    }

    /// Resolves a texture source name: either `target.N` / `target.depth`
    /// for a render target attachment, or a bare registered texture name.
    /// Unknown sources are logged and skipped (degraded output, not a
    /// failure).
    pub fn resolve_texture(&mut self, source: &str) -> Option<u32> {
        if let Some((target_name, attachment)) = source.rsplit_once('.') {
            if let Some(&target) = self.targets.get(target_name) {
                let attachment = if attachment == "depth" {
                    Some(DEPTH_ATTACHMENT)
                } else {
                    attachment.parse::<u32>().ok()
                };
                if let Some(attachment) = attachment {
                    return Some(self.backend.render_target_texture(target, attachment));
                }
            }
        }
        if let Some(&texture) = self.textures.get(source) {
            return Some(texture);
        }
        log::error!("Unknown texture source '{}' in pipeline config; binding skipped", source);
        None
    }

    pub fn viewport_for(&self, pass: &PassConfig) -> Viewport {
        match pass.viewport {
            Some(v) => Viewport {
                x: v.x,
                y: v.y,
                width: v.width,
                height: v.height,
            },
            None => Viewport::full(self.screen.0, self.screen.1),
        }
    }
}

/// A pass prebuilt from config at init time: everything that does not
/// change frame to frame. Stages instantiate it each frame and splice in
/// the per-frame blocks, parameters and texture updates.
#[derive(Clone)]
pub struct PassTemplate {
    pub label: String,
    pub target: RenderTargetBinding,
    pub viewport: Viewport,
    pub color_write: bool,
    pub depth_write: bool,
    pub clear_flags: ClearFlags,
    pub clear_color: [f32; 4],
    pub shader_passes: Vec<ShaderPassTemplate>,
}

#[derive(Clone)]
pub struct ShaderPassTemplate {
    pub program: ShaderKey,
    pub raster: RasterState,
    pub textures: Vec<TextureBinding>,
    pub block_names: Vec<String>,
}

impl PassTemplate {
    pub fn from_config(pass: &PassConfig, ctx: &mut InitContext<'_>) -> Self {
        let target = ctx.resolve_target(pass);
        let viewport = ctx.viewport_for(pass);

        let mut clear_flags = ClearFlags::empty();
        if pass.clear_color_buffer {
            clear_flags |= ClearFlags::COLOR;
        }
        if pass.clear_depth_buffer {
            clear_flags |= ClearFlags::DEPTH;
        }

        let shader_passes = pass
            .shader_passes
            .iter()
            .map(|sp| ShaderPassTemplate {
                program: ShaderKey::new(
                    sp.vertex_shader.clone(),
                    sp.fragment_shader.clone(),
                    sp.defines.clone(),
                ),
                raster: sp.raster.into(),
                textures: sp
                    .textures
                    .iter()
                    .filter_map(|t| {
                        ctx.resolve_texture(&t.source).map(|texture| TextureBinding {
                            slot: t.slot,
                            texture,
                        })
                    })
                    .collect(),
                block_names: sp.parameter_blocks.clone(),
            })
            .collect();

        Self {
            label: pass.name.clone(),
            target,
            viewport,
            color_write: pass.color_write,
            depth_write: pass.depth_write,
            clear_flags,
            clear_color: pass.clear_color,
            shader_passes,
        }
    }

    /// Builds the frame's render pass, drawing each configured shader pass
    /// with the given geometry. Blocks and parameters start empty.
    pub fn instantiate(&self, geometry: &Geometry) -> RenderPass {
        let mut pass = RenderPass::new(self.label.clone(), self.target, self.viewport)
            .with_clear(self.clear_flags, self.clear_color);
        pass.color_write = self.color_write;
        pass.depth_write = self.depth_write;
        pass.shader_passes = self
            .shader_passes
            .iter()
            .map(|template| ShaderPass {
                program: template.program.clone(),
                vertex_buffer: geometry.vertex_buffer,
                index_buffer: geometry.index_buffer,
                index_count: geometry.index_count,
                raster: template.raster,
                textures: template.textures.clone(),
                blocks: Vec::new(),
                params: Vec::new(),
            })
            .collect();
        pass
    }
}

/// One stage of the render pipeline. Driven in lockstep by the renderer:
/// `clear_stage()`, then `update()` (on a pool thread, reading only the
/// frame snapshot and the stage's own state), then `execute()` on the
/// frame thread in fixed stage order.
pub trait RenderStage: Send {
    fn kind(&self) -> StageKind;

    /// Drops all per-frame-built passes. Pure reset, no backend calls.
    fn clear_stage(&mut self);

    /// Rebuilds the stage's render passes from the frame snapshot.
    fn update(&mut self, frame: &FrameSnapshot);

    fn passes(&self) -> &[RenderPass];

    /// Walks the built passes and issues them through the backend.
    /// Mechanical and stateless with respect to prior frames.
    fn execute(&self, backend: &mut dyn GraphicsBackend, cache: &mut ShaderCache) {
        for pass in self.passes() {
            submit_pass(backend, cache, pass);
        }
    }

    /// Recreates size-dependent resources after a window resize. Must
    /// complete (for every stage) before the next frame is dispatched.
    fn resize_resources(&mut self, ctx: &mut InitContext<'_>);
}

/// Constructs the stage a config block names. Unknown stage names are a
/// configuration error: logged, and the stage is skipped so the engine
/// continues with a degraded pipeline.
pub fn create_stage(
    config: &StageConfig,
    ctx: &mut InitContext<'_>,
) -> Option<Box<dyn RenderStage>> {
    match StageKind::from_name(&config.name) {
        Some(StageKind::Shadow) => Some(Box::new(ShadowStage::new(config, ctx))),
        Some(StageKind::Deferred) => Some(Box::new(DeferredStage::new(config, ctx))),
        Some(StageKind::Lighting) => Some(Box::new(LightingStage::new(config, ctx))),
        Some(StageKind::PostProcess) => Some(Box::new(PostProcessStage::new(config, ctx))),
        None => {
            log::error!("Unknown render stage '{}' in pipeline config; skipping", config.name);
            None
        }
    }
}

/// Issues one render pass in the exact backend call sequence: bind target,
/// bind viewport, set write masks, clear if flagged, then per shader pass
/// vertex data, raster state, program, textures, parameter blocks and
/// scalar parameters, then the draw.
pub fn submit_pass(backend: &mut dyn GraphicsBackend, cache: &mut ShaderCache, pass: &RenderPass) {
    match pass.target {
        RenderTargetBinding::Main => backend.set_main_render_target(),
        RenderTargetBinding::Offline(target) => backend.set_offline_render_target(target),
    }
    backend.set_view_port(
        pass.viewport.x,
        pass.viewport.y,
        pass.viewport.width,
        pass.viewport.height,
    );
    backend.set_write_masks(pass.color_write, pass.depth_write);
    if !pass.clear_flags.is_empty() {
        backend.clear(pass.clear_flags, pass.clear_color);
    }
    for update in &pass.texture_updates {
        backend.update_texture(update.texture, update.width, update.height, &update.data);
    }

    for shader_pass in &pass.shader_passes {
        // Compilation happens here on the frame thread; pool-side updates
        // only ever compute keys.
        let Some(program) = cache.get_or_compile(backend, &shader_pass.program) else {
            // Already logged by the cache; skip the draw defensively.
            continue;
        };
        backend.set_vertex_data(shader_pass.vertex_buffer, shader_pass.index_buffer);
        backend.set_raster_state(&shader_pass.raster);
        backend.set_shader_program(program);
        for texture in &shader_pass.textures {
            backend.set_texture(texture.slot, texture.texture);
        }
        for block in &shader_pass.blocks {
            backend.set_shader_parameter_block(&block.name, &block.data);
        }
        for (name, value) in &shader_pass.params {
            backend.set_shader_parameter(name, value);
        }
        backend.draw_indexed(shader_pass.index_count);
    }
}
