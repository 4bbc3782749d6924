mod backend;
mod culler;
mod material;
mod passes;
mod pipeline_config;
#[allow(clippy::module_inception)]
mod renderer;
mod shader_cache;
mod shadows;
mod stage;
mod tiles;

pub use backend::{BackendCall, GraphicsBackend, RecordingBackend, DEPTH_ATTACHMENT};
pub use culler::{cull_items, cull_lights, cull_scene};
pub use material::{Material, MaterialBlock, MaterialFlags};
pub use passes::{
    ClearFlags, ParameterBlock, RasterState, RenderPass, RenderTargetBinding, ShaderPass,
    ShaderValue, TextureBinding, TextureUpdate, Viewport,
};
pub use pipeline_config::{
    ConfigError, PassConfig, PipelineConfig, RasterConfig, ShaderPassConfig, StageConfig,
    TargetConfig, TextureSlotConfig, ViewportConfig,
};
pub use renderer::{Renderer, RendererError};
pub use shader_cache::{ShaderCache, ShaderKey};
pub use shadows::{
    assign_occlusion_masks, calculate_cascade_splits, project_directional, project_point,
    project_spot, ShadowDepthData, ShadowInputs, ShadowOcclusionData, CASCADE_SPLIT_WEIGHT,
};
pub use stage::{
    create_stage, submit_pass, DeferredStage, InitContext, LightingStage, PassTemplate,
    PostProcessStage, RenderStage, ShaderPassTemplate, ShadowStage, StageKind,
};
pub use tiles::{LightTileGrid, Tile, TileRect};
