use bitflags::bitflags;

use crate::renderer::ShaderKey;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTargetBinding {
    /// The swapchain / window surface.
    Main,
    /// An offline target previously created through the backend.
    Offline(u32),
}

/// Fixed-function state for one shader pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub color_write: bool,
    pub alpha_blend: bool,
    pub cull_backfaces: bool,
}

impl Default for RasterState {
    /// Depth-tested opaque state.
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            color_write: true,
            alpha_blend: false,
            cull_backfaces: true,
        }
    }
}

impl RasterState {
    pub fn fullscreen() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            cull_backfaces: false,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShaderValue {
    Float(f32),
    Int(i32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    pub slot: u32,
    pub texture: u32,
}

/// Named shader parameter block, already packed to its GPU byte layout.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterBlock {
    pub name: String,
    pub data: Vec<u8>,
}

/// Per-frame texture content refresh, applied before the pass draws.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureUpdate {
    pub texture: u32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// One draw: program, geometry, state and bindings. Backend-agnostic
/// value type rebuilt every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderPass {
    pub program: ShaderKey,
    pub vertex_buffer: u32,
    pub index_buffer: u32,
    pub index_count: u32,
    pub raster: RasterState,
    pub textures: Vec<TextureBinding>,
    pub blocks: Vec<ParameterBlock>,
    pub params: Vec<(String, ShaderValue)>,
}

/// One GPU submission unit: a target, viewport, clear state and an ordered
/// list of shader passes. No cross-frame identity is implied.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPass {
    pub label: String,
    pub target: RenderTargetBinding,
    pub viewport: Viewport,
    pub color_write: bool,
    pub depth_write: bool,
    pub clear_flags: ClearFlags,
    pub clear_color: [f32; 4],
    pub texture_updates: Vec<TextureUpdate>,
    pub shader_passes: Vec<ShaderPass>,
}

impl RenderPass {
    pub fn new(label: impl Into<String>, target: RenderTargetBinding, viewport: Viewport) -> Self {
        Self {
            label: label.into(),
            target,
            viewport,
            color_write: true,
            depth_write: true,
            clear_flags: ClearFlags::empty(),
            clear_color: [0.0; 4],
            texture_updates: Vec::new(),
            shader_passes: Vec::new(),
        }
    }

    pub fn with_clear(mut self, flags: ClearFlags, color: [f32; 4]) -> Self {
        self.clear_flags = flags;
        self.clear_color = color;
        self
    }
}
