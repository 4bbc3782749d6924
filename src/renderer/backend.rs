use std::collections::HashMap;

use crate::renderer::{ClearFlags, RasterState, ShaderValue};

/// Attachment index referring to a render target's depth buffer.
pub const DEPTH_ATTACHMENT: u32 = u32::MAX;

/// Interface to the graphics-API backend. All resources are opaque integer
/// handles; the core never sees buffers, textures or programs directly.
///
/// Command submission through this trait is not thread-safe; the renderer
/// only calls it from the thread driving the frame.
pub trait GraphicsBackend {
    fn create_vertex_buffer(&mut self, data: &[u8]) -> u32;
    fn create_index_buffer(&mut self, data: &[u8]) -> u32;
    fn create_texture(&mut self, width: u32, height: u32) -> u32;
    fn create_render_target(&mut self, width: u32, height: u32, color_buffer_count: u32) -> u32;
    /// Compiles and links a program. Returns `None` on failure; the caller
    /// logs and leaves the program unusable (draws referencing it skip).
    fn create_shader_program(
        &mut self,
        vertex_file: &str,
        fragment_file: &str,
        defines: &[String],
    ) -> Option<u32>;
    fn remove_resource(&mut self, handle: u32);

    /// Texture handle of one of a render target's attachments, for
    /// sampling it in a later pass. `attachment` is a color attachment
    /// index, or `DEPTH_ATTACHMENT` for the depth buffer.
    fn render_target_texture(&mut self, target: u32, attachment: u32) -> u32;

    fn set_offline_render_target(&mut self, target: u32);
    fn set_main_render_target(&mut self);
    fn set_view_port(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn set_write_masks(&mut self, color: bool, depth: bool);
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);

    fn set_vertex_data(&mut self, vertex_buffer: u32, index_buffer: u32);
    fn set_raster_state(&mut self, state: &RasterState);
    fn set_shader_program(&mut self, program: u32);
    fn set_texture(&mut self, slot: u32, texture: u32);
    fn update_texture(&mut self, texture: u32, width: u32, height: u32, data: &[u8]);
    fn set_shader_parameter_block(&mut self, name: &str, data: &[u8]);
    fn set_shader_parameter(&mut self, name: &str, value: &ShaderValue);

    fn draw_indexed(&mut self, index_count: u32);
}

/// A backend call as observed by `RecordingBackend`.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    SetOfflineTarget(u32),
    SetMainTarget,
    SetViewPort(i32, i32, u32, u32),
    SetWriteMasks(bool, bool),
    Clear(ClearFlags, [f32; 4]),
    SetVertexData(u32, u32),
    SetRasterState(RasterState),
    SetShaderProgram(u32),
    SetTexture(u32, u32),
    UpdateTexture(u32, u32, u32, usize),
    SetParameterBlock(String, usize),
    SetParameter(String, ShaderValue),
    DrawIndexed(u32),
}

/// Backend that records the call stream instead of touching a GPU. Used by
/// the tests and useful for diffing two frames' submissions.
#[derive(Default)]
pub struct RecordingBackend {
    next_handle: u32,
    bound_vertex_data: Option<(u32, u32)>,
    attachment_textures: HashMap<(u32, u32), u32>,
    pub calls: Vec<BackendCall>,
    /// Program keys this backend should refuse to compile, for exercising
    /// the resource-error path.
    pub fail_programs: Vec<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::DrawIndexed(_)))
            .count()
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_vertex_buffer(&mut self, _data: &[u8]) -> u32 {
        self.allocate()
    }

    fn create_index_buffer(&mut self, _data: &[u8]) -> u32 {
        self.allocate()
    }

    fn create_texture(&mut self, _width: u32, _height: u32) -> u32 {
        self.allocate()
    }

    fn create_render_target(&mut self, _width: u32, _height: u32, _buffers: u32) -> u32 {
        self.allocate()
    }

    fn create_shader_program(
        &mut self,
        vertex_file: &str,
        _fragment_file: &str,
        _defines: &[String],
    ) -> Option<u32> {
        if self.fail_programs.iter().any(|f| f == vertex_file) {
            return None;
        }
        Some(self.allocate())
    }

    fn remove_resource(&mut self, _handle: u32) {}

    fn render_target_texture(&mut self, target: u32, attachment: u32) -> u32 {
        if let Some(&texture) = self.attachment_textures.get(&(target, attachment)) {
            return texture;
        }
        let texture = self.allocate();
        self.attachment_textures.insert((target, attachment), texture);
        texture
    }

    fn set_offline_render_target(&mut self, target: u32) {
        self.calls.push(BackendCall::SetOfflineTarget(target));
    }

    fn set_main_render_target(&mut self) {
        self.calls.push(BackendCall::SetMainTarget);
    }

    fn set_view_port(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.calls.push(BackendCall::SetViewPort(x, y, width, height));
    }

    fn set_write_masks(&mut self, color: bool, depth: bool) {
        self.calls.push(BackendCall::SetWriteMasks(color, depth));
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        self.calls.push(BackendCall::Clear(flags, color));
    }

    fn set_vertex_data(&mut self, vertex_buffer: u32, index_buffer: u32) {
        self.bound_vertex_data = Some((vertex_buffer, index_buffer));
        self.calls
            .push(BackendCall::SetVertexData(vertex_buffer, index_buffer));
    }

    fn set_raster_state(&mut self, state: &RasterState) {
        self.calls.push(BackendCall::SetRasterState(*state));
    }

    fn set_shader_program(&mut self, program: u32) {
        self.calls.push(BackendCall::SetShaderProgram(program));
    }

    fn set_texture(&mut self, slot: u32, texture: u32) {
        self.calls.push(BackendCall::SetTexture(slot, texture));
    }

    fn update_texture(&mut self, texture: u32, width: u32, height: u32, data: &[u8]) {
        self.calls
            .push(BackendCall::UpdateTexture(texture, width, height, data.len()));
    }

    fn set_shader_parameter_block(&mut self, name: &str, data: &[u8]) {
        self.calls
            .push(BackendCall::SetParameterBlock(name.to_owned(), data.len()));
    }

    fn set_shader_parameter(&mut self, name: &str, value: &ShaderValue) {
        self.calls
            .push(BackendCall::SetParameter(name.to_owned(), *value));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        if self.bound_vertex_data.is_none() {
            log::warn!("draw_indexed with no vertex data bound; skipping");
            return;
        }
        self.calls.push(BackendCall::DrawIndexed(index_count));
    }
}
