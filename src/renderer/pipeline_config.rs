use serde::Deserialize;
use thiserror::Error;

use crate::renderer::RasterState;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Declarative description of the render pipeline, consumed once at init.
/// Missing optional fields fall back to engine defaults; a missing
/// mandatory field fails the parse and the loader falls back to the
/// built-in pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub passes: Vec<PassConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassConfig {
    pub name: String,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub clear_color_buffer: bool,
    #[serde(default)]
    pub clear_depth_buffer: bool,
    #[serde(default)]
    pub clear_color: [f32; 4],
    #[serde(default = "default_true")]
    pub color_write: bool,
    #[serde(default = "default_true")]
    pub depth_write: bool,
    /// Override of the default full-screen viewport.
    #[serde(default)]
    pub viewport: Option<ViewportConfig>,
    #[serde(default)]
    pub shader_passes: Vec<ShaderPassConfig>,
}

/// Render target of a pass: the main target unless `offline` is set, in
/// which case a named offline target is created (or reused) with
/// `buffer_count` color attachments, sized by `scale` of the screen or an
/// explicit `size`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub offline: Option<String>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    #[serde(default = "default_buffer_count")]
    pub buffer_count: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            offline: None,
            scale: default_scale(),
            size: None,
            buffer_count: default_buffer_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewportConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShaderPassConfig {
    pub vertex_shader: String,
    pub fragment_shader: String,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub raster: RasterConfig,
    /// Texture bindings by source name, e.g. `gbuffer.1` for the second
    /// color attachment of the `gbuffer` target.
    #[serde(default)]
    pub textures: Vec<TextureSlotConfig>,
    #[serde(default)]
    pub parameter_blocks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextureSlotConfig {
    pub slot: u32,
    pub source: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RasterConfig {
    #[serde(default = "default_true")]
    pub depth_test: bool,
    #[serde(default = "default_true")]
    pub depth_write: bool,
    #[serde(default = "default_true")]
    pub color_write: bool,
    #[serde(default)]
    pub alpha_blend: bool,
    #[serde(default = "default_true")]
    pub cull_backfaces: bool,
}

impl Default for RasterConfig {
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

impl From<RasterConfig> for RasterState {
    fn from(config: RasterConfig) -> Self {
        Self {
            depth_test: config.depth_test,
            depth_write: config.depth_write,
            color_write: config.color_write,
            alpha_blend: config.alpha_blend,
            cull_backfaces: config.cull_backfaces,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_scale() -> f32 {
    1.0
}

fn default_buffer_count() -> u32 {
    1
}

/// The standard deferred pipeline used when no config file is given.
const DEFAULT_PIPELINE: &str = r#"{
  "stages": [
    {
      "name": "shadow",
      "passes": [
        {
          "name": "shadow_occlusion",
          "target": { "offline": "shadow_occlusion" },
          "clear_color_buffer": true,
          "shader_passes": [
            {
              "vertex_shader": "fullscreen.vert",
              "fragment_shader": "shadow_occlusion.frag",
              "raster": { "depth_test": false, "depth_write": false, "cull_backfaces": false },
              "textures": [ { "slot": 0, "source": "gbuffer.depth" } ]
            }
          ]
        }
      ]
    },
    {
      "name": "deferred",
      "passes": [
        {
          "name": "gbuffer",
          "target": { "offline": "gbuffer", "buffer_count": 3 },
          "clear_color_buffer": true,
          "clear_depth_buffer": true,
          "shader_passes": [
            {
              "vertex_shader": "gbuffer.vert",
              "fragment_shader": "gbuffer.frag",
              "parameter_blocks": [ "Materials" ]
            }
          ]
        }
      ]
    },
    {
      "name": "lighting",
      "passes": [
        {
          "name": "tiled_lighting",
          "target": { "offline": "scene" },
          "clear_color_buffer": true,
          "shader_passes": [
            {
              "vertex_shader": "fullscreen.vert",
              "fragment_shader": "tiled_lighting.frag",
              "raster": { "depth_test": false, "depth_write": false, "cull_backfaces": false },
              "textures": [
                { "slot": 0, "source": "gbuffer.0" },
                { "slot": 1, "source": "gbuffer.1" },
                { "slot": 2, "source": "gbuffer.2" },
                { "slot": 3, "source": "gbuffer.depth" },
                { "slot": 4, "source": "shadow_occlusion.0" },
                { "slot": 5, "source": "tile_info" }
              ],
              "parameter_blocks": [ "Lights" ]
            }
          ]
        }
      ]
    },
    {
      "name": "postprocess",
      "passes": [
        {
          "name": "tonemap",
          "shader_passes": [
            {
              "vertex_shader": "fullscreen.vert",
              "fragment_shader": "tonemap.frag",
              "raster": { "depth_test": false, "depth_write": false, "cull_backfaces": false },
              "textures": [
                { "slot": 0, "source": "scene.0" },
                { "slot": 1, "source": "skybox" }
              ]
            }
          ]
        }
      ]
    }
  ]
}"#;

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a pipeline document, falling back to the built-in deferred
    /// pipeline when the file is missing or malformed.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        let path = path.as_ref();
        let load = || -> Result<Self, ConfigError> {
            let contents = std::fs::read_to_string(path)?;
            Self::from_json(&contents)
        };
        match load() {
            Ok(config) => {
                log::info!("Loaded pipeline config from {:?}", path);
                config
            }
            Err(err) => {
                log::warn!(
                    "Pipeline config {:?} unusable ({}). Using the built-in deferred pipeline.",
                    path,
                    err
                );
                Self::standard_deferred()
            }
        }
    }

    pub fn standard_deferred() -> Self {
        Self::from_json(DEFAULT_PIPELINE).expect("built-in pipeline config is valid")
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|stage| stage.name == name)
    }
}
