use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_tile_size")]
    pub tile_width: u32,
    #[serde(default = "RenderSettings::default_tile_size")]
    pub tile_height: u32,
    #[serde(default = "RenderSettings::default_max_lights_per_tile")]
    pub max_lights_per_tile: u32,
    #[serde(default = "RenderSettings::default_cascade_count")]
    pub cascade_count: u32,
    #[serde(default)]
    pub resolution: Resolution,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            tile_width: Self::default_tile_size(),
            tile_height: Self::default_tile_size(),
            max_lights_per_tile: Self::default_max_lights_per_tile(),
            cascade_count: Self::default_cascade_count(),
            resolution: Resolution::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.tile_width == 0 || self.tile_height == 0 {
            warn!("Tile dimensions must be greater than zero. Using default tile size.");
            self.tile_width = Self::default_tile_size();
            self.tile_height = Self::default_tile_size();
        }

        if self.max_lights_per_tile == 0 {
            warn!("Max lights per tile must be greater than zero. Using default value.");
            self.max_lights_per_tile = Self::default_max_lights_per_tile();
        }

        if self.cascade_count == 0 || self.cascade_count > crate::scene::MAX_CASCADES as u32 {
            warn!(
                "Cascade count must be between 1 and {}. Using default value.",
                crate::scene::MAX_CASCADES
            );
            self.cascade_count = Self::default_cascade_count();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        self
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    const fn default_tile_size() -> u32 {
        64
    }

    const fn default_max_lights_per_tile() -> u32 {
        64
    }

    const fn default_cascade_count() -> u32 {
        4
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
