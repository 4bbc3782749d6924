use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const USE_BASE_COLOR_TEXTURE = 1 << 0;
        const USE_NORMAL_TEXTURE = 1 << 1;
        const USE_SPECULAR_TEXTURE = 1 << 2;
        const ALPHA_BLEND = 1 << 3;
        const UNLIT = 1 << 4;
        const DOUBLE_SIDED = 1 << 5;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub base_color: [f32; 4],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub emissive: [f32; 3],
    pub flags: MaterialFlags,
    pub base_color_texture: u32,
    pub normal_texture: u32,
    pub specular_texture: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0],
            shininess: 32.0,
            emissive: [0.0, 0.0, 0.0],
            flags: MaterialFlags::empty(),
            base_color_texture: 0,
            normal_texture: 0,
            specular_texture: 0,
        }
    }
}

impl Material {
    pub fn colored(base_color: [f32; 4]) -> Self {
        Self {
            base_color,
            ..Self::default()
        }
    }

    pub fn with_base_color_texture(mut self, texture: u32) -> Self {
        self.base_color_texture = texture;
        self.flags |= MaterialFlags::USE_BASE_COLOR_TEXTURE;
        self
    }

    pub fn with_normal_texture(mut self, texture: u32) -> Self {
        self.normal_texture = texture;
        self.flags |= MaterialFlags::USE_NORMAL_TEXTURE;
        self
    }

    pub fn with_alpha(mut self) -> Self {
        self.flags |= MaterialFlags::ALPHA_BLEND;
        self
    }

    pub fn unlit(mut self) -> Self {
        self.flags |= MaterialFlags::UNLIT;
        self
    }

    pub fn is_unlit(&self) -> bool {
        self.flags.contains(MaterialFlags::UNLIT)
    }

    /// Parameter block in the exact layout the geometry shader consumes.
    pub fn packed_block(&self) -> MaterialBlock {
        MaterialBlock {
            base_color: self.base_color,
            specular_shininess: [
                self.specular[0],
                self.specular[1],
                self.specular[2],
                self.shininess,
            ],
            emissive_flags: [
                self.emissive[0],
                self.emissive[1],
                self.emissive[2],
                f32::from_bits(self.flags.bits()),
            ],
        }
    }

    /// Content hash of the packed parameter block plus texture bindings.
    /// Two materials with identical content share one parameter-buffer
    /// slot regardless of identity.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        bytemuck::bytes_of(&self.packed_block()).hash(&mut hasher);
        self.base_color_texture.hash(&mut hasher);
        self.normal_texture.hash(&mut hasher);
        self.specular_texture.hash(&mut hasher);
        hasher.finish()
    }

    /// Preprocessor defines selecting the shader combination for this
    /// material.
    pub fn shader_defines(&self) -> Vec<String> {
        let mut defines = Vec::new();
        if self.flags.contains(MaterialFlags::USE_BASE_COLOR_TEXTURE) {
            defines.push("USE_BASE_COLOR_TEXTURE".to_owned());
        }
        if self.flags.contains(MaterialFlags::USE_NORMAL_TEXTURE) {
            defines.push("USE_NORMAL_TEXTURE".to_owned());
        }
        if self.flags.contains(MaterialFlags::USE_SPECULAR_TEXTURE) {
            defines.push("USE_SPECULAR_TEXTURE".to_owned());
        }
        if self.flags.contains(MaterialFlags::UNLIT) {
            defines.push("UNLIT".to_owned());
        }
        defines
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialBlock {
    pub base_color: [f32; 4],
    pub specular_shininess: [f32; 4],
    pub emissive_flags: [f32; 4],
}
