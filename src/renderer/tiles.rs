use glam::{Mat4, Vec2, Vec3};

use crate::scene::{CameraSnapshot, Light, LightKind, MAX_LIGHTS};

/// Screen-space tile rectangle in normalized device coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl TileRect {
    pub const FULL_SCREEN: Self = Self {
        min: Vec2::splat(-1.0),
        max: Vec2::splat(1.0),
    };

    /// Inclusive overlap: a rectangle exactly tangent to another counts as
    /// overlapping, so a light touching a tile edge never pops.
    pub fn overlaps(&self, other: &TileRect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

#[derive(Clone, Debug)]
pub struct Tile {
    pub rect: TileRect,
    pub lights: Vec<u32>,
}

/// Partitions the screen into fixed-size tiles and records, per tile, the
/// lights that may affect it. Also packs the flat light parameter buffer
/// the lighting shader consumes.
pub struct LightTileGrid {
    tiles_x: u32,
    tiles_y: u32,
    max_lights_per_tile: usize,
    tiles: Vec<Tile>,
    /// Dense `num_tiles x max_lights_per_tile` matrix of light indices,
    /// -1 meaning no light. Sized by the configured maximum, not the
    /// per-frame light count.
    tile_light_info: Vec<i32>,
    light_buffer: Vec<[f32; 4]>,
    bound_light_count: usize,
}

impl LightTileGrid {
    pub fn new(max_lights_per_tile: usize) -> Self {
        Self {
            tiles_x: 0,
            tiles_y: 0,
            max_lights_per_tile,
            tiles: Vec::new(),
            tile_light_info: Vec::new(),
            light_buffer: Vec::new(),
            bound_light_count: 0,
        }
    }

    /// (Re)allocates the tile array for the given screen size. Each tile's
    /// NDC rectangle is computed once here; the final row/column may extend
    /// past the viewport when the screen size is not a tile multiple.
    pub fn set_grid_dimensions(&mut self, tile_w: u32, tile_h: u32, screen_w: u32, screen_h: u32) {
        self.tiles_x = screen_w.div_ceil(tile_w);
        self.tiles_y = screen_h.div_ceil(tile_h);

        self.tiles.clear();
        self.tiles
            .reserve((self.tiles_x * self.tiles_y) as usize);
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let px_min = Vec2::new((tx * tile_w) as f32, (ty * tile_h) as f32);
                let px_max = Vec2::new(((tx + 1) * tile_w) as f32, ((ty + 1) * tile_h) as f32);
                let screen = Vec2::new(screen_w as f32, screen_h as f32);
                self.tiles.push(Tile {
                    rect: TileRect {
                        min: px_min / screen * 2.0 - Vec2::ONE,
                        max: px_max / screen * 2.0 - Vec2::ONE,
                    },
                    lights: Vec::new(),
                });
            }
        }
        self.tile_light_info = vec![-1; self.tiles.len() * self.max_lights_per_tile];
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn grid_size(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }

    pub fn tile_light_info(&self) -> &[i32] {
        &self.tile_light_info
    }

    /// Packed light parameter buffer: one header vec4 (light count + global
    /// ambient) followed by four vec4s per light.
    pub fn light_buffer(&self) -> &[[f32; 4]] {
        &self.light_buffer
    }

    pub fn light_buffer_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.light_buffer)
    }

    /// Tile-light-index texture content: width = this frame's light count,
    /// height = tile count, each texel a light index or -1.
    pub fn tile_texture_data(&self) -> (u32, u32, Vec<i32>) {
        let width = self.bound_light_count;
        let height = self.tiles.len();
        let mut data = Vec::with_capacity(width * height);
        for tile in 0..height {
            let row = &self.tile_light_info
                [tile * self.max_lights_per_tile..(tile + 1) * self.max_lights_per_tile];
            for x in 0..width {
                data.push(if x < row.len() { row[x] } else { -1 });
            }
        }
        (width as u32, height as u32, data)
    }

    /// Projects each light's bounding volume into screen space and appends
    /// its index to every overlapping tile, while packing the flat light
    /// parameter buffer.
    pub fn bin_lights(&mut self, lights: &[Light], camera: &CameraSnapshot, ambient: Vec3) {
        assert!(
            lights.len() <= MAX_LIGHTS,
            "light count {} exceeds the system-wide maximum {}",
            lights.len(),
            MAX_LIGHTS
        );

        for tile in &mut self.tiles {
            tile.lights.clear();
        }
        self.tile_light_info.fill(-1);

        self.light_buffer.clear();
        self.light_buffer
            .push([lights.len() as f32, ambient.x, ambient.y, ambient.z]);

        let mut dropped = 0usize;
        for (index, light) in lights.iter().enumerate() {
            let view_pos = camera.view.transform_point3(light.position);
            let view_dir = camera.view.transform_vector3(light.world_direction());

            // Directional lights reach every pixel; everything else gets a
            // tight view-space bounding sphere projected to a 2D rectangle.
            let rect = match light.kind {
                LightKind::Directional => TileRect::FULL_SCREEN,
                _ => project_2d(view_pos, light.radius, &camera.proj),
            };

            for (tile_index, tile) in self.tiles.iter_mut().enumerate() {
                if !tile.rect.overlaps(&rect) {
                    continue;
                }
                if tile.lights.len() >= self.max_lights_per_tile {
                    dropped += 1;
                    continue;
                }
                let slot = tile.lights.len();
                tile.lights.push(index as u32);
                self.tile_light_info[tile_index * self.max_lights_per_tile + slot] = index as i32;
            }

            self.light_buffer.push([view_pos.x, view_pos.y, view_pos.z, light.radius]);
            self.light_buffer
                .push([light.color.x, light.color.y, light.color.z, light.falloff]);
            self.light_buffer
                .push([view_dir.x, view_dir.y, view_dir.z, light.kind.type_tag()]);
            self.light_buffer.push([
                light.outer_angle.cos(),
                light.inner_angle.cos(),
                light.occlusion_mask as f32,
                light.shadow_bias,
            ]);
        }

        if dropped > 0 {
            log::warn!(
                "{} tile/light assignments dropped; tiles at the {}-light cap",
                dropped,
                self.max_lights_per_tile
            );
        }
        self.bound_light_count = lights.len();
    }
}

/// Projects the bounding box of a view-space sphere through the projection
/// matrix and returns the enclosing screen-space rectangle: all 8 corners,
/// divided by w, min/max over the results.
fn project_2d(view_center: Vec3, radius: f32, proj: &Mat4) -> TileRect {
    let min = view_center - Vec3::splat(radius);
    let max = view_center + Vec3::splat(radius);
    let corners = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ];

    let mut rect = TileRect {
        min: Vec2::splat(f32::INFINITY),
        max: Vec2::splat(f32::NEG_INFINITY),
    };
    for corner in corners {
        let clip = *proj * corner.extend(1.0);
        let ndc = Vec2::new(clip.x, clip.y) / clip.w;
        rect.min = rect.min.min(ndc);
        rect.max = rect.max.max(ndc);
    }
    rect
}
