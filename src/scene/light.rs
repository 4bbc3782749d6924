use glam::{Quat, Vec3};

use crate::geom::Sphere;

/// System-wide capacity limits. Exceeding them is a hard invariant
/// violation and fails loudly instead of silently corrupting buffers.
pub const MAX_LIGHTS: usize = 1000;
pub const MAX_SHADOW_LIGHTS: usize = 32;
pub const MAX_CASCADES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Spot,
    Point,
}

impl LightKind {
    /// Tag written into the packed light parameter buffer.
    pub fn type_tag(self) -> f32 {
        match self {
            LightKind::Directional => 0.0,
            LightKind::Spot => 1.0,
            LightKind::Point => 2.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub rotation: Quat,
    /// Base direction, rotated by `rotation` to get the world direction.
    pub direction: Vec3,
    pub color: Vec3,
    pub radius: f32,
    pub falloff: f32,
    /// Cone angles in radians, spot lights only.
    pub inner_angle: f32,
    pub outer_angle: f32,
    pub cast_shadows: bool,
    pub shadow_bias: f32,
    /// Extends the shadow near plane backward to capture casters behind
    /// the visible frustum (directional lights).
    pub shadow_near_offset: f32,
    /// Power-of-two bit identifying this light in the packed per-pixel
    /// shadow-test result. Assigned fresh each frame; zero when the light
    /// casts no shadow.
    pub occlusion_mask: u32,
    cascade_splits: Vec<f32>,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            direction,
            color,
            radius: 0.0,
            falloff: 0.0,
            inner_angle: 0.0,
            outer_angle: 0.0,
            cast_shadows: false,
            shadow_bias: 0.002,
            shadow_near_offset: 0.0,
            occlusion_mask: 0,
            cascade_splits: Vec::new(),
        }
    }

    pub fn point(position: Vec3, color: Vec3, radius: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Z,
            radius,
            falloff: 1.0,
            ..Self::directional(Vec3::NEG_Z, color)
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        radius: f32,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction,
            radius,
            falloff: 1.0,
            inner_angle,
            outer_angle,
            ..Self::directional(direction, color)
        }
    }

    pub fn with_shadows(mut self, bias: f32) -> Self {
        self.cast_shadows = true;
        self.shadow_bias = bias;
        self
    }

    pub fn world_direction(&self) -> Vec3 {
        self.rotation * self.direction
    }

    /// World-space bounding sphere of the light's influence. Directional
    /// lights affect everything and have no meaningful bound.
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.position, self.radius)
    }

    /// Caller-specified cascade far distances (directional only). Invalid
    /// sets (empty handled separately, too many, or not strictly
    /// increasing) are logged and ignored.
    pub fn set_cascade_splits(&mut self, splits: &[f32]) {
        if splits.len() > MAX_CASCADES {
            log::warn!(
                "Ignoring cascade splits: {} given, at most {} supported",
                splits.len(),
                MAX_CASCADES
            );
            return;
        }
        if splits.windows(2).any(|w| w[0] >= w[1]) {
            log::warn!("Ignoring cascade splits: distances must be strictly increasing");
            return;
        }
        self.cascade_splits = splits.to_vec();
    }

    pub fn cascade_splits(&self) -> &[f32] {
        &self.cascade_splits
    }
}
