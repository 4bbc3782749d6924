use glam::{Mat4, Vec3};

use crate::geom::Aabb;
use crate::scene::{CameraSnapshot, Light, MAX_SHADOW_LIGHTS};

/// Weight of the logarithmic term in the practical cascade split scheme.
pub const CASCADE_SPLIT_WEIGHT: f32 = 0.65;

/// Fraction of the light radius used as the near plane of spot/point
/// shadow projections.
const SHADOW_NEAR_FRACTION: f32 = 0.005;

/// Per-frame camera-derived inputs shared by all shadow projections.
#[derive(Clone, Copy, Debug)]
pub struct ShadowInputs {
    pub camera_near: f32,
    pub camera_far: f32,
    pub frustum_corners: [Vec3; 8],
    pub frustum_centroid: Vec3,
    pub camera_view: Mat4,
    pub shadow_map_size: u32,
    /// Cascade count used when a light does not specify its own splits.
    pub cascade_count: u32,
}

impl ShadowInputs {
    pub fn from_camera(camera: &CameraSnapshot, shadow_map_size: u32, cascade_count: u32) -> Self {
        Self {
            camera_near: camera.near,
            camera_far: camera.far,
            frustum_corners: camera.frustum.corners,
            frustum_centroid: camera.frustum.centroid(),
            camera_view: camera.view,
            shadow_map_size,
            cascade_count,
        }
    }
}

/// Light-space view-projection matrices for one light, one entry per
/// cascade or cube face. Rebuilt every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowDepthData {
    pub view_proj: Vec<Mat4>,
    /// Cascade far distances (directional lights only, empty otherwise).
    pub splits: Vec<f32>,
}

/// Matrices mapping camera-view-space positions directly into light clip
/// space, used by the screen-space shadow-occlusion lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowOcclusionData {
    pub view_to_light: Vec<Mat4>,
    pub occlusion_mask: u32,
    pub bias: f32,
}

/// Gives each shadow-casting light of the frame a unique power-of-two
/// occlusion-mask bit. At most `MAX_SHADOW_LIGHTS` lights may cast shadows
/// concurrently; exceeding that is a hard invariant violation.
pub fn assign_occlusion_masks(lights: &mut [Light]) {
    let mut next_bit = 0u32;
    for light in lights.iter_mut() {
        if light.cast_shadows {
            assert!(
                (next_bit as usize) < MAX_SHADOW_LIGHTS,
                "more than {} concurrently shadow-casting lights",
                MAX_SHADOW_LIGHTS
            );
            light.occlusion_mask = 1 << next_bit;
            next_bit += 1;
        } else {
            light.occlusion_mask = 0;
        }
    }
}

/// Practical split scheme: a weighted blend of logarithmic and uniform
/// splits. `split[count - 1]` lands exactly on `far`.
pub fn calculate_cascade_splits(near: f32, far: f32, count: u32) -> Vec<f32> {
    let w = CASCADE_SPLIT_WEIGHT;
    let count = count.max(1);
    (1..=count)
        .map(|i| {
            let t = i as f32 / count as f32;
            w * near * (far / near).powf(t) + (1.0 - w) * (near + (far - near) * t)
        })
        .collect()
}

/// Cascaded shadow projections for directional lights. The returned
/// vectors are index-aligned with `lights`.
pub fn project_directional(
    lights: &[Light],
    inputs: &ShadowInputs,
) -> (Vec<ShadowDepthData>, Vec<ShadowOcclusionData>) {
    let inv_camera_view = inputs.camera_view.inverse();
    let mut depth = Vec::with_capacity(lights.len());
    let mut occlusion = Vec::with_capacity(lights.len());

    for light in lights {
        let dir = light.world_direction().normalize();
        let up = light_up(dir);
        let eye = inputs.frustum_centroid - dir * (inputs.camera_far - inputs.camera_near);
        let view = Mat4::look_at_rh(eye, inputs.frustum_centroid, up);

        let splits = if light.cascade_splits().is_empty() {
            calculate_cascade_splits(inputs.camera_near, inputs.camera_far, inputs.cascade_count)
        } else {
            light.cascade_splits().to_vec()
        };

        let mut view_proj = Vec::with_capacity(splits.len());
        let mut view_to_light = Vec::with_capacity(splits.len());
        let mut split_near = inputs.camera_near;
        for &split_far in &splits {
            let slice = slice_frustum_corners(
                &inputs.frustum_corners,
                inputs.camera_near,
                inputs.camera_far,
                split_near,
                split_far,
            );
            let proj = fit_cascade_projection(
                &view,
                &slice,
                inputs.shadow_map_size,
                light.shadow_near_offset,
            );
            let vp = proj * view;
            view_to_light.push(vp * inv_camera_view);
            view_proj.push(vp);
            split_near = split_far;
        }

        depth.push(ShadowDepthData { view_proj, splits });
        occlusion.push(ShadowOcclusionData {
            view_to_light,
            occlusion_mask: light.occlusion_mask,
            bias: light.shadow_bias,
        });
    }

    (depth, occlusion)
}

/// Single perspective shadow projection per spot light: looking down the
/// cone, FOV equal to the outer cone angle, far plane at the light radius.
pub fn project_spot(
    lights: &[Light],
    inputs: &ShadowInputs,
) -> (Vec<ShadowDepthData>, Vec<ShadowOcclusionData>) {
    let inv_camera_view = inputs.camera_view.inverse();
    let mut depth = Vec::with_capacity(lights.len());
    let mut occlusion = Vec::with_capacity(lights.len());

    for light in lights {
        let dir = light.world_direction().normalize();
        let up = light_up(dir);
        let target = light.position + dir * light.radius;
        let view = Mat4::look_at_rh(light.position, target, up);
        let proj = Mat4::perspective_rh(
            light.outer_angle,
            1.0,
            light.radius * SHADOW_NEAR_FRACTION,
            light.radius,
        );
        let vp = proj * view;

        depth.push(ShadowDepthData {
            view_proj: vec![vp],
            splits: Vec::new(),
        });
        occlusion.push(ShadowOcclusionData {
            view_to_light: vec![vp * inv_camera_view],
            occlusion_mask: light.occlusion_mask,
            bias: light.shadow_bias,
        });
    }

    (depth, occlusion)
}

/// Cubemap face order and up vectors for point-light shadows.
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Six 90-degree perspective projections per point light, one per cubemap
/// face.
pub fn project_point(
    lights: &[Light],
    inputs: &ShadowInputs,
) -> (Vec<ShadowDepthData>, Vec<ShadowOcclusionData>) {
    let inv_camera_view = inputs.camera_view.inverse();
    let mut depth = Vec::with_capacity(lights.len());
    let mut occlusion = Vec::with_capacity(lights.len());

    for light in lights {
        let proj = Mat4::perspective_rh(
            std::f32::consts::FRAC_PI_2,
            1.0,
            light.radius * SHADOW_NEAR_FRACTION,
            light.radius,
        );

        let mut view_proj = Vec::with_capacity(CUBE_FACES.len());
        let mut view_to_light = Vec::with_capacity(CUBE_FACES.len());
        for (face_dir, up) in CUBE_FACES {
            let view = Mat4::look_at_rh(light.position, light.position + face_dir, up);
            let vp = proj * view;
            view_to_light.push(vp * inv_camera_view);
            view_proj.push(vp);
        }

        depth.push(ShadowDepthData {
            view_proj,
            splits: Vec::new(),
        });
        occlusion.push(ShadowOcclusionData {
            view_to_light,
            occlusion_mask: light.occlusion_mask,
            bias: light.shadow_bias,
        });
    }

    (depth, occlusion)
}

/// World up unless the light direction is nearly parallel to it, which
/// would degenerate the look-at basis.
fn light_up(dir: Vec3) -> Vec3 {
    if dir.dot(Vec3::Y).abs() > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Corners of the camera sub-frustum between `split_near` and `split_far`,
/// interpolated along the near-to-far corner edges.
fn slice_frustum_corners(
    corners: &[Vec3; 8],
    near: f32,
    far: f32,
    split_near: f32,
    split_far: f32,
) -> [Vec3; 8] {
    let range = far - near;
    let t_near = (split_near - near) / range;
    let t_far = (split_far - near) / range;

    let mut out = [Vec3::ZERO; 8];
    for i in 0..4 {
        let edge = corners[i + 4] - corners[i];
        out[i] = corners[i] + edge * t_near;
        out[i + 4] = corners[i] + edge * t_far;
    }
    out
}

/// Floor-quantizes a coordinate to whole texels.
pub(crate) fn texel_snap(value: f32, texel_size: f32) -> f32 {
    (value / texel_size).floor() * texel_size
}

/// Tight orthographic projection around the split frustum in light space,
/// with min/max snapped to shadow-map texels so shadow edges stay put
/// under camera motion.
fn fit_cascade_projection(
    light_view: &Mat4,
    slice: &[Vec3; 8],
    shadow_map_size: u32,
    near_offset: f32,
) -> Mat4 {
    let light_space: Vec<Vec3> = slice
        .iter()
        .map(|&corner| light_view.transform_point3(corner))
        .collect();
    let bounds = Aabb::from_points(&light_space);

    // World units covered by one shadow-map texel, derived from the split
    // frustum diagonal so it only changes when the split geometry does.
    let diagonal = (slice[0] - slice[7]).length();
    let texel_size = diagonal / shadow_map_size as f32;

    let min_x = texel_snap(bounds.min.x, texel_size);
    let min_y = texel_snap(bounds.min.y, texel_size);
    let max_x = texel_snap(bounds.max.x, texel_size) + texel_size;
    let max_y = texel_snap(bounds.max.y, texel_size) + texel_size;

    // Light view space looks down -Z; the near plane is extended backward
    // by the light's minimum-distance offset to catch casters behind the
    // visible frustum.
    let near = -bounds.max.z - near_offset;
    let far = -bounds.min.z;

    Mat4::orthographic_rh(min_x, max_x, min_y, max_y, near, far)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Camera, Projection};
    use glam::{Vec3Swizzles, Vec4Swizzles};

    fn camera_inputs(near: f32, far: f32) -> ShadowInputs {
        let camera = Camera::new(
            Vec3::new(0.0, 5.0, 20.0),
            Vec3::ZERO,
            Projection::Perspective {
                fov_y_radians: 60f32.to_radians(),
                aspect: 16.0 / 9.0,
            },
            near,
            far,
        );
        ShadowInputs::from_camera(&camera.snapshot(), 2048, 4)
    }

    #[test]
    fn cascade_splits_increase_and_end_at_far() {
        let splits = calculate_cascade_splits(0.1, 1000.0, 4);
        assert_eq!(splits.len(), 4);
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1], "splits not increasing: {splits:?}");
        }
        assert!((splits[3] - 1000.0).abs() < 1e-2, "last split {}", splits[3]);
    }

    #[test]
    fn cascade_split_formula_matches_weighted_blend() {
        let (near, far) = (1.0f32, 100.0f32);
        let splits = calculate_cascade_splits(near, far, 4);
        let w = CASCADE_SPLIT_WEIGHT;
        let expected =
            w * near * (far / near).powf(0.25) + (1.0 - w) * (near + (far - near) * 0.25);
        assert!((splits[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn directional_projection_encloses_split_frustum() {
        let inputs = camera_inputs(0.1, 100.0);
        let mut light = Light::directional(Vec3::new(-0.4, -1.0, -0.3).normalize(), Vec3::ONE);
        light.cast_shadows = true;
        let (depth, occlusion) = project_directional(std::slice::from_ref(&light), &inputs);

        assert_eq!(depth.len(), 1);
        assert_eq!(depth[0].view_proj.len(), 4);
        assert_eq!(occlusion[0].view_to_light.len(), 4);

        // Every corner of each split frustum must land inside the cascade's
        // clip volume (texel snapping only ever widens the bounds in -x/-y
        // and we pad +x/+y by one texel).
        let mut split_near = inputs.camera_near;
        for (i, &split_far) in depth[0].splits.iter().enumerate() {
            let slice = slice_frustum_corners(
                &inputs.frustum_corners,
                inputs.camera_near,
                inputs.camera_far,
                split_near,
                split_far,
            );
            for corner in slice {
                let clip = depth[0].view_proj[i] * corner.extend(1.0);
                let ndc = clip.xyz() / clip.w;
                assert!(ndc.x >= -1.001 && ndc.x <= 1.001, "x out of clip: {ndc}");
                assert!(ndc.y >= -1.001 && ndc.y <= 1.001, "y out of clip: {ndc}");
                assert!(ndc.z >= -0.001 && ndc.z <= 1.001, "z out of clip: {ndc}");
            }
            split_near = split_far;
        }
    }

    #[test]
    fn vertical_light_direction_gets_fallback_up() {
        let inputs = camera_inputs(0.1, 100.0);
        let light = Light::directional(Vec3::NEG_Y, Vec3::ONE);
        let (depth, _) = project_directional(std::slice::from_ref(&light), &inputs);
        for m in &depth[0].view_proj {
            assert!(m.is_finite(), "degenerate look-at produced {m:?}");
        }
    }

    #[test]
    fn texel_snap_quantizes_downward() {
        assert_eq!(texel_snap(3.7, 0.5), 3.5);
        assert_eq!(texel_snap(-3.7, 0.5), -4.0);
        assert_eq!(texel_snap(4.0, 0.5), 4.0);
    }

    #[test]
    fn snapped_bounds_are_texel_multiples() {
        let inputs = camera_inputs(0.1, 100.0);
        // A small camera shift inside one texel must not change the
        // cascade projection; that is the whole point of snapping.
        let light = Light::directional(Vec3::new(0.2, -1.0, 0.1).normalize(), Vec3::ONE);
        let (a, _) = project_directional(std::slice::from_ref(&light), &inputs);

        let mut shifted = inputs;
        let delta = Vec3::splat(1e-4);
        for corner in shifted.frustum_corners.iter_mut() {
            *corner += delta;
        }
        shifted.frustum_centroid += delta;
        let (b, _) = project_directional(std::slice::from_ref(&light), &shifted);

        // The light view translates with the centroid but the snapped
        // orthographic window covers the same texel grid, so corner 0 of
        // the first cascade projects to (nearly) the same texel position.
        let probe = inputs.frustum_corners[0];
        let pa = (a[0].view_proj[0] * probe.extend(1.0)).xy();
        let pb = (b[0].view_proj[0] * (probe + delta).extend(1.0)).xy();
        assert!((pa - pb).length() < 1e-3, "shimmer: {pa:?} vs {pb:?}");
    }

    #[test]
    fn spot_projection_near_and_far_follow_radius() {
        let inputs = camera_inputs(0.1, 100.0);
        let radius = 40.0;
        let light = Light::spot(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::NEG_Z,
            Vec3::ONE,
            radius,
            0.3,
            0.6,
        );
        let (depth, _) = project_spot(std::slice::from_ref(&light), &inputs);
        assert_eq!(depth[0].view_proj.len(), 1);

        let vp = depth[0].view_proj[0];
        let dir = light.world_direction().normalize();

        // A point at the far plane projects to depth 1, one at the near
        // plane (0.005 * radius) to depth 0.
        let far_point = light.position + dir * radius;
        let clip = vp * far_point.extend(1.0);
        assert!((clip.z / clip.w - 1.0).abs() < 1e-3);

        let near_point = light.position + dir * (radius * 0.005);
        let clip = vp * near_point.extend(1.0);
        assert!((clip.z / clip.w).abs() < 1e-3);
    }

    #[test]
    fn point_light_gets_six_square_faces() {
        let inputs = camera_inputs(0.1, 100.0);
        let light = Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::ONE, 10.0);
        let (depth, occlusion) = project_point(std::slice::from_ref(&light), &inputs);

        assert_eq!(depth[0].view_proj.len(), 6);
        assert_eq!(occlusion[0].view_to_light.len(), 6);

        for (i, (face_dir, _)) in CUBE_FACES.iter().enumerate() {
            let vp = depth[0].view_proj[i];
            assert!(vp.is_finite());
            // Each face looks along its axis: a point at the far plane in
            // that direction projects to center screen at depth 1.
            let p = light.position + *face_dir * light.radius;
            let clip = vp * p.extend(1.0);
            let ndc = clip.xyz() / clip.w;
            assert!(ndc.xy().length() < 1e-4);
            assert!((ndc.z - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn view_to_light_maps_camera_view_space_into_light_clip() {
        let inputs = camera_inputs(0.1, 100.0);
        let light = Light::point(Vec3::new(0.0, 4.0, 0.0), Vec3::ONE, 20.0);
        let (depth, occlusion) = project_point(std::slice::from_ref(&light), &inputs);

        let world = Vec3::new(1.0, 1.0, -2.0);
        let view_pos = inputs.camera_view.transform_point3(world);
        for face in 0..6 {
            let direct = depth[0].view_proj[face] * world.extend(1.0);
            let via_view = occlusion[0].view_to_light[face] * view_pos.extend(1.0);
            assert!(direct.abs_diff_eq(via_view, 1e-3));
        }
    }

    #[test]
    fn occlusion_masks_are_unique_power_of_two_bits() {
        let mut lights: Vec<Light> = (0..5)
            .map(|_| Light::point(Vec3::ZERO, Vec3::ONE, 1.0).with_shadows(0.001))
            .collect();
        lights.push(Light::point(Vec3::ZERO, Vec3::ONE, 1.0));
        assign_occlusion_masks(&mut lights);

        let masks: Vec<u32> = lights[0..5].iter().map(|l| l.occlusion_mask).collect();
        assert_eq!(masks, vec![1, 2, 4, 8, 16]);
        assert_eq!(lights[5].occlusion_mask, 0);
    }

    #[test]
    #[should_panic(expected = "shadow-casting")]
    fn too_many_shadow_casters_fail_loudly() {
        let mut lights: Vec<Light> = (0..MAX_SHADOW_LIGHTS + 1)
            .map(|_| Light::point(Vec3::ZERO, Vec3::ONE, 1.0).with_shadows(0.001))
            .collect();
        assign_occlusion_masks(&mut lights);
    }
}
