use glam::{Mat4, Vec3, Vec4};

use super::{Aabb, Containment, CullVolume, Plane, Sphere};

/// View frustum as six inward-facing planes plus the eight world-space
/// corner points (near quad first, then far quad).
///
/// Conventions follow the rest of the codebase: right-handed view space,
/// clip depth in [0, 1].
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
    pub corners: [Vec3; 8],
}

impl Frustum {
    /// Extracts planes (Gribb-Hartmann) and corners from a combined
    /// view-projection matrix.
    pub fn from_view_proj(view_proj: Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        let planes = [
            Plane::from_coefficients(r3 + r0), // left
            Plane::from_coefficients(r3 - r0), // right
            Plane::from_coefficients(r3 + r1), // bottom
            Plane::from_coefficients(r3 - r1), // top
            Plane::from_coefficients(r2),      // near (z = 0 in clip space)
            Plane::from_coefficients(r3 - r2), // far
        ];

        let inv = view_proj.inverse();
        let mut corners = [Vec3::ZERO; 8];
        let mut index = 0;
        for z in [0.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for x in [-1.0f32, 1.0] {
                    let clip = Vec4::new(x, y, z, 1.0);
                    let world = inv * clip;
                    corners[index] = world.truncate() / world.w;
                    index += 1;
                }
            }
        }

        Self { planes, corners }
    }

    pub fn centroid(&self) -> Vec3 {
        self.corners.iter().sum::<Vec3>() / 8.0
    }

    /// Corners of the sub-frustum between `slice_near` and `slice_far`
    /// (distances from the eye along the view direction), interpolated from
    /// the full near/far corner pairs.
    pub fn slice_corners(&self, near: f32, far: f32, slice_near: f32, slice_far: f32) -> [Vec3; 8] {
        let range = far - near;
        let t_near = (slice_near - near) / range;
        let t_far = (slice_far - near) / range;

        let mut out = [Vec3::ZERO; 8];
        for i in 0..4 {
            let n = self.corners[i];
            let f = self.corners[i + 4];
            out[i] = n + (f - n) * t_near;
            out[i + 4] = n + (f - n) * t_far;
        }
        out
    }
}

impl CullVolume for Frustum {
    fn classify_aabb(&self, aabb: &Aabb) -> Containment {
        let corners = aabb.corners();
        let mut all_inside = true;
        for plane in &self.planes {
            let mut outside_count = 0;
            for corner in &corners {
                if plane.signed_distance(*corner) < 0.0 {
                    outside_count += 1;
                }
            }
            if outside_count == 8 {
                return Containment::Outside;
            }
            if outside_count > 0 {
                all_inside = false;
            }
        }
        if all_inside {
            Containment::Inside
        } else {
            Containment::Intersects
        }
    }

    fn rejects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .any(|plane| plane.signed_distance(sphere.center) < -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_proj(proj * view)
    }

    #[test]
    fn box_at_origin_is_inside() {
        let f = camera_frustum();
        let b = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        assert_eq!(f.classify_aabb(&b), Containment::Inside);
    }

    #[test]
    fn box_behind_camera_is_outside() {
        let f = camera_frustum();
        let b = Aabb::new(Vec3::new(-1.0, -1.0, 10.0), Vec3::new(1.0, 1.0, 12.0));
        assert_eq!(f.classify_aabb(&b), Containment::Outside);
    }

    #[test]
    fn box_straddling_near_plane_intersects() {
        let f = camera_frustum();
        let b = Aabb::new(Vec3::new(-0.5, -0.5, 4.0), Vec3::new(0.5, 0.5, 6.0));
        assert_eq!(f.classify_aabb(&b), Containment::Intersects);
    }

    #[test]
    fn culling_is_conservative_for_huge_boxes() {
        // A box enclosing the whole frustum has corners outside every plane
        // but must never be rejected.
        let f = camera_frustum();
        let b = Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0));
        assert_eq!(f.classify_aabb(&b), Containment::Intersects);
    }

    #[test]
    fn sphere_rejection_is_conservative() {
        let f = camera_frustum();
        assert!(f.rejects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 200.0), 1.0)));
        assert!(!f.rejects_sphere(&Sphere::new(Vec3::ZERO, 1.0)));
        // Tangent sphere stays accepted.
        assert!(!f.rejects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 6.0), 1.0)));
    }

    #[test]
    fn corners_sit_on_near_and_far_planes() {
        let f = camera_frustum();
        for corner in &f.corners[0..4] {
            assert!((corner.z - 4.9).abs() < 1e-3, "near corner {corner:?}");
        }
        for corner in &f.corners[4..8] {
            assert!((corner.z + 95.0).abs() < 0.5, "far corner {corner:?}");
        }
    }

    #[test]
    fn slice_corners_interpolate_between_planes() {
        let f = camera_frustum();
        let sliced = f.slice_corners(0.1, 100.0, 0.1, 50.0);
        for i in 0..4 {
            assert!(sliced[i].abs_diff_eq(f.corners[i], 1e-4));
        }
        // Far slice corners lie halfway along each near->far edge.
        for i in 0..4 {
            let expected = f.corners[i] + (f.corners[i + 4] - f.corners[i]) * (49.9 / 99.9);
            assert!(sliced[i + 4].abs_diff_eq(expected, 1e-3));
        }
    }
}
