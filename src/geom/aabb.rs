use glam::{Mat4, Vec3};

use super::Containment;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::EMPTY;
        for &p in points {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn merge(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// World-space box enclosing this box under an affine transform.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let corners = self.corners();
        let mut out = Self::EMPTY;
        for corner in corners {
            let p = matrix.transform_point3(corner);
            out.min = out.min.min(p);
            out.max = out.max.max(p);
        }
        out
    }

    pub fn classify_point(&self, point: Vec3) -> Containment {
        if point.x < self.min.x
            || point.y < self.min.y
            || point.z < self.min.z
            || point.x > self.max.x
            || point.y > self.max.y
            || point.z > self.max.z
        {
            Containment::Outside
        } else if point.x > self.min.x
            && point.y > self.min.y
            && point.z > self.min.z
            && point.x < self.max.x
            && point.y < self.max.y
            && point.z < self.max.z
        {
            Containment::Inside
        } else {
            Containment::Intersects
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn points_outside_classify_outside() {
        let b = unit_box();
        for p in [
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, -5.0, 0.0),
            Vec3::new(1.5, 1.5, 1.5),
        ] {
            assert_eq!(b.classify_point(p), Containment::Outside);
        }
    }

    #[test]
    fn points_strictly_inside_classify_inside() {
        let b = unit_box();
        for p in [Vec3::ZERO, Vec3::splat(0.5), Vec3::new(-0.9, 0.2, 0.1)] {
            assert_eq!(b.classify_point(p), Containment::Inside);
        }
    }

    #[test]
    fn boundary_points_intersect() {
        let b = unit_box();
        assert_eq!(
            b.classify_point(Vec3::new(1.0, 0.0, 0.0)),
            Containment::Intersects
        );
    }

    #[test]
    fn transformed_encloses_rotated_corners() {
        let b = unit_box();
        let m = Mat4::from_rotation_z(45f32.to_radians());
        let t = b.transformed(&m);
        let expected = 2f32.sqrt();
        assert!((t.max.x - expected).abs() < 1e-5);
        assert!((t.max.y - expected).abs() < 1e-5);
    }

    #[test]
    fn merge_grows_bounds() {
        let mut a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        a.merge(&Aabb::new(Vec3::splat(-2.0), Vec3::splat(-1.0)));
        assert_eq!(a.min, Vec3::splat(-2.0));
        assert_eq!(a.max, Vec3::ONE);
    }
}
