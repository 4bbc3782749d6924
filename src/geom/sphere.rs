use glam::Vec3;

use super::{Aabb, Containment, CullVolume};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Axis-aligned box tightly enclosing the sphere.
    pub fn enclosing_aabb(&self) -> Aabb {
        Aabb::new(
            self.center - Vec3::splat(self.radius),
            self.center + Vec3::splat(self.radius),
        )
    }
}

impl CullVolume for Sphere {
    fn classify_aabb(&self, aabb: &Aabb) -> Containment {
        // Squared distance from the center to the closest point on the box.
        let closest = self.center.clamp(aabb.min, aabb.max);
        let dist_sq = (closest - self.center).length_squared();
        if dist_sq > self.radius * self.radius {
            return Containment::Outside;
        }

        let r_sq = self.radius * self.radius;
        let fully_inside = aabb
            .corners()
            .iter()
            .all(|&c| (c - self.center).length_squared() <= r_sq);
        if fully_inside {
            Containment::Inside
        } else {
            Containment::Intersects
        }
    }

    fn rejects_sphere(&self, sphere: &Sphere) -> bool {
        let combined = self.radius + sphere.radius;
        (sphere.center - self.center).length_squared() > combined * combined
    }
}
