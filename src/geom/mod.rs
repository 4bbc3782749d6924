mod aabb;
mod frustum;
mod plane;
mod sphere;

pub use aabb::Aabb;
pub use frustum::Frustum;
pub use plane::Plane;
pub use sphere::Sphere;

/// Result of classifying a bounding volume against a culling volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    Outside,
    Inside,
    Intersects,
}

/// A volume geometry can be culled against (camera frustum, light sphere).
pub trait CullVolume {
    fn classify_aabb(&self, aabb: &Aabb) -> Containment;

    /// Cheap binary test: true when the sphere is provably outside the
    /// volume. Ambiguous overlaps return false (conservative accept).
    fn rejects_sphere(&self, sphere: &Sphere) -> bool;
}
