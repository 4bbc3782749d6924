use crate::geom::{Containment, CullVolume, Frustum};
use crate::scene::{Light, LightKind, MeshSnapshot, RenderItemSnapshot};

/// Flat cull: keeps every item whose world bounds are not provably outside
/// the volume. Pure function of its inputs; no input is mutated.
pub fn cull_items(
    items: &[RenderItemSnapshot],
    volume: &impl CullVolume,
) -> Vec<RenderItemSnapshot> {
    items
        .iter()
        .filter(|item| volume.classify_aabb(&item.world_bounds) != Containment::Outside)
        .copied()
        .collect()
}

/// Hierarchical cull: classifies each mesh's world bounds first and only
/// falls back to per-item tests on ambiguous overlap.
pub fn cull_scene(meshes: &[MeshSnapshot], volume: &impl CullVolume) -> Vec<RenderItemSnapshot> {
    let mut culled = Vec::new();
    for mesh in meshes {
        match volume.classify_aabb(&mesh.world_bounds) {
            // Whole mesh visible: take every item without further tests.
            Containment::Inside => culled.extend(mesh.items.iter().copied()),
            Containment::Intersects => {
                for item in &mesh.items {
                    if volume.classify_aabb(&item.world_bounds) != Containment::Outside {
                        culled.push(*item);
                    }
                }
            }
            // No action: an outside mesh and all its items are dropped.
            Containment::Outside => {}
        }
    }
    culled
}

/// Keeps the lights that may affect the camera frustum. Directional lights
/// affect everything; the rest are rejected only when their bounding
/// sphere provably misses the frustum (binary accept/reject, ambiguous
/// overlaps are accepted).
pub fn cull_lights(lights: &[Light], frustum: &Frustum) -> Vec<Light> {
    lights
        .iter()
        .filter(|light| {
            light.kind == LightKind::Directional || !frustum.rejects_sphere(&light.bounding_sphere())
        })
        .cloned()
        .collect()
}
