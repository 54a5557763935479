use std::collections::HashMap;
use std::hash::Hash;

use glam::{EulerRot, Quat, Vec3};
use shared::ModelElement;

/// A ray in world space
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// World-space bounds of a model element (primitive + transform)
    pub fn from_element(element: &ModelElement) -> Self {
        let half = Vec3::from(element.primitive.half_extents().map(|v| v as f32));
        let t = &element.transform;
        let scale = Vec3::from(t.scale.map(|v| v as f32));
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            (t.rotation[0] as f32).to_radians(),
            (t.rotation[1] as f32).to_radians(),
            (t.rotation[2] as f32).to_radians(),
        );
        let position = Vec3::from(t.position.map(|v| v as f32));

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            );
            let world = position + rotation * (corner * scale);
            min = min.min(world);
            max = max.max(world);
        }

        Self { min, max }
    }

    /// Center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

/// Bounds enclosing every box in the iterator
pub fn enclosing<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Option<Aabb> {
    boxes
        .into_iter()
        .copied()
        .reduce(|acc, b| acc.union(&b))
}

/// Ray-AABB intersection using the slab method.
/// Returns the distance along the ray to the nearest hit, or None.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let inv_dir = Vec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );

    let t1 = (aabb.min.x - ray.origin.x) * inv_dir.x;
    let t2 = (aabb.max.x - ray.origin.x) * inv_dir.x;
    let t3 = (aabb.min.y - ray.origin.y) * inv_dir.y;
    let t4 = (aabb.max.y - ray.origin.y) * inv_dir.y;
    let t5 = (aabb.min.z - ray.origin.z) * inv_dir.z;
    let t6 = (aabb.max.z - ray.origin.z) * inv_dir.z;

    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Pick the nearest entry whose AABB is intersected by the ray.
pub fn pick_nearest<K: Clone + Eq + Hash>(ray: &Ray, aabbs: &HashMap<K, Aabb>) -> Option<(K, f32)> {
    let mut best: Option<(K, f32)> = None;

    for (key, aabb) in aabbs {
        if let Some(dist) = ray_aabb(ray, aabb) {
            if best.as_ref().is_none_or(|(_, d)| dist < *d) {
                best = Some((key.clone(), dist));
            }
        }
    }

    best
}

/// Unit axis most aligned with `direction`, keeping its sign
pub fn dominant_axis(direction: Vec3) -> Vec3 {
    let abs = direction.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        Vec3::X * direction.x.signum()
    } else if abs.y >= abs.z {
        Vec3::Y * direction.y.signum()
    } else {
        Vec3::Z * direction.z.signum()
    }
}
