use serde::{Deserialize, Serialize};
use shared::PlaneGeometry;

/// Identifier of a clipping plane within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaneId(pub u64);

/// A clipping plane record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingPlane {
    pub id: PlaneId,
    pub origin: [f64; 3],
    pub normal: [f64; 3],
}

/// Ordered planes with stack discipline: create appends, delete pops the
/// most recently created plane.
#[derive(Debug, Clone, Default)]
pub struct ClippingPlaneSet {
    planes: Vec<ClippingPlane>,
    next_id: u64,
}

impl ClippingPlaneSet {
    /// Id the next pushed plane will get
    pub fn next_id(&self) -> PlaneId {
        PlaneId(self.next_id)
    }

    pub fn push(&mut self, id: PlaneId, geometry: PlaneGeometry) -> &ClippingPlane {
        self.next_id = self.next_id.max(id.0 + 1);
        self.planes.push(ClippingPlane {
            id,
            origin: geometry.origin,
            normal: geometry.normal,
        });
        &self.planes[self.planes.len() - 1]
    }

    /// Remove and return the most recently created plane
    pub fn pop(&mut self) -> Option<ClippingPlane> {
        self.planes.pop()
    }

    pub fn last(&self) -> Option<&ClippingPlane> {
        self.planes.last()
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Planes in creation order
    pub fn iter(&self) -> impl Iterator<Item = &ClippingPlane> {
        self.planes.iter()
    }

    pub fn clear(&mut self) {
        self.planes.clear();
    }
}
