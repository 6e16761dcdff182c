use crate::bounds::{BoundingBox, Ray};
use crate::bvh::Bvh3;
use crate::query::{IntersectionQueryEngine, NearestNeighborQueryEngine, SpatialItem};
use crate::searcher::PointNeighborSearcher;
use crate::searcher::parallel_hash_grid::PointParallelHashGridSearcher3;
use crate::wasm::utils::{boxes_from_corners, flat_points, indices_to_u32, parse_js_point};
use wasm_bindgen::prelude::*;

// --- Point searcher ---

/// Fixed-radius neighbor search over 3D points, built in parallel.
#[wasm_bindgen]
pub struct PointSearcher3D {
    inner: PointParallelHashGridSearcher3,
}

#[wasm_bindgen]
impl PointSearcher3D {
    #[wasm_bindgen(constructor)]
    pub fn new(nx: usize, ny: usize, nz: usize, spacing: f64) -> Result<PointSearcher3D, JsError> {
        Ok(PointSearcher3D {
            inner: PointParallelHashGridSearcher3::new([nx, ny, nz], spacing)?,
        })
    }

    /// Rebuilds from a flat `[x0, y0, z0, x1, ...]` array.
    pub fn build(&mut self, coords: &[f64]) {
        self.inner.build(&flat_points::<3>(coords));
    }

    #[wasm_bindgen(getter)]
    pub fn count_points(&self) -> usize {
        self.inner.number_of_points()
    }

    /// Indices of all points within `radius` of `(x, y, z)`, ascending.
    pub fn nearby(&self, x: f64, y: f64, z: f64, radius: f64) -> Vec<u32> {
        let mut found = Vec::new();
        self.inner.for_each_nearby_point(&[x, y, z], radius, |i, _| found.push(i));
        found.sort_unstable();
        indices_to_u32(found)
    }

    /// Same as `nearby` with the origin given as an `[x, y, z]` array.
    #[wasm_bindgen(js_name = nearbyPoint)]
    pub fn nearby_point(&self, origin: JsValue, radius: f64) -> Result<Vec<u32>, JsError> {
        let [x, y, z] = parse_js_point::<3>(&origin).ok_or_else(|| JsError::new("origin must be [x, y, z]"))?;
        Ok(self.nearby(x, y, z, radius))
    }

    pub fn has_nearby(&self, x: f64, y: f64, z: f64, radius: f64) -> bool {
        self.inner.has_nearby_point(&[x, y, z], radius)
    }
}

// --- Box hierarchy ---

/// Bounding volume hierarchy over axis-aligned boxes identified by their input order.
#[wasm_bindgen]
pub struct BoxHierarchy3D {
    inner: Bvh3<(u32, BoundingBox<3>)>,
}

#[wasm_bindgen]
impl BoxHierarchy3D {
    #[wasm_bindgen(constructor)]
    pub fn new() -> BoxHierarchy3D {
        BoxHierarchy3D { inner: Bvh3::new() }
    }

    /// Rebuilds from flat min and max corner arrays of equal length, a
    /// multiple of 3.
    pub fn build(&mut self, mins: &[f64], maxs: &[f64]) -> Result<(), JsError> {
        let boxes = boxes_from_corners::<3>(mins, maxs)?;
        let items = boxes.iter().enumerate().map(|(i, b)| (i as u32, *b)).collect();
        self.inner.build(items, boxes)?;
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn count_boxes(&self) -> usize {
        self.inner.number_of_items()
    }

    /// Ray parameter of the nearest box hit, `Infinity` on a miss.
    pub fn closest_hit(&self, ox: f64, oy: f64, oz: f64, dx: f64, dy: f64, dz: f64) -> f64 {
        let ray = Ray::new([ox, oy, oz], [dx, dy, dz]);
        self.inner
            .closest_intersection(&ray, |(_, b), r| b.ray_hit(r))
            .distance
    }

    /// Index of the nearest box hit, `undefined` on a miss.
    pub fn closest_hit_index(&self, ox: f64, oy: f64, oz: f64, dx: f64, dy: f64, dz: f64) -> Option<u32> {
        let ray = Ray::new([ox, oy, oz], [dx, dy, dz]);
        self.inner
            .closest_intersection(&ray, |(_, b), r| b.ray_hit(r))
            .item
            .map(|(id, _)| *id)
    }

    /// Indices of all boxes overlapping the query box, ascending.
    pub fn overlapping(&self, min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64) -> Vec<u32> {
        let query = BoundingBox::from_points([min_x, min_y, min_z], [max_x, max_y, max_z]);
        let mut found = Vec::new();
        self.inner
            .for_each_intersecting_item(&query, |(_, b), q| b.overlaps(q), |(id, _)| found.push(*id));
        found.sort_unstable();
        found
    }

    /// Index of the box closest to the point, `undefined` when empty.
    pub fn nearest(&self, x: f64, y: f64, z: f64) -> Option<u32> {
        self.inner
            .nearest(&[x, y, z], |(_, b), p| b.distance_to(p))
            .item
            .map(|(id, _)| *id)
    }
}

impl Default for BoxHierarchy3D {
    fn default() -> Self {
        Self::new()
    }
}
