use crate::bounds::BoundingBox;
use crate::partition_tree::Quadtree;
use crate::query::{IntersectionQueryEngine, NearestNeighborQueryEngine, SpatialItem};
use crate::searcher::PointNeighborSearcher;
use crate::searcher::hash_grid::PointHashGridSearcher2;
use crate::wasm::utils::{flat_points, indices_to_u32};
use wasm_bindgen::prelude::*;

/// Fixed-radius neighbor search over 2D points.
#[wasm_bindgen]
pub struct PointSearcher2D {
    inner: PointHashGridSearcher2,
}

#[wasm_bindgen]
impl PointSearcher2D {
    #[wasm_bindgen(constructor)]
    pub fn new(nx: usize, ny: usize, spacing: f64) -> Result<PointSearcher2D, JsError> {
        Ok(PointSearcher2D {
            inner: PointHashGridSearcher2::new([nx, ny], spacing)?,
        })
    }

    /// Rebuilds from a flat `[x0, y0, x1, y1, ...]` array.
    pub fn build(&mut self, coords: &[f64]) {
        self.inner.build(&flat_points::<2>(coords));
    }

    #[wasm_bindgen(getter)]
    pub fn count_points(&self) -> usize {
        self.inner.points().len()
    }

    pub fn nearby(&self, x: f64, y: f64, radius: f64) -> Vec<u32> {
        let mut found = Vec::new();
        self.inner.for_each_nearby_point(&[x, y], radius, |i, _| found.push(i));
        found.sort_unstable();
        indices_to_u32(found)
    }
}

/// Quadtree over 2D points, answering nearest and window queries.
#[wasm_bindgen]
pub struct PointQuadtree2D {
    inner: Quadtree<(u32, [f64; 2])>,
}

#[wasm_bindgen]
impl PointQuadtree2D {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PointQuadtree2D {
        PointQuadtree2D { inner: Quadtree::new() }
    }

    /// Rebuilds from flat coordinates inside the given region.
    pub fn build(
        &mut self,
        coords: &[f64],
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        max_depth: usize,
    ) -> Result<(), JsError> {
        let items = flat_points::<2>(coords)
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i as u32, p))
            .collect();
        let bound = BoundingBox::new([min_x, min_y], [max_x, max_y]);
        let contains = |(_, p): &(u32, [f64; 2]), b: &BoundingBox<2>| b.contains(p);
        let point_bound = |(_, p): &(u32, [f64; 2])| BoundingBox::from_point(*p);
        self.inner.build_with_bounds(items, bound, contains, point_bound, max_depth)?;
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn count_nodes(&self) -> usize {
        self.inner.number_of_nodes()
    }

    /// Index of the point closest to `(x, y)`, `undefined` when empty.
    pub fn nearest(&self, x: f64, y: f64) -> Option<u32> {
        self.inner
            .nearest(&[x, y], |(_, p), q| p.distance_to(q))
            .item
            .map(|(id, _)| *id)
    }

    /// Indices of the points inside the window, ascending.
    pub fn within(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<u32> {
        let window = BoundingBox::from_points([min_x, min_y], [max_x, max_y]);
        let mut found = Vec::new();
        self.inner
            .for_each_intersecting_item(&window, |(_, p), w| w.contains(p), |(id, _)| found.push(*id));
        found.sort_unstable();
        found
    }
}

impl Default for PointQuadtree2D {
    fn default() -> Self {
        Self::new()
    }
}
