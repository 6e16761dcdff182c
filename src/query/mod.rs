use crate::bounds::{BoundingBox, Ray};

pub mod list;

/// Result of a nearest-neighbor query.
///
/// When nothing was found `item` and `index` are `None` and `distance` is infinite.
#[derive(Debug)]
pub struct NearestNeighborQueryResult<'a, T> {
    pub item: Option<&'a T>,
    pub index: Option<usize>,
    pub distance: f64,
}

/// Result of a closest ray intersection query.
///
/// `distance` is the ray parameter of the hit, infinite when nothing was hit.
#[derive(Debug)]
pub struct ClosestIntersectionQueryResult<'a, T> {
    pub item: Option<&'a T>,
    pub index: Option<usize>,
    pub distance: f64,
}

impl<'a, T> Clone for NearestNeighborQueryResult<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for NearestNeighborQueryResult<'a, T> {}

impl<'a, T> Default for NearestNeighborQueryResult<'a, T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<'a, T> NearestNeighborQueryResult<'a, T> {
    pub fn none() -> Self {
        Self {
            item: None,
            index: None,
            distance: f64::INFINITY,
        }
    }

    pub fn is_some(&self) -> bool {
        self.item.is_some()
    }

    /// Replaces the current best if `distance` is strictly smaller.
    pub(crate) fn offer(&mut self, index: usize, item: &'a T, distance: f64) {
        if distance < self.distance {
            self.item = Some(item);
            self.index = Some(index);
            self.distance = distance;
        }
    }
}

impl<'a, T> Clone for ClosestIntersectionQueryResult<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for ClosestIntersectionQueryResult<'a, T> {}

impl<'a, T> Default for ClosestIntersectionQueryResult<'a, T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<'a, T> ClosestIntersectionQueryResult<'a, T> {
    pub fn none() -> Self {
        Self {
            item: None,
            index: None,
            distance: f64::INFINITY,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.item.is_some()
    }

    /// Records a hit if it is finite and closer than the current one.
    /// Infinite or NaN distances are misses.
    pub(crate) fn offer(&mut self, index: usize, item: &'a T, distance: f64) {
        if distance.is_finite() && distance < self.distance {
            self.item = Some(item);
            self.index = Some(index);
            self.distance = distance;
        }
    }
}

/// An index that can find the item closest to a query point.
pub trait NearestNeighborQueryEngine<const D: usize, T> {
    /// Returns the item minimizing `distance_func(item, pt)`.
    ///
    /// Tree engines prune with the Euclidean distance from `pt` to node bounds,
    /// so `distance_func` must never be smaller than the Euclidean distance
    /// from `pt` to the item's bounding box.
    fn nearest<F>(&self, pt: &[f64; D], distance_func: F) -> NearestNeighborQueryResult<'_, T>
    where
        F: Fn(&T, &[f64; D]) -> f64;
}

/// An index that answers box overlap and ray intersection queries.
///
/// All tests are delegated to caller supplied predicates; the engine only
/// uses its node bounds to skip items that cannot pass them.
pub trait IntersectionQueryEngine<const D: usize, T> {
    /// Returns true if `test_func` holds for any stored item. Stops at the first hit.
    fn intersects_box<F>(&self, bbox: &BoundingBox<D>, test_func: F) -> bool
    where
        F: Fn(&T, &BoundingBox<D>) -> bool;

    /// Returns true if `test_func` holds for any stored item. Stops at the first hit.
    fn intersects_ray<F>(&self, ray: &Ray<D>, test_func: F) -> bool
    where
        F: Fn(&T, &Ray<D>) -> bool;

    /// Invokes `visitor` once for every item passing `test_func`.
    fn for_each_intersecting_item<'a, F, V>(&'a self, bbox: &BoundingBox<D>, test_func: F, visitor: V)
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a;

    /// Invokes `visitor` once for every item passing `test_func`.
    fn for_each_ray_intersecting_item<'a, F, V>(&'a self, ray: &Ray<D>, test_func: F, visitor: V)
    where
        F: Fn(&T, &Ray<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a;

    /// Returns the item with the smallest finite `test_func(item, ray)`.
    fn closest_intersection<F>(&self, ray: &Ray<D>, test_func: F) -> ClosestIntersectionQueryResult<'_, T>
    where
        F: Fn(&T, &Ray<D>) -> f64;
}

/// Geometry that knows how to answer the standard query predicates itself.
pub trait SpatialItem<const D: usize> {
    fn bounding_box(&self) -> BoundingBox<D>;

    /// Euclidean distance from the item to `pt`.
    fn distance_to(&self, pt: &[f64; D]) -> f64;

    fn overlaps_box(&self, bbox: &BoundingBox<D>) -> bool {
        self.bounding_box().overlaps(bbox)
    }

    /// Ray parameter of the first hit, or `f64::INFINITY` on a miss.
    fn ray_hit(&self, ray: &Ray<D>) -> f64;
}

impl<const D: usize> SpatialItem<D> for [f64; D] {
    fn bounding_box(&self) -> BoundingBox<D> {
        BoundingBox::from_point(*self)
    }

    fn distance_to(&self, pt: &[f64; D]) -> f64 {
        (0..D).map(|i| (self[i] - pt[i]).powi(2)).sum::<f64>().sqrt()
    }

    fn overlaps_box(&self, bbox: &BoundingBox<D>) -> bool {
        bbox.contains(self)
    }

    fn ray_hit(&self, ray: &Ray<D>) -> f64 {
        let dd: f64 = ray.direction.iter().map(|d| d * d).sum();
        if dd == 0.0 {
            return f64::INFINITY;
        }
        let t = (0..D)
            .map(|i| (self[i] - ray.origin[i]) * ray.direction[i])
            .sum::<f64>()
            / dd;
        if t < 0.0 {
            return f64::INFINITY;
        }
        let p = ray.point_at(t);
        let miss_sq: f64 = (0..D).map(|i| (p[i] - self[i]).powi(2)).sum();
        let scale: f64 = self.iter().map(|v| v * v).sum::<f64>().max(1.0);
        if miss_sq <= 1e-20 * scale { t } else { f64::INFINITY }
    }
}

impl<const D: usize> SpatialItem<D> for BoundingBox<D> {
    fn bounding_box(&self) -> BoundingBox<D> {
        *self
    }

    fn distance_to(&self, pt: &[f64; D]) -> f64 {
        self.distance_squared_to(pt).sqrt()
    }

    fn overlaps_box(&self, bbox: &BoundingBox<D>) -> bool {
        self.overlaps(bbox)
    }

    fn ray_hit(&self, ray: &Ray<D>) -> f64 {
        self.ray_entry(ray).map_or(f64::INFINITY, |(t_near, _)| t_near)
    }
}

/// Predicate-free queries for engines storing [`SpatialItem`]s.
pub trait SpatialQueryExt<const D: usize, T: SpatialItem<D>>:
    NearestNeighborQueryEngine<D, T> + IntersectionQueryEngine<D, T>
{
    fn nearest_item(&self, pt: &[f64; D]) -> NearestNeighborQueryResult<'_, T> {
        self.nearest(pt, |item, p| item.distance_to(p))
    }

    fn any_overlapping(&self, bbox: &BoundingBox<D>) -> bool {
        self.intersects_box(bbox, |item, b| item.overlaps_box(b))
    }

    fn closest_hit(&self, ray: &Ray<D>) -> ClosestIntersectionQueryResult<'_, T> {
        self.closest_intersection(ray, |item, r| item.ray_hit(r))
    }

    fn overlapping_items<'a>(&'a self, bbox: &BoundingBox<D>) -> Vec<&'a T>
    where
        T: 'a,
    {
        let mut out = Vec::new();
        self.for_each_intersecting_item(bbox, |item, b| item.overlaps_box(b), |item| out.push(item));
        out
    }
}

impl<const D: usize, T, E> SpatialQueryExt<D, T> for E
where
    T: SpatialItem<D>,
    E: NearestNeighborQueryEngine<D, T> + IntersectionQueryEngine<D, T>,
{
}
