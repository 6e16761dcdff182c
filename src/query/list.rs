use crate::bounds::{BoundingBox, Ray};
use crate::query::{
    ClosestIntersectionQueryResult, IntersectionQueryEngine, NearestNeighborQueryEngine,
    NearestNeighborQueryResult,
};

/// Brute-force query engine over a flat list of items.
///
/// Every query is a linear scan. Useful for tiny sets and as a reference
/// when checking the tree engines.
#[derive(Clone, Debug)]
pub struct ListQueryEngine<const D: usize, T> {
    items: Vec<T>,
}

impl<const D: usize, T> Default for ListQueryEngine<D, T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<const D: usize, T> ListQueryEngine<D, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn add_items<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.extend(items);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn number_of_items(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, i: usize) -> &T {
        &self.items[i]
    }
}

impl<const D: usize, T> NearestNeighborQueryEngine<D, T> for ListQueryEngine<D, T> {
    fn nearest<F>(&self, pt: &[f64; D], distance_func: F) -> NearestNeighborQueryResult<'_, T>
    where
        F: Fn(&T, &[f64; D]) -> f64,
    {
        let mut best = NearestNeighborQueryResult::none();
        for (i, item) in self.items.iter().enumerate() {
            best.offer(i, item, distance_func(item, pt));
        }
        best
    }
}

impl<const D: usize, T> IntersectionQueryEngine<D, T> for ListQueryEngine<D, T> {
    fn intersects_box<F>(&self, bbox: &BoundingBox<D>, test_func: F) -> bool
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
    {
        self.items.iter().any(|item| test_func(item, bbox))
    }

    fn intersects_ray<F>(&self, ray: &Ray<D>, test_func: F) -> bool
    where
        F: Fn(&T, &Ray<D>) -> bool,
    {
        self.items.iter().any(|item| test_func(item, ray))
    }

    fn for_each_intersecting_item<'a, F, V>(&'a self, bbox: &BoundingBox<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a,
    {
        for item in &self.items {
            if test_func(item, bbox) {
                visitor(item);
            }
        }
    }

    fn for_each_ray_intersecting_item<'a, F, V>(&'a self, ray: &Ray<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &Ray<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a,
    {
        for item in &self.items {
            if test_func(item, ray) {
                visitor(item);
            }
        }
    }

    fn closest_intersection<F>(&self, ray: &Ray<D>, test_func: F) -> ClosestIntersectionQueryResult<'_, T>
    where
        F: Fn(&T, &Ray<D>) -> f64,
    {
        let mut best = ClosestIntersectionQueryResult::none();
        for (i, item) in self.items.iter().enumerate() {
            best.offer(i, item, test_func(item, ray));
        }
        best
    }
}
