use crate::searcher::{PointNeighborSearcher, distance_squared};

/// Brute-force searcher that checks every point on each query.
#[derive(Clone, Debug, Default)]
pub struct PointSimpleListSearcher<const D: usize> {
    points: Vec<[f64; D]>,
}

impl<const D: usize> PointSimpleListSearcher<D> {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn points(&self) -> &[[f64; D]] {
        &self.points
    }
}

impl<const D: usize> PointNeighborSearcher<D> for PointSimpleListSearcher<D> {
    fn type_name(&self) -> &'static str {
        "PointSimpleListSearcher"
    }

    fn build(&mut self, points: &[[f64; D]]) {
        self.points = points.to_vec();
    }

    fn for_each_nearby_point<F>(&self, origin: &[f64; D], radius: f64, mut callback: F)
    where
        F: FnMut(usize, &[f64; D]),
    {
        if !(radius >= 0.0) {
            return;
        }
        let radius_sq = radius * radius;
        for (i, p) in self.points.iter().enumerate() {
            if distance_squared(p, origin) <= radius_sq {
                callback(i, p);
            }
        }
    }

    fn has_nearby_point(&self, origin: &[f64; D], radius: f64) -> bool {
        radius >= 0.0
            && self
                .points
                .iter()
                .any(|p| distance_squared(p, origin) <= radius * radius)
    }
}
