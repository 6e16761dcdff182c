use crate::config::HashGridConfig;
use crate::error::Result;
use crate::searcher::{GridLayout, PointNeighborSearcher, distance_squared};
use tracing::debug;

/// Hash grid based point searcher.
///
/// Each point is recorded in the bucket of the grid cell containing it. The
/// bucket table is a list of point indices per hash key, filled one point at
/// a time. The grid spacing should be at least twice the search radius so a
/// query touches no more than `2^D` buckets.
#[derive(Clone, Debug)]
pub struct PointHashGridSearcher<const D: usize> {
    layout: GridLayout<D>,
    points: Vec<[f64; D]>,
    buckets: Vec<Vec<usize>>,
}

pub type PointHashGridSearcher2 = PointHashGridSearcher<2>;
pub type PointHashGridSearcher3 = PointHashGridSearcher<3>;

impl<const D: usize> PointHashGridSearcher<D> {
    /// Creates an empty searcher with cells anchored at the coordinate origin.
    pub fn new(resolution: [usize; D], grid_spacing: f64) -> Result<Self> {
        Self::with_origin(resolution, grid_spacing, [0.0; D])
    }

    pub fn with_origin(resolution: [usize; D], grid_spacing: f64, origin: [f64; D]) -> Result<Self> {
        Ok(Self::with_layout(GridLayout::new(resolution, grid_spacing, origin)?))
    }

    pub fn from_config(config: &HashGridConfig) -> Result<Self> {
        Ok(Self::with_layout(config.layout()?))
    }

    pub fn with_layout(layout: GridLayout<D>) -> Self {
        PointHashGridSearcher {
            layout,
            points: Vec::new(),
            buckets: Vec::new(),
        }
    }

    pub fn layout(&self) -> &GridLayout<D> {
        &self.layout
    }

    pub fn resolution(&self) -> [usize; D] {
        self.layout.resolution()
    }

    pub fn grid_spacing(&self) -> f64 {
        self.layout.grid_spacing()
    }

    pub fn points(&self) -> &[[f64; D]] {
        &self.points
    }

    /// The bucket table: for every hash key, the indices of its points in insertion order.
    pub fn buckets(&self) -> &[Vec<usize>] {
        &self.buckets
    }

    pub fn bucket_index(&self, position: &[f64; D]) -> [i64; D] {
        self.layout.bucket_index(position)
    }

    pub fn hash_key_from_bucket_index(&self, bucket_index: &[i64; D]) -> usize {
        self.layout.hash_key_from_bucket_index(bucket_index)
    }

    pub fn hash_key_from_position(&self, position: &[f64; D]) -> usize {
        self.layout.hash_key_from_position(position)
    }

    fn visit_nearby<F>(&self, origin: &[f64; D], radius: f64, mut visitor: F)
    where
        F: FnMut(usize, &[f64; D]) -> bool,
    {
        if self.points.is_empty() || !(radius >= 0.0) {
            return;
        }
        let mut keys = Vec::with_capacity(1 << D);
        self.layout.nearby_keys(origin, radius, &mut keys);
        let radius_sq = radius * radius;
        for &key in &keys {
            for &i in &self.buckets[key] {
                let p = &self.points[i];
                if distance_squared(p, origin) <= radius_sq && !visitor(i, p) {
                    return;
                }
            }
        }
    }
}

impl<const D: usize> PointNeighborSearcher<D> for PointHashGridSearcher<D> {
    fn type_name(&self) -> &'static str {
        "PointHashGridSearcher"
    }

    fn build(&mut self, points: &[[f64; D]]) {
        self.buckets.clear();
        self.buckets.resize_with(self.layout.number_of_buckets(), Vec::new);
        self.points = points.to_vec();

        for (i, p) in points.iter().enumerate() {
            let key = self.layout.hash_key_from_position(p);
            self.buckets[key].push(i);
        }

        debug!(
            points = points.len(),
            buckets = self.buckets.len(),
            occupied = self.buckets.iter().filter(|b| !b.is_empty()).count(),
            "built hash grid"
        );
    }

    fn for_each_nearby_point<F>(&self, origin: &[f64; D], radius: f64, mut callback: F)
    where
        F: FnMut(usize, &[f64; D]),
    {
        self.visit_nearby(origin, radius, |i, p| {
            callback(i, p);
            true
        });
    }

    fn has_nearby_point(&self, origin: &[f64; D], radius: f64) -> bool {
        let mut found = false;
        self.visit_nearby(origin, radius, |_, _| {
            found = true;
            false
        });
        found
    }
}
