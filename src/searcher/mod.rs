use crate::error::{Result, SpatialError};

pub mod hash_grid;
pub mod parallel_hash_grid;
pub mod simple_list;

/// Resolution used per axis when none is configured.
pub const DEFAULT_RESOLUTION: usize = 64;

/// Trait defining a point neighbor search structure.
/// This allows swapping between the serial hash grid, the parallel hash grid
/// and the brute-force list.
pub trait PointNeighborSearcher<const D: usize>: Send + Sync {
    /// Short name of the searcher type.
    fn type_name(&self) -> &'static str;

    /// Rebuild the searcher from scratch for the given points.
    ///
    /// Point `i` of the slice keeps index `i` in all callbacks.
    fn build(&mut self, points: &[[f64; D]]);

    /// Invokes `callback(index, point)` once for every point within `radius` of `origin`.
    ///
    /// A negative or NaN radius matches nothing.
    fn for_each_nearby_point<F>(&self, origin: &[f64; D], radius: f64, callback: F)
    where
        F: FnMut(usize, &[f64; D]);

    /// Returns true if any point lies within `radius` of `origin`.
    fn has_nearby_point(&self, origin: &[f64; D], radius: f64) -> bool;
}

/// Mapping from positions to hash keys shared by the grid searchers.
///
/// Space is cut into cubic cells of edge `grid_spacing` starting at `origin`.
/// Cell coordinates wrap modulo `resolution` on each axis, so the key table
/// has `resolution.iter().product()` buckets and distant cells may share one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout<const D: usize> {
    resolution: [usize; D],
    grid_spacing: f64,
    origin: [f64; D],
}

impl<const D: usize> GridLayout<D> {
    /// Creates a layout, clamping every resolution component to at least 1.
    pub fn new(resolution: [usize; D], grid_spacing: f64, origin: [f64; D]) -> Result<Self> {
        if !(grid_spacing.is_finite() && grid_spacing > 0.0) {
            return Err(SpatialError::InvalidGridSpacing(grid_spacing));
        }
        let mut res = resolution;
        for r in res.iter_mut() {
            *r = (*r).max(1);
        }
        Ok(Self {
            resolution: res,
            grid_spacing,
            origin,
        })
    }

    pub fn resolution(&self) -> [usize; D] {
        self.resolution
    }

    pub fn grid_spacing(&self) -> f64 {
        self.grid_spacing
    }

    pub fn origin(&self) -> [f64; D] {
        self.origin
    }

    pub fn number_of_buckets(&self) -> usize {
        self.resolution.iter().product()
    }

    fn cell_coordinate(&self, x: f64, axis: usize) -> i64 {
        ((x - self.origin[axis]) / self.grid_spacing).floor() as i64
    }

    /// Unwrapped integer cell coordinate containing `position`.
    pub fn bucket_index(&self, position: &[f64; D]) -> [i64; D] {
        let mut idx = [0; D];
        for a in 0..D {
            idx[a] = self.cell_coordinate(position[a], a);
        }
        idx
    }

    /// Wraps a cell coordinate into the table and flattens it, x fastest.
    pub fn hash_key_from_bucket_index(&self, bucket_index: &[i64; D]) -> usize {
        let mut key = 0;
        for a in (0..D).rev() {
            let res = self.resolution[a];
            let wrapped = bucket_index[a].rem_euclid(res as i64) as usize;
            key = key * res + wrapped;
        }
        key
    }

    pub fn hash_key_from_position(&self, position: &[f64; D]) -> usize {
        self.hash_key_from_bucket_index(&self.bucket_index(position))
    }

    /// Collects the distinct keys of all cells touching the box of half-width
    /// `radius` around `origin`.
    ///
    /// For `radius <= grid_spacing / 2` this is at most `2^D` cells.
    pub fn nearby_keys(&self, origin: &[f64; D], radius: f64, keys: &mut Vec<usize>) {
        keys.clear();
        keys.push(0);
        let mut stride = 1;
        let mut next = Vec::new();
        for a in 0..D {
            let res = self.resolution[a] as i64;
            let lo = self.cell_coordinate(origin[a] - radius, a);
            let hi = self.cell_coordinate(origin[a] + radius, a);
            let span = hi.saturating_sub(lo).saturating_add(1);
            // Wider than the table: every wrapped coordinate is touched.
            let (start, count) = if span >= res { (0, res) } else { (lo, span.max(1)) };

            next.clear();
            for &k in keys.iter() {
                for c in 0..count {
                    let wrapped = start.wrapping_add(c).rem_euclid(res) as usize;
                    next.push(k + wrapped * stride);
                }
            }
            std::mem::swap(keys, &mut next);
            stride *= self.resolution[a];
        }
        keys.sort_unstable();
        keys.dedup();
    }
}

#[inline]
pub(crate) fn distance_squared<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    let mut d2 = 0.0;
    for i in 0..D {
        let d = a[i] - b[i];
        d2 += d * d;
    }
    d2
}
