use crate::config::HashGridConfig;
use crate::error::Result;
use crate::searcher::{GridLayout, PointNeighborSearcher, distance_squared};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Parallel version of the hash grid point searcher.
///
/// Instead of one list per bucket, points are sorted by hash key so every
/// bucket is a contiguous range `[start_index_table[k], end_index_table[k])`
/// of the sorted arrays. Building is a counting sort over chunks of the input:
/// every chunk counts its keys on the rayon pool, a prefix sum over buckets
/// and chunks fixes the slot of every point, and the points are then placed
/// without further coordination. Points inside a bucket keep their original
/// order, so the result does not depend on thread scheduling.
#[derive(Clone, Debug)]
pub struct PointParallelHashGridSearcher<const D: usize> {
    layout: GridLayout<D>,
    points: Vec<[f64; D]>,
    keys: Vec<usize>,
    start_index_table: Vec<usize>,
    end_index_table: Vec<usize>,
    sorted_indices: Vec<usize>,
}

pub type PointParallelHashGridSearcher2 = PointParallelHashGridSearcher<2>;
pub type PointParallelHashGridSearcher3 = PointParallelHashGridSearcher<3>;

impl<const D: usize> PointParallelHashGridSearcher<D> {
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
        PointParallelHashGridSearcher {
            layout,
            points: Vec::new(),
            keys: Vec::new(),
            start_index_table: Vec::new(),
            end_index_table: Vec::new(),
            sorted_indices: Vec::new(),
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

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    /// Points in sorted (bucket) order.
    pub fn points(&self) -> &[[f64; D]] {
        &self.points
    }

    /// Hash key of every sorted point. Non-decreasing after a build.
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn start_index_table(&self) -> &[usize] {
        &self.start_index_table
    }

    pub fn end_index_table(&self) -> &[usize] {
        &self.end_index_table
    }

    /// Original index of every sorted point.
    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    /// Original indices of the points in bucket `key`, in ascending order.
    pub fn bucket(&self, key: usize) -> &[usize] {
        &self.sorted_indices[self.start_index_table[key]..self.end_index_table[key]]
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
            let start = self.start_index_table[key];
            let end = self.end_index_table[key];
            for j in start..end {
                let p = &self.points[j];
                if distance_squared(p, origin) <= radius_sq && !visitor(self.sorted_indices[j], p) {
                    return;
                }
            }
        }
    }
}

impl<const D: usize> PointNeighborSearcher<D> for PointParallelHashGridSearcher<D> {
    fn type_name(&self) -> &'static str {
        "PointParallelHashGridSearcher"
    }

    fn build(&mut self, points: &[[f64; D]]) {
        let n = points.len();
        let number_of_buckets = self.layout.number_of_buckets();
        let layout = self.layout;

        let keys: Vec<usize> = points.par_iter().map(|p| layout.hash_key_from_position(p)).collect();

        // Per-chunk bucket sizes, one chunk per worker
        let chunk_size = n.div_ceil(rayon::current_num_threads()).max(1);
        let mut chunk_offsets: Vec<Vec<usize>> = keys
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut counts = vec![0; number_of_buckets];
                for &key in chunk {
                    counts[key] += 1;
                }
                counts
            })
            .collect();
        trace!(points = n, buckets = number_of_buckets, chunks = chunk_offsets.len(), "counted bucket sizes");

        // Exclusive prefix sum over (bucket, chunk). Afterwards chunk_offsets[c][k]
        // is the first slot of chunk c inside bucket k.
        self.start_index_table.clear();
        self.end_index_table.clear();
        self.start_index_table.reserve(number_of_buckets);
        self.end_index_table.reserve(number_of_buckets);
        let mut offset = 0;
        for key in 0..number_of_buckets {
            self.start_index_table.push(offset);
            for counts in chunk_offsets.iter_mut() {
                let count = counts[key];
                counts[key] = offset;
                offset += count;
            }
            self.end_index_table.push(offset);
        }

        // Slot of every point: its chunk's offset plus its rank inside the chunk
        let slots: Vec<usize> = keys
            .par_chunks(chunk_size)
            .zip(chunk_offsets.into_par_iter())
            .flat_map_iter(|(chunk, mut cursor)| {
                chunk
                    .iter()
                    .map(|&key| {
                        let slot = cursor[key];
                        cursor[key] += 1;
                        slot
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut sorted_indices = vec![0; n];
        for (i, &slot) in slots.iter().enumerate() {
            sorted_indices[slot] = i;
        }
        trace!("scattered points into buckets");

        self.points = sorted_indices.par_iter().map(|&i| points[i]).collect();
        self.keys = sorted_indices.par_iter().map(|&i| keys[i]).collect();
        self.sorted_indices = sorted_indices;

        debug!(
            points = n,
            buckets = number_of_buckets,
            occupied = self
                .start_index_table
                .iter()
                .zip(&self.end_index_table)
                .filter(|(s, e)| s < e)
                .count(),
            "built parallel hash grid"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::hash_grid::PointHashGridSearcher;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn for_each_nearby_point_2d() {
        let points = [[1.0, 3.0], [2.0, 5.0], [-1.0, 3.0]];
        let mut searcher = PointParallelHashGridSearcher2::new([4, 4], 2.0 * 10f64.sqrt()).unwrap();
        searcher.build(&points);

        let mut visited = Vec::new();
        searcher.for_each_nearby_point(&[0.0, 0.0], 10f64.sqrt(), |i, p| {
            assert_eq!(*p, points[i]);
            visited.push(i);
        });
        visited.sort();
        assert_eq!(visited, vec![0, 2]);
    }

    #[test]
    fn build_produces_sorted_tables() {
        let points = [
            [0.0, 1.0, 3.0],
            [2.0, 5.0, 4.0],
            [-1.0, 3.0, 0.0],
            [0.5, 1.5, 3.5],
            [9.0, -4.0, 2.0],
        ];
        let mut searcher = PointParallelHashGridSearcher3::new([4, 4, 4], 2.0).unwrap();
        searcher.build(&points);

        assert_eq!(searcher.number_of_points(), points.len());
        assert!(searcher.keys().windows(2).all(|w| w[0] <= w[1]));

        let mut seen = searcher.sorted_indices().to_vec();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        for (j, &i) in searcher.sorted_indices().iter().enumerate() {
            assert_eq!(searcher.points()[j], points[i]);
            assert_eq!(searcher.keys()[j], searcher.hash_key_from_position(&points[i]));
        }

        for k in 0..searcher.layout().number_of_buckets() {
            let (start, end) = (searcher.start_index_table()[k], searcher.end_index_table()[k]);
            assert!(start <= end);
            for j in start..end {
                assert_eq!(searcher.keys()[j], k);
            }
        }
        let occupied: usize = (0..64)
            .map(|k| searcher.end_index_table()[k] - searcher.start_index_table()[k])
            .sum();
        assert_eq!(occupied, points.len());
    }

    #[test]
    fn matches_serial_buckets() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<[f64; 3]> = (0..2000)
            .map(|_| [rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)])
            .collect();

        let mut serial = PointHashGridSearcher::<3>::new([8, 8, 8], 0.5).unwrap();
        let mut parallel = PointParallelHashGridSearcher::<3>::new([8, 8, 8], 0.5).unwrap();
        serial.build(&points);
        parallel.build(&points);

        for (k, bucket) in serial.buckets().iter().enumerate() {
            assert_eq!(parallel.bucket(k), bucket.as_slice());
        }
    }

    #[test]
    fn buckets_keep_input_order_across_chunks() {
        // Two interleaved clusters, so every chunk feeds both buckets
        let points: Vec<[f64; 2]> = (0..10_000)
            .map(|i| if i % 3 == 0 { [0.5, 0.5] } else { [1.5, 0.5] })
            .collect();
        let mut searcher = PointParallelHashGridSearcher2::new([4, 4], 1.0).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        pool.install(|| searcher.build(&points));

        let left = searcher.hash_key_from_position(&[0.5, 0.5]);
        let right = searcher.hash_key_from_position(&[1.5, 0.5]);
        let expected_left: Vec<usize> = (0..10_000).filter(|i| i % 3 == 0).collect();
        let expected_right: Vec<usize> = (0..10_000).filter(|i| i % 3 != 0).collect();
        assert_eq!(searcher.bucket(left), expected_left.as_slice());
        assert_eq!(searcher.bucket(right), expected_right.as_slice());
        assert_eq!(searcher.start_index_table()[right], expected_left.len());

        // Same input on one thread gives the same tables
        let mut single = PointParallelHashGridSearcher2::new([4, 4], 1.0).unwrap();
        let one = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        one.install(|| single.build(&points));
        assert_eq!(single.sorted_indices(), searcher.sorted_indices());
        assert_eq!(single.start_index_table(), searcher.start_index_table());
    }

    #[test]
    fn empty_build_and_rebuild() {
        let mut searcher = PointParallelHashGridSearcher2::new([4, 4], 1.0).unwrap();
        searcher.build(&[]);
        assert!(!searcher.has_nearby_point(&[0.0, 0.0], 100.0));
        assert!(searcher.start_index_table().iter().zip(searcher.end_index_table()).all(|(s, e)| s == e));

        searcher.build(&[[0.5, 0.5], [0.6, 0.6]]);
        searcher.build(&[[2.5, 2.5]]);
        assert_eq!(searcher.number_of_points(), 1);
        assert!(!searcher.has_nearby_point(&[0.5, 0.5], 0.2));
        assert!(searcher.has_nearby_point(&[2.5, 2.5], 0.0));
    }
}
