use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_query::{
    PointHashGridSearcher, PointNeighborSearcher, PointParallelHashGridSearcher, PointSimpleListSearcher,
};

fn random_points<const D: usize>(rng: &mut StdRng, n: usize, lo: f64, hi: f64) -> Vec<[f64; D]> {
    (0..n)
        .map(|_| {
            let mut p = [0.0; D];
            for v in p.iter_mut() {
                *v = rng.gen_range(lo..hi);
            }
            p
        })
        .collect()
}

fn collect<const D: usize, S: PointNeighborSearcher<D>>(searcher: &S, origin: &[f64; D], radius: f64) -> Vec<usize> {
    let mut found = Vec::new();
    searcher.for_each_nearby_point(origin, radius, |i, _| found.push(i));
    found.sort_unstable();
    found
}

fn check_against_brute_force<const D: usize>(seed: u64, resolution: [usize; D], spacing: f64, radius: f64) {
    let mut rng = StdRng::seed_from_u64(seed);
    // Wider than the grid so that distant cells share buckets
    let points = random_points::<D>(&mut rng, 3000, -40.0, 40.0);

    let mut serial = PointHashGridSearcher::new(resolution, spacing).unwrap();
    let mut parallel = PointParallelHashGridSearcher::new(resolution, spacing).unwrap();
    let mut brute = PointSimpleListSearcher::new();
    serial.build(&points);
    parallel.build(&points);
    brute.build(&points);

    for _ in 0..300 {
        let origin = random_points::<D>(&mut rng, 1, -45.0, 45.0)[0];
        let expected = collect(&brute, &origin, radius);

        let from_serial = collect(&serial, &origin, radius);
        let from_parallel = collect(&parallel, &origin, radius);
        assert_eq!(from_serial, expected, "serial grid at {:?}", origin);
        assert_eq!(from_parallel, expected, "parallel grid at {:?}", origin);

        assert_eq!(serial.has_nearby_point(&origin, radius), !expected.is_empty());
        assert_eq!(parallel.has_nearby_point(&origin, radius), !expected.is_empty());
    }
}

#[test]
fn test_hash_grid_matches_brute_force_2d() {
    check_against_brute_force::<2>(1, [16, 16], 2.0, 1.0);
}

#[test]
fn test_hash_grid_matches_brute_force_3d() {
    check_against_brute_force::<3>(2, [8, 8, 8], 3.0, 1.5);
}

#[test]
fn test_radius_larger_than_cell() {
    check_against_brute_force::<3>(3, [8, 8, 8], 1.0, 2.7);
    check_against_brute_force::<2>(4, [5, 7], 1.0, 9.0);
}

#[test]
fn test_each_point_visited_once() {
    let points = vec![[0.5, 0.5]; 10];
    let mut searcher = PointParallelHashGridSearcher::new([2, 2], 1.0).unwrap();
    searcher.build(&points);

    let mut counts = vec![0; points.len()];
    searcher.for_each_nearby_point(&[0.5, 0.5], 100.0, |i, _| counts[i] += 1);
    assert!(counts.iter().all(|&c| c == 1));
}

#[test]
fn test_serial_and_parallel_buckets_agree() {
    let mut rng = StdRng::seed_from_u64(9);
    let points = random_points::<3>(&mut rng, 5000, -20.0, 20.0);

    let mut serial = PointHashGridSearcher::new([16, 8, 4], 0.75).unwrap();
    let mut parallel = PointParallelHashGridSearcher::new([16, 8, 4], 0.75).unwrap();
    serial.build(&points);
    parallel.build(&points);

    assert_eq!(serial.buckets().len(), 16 * 8 * 4);
    let mut total = 0;
    for (key, bucket) in serial.buckets().iter().enumerate() {
        assert_eq!(parallel.bucket(key), bucket.as_slice());
        assert_eq!(
            parallel.end_index_table()[key] - parallel.start_index_table()[key],
            bucket.len()
        );
        total += bucket.len();
    }
    assert_eq!(total, points.len());
}

#[test]
fn test_negative_radius_matches_nothing() {
    let points = vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]];
    let mut serial = PointHashGridSearcher::new([4, 4, 4], 1.0).unwrap();
    serial.build(&points);
    assert!(collect(&serial, &[0.0; 3], -1.0).is_empty());
    assert!(!serial.has_nearby_point(&[0.0; 3], f64::NAN));
    assert_eq!(collect(&serial, &[0.0; 3], 0.0), vec![0]);
}

#[test]
fn test_type_names() {
    let serial = PointHashGridSearcher::<2>::new([4, 4], 1.0).unwrap();
    let parallel = PointParallelHashGridSearcher::<2>::new([4, 4], 1.0).unwrap();
    let brute = PointSimpleListSearcher::<2>::new();
    assert_eq!(serial.type_name(), "PointHashGridSearcher");
    assert_eq!(parallel.type_name(), "PointParallelHashGridSearcher");
    assert_eq!(brute.type_name(), "PointSimpleListSearcher");
}
