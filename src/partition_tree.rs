use crate::bounds::{BoundingBox, Ray};
use crate::config::PartitionTreeConfig;
use crate::error::{Result, SpatialError};
use crate::query::{
    ClosestIntersectionQueryResult, IntersectionQueryEngine, NearestNeighborQueryEngine,
    NearestNeighborQueryResult,
};
use std::ops::Range;
use tracing::debug;

#[derive(Clone, Debug)]
struct TreeNode<const D: usize> {
    bound: BoundingBox<D>,
    // Node bound merged with the bounds of every item stored below
    extent: BoundingBox<D>,
    first_child: usize, // usize::MAX if leaf
    items: Vec<usize>,
}

impl<const D: usize> TreeNode<D> {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.first_child == usize::MAX
    }
}

/// Adaptive `2^D`-ary space partitioning tree: a quadtree for `D = 2`, an
/// octree for `D = 3`.
///
/// An occupied node is split into all of its `2^D` children at once until the
/// maximum depth is reached, the root being at depth 1. Child `c` covers the
/// upper half of the parent on axis `a` when bit `a` of `c` is set. The
/// children of a node are stored as one contiguous block whose offset is
/// recorded when the node is split.
///
/// Only leaves hold items. An item accepted by several children is stored in
/// each of them. Queries descend by node extent, the node bound grown to cover
/// the items stored below it, so an item reaching outside the region that
/// accepted it is still found.
#[derive(Clone, Debug)]
pub struct PartitionTree<const D: usize, T> {
    config: PartitionTreeConfig,
    max_depth: usize,
    bound: BoundingBox<D>,
    items: Vec<T>,
    nodes: Vec<TreeNode<D>>,
}

pub type Quadtree<T> = PartitionTree<2, T>;
pub type Octree<T> = PartitionTree<3, T>;

impl<const D: usize, T> Default for PartitionTree<D, T> {
    fn default() -> Self {
        Self::with_config(PartitionTreeConfig::default())
    }
}

impl<const D: usize, T> PartitionTree<D, T> {
    const CHILDREN: usize = 1 << D;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PartitionTreeConfig) -> Self {
        PartitionTree {
            config,
            max_depth: config.max_depth,
            bound: BoundingBox::empty(),
            items: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn config(&self) -> &PartitionTreeConfig {
        &self.config
    }

    /// Builds the tree from scratch.
    ///
    /// `test_func(item, bound)` decides whether an item belongs to a region.
    /// It should report every region the item overlaps, otherwise nearest
    /// queries may miss it. Items rejected by the root bound are kept in
    /// [`Self::item`] but never returned by queries.
    ///
    /// The extent of the items is unknown here, so queries only skip empty
    /// regions. Use [`Self::build_with_bounds`] to prune occupied ones too.
    /// A `max_depth` of 0 or 1 leaves the root as the only node.
    pub fn build<F>(&mut self, items: Vec<T>, bound: BoundingBox<D>, test_func: F, max_depth: usize) -> Result<()>
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
    {
        let unbounded = BoundingBox::new([f64::NEG_INFINITY; D], [f64::INFINITY; D]);
        self.build_with_bounds(items, bound, test_func, |_| unbounded, max_depth)
    }

    /// Builds the tree from scratch, with `bound_func(item)` bounding each item.
    pub fn build_with_bounds<F, B>(
        &mut self,
        items: Vec<T>,
        bound: BoundingBox<D>,
        test_func: F,
        bound_func: B,
        max_depth: usize,
    ) -> Result<()>
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
        B: Fn(&T) -> BoundingBox<D>,
    {
        if !bound.is_valid() {
            return Err(SpatialError::InvalidBound);
        }

        self.items = items;
        self.max_depth = max_depth;
        self.bound = bound;
        if self.config.cubic {
            let edge = (0..D).map(|a| bound.length(a)).fold(0.0, f64::max);
            for a in 0..D {
                self.bound.max[a] = self.bound.min[a] + edge;
            }
        }

        let root_items = (0..self.items.len())
            .filter(|&i| test_func(&self.items[i], &self.bound))
            .collect();
        self.nodes.clear();
        self.nodes.push(TreeNode {
            bound: self.bound,
            extent: self.bound,
            first_child: usize::MAX,
            items: root_items,
        });
        self.subdivide(0, 1, &test_func);

        // Children follow their parent, so a reverse sweep sees them first
        let item_bounds: Vec<BoundingBox<D>> = self.items.iter().map(bound_func).collect();
        for i in (0..self.nodes.len()).rev() {
            let mut extent = self.nodes[i].bound;
            match self.children(i) {
                Some(children) => children.for_each(|c| extent.merge(&self.nodes[c].extent)),
                None => self.nodes[i].items.iter().for_each(|&j| extent.merge(&item_bounds[j])),
            }
            self.nodes[i].extent = extent;
        }

        debug!(
            items = self.items.len(),
            nodes = self.nodes.len(),
            max_depth,
            "built partition tree"
        );
        Ok(())
    }

    /// Builds with the configured maximum depth.
    pub fn build_from_config<F>(&mut self, items: Vec<T>, bound: BoundingBox<D>, test_func: F) -> Result<()>
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
    {
        self.build(items, bound, test_func, self.config.max_depth)
    }

    fn subdivide<F>(&mut self, node: usize, depth: usize, test_func: &F)
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
    {
        if depth >= self.max_depth || self.nodes[node].items.is_empty() {
            return;
        }

        let first_child = self.nodes.len();
        let bound = self.nodes[node].bound;
        let items = std::mem::take(&mut self.nodes[node].items);
        self.nodes[node].first_child = first_child;

        for c in 0..Self::CHILDREN {
            let child_bound = bound.octant(c);
            let child_items = items
                .iter()
                .copied()
                .filter(|&i| test_func(&self.items[i], &child_bound))
                .collect();
            self.nodes.push(TreeNode {
                bound: child_bound,
                extent: child_bound,
                first_child: usize::MAX,
                items: child_items,
            });
        }

        for c in 0..Self::CHILDREN {
            self.subdivide(first_child + c, depth + 1, test_func);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.nodes.clear();
        self.bound = BoundingBox::empty();
    }

    pub fn number_of_items(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, i: usize) -> &T {
        &self.items[i]
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Root bound after normalization.
    pub fn bounding_box(&self) -> &BoundingBox<D> {
        &self.bound
    }

    pub fn node_bound(&self, i: usize) -> &BoundingBox<D> {
        &self.nodes[i].bound
    }

    /// Bound of node `i` merged with the bounds of the items stored below it.
    pub fn node_extent(&self, i: usize) -> &BoundingBox<D> {
        &self.nodes[i].extent
    }

    pub fn is_leaf(&self, i: usize) -> bool {
        self.nodes[i].is_leaf()
    }

    pub fn children(&self, i: usize) -> Option<Range<usize>> {
        let node = &self.nodes[i];
        if node.is_leaf() {
            None
        } else {
            Some(node.first_child..node.first_child + Self::CHILDREN)
        }
    }

    /// Node index of child `child` of node `node`, `None` for leaves or when
    /// `child >= 2^D`.
    pub fn child_index(&self, node: usize, child: usize) -> Option<usize> {
        let n = &self.nodes[node];
        (!n.is_leaf() && child < Self::CHILDREN).then(|| n.first_child + child)
    }

    /// Indices of the items stored at node `i`. Empty for internal nodes.
    pub fn items_at_node(&self, i: usize) -> &[usize] {
        &self.nodes[i].items
    }

    fn visit_box<'a, F, V>(&'a self, bbox: &BoundingBox<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
        V: FnMut(usize, &'a T) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }
        let mut visited = vec![false; self.items.len()];
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.extent.overlaps(bbox) {
                continue;
            }
            if let Some(children) = self.children(i) {
                stack.extend(children.rev());
                continue;
            }
            for &j in &node.items {
                if visited[j] {
                    continue;
                }
                visited[j] = true;
                let item = &self.items[j];
                if test_func(item, bbox) && !visitor(j, item) {
                    return;
                }
            }
        }
    }

    fn visit_ray<'a, F, V>(&'a self, ray: &Ray<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &Ray<D>) -> bool,
        V: FnMut(usize, &'a T) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }
        let mut visited = vec![false; self.items.len()];
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.extent.intersects_ray(ray) {
                continue;
            }
            if let Some(children) = self.children(i) {
                stack.extend(children.rev());
                continue;
            }
            for &j in &node.items {
                if visited[j] {
                    continue;
                }
                visited[j] = true;
                let item = &self.items[j];
                if test_func(item, ray) && !visitor(j, item) {
                    return;
                }
            }
        }
    }
}

impl<const D: usize, T> NearestNeighborQueryEngine<D, T> for PartitionTree<D, T> {
    fn nearest<F>(&self, pt: &[f64; D], distance_func: F) -> NearestNeighborQueryResult<'_, T>
    where
        F: Fn(&T, &[f64; D]) -> f64,
    {
        let mut best = NearestNeighborQueryResult::none();
        if self.nodes.is_empty() {
            return best;
        }

        let mut order: Vec<(f64, usize)> = Vec::with_capacity(Self::CHILDREN);
        let mut stack = vec![(0, self.nodes[0].extent.distance_squared_to(pt))];
        while let Some((i, lower_sq)) = stack.pop() {
            if lower_sq > best.distance * best.distance {
                continue;
            }
            let node = &self.nodes[i];
            let Some(children) = self.children(i) else {
                for &j in &node.items {
                    best.offer(j, &self.items[j], distance_func(&self.items[j], pt));
                }
                continue;
            };

            order.clear();
            order.extend(children.map(|c| (self.nodes[c].extent.distance_squared_to(pt), c)));
            // Farthest first onto the stack; equal bounds pop in child order
            order.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
            for &(d, c) in &order {
                if d <= best.distance * best.distance {
                    stack.push((c, d));
                }
            }
        }
        best
    }
}

impl<const D: usize, T> IntersectionQueryEngine<D, T> for PartitionTree<D, T> {
    fn intersects_box<F>(&self, bbox: &BoundingBox<D>, test_func: F) -> bool
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
    {
        let mut found = false;
        self.visit_box(bbox, test_func, |_, _| {
            found = true;
            false
        });
        found
    }

    fn intersects_ray<F>(&self, ray: &Ray<D>, test_func: F) -> bool
    where
        F: Fn(&T, &Ray<D>) -> bool,
    {
        let mut found = false;
        self.visit_ray(ray, test_func, |_, _| {
            found = true;
            false
        });
        found
    }

    fn for_each_intersecting_item<'a, F, V>(&'a self, bbox: &BoundingBox<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a,
    {
        self.visit_box(bbox, test_func, |_, item| {
            visitor(item);
            true
        });
    }

    fn for_each_ray_intersecting_item<'a, F, V>(&'a self, ray: &Ray<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &Ray<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a,
    {
        self.visit_ray(ray, test_func, |_, item| {
            visitor(item);
            true
        });
    }

    fn closest_intersection<F>(&self, ray: &Ray<D>, test_func: F) -> ClosestIntersectionQueryResult<'_, T>
    where
        F: Fn(&T, &Ray<D>) -> f64,
    {
        let mut best = ClosestIntersectionQueryResult::none();
        let Some((t_root, _)) = self.nodes.first().and_then(|n| n.extent.ray_entry(ray)) else {
            return best;
        };

        let mut order: Vec<(f64, usize)> = Vec::with_capacity(Self::CHILDREN);
        let mut stack = vec![(0, t_root)];
        while let Some((i, t_near)) = stack.pop() {
            if t_near > best.distance {
                continue;
            }
            let node = &self.nodes[i];
            let Some(children) = self.children(i) else {
                for &j in &node.items {
                    best.offer(j, &self.items[j], test_func(&self.items[j], ray));
                }
                continue;
            };

            order.clear();
            order.extend(children.filter_map(|c| self.nodes[c].extent.ray_entry(ray).map(|(t, _)| (t, c))));
            order.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
            stack.extend(order.iter().map(|&(t, c)| (c, t)));
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SpatialQueryExt;
    use crate::query::list::ListQueryEngine;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn contains_point<const D: usize>(p: &[f64; D], b: &BoundingBox<D>) -> bool {
        b.contains(p)
    }

    #[test]
    fn quadtree_single_item() {
        let mut tree = Quadtree::new();
        tree.build(vec![[0.2, 0.7]], BoundingBox::new([0.0, 0.0], [0.9, 1.0]), contains_point, 3)
            .unwrap();

        assert_eq!(tree.number_of_nodes(), 9);
        let holding: Vec<usize> = (0..9).filter(|&i| !tree.items_at_node(i).is_empty()).collect();
        assert_eq!(holding.len(), 1);
        assert_eq!(tree.items_at_node(holding[0]), &[0]);

        assert_eq!(tree.children(0), Some(1..5));
        assert_eq!(tree.child_index(0, 2), Some(3));
        assert_eq!(tree.child_index(3, 0), Some(5));
        assert_eq!(tree.child_index(0, 4), None);
        assert_eq!(tree.child_index(5, 0), None);
        assert_eq!(holding[0], 5);
        assert!(tree.is_leaf(5));
        assert_eq!(*tree.bounding_box(), BoundingBox::new([0.0, 0.0], [1.0, 1.0]));
    }

    #[test]
    fn octree_single_item() {
        let mut tree = Octree::new();
        tree.build(
            vec![[0.2, 0.7, 0.7]],
            BoundingBox::new([0.0, 0.0, 0.0], [0.9, 1.0, 0.8]),
            contains_point,
            3,
        )
        .unwrap();

        assert_eq!(tree.number_of_nodes(), 17);
        let holding = (0..17).filter(|&i| tree.items_at_node(i).len() == 1).count();
        let empty = (0..17).filter(|&i| tree.items_at_node(i).is_empty()).count();
        assert_eq!((holding, empty), (1, 16));
    }

    #[test]
    fn single_item_node_count_by_depth() {
        for depth in 0..6 {
            let splits = depth.max(1) - 1;
            let mut quad = Quadtree::new();
            quad.build(vec![[0.3, 0.3]], BoundingBox::new([0.0; 2], [1.0; 2]), contains_point, depth)
                .unwrap();
            assert_eq!(quad.number_of_nodes(), 1 + splits * 4);

            let mut oct = Octree::new();
            oct.build(vec![[0.3; 3]], BoundingBox::new([0.0; 3], [1.0; 3]), contains_point, depth)
                .unwrap();
            assert_eq!(oct.number_of_nodes(), 1 + splits * 8);
        }
    }

    #[test]
    fn zero_depth_keeps_a_single_leaf() {
        let mut tree = Quadtree::new();
        tree.build(vec![[0.2, 0.7]], BoundingBox::new([0.0; 2], [1.0; 2]), contains_point, 0)
            .unwrap();
        assert_eq!(tree.number_of_nodes(), 1);
        assert_eq!(tree.max_depth(), 0);
        assert!(tree.is_leaf(0));
        assert_eq!(tree.children(0), None);
        assert_eq!(tree.items_at_node(0), &[0]);
        assert_eq!(tree.nearest_item(&[0.0, 0.0]).index, Some(0));
    }

    #[test]
    fn inverted_bound_is_rejected() {
        let mut tree = Quadtree::new();
        assert_eq!(
            tree.build(vec![[0.5, 0.5]], BoundingBox::new([1.0, 0.0], [0.0, 1.0]), contains_point, 3),
            Err(SpatialError::InvalidBound)
        );
    }

    #[test]
    fn items_reaching_outside_the_root_are_found() {
        // The first box sticks far out of the root on the left
        let boxes = vec![
            BoundingBox::new([-5.0, 0.9], [0.05, 0.95]),
            BoundingBox::from_point([0.0, 0.1]),
        ];
        let root = BoundingBox::new([0.0; 2], [1.0; 2]);
        let q = [-3.0, 0.1];

        let mut bounded = Quadtree::new();
        bounded
            .build_with_bounds(boxes.clone(), root, |b, r| b.overlaps(r), |b| *b, 5)
            .unwrap();
        let mut plain = Quadtree::new();
        plain.build(boxes.clone(), root, |b, r| b.overlaps(r), 5).unwrap();

        for tree in [&bounded, &plain] {
            assert!(tree.node_extent(0).contains_box(&boxes[0]));
            let nearest = tree.nearest_item(&q);
            assert_eq!(nearest.index, Some(0));
            assert!((nearest.distance - 0.8).abs() < 1e-12);

            let outside = BoundingBox::new([-4.0, 0.8], [-3.0, 1.0]);
            assert!(tree.any_overlapping(&outside));
            let hit = tree.closest_hit(&Ray::new([-3.0, 0.0], [0.0, 1.0]));
            assert_eq!(hit.index, Some(0));
            assert!((hit.distance - 0.9).abs() < 1e-12);
        }

        let mut list = ListQueryEngine::<2, BoundingBox<2>>::new();
        list.add_items(boxes.iter().copied());
        assert_eq!(list.nearest_item(&q).index, Some(0));
    }

    #[test]
    fn empty_tree_answers_with_sentinels() {
        let mut tree = Octree::<[f64; 3]>::new();
        tree.build(Vec::new(), BoundingBox::new([0.0; 3], [1.0; 3]), contains_point, 4)
            .unwrap();
        assert_eq!(tree.number_of_nodes(), 1);
        assert!(tree.is_leaf(0));
        assert!(!tree.nearest_item(&[0.5; 3]).is_some());
        assert!(!tree.any_overlapping(&BoundingBox::new([0.0; 3], [1.0; 3])));
        assert!(!tree.closest_hit(&Ray::new([-1.0, 0.5, 0.5], [1.0, 0.0, 0.0])).is_hit());
    }

    #[test]
    fn nearest_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(20);
        let points: Vec<[f64; 2]> = (0..20).map(|_| [rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)]).collect();
        let mut tree = Quadtree::new();
        tree.build(points.clone(), BoundingBox::new([0.0; 2], [1.0; 2]), contains_point, 5)
            .unwrap();
        let mut list = ListQueryEngine::<2, [f64; 2]>::new();
        list.add_items(points.iter().copied());

        for _ in 0..50 {
            let q = [rng.gen_range(-0.5..1.5), rng.gen_range(-0.5..1.5)];
            let a = tree.nearest_item(&q);
            let b = list.nearest_item(&q);
            assert_eq!(a.distance, b.distance);
            assert_eq!(a.item, b.item);
        }
    }

    #[test]
    fn straddling_items_are_visited_once() {
        let boxes = vec![
            BoundingBox::new([0.4, 0.4], [0.6, 0.6]),
            BoundingBox::new([0.05, 0.05], [0.1, 0.1]),
            BoundingBox::new([0.8, 0.1], [0.9, 0.9]),
        ];
        let mut tree = Quadtree::new();
        tree.build(boxes, BoundingBox::new([0.0; 2], [1.0; 2]), |b, r| b.overlaps(r), 4)
            .unwrap();

        let all = tree.overlapping_items(&BoundingBox::new([0.0; 2], [1.0; 2]));
        assert_eq!(all.len(), 3);

        let mut hits = 0;
        tree.for_each_ray_intersecting_item(
            &Ray::new([0.0, 0.5], [1.0, 0.0]),
            |b, r| b.intersects_ray(r),
            |_| hits += 1,
        );
        assert_eq!(hits, 2);

        let hit = tree.closest_hit(&Ray::new([0.0, 0.5], [1.0, 0.0]));
        assert_eq!(hit.index, Some(0));
        assert!((hit.distance - 0.4).abs() < 1e-12);

        let nearest = tree.nearest_item(&[0.95, 0.5]);
        assert_eq!(nearest.index, Some(2));
    }

    #[test]
    fn children_are_unique_and_nested() {
        let mut rng = StdRng::seed_from_u64(5);
        let points: Vec<[f64; 3]> = (0..100)
            .map(|_| [rng.gen_range(0.0..2.0), rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
            .collect();
        let mut tree = Octree::new();
        tree.build(points.clone(), BoundingBox::new([0.0; 3], [2.0, 1.0, 1.0]), contains_point, 4)
            .unwrap();

        let mut seen = vec![false; tree.number_of_nodes()];
        for i in 0..tree.number_of_nodes() {
            if let Some(children) = tree.children(i) {
                assert!(tree.items_at_node(i).is_empty());
                for c in children {
                    assert!(c > i);
                    assert!(!seen[c]);
                    seen[c] = true;
                    assert!(tree.node_bound(i).contains_box(tree.node_bound(c)));
                }
            } else {
                for &j in tree.items_at_node(i) {
                    assert!(tree.node_bound(i).contains(&points[j]));
                }
            }
        }
        assert!(!seen[0]);
    }

    #[test]
    fn non_cubic_root_keeps_bound() {
        let mut tree = Quadtree::with_config(PartitionTreeConfig {
            max_depth: 2,
            cubic: false,
        });
        let bound = BoundingBox::new([0.0, 0.0], [4.0, 1.0]);
        tree.build_from_config(vec![[3.0, 0.5]], bound, contains_point).unwrap();
        assert_eq!(*tree.bounding_box(), bound);
        assert_eq!(tree.max_depth(), 2);
        assert_eq!(tree.number_of_nodes(), 5);
        let upper_x = tree.child_index(0, 1).unwrap();
        assert_eq!(*tree.node_bound(upper_x), BoundingBox::new([2.0, 0.0], [4.0, 0.5]));
    }
}
