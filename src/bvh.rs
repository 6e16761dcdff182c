use crate::bounds::{BoundingBox, Ray};
use crate::config::BvhConfig;
use crate::error::{Result, SpatialError};
use crate::query::{
    ClosestIntersectionQueryResult, IntersectionQueryEngine, NearestNeighborQueryEngine,
    NearestNeighborQueryResult,
};
use tracing::debug;

#[derive(Clone, Copy, Debug)]
struct BvhNode<const D: usize> {
    bound: BoundingBox<D>,
    // Right child; the left child always follows its parent. usize::MAX for leaves.
    child: usize,
    // Leaf data
    item: usize,
    // Internal node data
    axis: u8,
}

impl<const D: usize> BvhNode<D> {
    fn leaf(bound: BoundingBox<D>, item: usize) -> Self {
        BvhNode {
            bound,
            child: usize::MAX,
            item,
            axis: 0,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.child == usize::MAX
    }
}

/// Bounding volume hierarchy over arbitrary items.
///
/// The tree is binary with one item per leaf. Nodes are stored in pre-order,
/// so the root is node 0, the children of an internal node `i` are
/// `(i + 1, i + 1 + size of the left subtree)` and every child index is larger
/// than its parent's.
#[derive(Clone, Debug)]
pub struct Bvh<const D: usize, T> {
    config: BvhConfig,
    bound: BoundingBox<D>,
    items: Vec<T>,
    item_bounds: Vec<BoundingBox<D>>,
    nodes: Vec<BvhNode<D>>,
}

pub type Bvh2<T> = Bvh<2, T>;
pub type Bvh3<T> = Bvh<3, T>;

impl<const D: usize, T> Default for Bvh<D, T> {
    fn default() -> Self {
        Self::with_config(BvhConfig::default())
    }
}

impl<const D: usize, T> Bvh<D, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BvhConfig) -> Self {
        Bvh {
            config,
            bound: BoundingBox::empty(),
            items: Vec::new(),
            item_bounds: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn config(&self) -> &BvhConfig {
        &self.config
    }

    /// Builds the hierarchy from scratch, dropping any previous content.
    ///
    /// `item_bounds[i]` must bound `items[i]`.
    pub fn build(&mut self, items: Vec<T>, item_bounds: Vec<BoundingBox<D>>) -> Result<()> {
        if items.len() != item_bounds.len() {
            return Err(SpatialError::LengthMismatch {
                items: items.len(),
                bounds: item_bounds.len(),
            });
        }

        self.items = items;
        self.item_bounds = item_bounds;
        self.nodes.clear();
        self.bound = BoundingBox::empty();

        if self.items.is_empty() {
            debug!("built empty bvh");
            return Ok(());
        }

        let centroids: Vec<[f64; D]> = self.item_bounds.iter().map(BoundingBox::mid_point).collect();
        let mut indices: Vec<usize> = (0..self.items.len()).collect();
        self.nodes = build_subtree(
            &self.item_bounds,
            &centroids,
            &mut indices,
            self.config.parallel_threshold.max(1),
        );
        self.bound = self.nodes[0].bound;

        debug!(
            items = self.items.len(),
            nodes = self.nodes.len(),
            depth = self.depth(),
            "built bvh"
        );
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.item_bounds.clear();
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

    pub fn item_bound(&self, i: usize) -> &BoundingBox<D> {
        &self.item_bounds[i]
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Bound of the whole hierarchy; empty when there are no items.
    pub fn bounding_box(&self) -> &BoundingBox<D> {
        &self.bound
    }

    pub fn node_bound(&self, i: usize) -> &BoundingBox<D> {
        &self.nodes[i].bound
    }

    pub fn is_leaf(&self, i: usize) -> bool {
        self.nodes[i].is_leaf()
    }

    /// Left and right child of node `i`, `None` for leaves.
    pub fn children(&self, i: usize) -> Option<(usize, usize)> {
        let node = &self.nodes[i];
        if node.is_leaf() { None } else { Some((i + 1, node.child)) }
    }

    /// Item stored at leaf `i`, `None` for internal nodes.
    pub fn item_of_node(&self, i: usize) -> Option<usize> {
        let node = &self.nodes[i];
        node.is_leaf().then_some(node.item)
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0, 1)];
        while let Some((i, d)) = stack.pop() {
            match self.children(i) {
                Some((l, r)) => {
                    stack.push((l, d + 1));
                    stack.push((r, d + 1));
                }
                None => deepest = deepest.max(d),
            }
        }
        deepest
    }

    // Children of an internal node ordered so the one facing the ray comes first.
    #[inline]
    fn ordered_children(&self, i: usize, ray: &Ray<D>) -> (usize, usize) {
        let node = &self.nodes[i];
        if ray.direction[node.axis as usize] < 0.0 {
            (node.child, i + 1)
        } else {
            (i + 1, node.child)
        }
    }
}

/// Builds the nodes for `indices` with the subtree root at local index 0.
fn build_subtree<const D: usize>(
    item_bounds: &[BoundingBox<D>],
    centroids: &[[f64; D]],
    indices: &mut [usize],
    parallel_threshold: usize,
) -> Vec<BvhNode<D>> {
    let count = indices.len();
    if count == 1 {
        return vec![BvhNode::leaf(item_bounds[indices[0]], indices[0])];
    }

    let mut bound = BoundingBox::empty();
    for &i in indices.iter() {
        bound.merge(&item_bounds[i]);
    }

    // Median split on the longest axis, ties broken by item index
    let axis = bound.longest_axis();
    let mid = count / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        centroids[a][axis]
            .total_cmp(&centroids[b][axis])
            .then(a.cmp(&b))
    });
    let (left_indices, right_indices) = indices.split_at_mut(mid);

    let (left, right) = if count > parallel_threshold {
        rayon::join(
            || build_subtree(item_bounds, centroids, left_indices, parallel_threshold),
            || build_subtree(item_bounds, centroids, right_indices, parallel_threshold),
        )
    } else {
        (
            build_subtree(item_bounds, centroids, left_indices, parallel_threshold),
            build_subtree(item_bounds, centroids, right_indices, parallel_threshold),
        )
    };

    let mut nodes = Vec::with_capacity(1 + left.len() + right.len());
    nodes.push(BvhNode {
        bound,
        child: 1 + left.len(),
        item: usize::MAX,
        axis: axis as u8,
    });
    append_shifted(&mut nodes, left);
    append_shifted(&mut nodes, right);
    nodes
}

fn append_shifted<const D: usize>(nodes: &mut Vec<BvhNode<D>>, subtree: Vec<BvhNode<D>>) {
    let offset = nodes.len();
    nodes.extend(subtree.into_iter().map(|mut node| {
        if !node.is_leaf() {
            node.child += offset;
        }
        node
    }));
}

impl<const D: usize, T> NearestNeighborQueryEngine<D, T> for Bvh<D, T> {
    fn nearest<F>(&self, pt: &[f64; D], distance_func: F) -> NearestNeighborQueryResult<'_, T>
    where
        F: Fn(&T, &[f64; D]) -> f64,
    {
        let mut best = NearestNeighborQueryResult::none();
        if self.nodes.is_empty() {
            return best;
        }

        // (node, squared lower bound to pt)
        let mut stack = vec![(0, self.nodes[0].bound.distance_squared_to(pt))];
        while let Some((i, lower_sq)) = stack.pop() {
            if lower_sq > best.distance * best.distance {
                continue;
            }
            let node = &self.nodes[i];
            if node.is_leaf() {
                best.offer(node.item, &self.items[node.item], distance_func(&self.items[node.item], pt));
                continue;
            }

            let (l, r) = (i + 1, node.child);
            let dl = self.nodes[l].bound.distance_squared_to(pt);
            let dr = self.nodes[r].bound.distance_squared_to(pt);
            // The closer child is popped first; equal bounds favor the left child
            if dr < dl {
                stack.push((l, dl));
                stack.push((r, dr));
            } else {
                stack.push((r, dr));
                stack.push((l, dl));
            }
        }
        best
    }
}

impl<const D: usize, T> IntersectionQueryEngine<D, T> for Bvh<D, T> {
    fn intersects_box<F>(&self, bbox: &BoundingBox<D>, test_func: F) -> bool
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.bound.overlaps(bbox) {
                continue;
            }
            if node.is_leaf() {
                if test_func(&self.items[node.item], bbox) {
                    return true;
                }
            } else {
                stack.push(node.child);
                stack.push(i + 1);
            }
        }
        false
    }

    fn intersects_ray<F>(&self, ray: &Ray<D>, test_func: F) -> bool
    where
        F: Fn(&T, &Ray<D>) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.bound.intersects_ray(ray) {
                continue;
            }
            if node.is_leaf() {
                if test_func(&self.items[node.item], ray) {
                    return true;
                }
            } else {
                let (near, far) = self.ordered_children(i, ray);
                stack.push(far);
                stack.push(near);
            }
        }
        false
    }

    fn for_each_intersecting_item<'a, F, V>(&'a self, bbox: &BoundingBox<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &BoundingBox<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a,
    {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.bound.overlaps(bbox) {
                continue;
            }
            if node.is_leaf() {
                let item = &self.items[node.item];
                if test_func(item, bbox) {
                    visitor(item);
                }
            } else {
                stack.push(node.child);
                stack.push(i + 1);
            }
        }
    }

    fn for_each_ray_intersecting_item<'a, F, V>(&'a self, ray: &Ray<D>, test_func: F, mut visitor: V)
    where
        F: Fn(&T, &Ray<D>) -> bool,
        V: FnMut(&'a T),
        T: 'a,
    {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.bound.intersects_ray(ray) {
                continue;
            }
            if node.is_leaf() {
                let item = &self.items[node.item];
                if test_func(item, ray) {
                    visitor(item);
                }
            } else {
                let (near, far) = self.ordered_children(i, ray);
                stack.push(far);
                stack.push(near);
            }
        }
    }

    fn closest_intersection<F>(&self, ray: &Ray<D>, test_func: F) -> ClosestIntersectionQueryResult<'_, T>
    where
        F: Fn(&T, &Ray<D>) -> f64,
    {
        let mut best = ClosestIntersectionQueryResult::none();
        let Some((t_root, _)) = self.nodes.first().and_then(|n| n.bound.ray_entry(ray)) else {
            return best;
        };

        // (node, ray parameter where it enters the node bound)
        let mut stack = vec![(0, t_root)];
        while let Some((i, t_near)) = stack.pop() {
            if t_near > best.distance {
                continue;
            }
            let node = &self.nodes[i];
            if node.is_leaf() {
                let item = &self.items[node.item];
                best.offer(node.item, item, test_func(item, ray));
                continue;
            }

            let (near, far) = self.ordered_children(i, ray);
            let hit_near = self.nodes[near].bound.ray_entry(ray);
            let hit_far = self.nodes[far].bound.ray_entry(ray);
            if let Some((t, _)) = hit_far {
                stack.push((far, t));
            }
            if let Some((t, _)) = hit_near {
                stack.push((near, t));
            }
            // Visit the child the ray enters first
            if let (Some((tn, _)), Some((tf, _))) = (hit_near, hit_far) {
                if tf < tn {
                    let len = stack.len();
                    stack.swap(len - 1, len - 2);
                }
            }
        }
        best
    }
}
