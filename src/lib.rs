//! # spatial-query
//!
//! `spatial-query` is a Rust library of spatial indices for nearest-neighbor,
//! range-overlap and ray-intersection queries, designed to be used in Rust as
//! well as compiled to WebAssembly (WASM).
//!
//! ## Features
//!
//! - **Bounding volume hierarchy**: [`Bvh`] over arbitrary items with caller supplied bounds,
//!   built in parallel for large inputs.
//! - **Quadtree / Octree**: [`PartitionTree`] subdividing occupied regions up to a maximum depth.
//! - **Hash grid searchers**: fixed-radius point queries with a serial
//!   ([`PointHashGridSearcher`]) and a counting-sort parallel ([`PointParallelHashGridSearcher`]) build.
//! - **Predicate driven**: every query takes closures for the item tests, so any
//!   geometry that can be bounded by a box can be indexed.
//!
//! ## Main Interface
//!
//! Build an index once, then query it through [`NearestNeighborQueryEngine`] and
//! [`IntersectionQueryEngine`]. Items implementing [`SpatialItem`] get the
//! predicate-free helpers of [`SpatialQueryExt`].
//!
//! ```
//! use spatial_query::{BoundingBox, Bvh2, SpatialQueryExt};
//!
//! let points = vec![[0.0, 0.0], [1.0, 2.0], [3.0, 1.0]];
//! let bounds = points.iter().map(|p| BoundingBox::from_point(*p)).collect();
//! let mut bvh = Bvh2::new();
//! bvh.build(points, bounds).unwrap();
//!
//! let nearest = bvh.nearest_item(&[2.9, 1.2]);
//! assert_eq!(nearest.index, Some(2));
//! ```

pub mod bounds;
pub mod bvh;
pub mod config;
pub mod error;
pub mod partition_tree;
pub mod query;
pub mod searcher;
pub mod wasm;

pub use bounds::{BoundingBox, Ray};
pub use bvh::{Bvh, Bvh2, Bvh3};
pub use config::{BvhConfig, HashGridConfig, PartitionTreeConfig};
pub use error::{Result, SpatialError};
pub use partition_tree::{Octree, PartitionTree, Quadtree};
pub use query::list::ListQueryEngine;
pub use query::{
    ClosestIntersectionQueryResult, IntersectionQueryEngine, NearestNeighborQueryEngine,
    NearestNeighborQueryResult, SpatialItem, SpatialQueryExt,
};
pub use searcher::hash_grid::{PointHashGridSearcher, PointHashGridSearcher2, PointHashGridSearcher3};
pub use searcher::parallel_hash_grid::{
    PointParallelHashGridSearcher, PointParallelHashGridSearcher2, PointParallelHashGridSearcher3,
};
pub use searcher::simple_list::PointSimpleListSearcher;
pub use searcher::{GridLayout, PointNeighborSearcher};
