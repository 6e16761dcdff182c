//! Serializable build settings for the indices.
//!
//! Every field has a default, so partial JSON such as `{"grid_spacing": 0.5}`
//! is accepted.

use crate::error::{Result, SpatialError};
use crate::searcher::{DEFAULT_RESOLUTION, GridLayout};
use serde::{Deserialize, Serialize};

/// Settings for the hash grid point searchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashGridConfig {
    /// Buckets per axis. Empty means [`DEFAULT_RESOLUTION`] on every axis.
    pub resolution: Vec<usize>,
    pub grid_spacing: f64,
    /// Grid anchor. Empty means the coordinate origin.
    pub origin: Vec<f64>,
}

impl Default for HashGridConfig {
    fn default() -> Self {
        Self {
            resolution: Vec::new(),
            grid_spacing: 1.0,
            origin: Vec::new(),
        }
    }
}

impl HashGridConfig {
    /// Converts into a typed layout, checking the component counts against `D`.
    pub fn layout<const D: usize>(&self) -> Result<GridLayout<D>> {
        let resolution = if self.resolution.is_empty() {
            [DEFAULT_RESOLUTION; D]
        } else {
            to_array(&self.resolution)?
        };
        let origin = if self.origin.is_empty() {
            [0.0; D]
        } else {
            to_array(&self.origin)?
        };
        GridLayout::new(resolution, self.grid_spacing, origin)
    }
}

fn to_array<const D: usize, V: Copy>(values: &[V]) -> Result<[V; D]> {
    values.try_into().map_err(|_| SpatialError::DimensionMismatch {
        expected: D,
        found: values.len(),
    })
}

/// Settings for [`crate::bvh::Bvh`] construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhConfig {
    /// Item ranges larger than this are split across rayon tasks.
    pub parallel_threshold: usize,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 4096,
        }
    }
}

/// Settings for [`crate::partition_tree::PartitionTree`] construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionTreeConfig {
    pub max_depth: usize,
    /// Grow the root bound into a cube of its longest edge.
    pub cubic: bool,
}

impl Default for PartitionTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            cubic: true,
        }
    }
}
