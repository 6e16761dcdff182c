//! Error types for index construction.

use thiserror::Error;

/// Precondition violations detected while building or configuring an index.
///
/// Queries never fail; an empty index answers with a "no result" value instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    #[error("Item count {items} does not match bounding box count {bounds}")]
    LengthMismatch { items: usize, bounds: usize },

    #[error("Root bound must be finite with min <= max on every axis")]
    InvalidBound,

    #[error("Grid spacing must be positive and finite, got {0}")]
    InvalidGridSpacing(f64),

    #[error("Expected {expected} components, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, SpatialError>;
