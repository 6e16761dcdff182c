//! JavaScript bindings for the 2D and 3D indices.

pub mod d2;
pub mod d3;
pub mod utils;
