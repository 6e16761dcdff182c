use crate::bounds::BoundingBox;
use crate::error::SpatialError;
use wasm_bindgen::prelude::*;
use js_sys::Array;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_rayon::init_thread_pool;

/// Starts the rayon worker pool used by the parallel builds.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_threads(n: usize) -> js_sys::Promise {
    init_thread_pool(n)
}

/// Reads a `[x, y, ...]` array of at least `D` numbers.
pub fn parse_js_point<const D: usize>(val: &JsValue) -> Option<[f64; D]> {
    let arr = val.dyn_ref::<Array>()?;
    if arr.length() < D as u32 {
        return None;
    }
    let mut point = [0.0; D];
    for i in 0..D {
        point[i] = arr.get(i as u32).as_f64()?;
    }
    Some(point)
}

/// Splits a flat coordinate array into points, ignoring a trailing partial point.
pub fn flat_points<const D: usize>(coords: &[f64]) -> Vec<[f64; D]> {
    coords
        .chunks_exact(D)
        .map(|c| {
            let mut p = [0.0; D];
            p.copy_from_slice(c);
            p
        })
        .collect()
}

/// Pairs flat min and max corner arrays into boxes.
///
/// Both arrays must have the same length, a whole number of points.
pub fn boxes_from_corners<const D: usize>(mins: &[f64], maxs: &[f64]) -> Result<Vec<BoundingBox<D>>, SpatialError> {
    if mins.len() != maxs.len() {
        return Err(SpatialError::LengthMismatch {
            items: mins.len(),
            bounds: maxs.len(),
        });
    }
    if mins.len() % D != 0 {
        return Err(SpatialError::DimensionMismatch {
            expected: D,
            found: mins.len() % D,
        });
    }
    Ok(flat_points::<D>(mins)
        .into_iter()
        .zip(flat_points::<D>(maxs))
        .map(|(a, b)| BoundingBox::from_points(a, b))
        .collect())
}

pub(crate) fn indices_to_u32(indices: Vec<usize>) -> Vec<u32> {
    indices.into_iter().map(|i| i as u32).collect()
}
