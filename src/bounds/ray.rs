/// A half-line `origin + t * direction` for `t >= 0`.
///
/// The direction is not normalized; hit distances reported by queries are in
/// units of `t`, so they equal Euclidean distances only for unit directions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray<const D: usize> {
    pub origin: [f64; D],
    pub direction: [f64; D],
}

impl<const D: usize> Ray<D> {
    pub fn new(origin: [f64; D], direction: [f64; D]) -> Self {
        Self { origin, direction }
    }

    /// Creates a ray with the direction scaled to unit length.
    pub fn normalized(origin: [f64; D], direction: [f64; D]) -> Self {
        let len = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
        let mut dir = direction;
        if len > 0.0 {
            for d in dir.iter_mut() {
                *d /= len;
            }
        }
        Self { origin, direction: dir }
    }

    pub fn point_at(&self, t: f64) -> [f64; D] {
        let mut p = self.origin;
        for i in 0..D {
            p[i] += t * self.direction[i];
        }
        p
    }
}
