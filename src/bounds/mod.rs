mod ray;

pub use ray::Ray;

/// Generic axis-aligned bounding box for N-dimensional space.
///
/// A box with `min > max` on any axis is empty; [`BoundingBox::empty`] is the
/// identity for [`BoundingBox::merge`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> Default for BoundingBox<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    /// Creates the tightest box covering two corner points given in any order.
    pub fn from_points(a: [f64; D], b: [f64; D]) -> Self {
        let mut min = [0.0; D];
        let mut max = [0.0; D];
        for i in 0..D {
            min[i] = a[i].min(b[i]);
            max[i] = a[i].max(b[i]);
        }
        Self { min, max }
    }

    /// A zero-volume box at a single point.
    pub fn from_point(p: [f64; D]) -> Self {
        Self { min: p, max: p }
    }

    /// The empty box: `min = +inf`, `max = -inf`.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; D],
            max: [f64::NEG_INFINITY; D],
        }
    }

    /// Returns true if `min > max` on any axis.
    pub fn is_empty(&self) -> bool {
        (0..D).any(|i| self.min[i] > self.max[i])
    }

    /// Returns true if the box is non-empty and all corners are finite.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self.min[i].is_finite() && self.max[i].is_finite() && self.min[i] <= self.max[i])
    }

    pub fn length(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// The axis with the largest extent. Ties resolve to the lower axis.
    pub fn longest_axis(&self) -> usize {
        let mut axis = 0;
        for i in 1..D {
            if self.length(i) > self.length(axis) {
                axis = i;
            }
        }
        axis
    }

    pub fn mid_point(&self) -> [f64; D] {
        let mut mid = [0.0; D];
        for i in 0..D {
            mid[i] = 0.5 * (self.min[i] + self.max[i]);
        }
        mid
    }

    /// Returns the corner selected by `idx`: bit `a` set picks `max` on axis `a`.
    pub fn corner(&self, idx: usize) -> [f64; D] {
        let mut c = [0.0; D];
        for a in 0..D {
            c[a] = if idx & (1 << a) != 0 { self.max[a] } else { self.min[a] };
        }
        c
    }

    /// The sub-box spanned by `corner(idx)` and the mid point.
    ///
    /// For `idx` in `0..1 << D` these partition the box into `2^D` equal cells.
    pub fn octant(&self, idx: usize) -> Self {
        Self::from_points(self.corner(idx), self.mid_point())
    }

    pub fn merge(&mut self, other: &Self) {
        for i in 0..D {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    pub fn merge_point(&mut self, p: &[f64; D]) {
        for i in 0..D {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Grows the box by `delta` in every direction, so each extent gains `2 * delta`.
    pub fn expand(&mut self, delta: f64) {
        for i in 0..D {
            self.min[i] -= delta;
            self.max[i] += delta;
        }
    }

    /// Closed-interval overlap test; touching boxes overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        (0..D).all(|i| self.max[i] >= other.min[i] && self.min[i] <= other.max[i])
    }

    pub fn contains(&self, p: &[f64; D]) -> bool {
        (0..D).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn contains_box(&self, other: &Self) -> bool {
        (0..D).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }

    /// Clamps `p` into the box, giving the box point closest to `p`.
    pub fn clamp(&self, p: &[f64; D]) -> [f64; D] {
        let mut c = *p;
        for i in 0..D {
            c[i] = c[i].max(self.min[i]).min(self.max[i]);
        }
        c
    }

    /// Squared distance from `p` to the nearest point of the box (0 inside).
    pub fn distance_squared_to(&self, p: &[f64; D]) -> f64 {
        let mut d2 = 0.0;
        for i in 0..D {
            let d = (self.min[i] - p[i]).max(0.0).max(p[i] - self.max[i]);
            d2 += d * d;
        }
        d2
    }

    pub fn intersects_ray(&self, ray: &Ray<D>) -> bool {
        self.ray_entry(ray).is_some()
    }

    /// Slab test against the forward half of `ray`.
    ///
    /// Returns the parametric interval `(t_near, t_far)` with `t_near >= 0`;
    /// `t_near` is 0 when the origin lies inside the box.
    pub fn ray_entry(&self, ray: &Ray<D>) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;
        for i in 0..D {
            let o = ray.origin[i];
            let d = ray.direction[i];
            if d == 0.0 {
                // Parallel to the slab: either always inside it or never.
                if o < self.min[i] || o > self.max[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t_near = (self.min[i] - o) * inv;
            let mut t_far = (self.max[i] - o) * inv;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_min = t_min.max(t_near);
            t_max = t_max.min(t_far);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}
