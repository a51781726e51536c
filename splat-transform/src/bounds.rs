/// Axis-aligned bounds tracking for splat positions and chunk quantisation
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Rows per task when bounds are reduced in parallel.
const PARALLEL_CHUNK: usize = 25_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds3 {
    /// Create new bounds initialised to infinity values
    pub fn new() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }

    /// Update bounds with a new point, ignoring non-finite components
    pub fn update(&mut self, p: [f32; 3]) {
        for axis in 0..3 {
            let v = p[axis];
            if v.is_finite() {
                self.min[axis] = self.min[axis].min(v);
                self.max[axis] = self.max[axis].max(v);
            }
        }
    }

    pub fn merge(mut self, other: Bounds3) -> Bounds3 {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
        self
    }

    /// True if no finite point has been seen on some axis.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn dimensions(&self) -> [f32; 3] {
        std::array::from_fn(|axis| (self.max[axis] - self.min[axis]).max(0.0))
    }

    /// Normalise a value on `axis` to 0-1; zero extent maps to 0
    pub fn normalize(&self, axis: usize, v: f32) -> f32 {
        let extent = self.max[axis] - self.min[axis];
        if extent > 0.0 {
            (v - self.min[axis]) / extent
        } else {
            0.0
        }
    }

    /// Bounds of the rows `range` of three coordinate columns.
    pub fn of_columns(x: &[f32], y: &[f32], z: &[f32], range: std::ops::Range<usize>) -> Self {
        let mut bounds = Bounds3::new();
        for i in range {
            bounds.update([x[i], y[i], z[i]]);
        }
        bounds
    }

    /// Bounds of selected rows of three coordinate columns, reduced in parallel.
    pub fn of_rows(x: &[f32], y: &[f32], z: &[f32], rows: &[usize]) -> Self {
        rows.par_chunks(PARALLEL_CHUNK)
            .map(|chunk| {
                let mut local_bounds = Bounds3::new();
                for &i in chunk {
                    local_bounds.update([x[i], y[i], z[i]]);
                }
                local_bounds
            })
            .reduce_with(Bounds3::merge)
            .unwrap_or_else(Bounds3::new)
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::new()
    }
}
