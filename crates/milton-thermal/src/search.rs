//! N-dimensional grid-descent minimization, used offline to fit predictor
//! and controller parameters against recorded history.

use crate::error::SearchError;

/// Per-axis bounds for [`MinimumSearch`], with optional hard constraints the
/// boundary-extension step must not cross.
#[derive(Debug, Clone, Copy)]
pub struct Axis {
    pub lo: f64,
    pub hi: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Axis {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self {
            lo,
            hi,
            min: None,
            max: None,
        }
    }

    pub fn with_constraints(lo: f64, hi: f64, min: Option<f64>, max: Option<f64>) -> Self {
        Self { lo, hi, min, max }
    }

    fn span(&self) -> f64 {
        self.hi - self.lo
    }

    fn clamp(&self, x: f64) -> f64 {
        let x = self.min.map_or(x, |m| x.max(m));
        self.max.map_or(x, |m| x.min(m))
    }
}

/// N-dimensional grid-descent minimizer.
///
/// Evaluates `f` on a `steps`-per-axis lattice excluding the low face
/// (inclusive of the high face), picks the argmin, then contracts each axis
/// toward the winner — extending past a boundary when the winner lies on an
/// unconstrained edge, faster if the same direction wins twice running.
#[derive(Debug, Clone, Copy)]
pub struct MinimumSearch {
    pub steps: usize,
    pub threshold: f64,
    pub depth_cap: u32,
}

impl Default for MinimumSearch {
    fn default() -> Self {
        Self {
            steps: 8,
            threshold: 1e-6,
            depth_cap: 100,
        }
    }
}

impl MinimumSearch {
    pub fn new(steps: usize, threshold: f64) -> Self {
        Self {
            steps,
            threshold,
            ..Self::default()
        }
    }

    /// Runs the search over `axes`, calling `f` with one coordinate vector
    /// per lattice point.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the contraction depth cap is exceeded
    /// before every axis's span falls within `threshold`.
    pub fn run(&self, mut axes: Vec<Axis>, mut f: impl FnMut(&[f64]) -> f64) -> Result<Vec<f64>, SearchError> {
        assert!(!axes.is_empty(), "MinimumSearch requires at least one axis");
        assert!(self.steps >= 1, "steps must be at least 1");

        // Tracks, per axis, the direction the boundary last extended in, to
        // accelerate runaway extension toward a distant optimum.
        let mut last_direction = vec![0i8; axes.len()];
        let mut best = axes.iter().map(|a| a.lo).collect::<Vec<_>>();

        for _ in 0..self.depth_cap {
            if axes.iter().all(|a| a.span() <= self.threshold) {
                return Ok(best);
            }

            let (point, indices, _) = self.grid_argmin(&axes, &mut f);
            best = point.clone();

            for (i, axis) in axes.iter_mut().enumerate() {
                let step = axis.span() / self.steps as f64;
                let x = point[i];
                let on_lo_boundary = indices[i] == 1;
                let on_hi_boundary = indices[i] == self.steps;

                if on_lo_boundary && axis.min.is_none() {
                    let accel = if last_direction[i] == -1 { 2.0 } else { 1.0 };
                    let extension = self.steps as f64 * step * accel;
                    axis.lo = axis.clamp(x - extension);
                    axis.hi = axis.clamp(x + step);
                    last_direction[i] = -1;
                } else if on_hi_boundary && axis.max.is_none() {
                    let accel = if last_direction[i] == 1 { 2.0 } else { 1.0 };
                    let extension = self.steps as f64 * step * accel;
                    axis.lo = axis.clamp(x - step);
                    axis.hi = axis.clamp(x + extension);
                    last_direction[i] = 1;
                } else {
                    axis.lo = axis.clamp(x - step);
                    axis.hi = axis.clamp(x + step);
                    last_direction[i] = 0;
                }
            }
        }

        Err(SearchError)
    }

    /// Evaluates `f` over the `steps`-per-axis lattice. Each axis ranges
    /// over `k = 1..=steps` (excluding its own `lo`, including its `hi`),
    /// giving `steps^n` evaluations total.
    fn grid_argmin(
        &self,
        axes: &[Axis],
        f: &mut impl FnMut(&[f64]) -> f64,
    ) -> (Vec<f64>, Vec<usize>, f64) {
        let n = axes.len();
        let total_points = self.steps.pow(n as u32);
        let mut best_point = vec![0.0; n];
        let mut best_indices = vec![0usize; n];
        let mut best_value = f64::INFINITY;

        for flat in 0..total_points {
            let mut idx = flat;
            let mut point = vec![0.0; n];
            let mut indices = vec![0usize; n];
            for (i, axis) in axes.iter().enumerate() {
                let k = 1 + idx % self.steps;
                idx /= self.steps;
                indices[i] = k;
                point[i] = axis.lo + axis.span() * (k as f64) / (self.steps as f64);
            }
            let value = f(&point);
            if value < best_value {
                best_value = value;
                best_point = point;
                best_indices = indices;
            }
        }

        (best_point, best_indices, best_value)
    }
}
