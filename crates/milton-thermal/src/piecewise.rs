//! Piecewise-linear interpolation/extrapolation table.
//!
//! Backs RTD calibration, supply calibration, power-limit curves and reflow
//! profiles — anywhere an ordered `(x, y)` table is needed with linear
//! interpolation between points and linear extrapolation beyond the
//! endpoints.

use crate::error::PiecewiseLinearError;

#[derive(Debug, Clone)]
struct Point {
    x: f64,
    y: f64,
    label: Option<Box<str>>,
}

/// An ordered `(x, y)` table, optionally carrying a label per point.
///
/// Invariants: points are kept sorted by strictly increasing `x`; adding a
/// point whose `x` already exists replaces that point's `y`/label rather
/// than inserting a duplicate.
#[derive(Debug, Clone, Default)]
pub struct PiecewiseLinear {
    points: Vec<Point>,
}

impl PiecewiseLinear {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Builds a table from `(x, y)` pairs, in any order.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut table = Self::new();
        for (x, y) in points {
            table.add_point(x, y);
        }
        table
    }

    /// Adds or replaces the point at `x`, keeping the table sorted.
    pub fn add_point(&mut self, x: f64, y: f64) {
        self.add_labeled_point(x, y, None);
    }

    /// Adds or replaces the point at `x`, with an associated segment label.
    pub fn add_named_point(&mut self, x: f64, y: f64, name: impl Into<Box<str>>) {
        self.add_labeled_point(x, y, Some(name.into()));
    }

    fn add_labeled_point(&mut self, x: f64, y: f64, label: Option<Box<str>>) {
        match self
            .points
            .binary_search_by(|p| p.x.partial_cmp(&x).expect("NaN in piecewise-linear x"))
        {
            Ok(i) => self.points[i] = Point { x, y, label },
            Err(i) => self.points.insert(i, Point { x, y, label }),
        }
    }

    /// Number of points in the table.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the table has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `x` of the first point, if any.
    pub fn start(&self) -> Option<f64> {
        self.points.first().map(|p| p.x)
    }

    /// `x` of the last point, if any.
    pub fn end(&self) -> Option<f64> {
        self.points.last().map(|p| p.x)
    }

    /// Interpolates/extrapolates `y` at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`PiecewiseLinearError`] when the table is empty.
    pub fn estimate(&self, x: f64) -> Result<f64, PiecewiseLinearError> {
        self.estimate_labeled(x).map(|(y, _)| y)
    }

    /// Interpolates/extrapolates `y` at `x`, also returning the segment
    /// label that applies (see module docs for the tie-break rules at exact
    /// point hits and the nearest-boundary rule under extrapolation).
    pub fn estimate_labeled(&self, x: f64) -> Result<(f64, Option<&str>), PiecewiseLinearError> {
        let n = self.points.len();
        if n == 0 {
            return Err(PiecewiseLinearError);
        }
        if n == 1 {
            let p = &self.points[0];
            return Ok((p.y, p.label.as_deref()));
        }

        // Exact hit at a point: y at that point, label of the segment that
        // starts there (or, at the last point, the segment that ends there).
        if let Ok(i) = self
            .points
            .binary_search_by(|p| p.x.partial_cmp(&x).expect("NaN in piecewise-linear x"))
        {
            let y = self.points[i].y;
            let label_index = if i == n - 1 { i - 1 } else { i };
            return Ok((y, self.points[label_index].label.as_deref()));
        }

        if x < self.points[0].x {
            return Ok(self.extrapolate(0, x));
        }
        if x > self.points[n - 1].x {
            return Ok(self.extrapolate(n - 2, x));
        }

        // x lies strictly between two adjacent points.
        let i = match self
            .points
            .binary_search_by(|p| p.x.partial_cmp(&x).expect("NaN in piecewise-linear x"))
        {
            Ok(_) => unreachable!("exact hits are handled above"),
            Err(i) => i - 1,
        };
        Ok((self.lerp(i, x), self.points[i].label.as_deref()))
    }

    fn lerp(&self, i: usize, x: f64) -> f64 {
        let (a, b) = (&self.points[i], &self.points[i + 1]);
        let slope = (b.y - a.y) / (b.x - a.x);
        a.y + slope * (x - a.x)
    }

    fn extrapolate(&self, segment: usize, x: f64) -> (f64, Option<&str>) {
        let y = self.lerp(segment, x);
        (y, self.points[segment].label.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn sample() -> PiecewiseLinear {
        PiecewiseLinear::from_points([(0.0, 0.0), (10.0, 10.0), (20.0, 40.0), (30.0, 90.0)])
    }

    #[test]
    fn interpolates_and_extrapolates_beyond_endpoints() {
        let pl = sample();
        assert!(approx_eq!(f64, pl.estimate(5.0).unwrap(), 5.0));
        assert!(approx_eq!(f64, pl.estimate(15.0).unwrap(), 25.0));
        assert!(approx_eq!(f64, pl.estimate(25.0).unwrap(), 65.0));
        assert!(approx_eq!(f64, pl.estimate(-5.0).unwrap(), -5.0));
        assert!(approx_eq!(f64, pl.estimate(35.0).unwrap(), 115.0));
    }

    #[test]
    fn exact_hits_return_point_value() {
        let pl = sample();
        assert!(approx_eq!(f64, pl.estimate(10.0).unwrap(), 10.0));
        assert!(approx_eq!(f64, pl.estimate(20.0).unwrap(), 40.0));
        assert!(approx_eq!(f64, pl.estimate(30.0).unwrap(), 90.0));
    }

    #[test]
    fn empty_table_fails() {
        let pl = PiecewiseLinear::new();
        assert!(pl.estimate(0.0).is_err());
    }

    #[test]
    fn single_point_is_constant() {
        let mut pl = PiecewiseLinear::new();
        pl.add_point(5.0, 42.0);
        assert!(approx_eq!(f64, pl.estimate(-100.0).unwrap(), 42.0));
        assert!(approx_eq!(f64, pl.estimate(100.0).unwrap(), 42.0));
    }

    #[test]
    fn duplicate_x_replaces_latest() {
        let mut pl = PiecewiseLinear::new();
        pl.add_point(1.0, 10.0);
        pl.add_point(1.0, 20.0);
        assert_eq!(pl.len(), 1);
        assert!(approx_eq!(f64, pl.estimate(1.0).unwrap(), 20.0));
    }

    #[test]
    fn labeled_segment_at_left_endpoint() {
        let mut pl = PiecewiseLinear::new();
        pl.add_named_point(0.0, 150.0, "preheat");
        pl.add_named_point(90.0, 180.0, "soak");
        pl.add_named_point(150.0, 0.0, "end");

        let (_, label) = pl.estimate_labeled(30.0).unwrap();
        assert_eq!(label, Some("preheat"));

        // Exact hit at an interior point picks the segment starting there.
        let (_, label) = pl.estimate_labeled(90.0).unwrap();
        assert_eq!(label, Some("soak"));

        // Exact hit at the first point picks the first segment's label.
        let (_, label) = pl.estimate_labeled(0.0).unwrap();
        assert_eq!(label, Some("preheat"));

        // Exact hit at the last point has no segment starting there; it
        // reports the segment that ends there.
        let (_, label) = pl.estimate_labeled(150.0).unwrap();
        assert_eq!(label, Some("soak"));

        // Extrapolation past the end reports the nearest boundary segment.
        let (_, label) = pl.estimate_labeled(200.0).unwrap();
        assert_eq!(label, Some("soak"));
    }

    #[test]
    fn start_and_end_accessors() {
        let pl = sample();
        assert_eq!(pl.start(), Some(0.0));
        assert_eq!(pl.end(), Some(30.0));
        assert_eq!(PiecewiseLinear::new().start(), None);
    }

    #[test]
    fn continuous_on_closed_intervals() {
        let pl = sample();
        // At the boundary of two segments, both sides should agree.
        let just_below = pl.estimate(19.999).unwrap();
        let at = pl.estimate(20.0).unwrap();
        let just_above = pl.estimate(20.001).unwrap();
        assert!((just_below - at).abs() < 0.01);
        assert!((just_above - at).abs() < 0.01);
    }
}
