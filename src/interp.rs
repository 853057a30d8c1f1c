//! Piecewise-linear interpolation of sampled data.

/// An error type for interpolants that cannot be constructed
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("the sample columns have different lengths ({0} != {1})")]
    LengthMismatch(usize, usize),

    #[error("at least two distinct abscissas are needed")]
    TooFewPoints,
}

/// A piecewise-linear function through a set of `(x, y)` points, extended
/// flat beyond the sampled range: below the smallest abscissa it returns the
/// value there, and likewise above the largest.
#[derive(Clone, Debug)]
pub struct LinearInterpolant {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolant {
    /// Builds an interpolant from unordered samples. The samples are sorted
    /// by abscissa with a stable sort; samples sharing an abscissa with an
    /// earlier one (in sorted order) are dropped. Non-finite abscissas are
    /// ignored. `TooFewPoints` is returned if fewer than two distinct
    /// abscissas remain.
    pub fn from_samples(xs: &[f64], ys: &[f64]) -> Result<Self, Error> {
        if xs.len() != ys.len() {
            return Err(Error::LengthMismatch(xs.len(), ys.len()));
        }
        let mut order: Vec<usize> = (0..xs.len()).filter(|&i| xs[i].is_finite()).collect();
        order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));
        order.dedup_by(|b, a| xs[*a] == xs[*b]);

        if order.len() < 2 {
            return Err(Error::TooFewPoints);
        }
        Ok(Self {
            xs: order.iter().map(|&i| xs[i]).collect(),
            ys: order.iter().map(|&i| ys[i]).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Evaluates the interpolant at `x`. At a sampled abscissa the sampled
    /// value is returned exactly. NaN is returned for a NaN `x`.
    pub fn sample(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        match self.xs.binary_search_by(|xi| xi.total_cmp(&x)) {
            Ok(i) => self.ys[i],
            Err(i) => {
                let (x0, x1) = (self.xs[i - 1], self.xs[i]);
                let (y0, y1) = (self.ys[i - 1], self.ys[i]);
                y0 + (x - x0) * (y1 - y0) / (x1 - x0)
            }
        }
    }
}
