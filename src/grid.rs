use crate::dataset::BinSpec;
use crate::error::Error;

/// The largest number of radii a grid may hold.
pub const MAX_BIN_COUNT: usize = 1 << 28;

/// The fixed radii at which profiles are reported.
///
/// There are `floor(max_radius / spacing)` radii, evenly spaced from
/// `spacing` to `max_radius` inclusive. If `spacing > max_radius` the grid is
/// empty. Grids with more than [`MAX_BIN_COUNT`] radii are rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGrid {
    spacing: f64,
    max_radius: f64,
    radii: Vec<f64>,
}

impl RadialGrid {
    pub fn new(spacing: f64, max_radius: f64) -> Result<Self, Error> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(Error::InvalidGrid(format!(
                "spacing must be positive and finite, got {}",
                spacing
            )));
        }
        if !(max_radius.is_finite() && max_radius > 0.0) {
            return Err(Error::InvalidGrid(format!(
                "maximum radius must be positive and finite, got {}",
                max_radius
            )));
        }
        let ratio = (max_radius / spacing).floor();
        if !(ratio <= MAX_BIN_COUNT as f64) {
            return Err(Error::InvalidGrid(format!(
                "{} / {} gives more than {} radii",
                max_radius, spacing, MAX_BIN_COUNT
            )));
        }
        let bin_count = ratio as usize;
        Ok(Self {
            spacing,
            max_radius,
            radii: linspace(spacing, max_radius, bin_count),
        })
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    pub fn bin_count(&self) -> usize {
        self.radii.len()
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    /// Bins whose centers line up with the grid radii: `bin_count` linear
    /// bins over `[spacing / 2, max_radius + spacing / 2]`.
    pub fn bin_spec(&self) -> BinSpec {
        BinSpec::new(
            0.5 * self.spacing,
            self.max_radius + 0.5 * self.spacing,
            self.bin_count(),
        )
    }
}

/// `n` evenly spaced values from `a` to `b` inclusive. A single value is
/// placed at `a`.
fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { b } else { a + i as f64 * step })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_count_is_floor_of_ratio() {
        assert_eq!(RadialGrid::new(2.5, 10.0).unwrap().bin_count(), 4);
        assert_eq!(RadialGrid::new(3.0, 10.0).unwrap().bin_count(), 3);
        assert_eq!(RadialGrid::new(1e5, 5e7).unwrap().bin_count(), 500);
        assert_eq!(RadialGrid::new(10.0, 10.0).unwrap().bin_count(), 1);
    }

    #[test]
    fn radii_span_spacing_to_max_radius() {
        let grid = RadialGrid::new(2.5, 10.0).unwrap();
        assert_eq!(grid.radii(), &[2.5, 5.0, 7.5, 10.0]);

        let grid = RadialGrid::new(3.0, 10.0).unwrap();
        let radii = grid.radii();
        assert_eq!(radii.first(), Some(&3.0));
        assert_eq!(radii.last(), Some(&10.0));
        assert!(radii.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn spacing_larger_than_max_radius_gives_empty_grid() {
        let grid = RadialGrid::new(20.0, 10.0).unwrap();
        assert!(grid.is_empty());
        assert_eq!(grid.bin_spec().count(), 0);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(RadialGrid::new(0.0, 10.0).is_err());
        assert!(RadialGrid::new(-1.0, 10.0).is_err());
        assert!(RadialGrid::new(1.0, f64::INFINITY).is_err());
        assert!(RadialGrid::new(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn too_many_radii_are_rejected() {
        assert!(matches!(RadialGrid::new(1e-300, 1.0), Err(Error::InvalidGrid(_))));
        assert!(matches!(RadialGrid::new(1e-10, 1e300), Err(Error::InvalidGrid(_))));
        let limit = MAX_BIN_COUNT as f64;
        assert!(matches!(RadialGrid::new(1.0, limit + 1.0), Err(Error::InvalidGrid(_))));
        assert!(matches!(RadialGrid::new(1.0, 1e6), Ok(grid) if grid.bin_count() == 1_000_000));
    }

    #[test]
    fn bin_centers_match_radii_for_commensurate_grids() {
        let grid = RadialGrid::new(1.0, 8.0).unwrap();
        let bins = grid.bin_spec();
        for (k, r) in grid.radii().iter().enumerate() {
            assert!((bins.center(k) - r).abs() < 1e-12);
        }
    }
}
