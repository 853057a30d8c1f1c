//! The interface between profile builders and simulation data.

use crate::error::Error;
use std::collections::BTreeMap;

/// Value reported for a bin whose total weight is zero (including bins that
/// received no cells at all).
pub const EMPTY_BIN_FILL: f64 = 0.0;

/// Field values sampled along a straight segment. Each sample is tagged with
/// its parametric position `t` in `[0, 1]` along the segment; samples are
/// not required to be ordered.
#[derive(Clone, Debug, Default)]
pub struct RaySamples {
    t: Vec<f64>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl RaySamples {
    pub fn new(t: Vec<f64>) -> Self {
        Self {
            t,
            columns: BTreeMap::new(),
        }
    }

    /// Builds samples from `(t, values)` rows, with one value per entry of
    /// `names` in each row.
    pub fn from_rows(names: &[&str], rows: &[(f64, Vec<f64>)]) -> Result<Self, Error> {
        let mut samples = Self::new(rows.iter().map(|(t, _)| *t).collect());
        for (n, name) in names.iter().enumerate() {
            let column = rows
                .iter()
                .map(|(_, values)| values.get(n).copied())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| Error::MissingField(name.to_string()))?;
            samples = samples.with_column(name, column)?;
        }
        Ok(samples)
    }

    /// Adds a column of field values, one per sample.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self, Error> {
        if values.len() != self.t.len() {
            return Err(Error::InvalidCheckpoint(format!(
                "ray column {} has {} values for {} samples",
                name,
                values.len(),
                self.t.len()
            )));
        }
        self.columns.insert(name.to_owned(), values);
        Ok(self)
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// A selection of cells, by storage index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    pub cells: Vec<usize>,
}

impl Region {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Linear bins over `[lower, upper)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinSpec {
    lower: f64,
    upper: f64,
    count: usize,
}

impl BinSpec {
    pub fn new(lower: f64, upper: f64, count: usize) -> Self {
        Self {
            lower,
            upper,
            count,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn width(&self) -> f64 {
        (self.upper - self.lower) / self.count as f64
    }

    pub fn center(&self, k: usize) -> f64 {
        self.lower + (k as f64 + 0.5) * self.width()
    }

    /// Returns the bin containing `x`, or `None` if `x` is outside the
    /// binned range (or not a number).
    pub fn index_of(&self, x: f64) -> Option<usize> {
        if self.count == 0 || !(x >= self.lower && x < self.upper) {
            return None;
        }
        let k = ((x - self.lower) / (self.upper - self.lower) * self.count as f64) as usize;
        Some(k.min(self.count - 1))
    }
}

/// Weighted means of fields in radial bins.
#[derive(Clone, Debug)]
pub struct BinnedProfile {
    pub bins: BinSpec,
    /// Total weight collected in each bin.
    pub weight: Vec<f64>,
    /// Weighted mean of each field in each bin.
    pub values: BTreeMap<String, Vec<f64>>,
}

/// Accumulates `Σ w f / Σ w` per bin for each field column. `bin_by`,
/// `weight`, and every column must have one entry per cell. Cells whose
/// `bin_by` value falls outside the bins are ignored; bins with zero total
/// weight report `EMPTY_BIN_FILL`.
pub fn weighted_binning(
    bins: BinSpec,
    bin_by: &[f64],
    weight: &[f64],
    columns: &[(&str, Vec<f64>)],
) -> Result<BinnedProfile, Error> {
    if weight.len() != bin_by.len() || columns.iter().any(|(_, c)| c.len() != bin_by.len()) {
        return Err(Error::InvalidCheckpoint(
            "binned columns have inconsistent lengths".into(),
        ));
    }
    let index: Vec<Option<usize>> = bin_by.iter().map(|&x| bins.index_of(x)).collect();

    let mut total = vec![0.0; bins.count()];
    for (k, w) in index.iter().zip(weight) {
        if let Some(k) = k {
            total[*k] += w;
        }
    }

    let values = columns
        .iter()
        .map(|(name, column)| {
            let mut sum = vec![0.0; bins.count()];
            for ((k, w), f) in index.iter().zip(weight).zip(column) {
                if let Some(k) = k {
                    sum[*k] += w * f;
                }
            }
            let mean = sum
                .iter()
                .zip(&total)
                .map(|(s, w)| if *w == 0.0 { EMPTY_BIN_FILL } else { s / w })
                .collect::<Vec<f64>>();
            (name.to_string(), mean)
        })
        .collect();

    Ok(BinnedProfile {
        bins,
        weight: total,
        values,
    })
}

/// Read-only access to a loaded simulation dataset.
pub trait Dataset {
    /// Dimensionality of the data (1, 2, or 3).
    fn dimensionality(&self) -> usize;

    /// Names of every field this dataset can produce, stored or derived.
    fn field_names(&self) -> Vec<String>;

    fn has_field(&self, name: &str) -> bool {
        self.field_names().iter().any(|n| n == name)
    }

    /// Samples the given fields along the segment `start -> end`.
    fn ray(&self, start: [f64; 3], end: [f64; 3], fields: &[String]) -> Result<RaySamples, Error>;

    /// Selects the cells within `radius` of `center`.
    fn sphere(&self, center: [f64; 3], radius: f64) -> Region;

    /// Bins the cells of `region` by the value of `bin_field` and reports
    /// the mean of each field, weighted by `weight_field`.
    fn profile(
        &self,
        region: &Region,
        bin_field: &str,
        fields: &[String],
        weight_field: &str,
        bins: BinSpec,
    ) -> Result<BinnedProfile, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_index_respects_half_open_range() {
        let bins = BinSpec::new(0.5, 4.5, 4);
        assert_eq!(bins.index_of(0.4), None);
        assert_eq!(bins.index_of(0.5), Some(0));
        assert_eq!(bins.index_of(1.49), Some(0));
        assert_eq!(bins.index_of(1.5), Some(1));
        assert_eq!(bins.index_of(4.49), Some(3));
        assert_eq!(bins.index_of(4.5), None);
        assert_eq!(bins.index_of(f64::NAN), None);
        assert_eq!(bins.width(), 1.0);
        assert_eq!(bins.center(2), 3.0);
    }

    #[test]
    fn empty_bin_spec_selects_nothing() {
        let bins = BinSpec::new(0.5, 4.5, 0);
        assert_eq!(bins.index_of(1.0), None);
        let profile = weighted_binning(bins, &[1.0], &[1.0], &[("dens", vec![2.0])]).unwrap();
        assert!(profile.values["dens"].is_empty());
    }

    #[test]
    fn weighted_mean_per_bin() {
        let bins = BinSpec::new(0.0, 2.0, 2);
        let bin_by = [0.5, 0.5, 1.5];
        let weight = [1.0, 3.0, 2.0];
        let dens = vec![2.0, 6.0, 7.0];
        let profile = weighted_binning(bins, &bin_by, &weight, &[("dens", dens)]).unwrap();
        assert_eq!(profile.weight, vec![4.0, 2.0]);
        assert_eq!(profile.values["dens"], vec![5.0, 7.0]);
    }

    #[test]
    fn zero_weight_bins_get_the_fill_value() {
        let bins = BinSpec::new(0.0, 3.0, 3);
        let bin_by = [0.5, 1.5, 1.5];
        let weight = [1.0, 0.0, 0.0];
        let dens = vec![4.0, 5.0, 6.0];
        let profile = weighted_binning(bins, &bin_by, &weight, &[("dens", dens)]).unwrap();
        assert_eq!(profile.values["dens"], vec![4.0, EMPTY_BIN_FILL, EMPTY_BIN_FILL]);
        assert!(profile.values["dens"].iter().all(|x| x.is_finite()));
    }

    #[test]
    fn inconsistent_columns_are_rejected() {
        let bins = BinSpec::new(0.0, 1.0, 1);
        assert!(weighted_binning(bins, &[0.5], &[1.0, 1.0], &[]).is_err());
        assert!(weighted_binning(bins, &[0.5], &[1.0], &[("dens", vec![])]).is_err());
    }

    #[test]
    fn ray_samples_from_rows() {
        let rows = vec![(0.0, vec![10.0, 1.0]), (1.0, vec![30.0, 3.0])];
        let samples = RaySamples::from_rows(&["dens", "entr"], &rows).unwrap();
        assert_eq!(samples.t(), &[0.0, 1.0]);
        assert_eq!(samples.column("entr"), Some(&[1.0, 3.0][..]));
        assert!(samples.column("pres").is_none());
        assert!(RaySamples::from_rows(&["dens", "entr", "pres"], &rows).is_err());
    }
}
