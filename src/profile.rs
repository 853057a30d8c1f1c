//! Radial profiles of simulation data on a fixed radius grid.
//!
//! One-dimensional data is profiled by casting a single ray outward from the
//! origin and interpolating the samples onto the grid. Two- and
//! three-dimensional data is profiled by mass-weighted binning of the cells
//! inside a sphere of radius `max_radius`.

use crate::dataset::{Dataset, RaySamples, Region};
use crate::error::Error;
use crate::grid::RadialGrid;
use crate::interp::{self, LinearInterpolant};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info};

/// Profiles of one or more fields, each aligned with the radii of the grid
/// that produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileSet {
    radii: Vec<f64>,
    values: BTreeMap<String, Vec<f64>>,
}

impl ProfileSet {
    fn new(radii: &[f64]) -> Self {
        Self {
            radii: radii.to_vec(),
            values: BTreeMap::new(),
        }
    }

    fn insert(&mut self, field: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.radii.len());
        self.values.insert(field.to_owned(), values);
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn get(&self, field: &str) -> Option<&[f64]> {
        self.values.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of fields in the set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Writes the profiles as a whitespace-separated table, one row per
    /// radius, preceded by a `#` header line naming the columns.
    pub fn write_table<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        write!(w, "# {:<14}", "radius")?;
        for field in self.fields() {
            write!(w, " {:<14}", field)?;
        }
        writeln!(w)?;

        for (n, r) in self.radii.iter().enumerate() {
            write!(w, "{:+.6e}", r)?;
            for values in self.values.values() {
                write!(w, " {:+.6e}", values[n])?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

impl std::ops::Index<&str> for ProfileSet {
    type Output = [f64];

    fn index(&self, field: &str) -> &[f64] {
        &self.values[field]
    }
}

/// The sampling strategy for data of a particular dimensionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileStrategy {
    /// Ray sampling and linear interpolation of 1D spherical data.
    Spherical,
    /// Mass-weighted binning of 2D axisymmetric data.
    Cylindrical,
    /// Mass-weighted binning of 3D Cartesian data.
    Cartesian,
}

impl ProfileStrategy {
    pub fn for_dimension(dim: usize) -> Result<Self, Error> {
        match dim {
            1 => Ok(Self::Spherical),
            2 => Ok(Self::Cylindrical),
            3 => Ok(Self::Cartesian),
            _ => Err(Error::UnsupportedDimension(dim)),
        }
    }

    /// The per-cell radius field cells are binned by, if this strategy bins.
    pub fn radius_field(&self) -> Option<&'static str> {
        match self {
            Self::Spherical => None,
            Self::Cylindrical => Some("cyl_radius"),
            Self::Cartesian => Some("radius"),
        }
    }

    /// The field bin averages are weighted by, if this strategy bins.
    pub fn weight_field(&self) -> Option<&'static str> {
        match self {
            Self::Spherical => None,
            Self::Cylindrical => Some("cyl_cell_mass"),
            Self::Cartesian => Some("cell_mass"),
        }
    }

    /// Profiles `fields` of the dataset on the builder's grid. Every field
    /// is checked before any sampling is done, so a missing field fails the
    /// whole call.
    pub fn sample<D: Dataset + ?Sized>(
        &self,
        builder: &RadialProfileBuilder,
        dataset: &D,
        fields: &[String],
    ) -> Result<ProfileSet, Error> {
        let required = fields
            .iter()
            .map(String::as_str)
            .chain(self.radius_field())
            .chain(self.weight_field());

        for field in required {
            if !dataset.has_field(field) {
                return Err(Error::MissingField(field.to_owned()));
            }
        }

        match (self.radius_field(), self.weight_field()) {
            (Some(radius_field), Some(weight_field)) => {
                let max_radius = builder.grid().max_radius();
                let region = dataset.sphere([0.0; 3], max_radius);
                builder.sample_weighted_binning(dataset, &region, radius_field, fields, weight_field)
            }
            _ => {
                let end = [builder.grid().max_radius(), 0.0, 0.0];
                let samples = dataset.ray([0.0; 3], end, fields)?;
                builder.sample_1d(&samples, fields)
            }
        }
    }
}

/// Builds radial profiles on a fixed grid of radii.
#[derive(Clone, Debug)]
pub struct RadialProfileBuilder {
    grid: RadialGrid,
}

impl RadialProfileBuilder {
    /// Creates a builder reporting profiles at `floor(max_radius / spacing)`
    /// radii from `spacing` to `max_radius`.
    pub fn build(spacing: f64, max_radius: f64) -> Result<Self, Error> {
        Ok(Self {
            grid: RadialGrid::new(spacing, max_radius)?,
        })
    }

    pub fn grid(&self) -> &RadialGrid {
        &self.grid
    }

    pub fn radii(&self) -> &[f64] {
        self.grid.radii()
    }

    /// Profiles `fields` of a dataset with the given dimensionality.
    pub fn profile<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
        dim: usize,
        fields: &[String],
    ) -> Result<ProfileSet, Error> {
        let strategy = ProfileStrategy::for_dimension(dim)?;
        info!(?strategy, fields = fields.len(), bins = self.grid.bin_count(), "profile");
        strategy.sample(self, dataset, fields)
    }

    /// Interpolates ray samples onto the grid. The samples are taken along a
    /// ray from the origin to `max_radius`, so a sample at parametric
    /// position `t` lies at radius `t * max_radius`. Grid radii outside the
    /// sampled range take the value of the nearest sample.
    pub fn sample_1d(&self, samples: &RaySamples, fields: &[String]) -> Result<ProfileSet, Error> {
        let columns = fields
            .iter()
            .map(|field| {
                samples
                    .column(field)
                    .map(|c| (field.as_str(), c))
                    .ok_or_else(|| Error::MissingField(field.clone()))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut profiles = ProfileSet::new(self.radii());
        if self.grid.is_empty() {
            for (field, _) in columns {
                profiles.insert(field, vec![]);
            }
            return Ok(profiles);
        }

        let max_radius = self.grid.max_radius();
        let r: Vec<f64> = samples.t().iter().map(|t| t * max_radius).collect();

        for (field, column) in columns {
            let f = LinearInterpolant::from_samples(&r, column).map_err(|e| match e {
                interp::Error::TooFewPoints => Error::InsufficientSamples {
                    field: field.to_owned(),
                },
                interp::Error::LengthMismatch(..) => {
                    Error::InvalidCheckpoint(format!("ray column {}: {}", field, e))
                }
            })?;
            debug!(field, samples = f.len(), "interpolate");
            profiles.insert(field, self.radii().iter().map(|&x| f.sample(x)).collect());
        }
        Ok(profiles)
    }

    /// Bins the cells of `region` by `radius_field` into bins centered on
    /// the grid radii, and reports the `weight_field`-weighted mean of each
    /// field per bin. Bins with zero total weight report
    /// [`EMPTY_BIN_FILL`](crate::dataset::EMPTY_BIN_FILL).
    pub fn sample_weighted_binning<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
        region: &Region,
        radius_field: &str,
        fields: &[String],
        weight_field: &str,
    ) -> Result<ProfileSet, Error> {
        let binned = dataset.profile(region, radius_field, fields, weight_field, self.grid.bin_spec())?;
        let mut profiles = ProfileSet::new(self.radii());
        for field in fields {
            let values = binned
                .values
                .get(field)
                .cloned()
                .ok_or_else(|| Error::MissingField(field.clone()))?;
            profiles.insert(field, values);
        }
        Ok(profiles)
    }
}
