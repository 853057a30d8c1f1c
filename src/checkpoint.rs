use crate::dataset::{weighted_binning, BinSpec, BinnedProfile, Dataset, RaySamples, Region};
use crate::error::Error;
use crate::fields::{CellInputs, DerivedField, FieldRegistry};
use crate::mesh::Mesh;
use crate::units::Units;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// A named per-cell variable stored in a checkpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "StoredVariable", try_from = "StoredVariable")]
pub struct Variable {
    pub name: String,
    pub units: String,
    pub data: Vec<f64>,
}

/// The on-disk form of a variable: its data is a packed blob of
/// little-endian f64 bytes.
#[derive(Serialize, Deserialize)]
struct StoredVariable {
    name: String,
    units: String,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl From<Variable> for StoredVariable {
    fn from(v: Variable) -> Self {
        Self {
            name: v.name,
            units: v.units,
            data: v.data.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

impl TryFrom<StoredVariable> for Variable {
    type Error = Error;

    fn try_from(v: StoredVariable) -> Result<Self, Self::Error> {
        let chunks = v.data.chunks_exact(std::mem::size_of::<f64>());
        if !chunks.remainder().is_empty() {
            return Err(Error::InvalidCheckpoint(format!(
                "variable {} has {} bytes, not a multiple of 8",
                v.name,
                v.data.len()
            )));
        }
        let data = chunks
            .map(|c| [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            .map(f64::from_le_bytes)
            .collect();
        Ok(Self {
            name: v.name,
            units: v.units,
            data,
        })
    }
}

/// A simulation snapshot: the mesh, the simulation time, and any number of
/// stored cell variables. Derived fields for the mesh geometry are computed
/// on demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub mesh: Mesh,
    pub time: f64,
    pub setup_name: String,
    pub parameters: String,
    variables: Vec<Variable>,
}

impl Checkpoint {
    pub fn new(mesh: Mesh, time: f64) -> Self {
        Self {
            mesh,
            time,
            setup_name: String::new(),
            parameters: String::new(),
            variables: Vec::new(),
        }
    }

    /// Adds a stored variable. The data must have one value per cell, the
    /// units must parse, and the name must not already be stored.
    pub fn add_variable(&mut self, name: &str, units: &str, data: Vec<f64>) -> Result<(), Error> {
        units.parse::<Units>()?;
        if self.variable(name).is_some() {
            return Err(Error::InvalidCheckpoint(format!(
                "variable {} is already stored",
                name
            )));
        }
        if data.len() != self.mesh.num_total_zones() {
            return Err(Error::InvalidCheckpoint(format!(
                "variable {} has {} values for {} cells",
                name,
                data.len(),
                self.mesh.num_total_zones()
            )));
        }
        self.variables.push(Variable {
            name: name.to_owned(),
            units: units.to_owned(),
            data,
        });
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn from_file(filename: &str) -> Result<Self, Error> {
        info!("read {}", filename);

        let mut f = File::open(filename)?;
        let mut bytes = Vec::new();
        f.read_to_end(&mut bytes)?;

        let checkpoint: Checkpoint = rmp_serde::from_slice(&bytes)
            .map_err(|e| Error::InvalidCheckpoint(format!("{}: {}", filename, e)))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    pub fn write_file(&self, filename: &str) -> Result<(), Error> {
        if let Some(parent) = Path::new(filename).parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let bytes = rmp_serde::to_vec_named(self)
            .map_err(|e| Error::InvalidCheckpoint(format!("{}", e)))?;
        let mut file = File::create(filename)?;
        info!("write {}", filename);
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Checks the mesh, the variable lengths and units, and that the
    /// standard derived fields do not conflict with stored variables.
    pub fn validate(&self) -> Result<(), Error> {
        self.mesh.validate()?;
        for (n, v) in self.variables.iter().enumerate() {
            if v.data.len() != self.mesh.num_total_zones() {
                return Err(Error::InvalidCheckpoint(format!(
                    "variable {} has {} values for {} cells",
                    v.name,
                    v.data.len(),
                    self.mesh.num_total_zones()
                )));
            }
            if self.variables[..n].iter().any(|w| w.name == v.name) {
                return Err(Error::InvalidCheckpoint(format!(
                    "variable {} is stored twice",
                    v.name
                )));
            }
            v.units.parse::<Units>()?;
        }
        self.registry()?;
        Ok(())
    }

    /// The standard derived fields for this checkpoint's geometry.
    pub fn registry(&self) -> Result<FieldRegistry, Error> {
        let stored = self
            .variables
            .iter()
            .map(|v| Ok((v.name.clone(), v.units.parse::<Units>()?)))
            .collect::<Result<Vec<_>, Error>>()?;
        FieldRegistry::standard(self.mesh.geometry(), stored)
    }

    /// Units of a stored or derived field.
    pub fn field_units(&self, name: &str) -> Result<Units, Error> {
        if let Some(v) = self.variable(name) {
            return v.units.parse();
        }
        self.registry()?
            .get(name)
            .map(|f| f.units().clone())
            .ok_or_else(|| Error::MissingField(name.to_owned()))
    }

    /// Values of a stored or derived field on every cell, in storage order.
    pub fn values(&self, name: &str) -> Result<Vec<f64>, Error> {
        if let Some(v) = self.variable(name) {
            return Ok(v.data.clone());
        }
        let cells: Vec<usize> = (0..self.mesh.num_total_zones()).collect();
        self.values_at(name, &cells)
    }

    /// Values of a stored or derived field on the given cells.
    pub fn values_at(&self, name: &str, cells: &[usize]) -> Result<Vec<f64>, Error> {
        if let Some(v) = self.variable(name) {
            return Ok(cells.iter().map(|&n| v.data[n]).collect());
        }
        let registry = self.registry()?;
        let field = registry
            .get(name)
            .ok_or_else(|| Error::MissingField(name.to_owned()))?;

        let dens = self.input_column(field, "dens")?;
        let entr = self.input_column(field, "entr")?;
        let vel = [
            self.input_column(field, "velx")?,
            self.input_column(field, "vely")?,
            self.input_column(field, "velz")?,
        ];

        Ok(cells
            .iter()
            .map(|&n| {
                let ijk = self.mesh.unravel(n);
                let cell = CellInputs {
                    center: self.mesh.cell_center(ijk),
                    width: self.mesh.cell_width(ijk),
                    dens: dens.map_or(0.0, |d| d[n]),
                    entr: entr.map_or(0.0, |s| s[n]),
                    vel: [
                        vel[0].map_or(0.0, |v| v[n]),
                        vel[1].map_or(0.0, |v| v[n]),
                        vel[2].map_or(0.0, |v| v[n]),
                    ],
                };
                field.evaluate(&cell)
            })
            .collect())
    }

    /// The stored column for one of a derived field's declared inputs, or
    /// `None` if the field does not read it.
    fn input_column(&self, field: &DerivedField, input: &str) -> Result<Option<&[f64]>, Error> {
        if !field.inputs().iter().any(|i| *i == input) {
            return Ok(None);
        }
        self.variable(input)
            .map(|v| Some(v.data.as_slice()))
            .ok_or_else(|| Error::MissingField(input.to_owned()))
    }
}

impl Dataset for Checkpoint {
    fn dimensionality(&self) -> usize {
        self.mesh.dimensionality()
    }

    fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.iter().map(|v| v.name.clone()).collect();
        if let Ok(registry) = self.registry() {
            for name in registry.names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_owned())
                }
            }
        }
        names
    }

    fn ray(&self, start: [f64; 3], end: [f64; 3], fields: &[String]) -> Result<RaySamples, Error> {
        let segments = self.mesh.ray_segments(start, end);
        let cells: Vec<usize> = segments.iter().map(|(_, c)| self.mesh.index(*c)).collect();
        debug!(samples = cells.len(), ?start, ?end, "ray");

        let mut samples = RaySamples::new(segments.iter().map(|(t, _)| *t).collect());
        for field in fields {
            samples = samples.with_column(field, self.values_at(field, &cells)?)?;
        }
        Ok(samples)
    }

    fn sphere(&self, center: [f64; 3], radius: f64) -> Region {
        Region {
            cells: self.mesh.cells_within(center, radius),
        }
    }

    fn profile(
        &self,
        region: &Region,
        bin_field: &str,
        fields: &[String],
        weight_field: &str,
        bins: BinSpec,
    ) -> Result<BinnedProfile, Error> {
        let bin_by = self.values_at(bin_field, &region.cells)?;
        let weight = self.values_at(weight_field, &region.cells)?;
        let columns = fields
            .iter()
            .map(|f| Ok((f.as_str(), self.values_at(f, &region.cells)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        let profile = weighted_binning(bins, &bin_by, &weight, &columns)?;
        debug!(
            cells = region.len(),
            bins = bins.count(),
            empty_bins = profile.weight.iter().filter(|w| **w == 0.0).count(),
            bin_field,
            weight_field,
            "binned profile"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Geometry;

    fn shells(n: usize, rmax: f64) -> Checkpoint {
        let mesh = Mesh::for_dimension(1, rmax, n).unwrap();
        let mut chkpt = Checkpoint::new(mesh, 0.0);
        let r: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) * rmax / n as f64).collect();
        chkpt.add_variable("dens", "g/cm**3", vec![2.0; n]).unwrap();
        chkpt.add_variable("velx", "cm/s", r.iter().map(|r| -r).collect()).unwrap();
        chkpt.add_variable("entr", "", r.clone()).unwrap();
        chkpt
    }

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("ccsn-{}-{}", std::process::id(), name))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn checkpoint_survives_write_and_read() {
        let chkpt = shells(16, 8.0);
        let filename = temp_path("roundtrip.ccsn");
        chkpt.write_file(&filename).unwrap();
        let loaded = Checkpoint::from_file(&filename).unwrap();
        std::fs::remove_file(&filename).unwrap();

        assert_eq!(loaded.mesh, chkpt.mesh);
        assert_eq!(loaded.variables().len(), 3);
        assert_eq!(loaded.variable("velx").unwrap().data, chkpt.variable("velx").unwrap().data);
    }

    #[test]
    fn variables_are_stored_as_byte_blobs() {
        let chkpt = shells(2, 2.0);
        let stored = StoredVariable::from(chkpt.variable("entr").unwrap().clone());
        assert_eq!(stored.data.len(), 16);
        assert_eq!(&stored.data[..8], &0.5f64.to_le_bytes());
        assert_eq!(&stored.data[8..], &1.5f64.to_le_bytes());

        let truncated = StoredVariable {
            data: stored.data[..12].to_vec(),
            ..stored
        };
        assert!(matches!(
            Variable::try_from(truncated),
            Err(Error::InvalidCheckpoint(_))
        ));
    }

    #[test]
    fn garbage_files_are_invalid_checkpoints() {
        let filename = temp_path("garbage.ccsn");
        std::fs::write(&filename, b"not a checkpoint").unwrap();
        let result = Checkpoint::from_file(&filename);
        std::fs::remove_file(&filename).unwrap();
        assert!(matches!(result, Err(Error::InvalidCheckpoint(_))));
    }

    #[test]
    fn variables_must_cover_the_mesh() {
        let mut chkpt = shells(4, 1.0);
        assert!(chkpt.add_variable("pres", "erg/cm**3", vec![1.0; 3]).is_err());
        assert!(chkpt.add_variable("dens", "g/cm**3", vec![1.0; 4]).is_err());
        assert!(chkpt.add_variable("pres", "bogus", vec![1.0; 4]).is_err());
    }

    #[test]
    fn derived_fields_are_computed_from_stored_variables() {
        let chkpt = shells(4, 4.0);
        assert_eq!(chkpt.values("radius").unwrap(), vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(chkpt.values("radial_velocity").unwrap(), vec![-0.5, -1.5, -2.5, -3.5]);
        let mass = chkpt.values("sph_cell_mass").unwrap();
        let volume = chkpt.values("sph_cell_volume").unwrap();
        for (m, v) in mass.iter().zip(&volume) {
            assert!((m - 2.0 * v).abs() < 1e-12 * m.abs());
        }
        let total: f64 = volume.iter().sum();
        let sphere = 4.0 / 3.0 * std::f64::consts::PI * 64.0;
        assert!((total - sphere).abs() < 1e-9 * sphere);
        assert_eq!(chkpt.field_units("sph_cell_mass").unwrap(), "g".parse().unwrap());
    }

    #[test]
    fn entropy_reads_the_stored_entr_variable() {
        let chkpt = shells(4, 4.0);
        assert_eq!(chkpt.values("entropy").unwrap(), chkpt.values("entr").unwrap());
        assert_eq!(chkpt.field_units("entropy").unwrap().symbol(), "kB/by");

        let mesh = Mesh::for_dimension(1, 1.0, 2).unwrap();
        let bare = Checkpoint::new(mesh, 0.0);
        match bare.values("entropy") {
            Err(Error::MissingField(name)) => assert_eq!(name, "entr"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_are_missing() {
        let chkpt = shells(4, 4.0);
        assert!(matches!(chkpt.values("ye"), Err(Error::MissingField(_))));
        assert!(matches!(chkpt.values("cyl_radius"), Err(Error::MissingField(_))));
        assert!(chkpt.has_field("sph_cell_mass"));
        assert!(!chkpt.has_field("cell_mass"));
    }

    #[test]
    fn derived_field_with_missing_input_reports_the_input() {
        let mesh = Mesh::for_dimension(1, 1.0, 2).unwrap();
        let chkpt = Checkpoint::new(mesh, 0.0);
        match chkpt.values("sph_cell_mass") {
            Err(Error::MissingField(name)) => assert_eq!(name, "dens"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(chkpt.values("radius").is_ok());
    }

    #[test]
    fn ray_samples_carry_requested_fields() {
        let chkpt = shells(10, 10.0);
        let fields = vec!["entr".to_string(), "radius".to_string()];
        let ray = chkpt.ray([0.0; 3], [10.0, 0.0, 0.0], &fields).unwrap();
        assert_eq!(ray.len(), 10);
        for (t, r) in ray.t().iter().zip(ray.column("radius").unwrap()) {
            assert!((t * 10.0 - r).abs() < 1e-12);
        }
        assert_eq!(ray.column("entr"), ray.column("radius"));
    }

    #[test]
    fn cylindrical_profile_of_uniform_medium_is_uniform() {
        let mesh = Mesh::uniform(Geometry::Cylindrical, &[0.0, -8.0], &[8.0, 8.0], &[32, 64]).unwrap();
        let n = mesh.num_total_zones();
        let mut chkpt = Checkpoint::new(mesh, 0.0);
        chkpt.add_variable("dens", "g/cm**3", vec![3.0; n]).unwrap();

        let region = chkpt.sphere([0.0; 3], 8.0);
        assert!(region.len() < n);
        let bins = BinSpec::new(0.5, 8.5, 8);
        let profile = chkpt
            .profile(&region, "cyl_radius", &["dens".to_string()], "cyl_cell_mass", bins)
            .unwrap();
        assert!(profile.values["dens"].iter().all(|d| (d - 3.0).abs() < 1e-12));
        assert!(profile.weight.iter().all(|w| *w > 0.0));
    }
}
