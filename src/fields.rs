//! Derived fields: named per-cell formulas over a fixed set of primitive
//! inputs.
//!
//! Each geometry has a standard set of derived fields (radius, cell volume,
//! cell mass, radial and tangential velocity, entropy). The formulas are pure
//! functions of [`CellInputs`]; the registry records their units and the
//! stored variables they read, and checks both when a field is registered.

use crate::error::Error;
use crate::mesh::Geometry;
use crate::units::Units;
use std::f64::consts::PI;

/// Stored variables that derived-field formulas may read.
pub const PRIMITIVE_INPUTS: [&str; 5] = ["dens", "entr", "velx", "vely", "velz"];

/// Everything a derived-field formula can see about one cell. Coordinates
/// and widths are in mesh coordinates, padded with zeros on absent axes;
/// velocity components follow the mesh axes (`velx` along the first axis,
/// and so on). Inputs a field did not declare are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellInputs {
    pub center: [f64; 3],
    pub width: [f64; 3],
    pub dens: f64,
    pub entr: f64,
    pub vel: [f64; 3],
}

pub type FieldFunction = fn(&CellInputs) -> f64;

/// A registered derived field.
#[derive(Clone)]
pub struct DerivedField {
    name: String,
    units: Units,
    inputs: Vec<&'static str>,
    function: FieldFunction,
}

impl std::fmt::Debug for DerivedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedField")
            .field("name", &self.name)
            .field("units", &self.units)
            .field("inputs", &self.inputs)
            .finish()
    }
}

impl DerivedField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    /// Stored variables read by this field's formula.
    pub fn inputs(&self) -> &[&'static str] {
        &self.inputs
    }

    pub fn evaluate(&self, cell: &CellInputs) -> f64 {
        (self.function)(cell)
    }
}

/// Stored variables available to formulas in each geometry.
fn available_inputs(geometry: Geometry) -> &'static [&'static str] {
    match geometry {
        Geometry::Spherical => &PRIMITIVE_INPUTS[..3],
        Geometry::Cylindrical => &PRIMITIVE_INPUTS[..4],
        Geometry::Cartesian => &PRIMITIVE_INPUTS[..],
    }
}

/// An explicit table of derived fields for one geometry.
#[derive(Clone, Debug)]
pub struct FieldRegistry {
    geometry: Geometry,
    stored: Vec<(String, Units)>,
    fields: Vec<DerivedField>,
}

impl FieldRegistry {
    /// Creates an empty registry. `stored` lists the variables present in
    /// the dataset, with their units; derived fields may not shadow them
    /// with different units.
    pub fn new(geometry: Geometry, stored: Vec<(String, Units)>) -> Self {
        Self {
            geometry,
            stored,
            fields: Vec::new(),
        }
    }

    /// Creates a registry holding the standard derived fields of a geometry.
    pub fn standard(geometry: Geometry, stored: Vec<(String, Units)>) -> Result<Self, Error> {
        let mut registry = Self::new(geometry, stored);
        match geometry {
            Geometry::Spherical => {
                registry.register("radial_velocity", "cm/s", &["velx"], sph_radial_velocity)?;
                registry.register("tangential_velocity", "cm/s", &["velx"], sph_tangential_velocity)?;
                registry.register("radius", "cm", &[], sph_radius)?;
                registry.register("sph_radius", "cm", &[], sph_radius)?;
                registry.register("sph_cell_volume", "cm**3", &[], sph_cell_volume)?;
                registry.register("sph_cell_mass", "g", &["dens"], sph_cell_mass)?;
            }
            Geometry::Cylindrical => {
                registry.register("radial_velocity", "cm/s", &["velx", "vely"], cyl_radial_velocity)?;
                registry.register("tangential_velocity", "cm/s", &["velx", "vely"], cyl_tangential_velocity)?;
                registry.register("radius", "cm", &[], cyl_radius)?;
                registry.register("cyl_radius", "cm", &[], cyl_radius)?;
                registry.register("cyl_cell_volume", "cm**3", &[], cyl_cell_volume)?;
                registry.register("cyl_cell_mass", "g", &["dens"], cyl_cell_mass)?;
            }
            Geometry::Cartesian => {
                registry.register("radial_velocity", "cm/s", &["velx", "vely", "velz"], car_radial_velocity)?;
                registry.register("tangential_velocity", "cm/s", &["velx", "vely", "velz"], car_tangential_velocity)?;
                registry.register("radius", "cm", &[], car_radius)?;
                registry.register("cell_volume", "cm**3", &[], car_cell_volume)?;
                registry.register("cell_mass", "g", &["dens"], car_cell_mass)?;
            }
        }
        registry.register("entropy", "kB/by", &["entr"], entropy)?;
        Ok(registry)
    }

    /// Adds a derived field. Fails if the units do not parse, the name is
    /// already registered, an input is not a primitive available in this
    /// geometry, or a stored variable of the same name has different units.
    pub fn register(
        &mut self,
        name: &str,
        units: &str,
        inputs: &[&'static str],
        function: FieldFunction,
    ) -> Result<(), Error> {
        let units: Units = units.parse()?;

        if self.get(name).is_some() {
            return Err(Error::FieldRegistration(format!(
                "{} is already registered",
                name
            )));
        }
        if let Some(input) = inputs
            .iter()
            .find(|i| !available_inputs(self.geometry).contains(*i))
        {
            return Err(Error::FieldRegistration(format!(
                "{} reads {}, which is not available in {:?} geometry",
                name, input, self.geometry
            )));
        }
        if let Some((_, stored)) = self.stored.iter().find(|(n, _)| n == name) {
            if *stored != units {
                return Err(Error::FieldRegistration(format!(
                    "{} [{}] would shadow a stored variable with units [{}]",
                    name, units, stored
                )));
            }
        }
        self.fields.push(DerivedField {
            name: name.to_owned(),
            units,
            inputs: inputs.to_vec(),
            function,
        });
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn get(&self, name: &str) -> Option<&DerivedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[DerivedField] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Specific entropy in Boltzmann constants per baryon.
fn entropy(c: &CellInputs) -> f64 {
    c.entr
}

// 1D spherical

fn sph_radius(c: &CellInputs) -> f64 {
    c.center[0]
}

fn sph_cell_volume(c: &CellInputs) -> f64 {
    let r_out = c.center[0] + 0.5 * c.width[0];
    let r_in = c.center[0] - 0.5 * c.width[0];
    4.0 / 3.0 * PI * (r_out.powi(3) - r_in.powi(3))
}

fn sph_cell_mass(c: &CellInputs) -> f64 {
    c.dens * sph_cell_volume(c)
}

fn sph_radial_velocity(c: &CellInputs) -> f64 {
    c.vel[0]
}

fn sph_tangential_velocity(_: &CellInputs) -> f64 {
    0.0
}

// 2D cylindrical (r, z)

fn cyl_radius(c: &CellInputs) -> f64 {
    c.center[0].hypot(c.center[1])
}

fn cyl_cell_volume(c: &CellInputs) -> f64 {
    c.width[0] * c.width[1] * 2.0 * PI * c.center[0]
}

fn cyl_cell_mass(c: &CellInputs) -> f64 {
    c.dens * cyl_cell_volume(c)
}

/// Polar angle measured from the equatorial plane.
fn cyl_polar_angle(c: &CellInputs) -> f64 {
    (c.center[1] / c.center[0]).atan()
}

fn cyl_radial_velocity(c: &CellInputs) -> f64 {
    let phi = cyl_polar_angle(c);
    phi.cos() * c.vel[0] + phi.sin() * c.vel[1]
}

fn cyl_tangential_velocity(c: &CellInputs) -> f64 {
    let phi = cyl_polar_angle(c);
    -phi.sin() * c.vel[0] + phi.cos() * c.vel[1]
}

// 3D Cartesian

fn car_radius(c: &CellInputs) -> f64 {
    let [x, y, z] = c.center;
    (x * x + y * y + z * z).sqrt()
}

fn car_cell_volume(c: &CellInputs) -> f64 {
    c.width[0] * c.width[1] * c.width[2]
}

fn car_cell_mass(c: &CellInputs) -> f64 {
    c.dens * car_cell_volume(c)
}

fn car_radial_velocity(c: &CellInputs) -> f64 {
    let r = car_radius(c);
    if r == 0.0 {
        return 0.0;
    }
    (0..3).map(|a| c.vel[a] * c.center[a]).sum::<f64>() / r
}

fn car_tangential_velocity(c: &CellInputs) -> f64 {
    let r = car_radius(c);
    let vr = car_radial_velocity(c);
    let v2: f64 = c.vel.iter().map(|v| v * v).sum();
    if r == 0.0 {
        return v2.sqrt();
    }
    (v2 - vr * vr).max(0.0).sqrt()
}
