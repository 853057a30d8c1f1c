//! Master list of the analytic model setups.
//!
//! Each setup describes a spherically symmetric model star. A setup is
//! realized on a mesh of any geometry by [`generate`], which evaluates the
//! model at each cell's distance from the origin and writes a checkpoint.

use crate::checkpoint::Checkpoint;
use crate::error::{self, Error::*};
use crate::mesh::{Geometry, Mesh};
use std::fmt::Write;
use std::str::FromStr;
use tracing::info;

/// Primitive state of a model at a given radius.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Primitive {
    /// Mass density (g/cm^3)
    pub dens: f64,
    /// Radial velocity (cm/s)
    pub radial_velocity: f64,
    /// Gas pressure (erg/cm^3)
    pub pres: f64,
    /// Specific entropy (kB/by)
    pub entr: f64,
    /// Electron fraction
    pub ye: f64,
}

pub trait Setup {
    /// The model state at spherical radius `r`.
    fn primitive(&self, r: f64) -> Primitive;

    /// The model parameters, with their descriptions.
    fn form(&self) -> &kind_config::Form;

    fn print_parameters(&self) {
        let form = self.form();
        for key in form.sorted_keys() {
            info!("{:.<20} {:<10} {}", key, form.get(&key), form.about(&key));
        }
    }

    /// The parameters as a `key=value:key=value` string, which parses back
    /// to the same setup.
    fn model_parameter_string(&self) -> String {
        self.form()
            .iter()
            .map(|(a, b)| format!("{}={}", a, b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

macro_rules! setup_builder {
    ($setup:ident) => {
        Box::new(|p: &str| -> Result<Box<dyn Setup>, error::Error> {
            Ok(Box::new($setup::from_str(p)?))
        })
    };
}

type SetupFunction = Box<dyn Fn(&str) -> Result<Box<dyn Setup>, error::Error>>;

fn setups() -> Vec<(&'static str, SetupFunction)> {
    vec![
        ("collapse", setup_builder!(Collapse)),
        ("uniform", setup_builder!(Uniform)),
    ]
}

/// Generates an error message of type `PrintUserInformation` listing known
/// model setups.
pub fn possible_setups_info() -> error::Error {
    let mut message = String::new();
    let _ = writeln!(message, "specify setup:");
    for (setup_name, _) in setups() {
        let _ = writeln!(message, "    {}", setup_name);
    }
    PrintUserInformation(message)
}

/// Tries to construct a dynamic setup from a string key and model parameter
/// string.
///
/// If no setup matches the given name, a `PrintUserInformation` error is
/// returned listing the available setups. If a setup is found, but has an
/// invalid configuration, the `InvalidSetup` error is returned here.
pub fn make_setup(setup_name: &str, parameters: &str) -> Result<Box<dyn Setup>, error::Error> {
    setups()
        .into_iter()
        .find(|&(n, _)| n == setup_name)
        .map(|(_, f)| f(parameters))
        .ok_or_else(possible_setups_info)?
}

/// Evaluates a setup on every cell of a mesh. The stored variables are
/// `dens`, `pres`, `entr`, `ye`, and the velocity components of the mesh
/// geometry (`velx` in 1D, `velx, vely` in 2D, `velx, vely, velz` in 3D)
/// obtained by projecting the radial velocity onto the mesh axes.
pub fn generate(setup: &dyn Setup, mesh: Mesh) -> Result<Checkpoint, error::Error> {
    let geometry = mesh.geometry();
    let num_axes = geometry.num_axes();
    let n = mesh.num_total_zones();

    let mut dens = Vec::with_capacity(n);
    let mut pres = Vec::with_capacity(n);
    let mut entr = Vec::with_capacity(n);
    let mut ye = Vec::with_capacity(n);
    let mut vel = vec![Vec::with_capacity(n); num_axes];

    for ijk in mesh.cells() {
        let c = mesh.cell_center(ijk);
        let r = geometry.spherical_radius(c);
        let p = setup.primitive(r);
        let direction = radial_direction(geometry, c, r);

        dens.push(p.dens);
        pres.push(p.pres);
        entr.push(p.entr);
        ye.push(p.ye);
        for (v, d) in vel.iter_mut().zip(direction) {
            v.push(p.radial_velocity * d);
        }
    }

    let mut chkpt = Checkpoint::new(mesh, 0.0);
    chkpt.parameters = setup.model_parameter_string();
    chkpt.add_variable("dens", "g/cm**3", dens)?;
    for (name, v) in ["velx", "vely", "velz"].iter().zip(vel) {
        chkpt.add_variable(name, "cm/s", v)?;
    }
    chkpt.add_variable("pres", "erg/cm**3", pres)?;
    chkpt.add_variable("entr", "", entr)?;
    chkpt.add_variable("ye", "", ye)?;
    Ok(chkpt)
}

/// Components of the unit radial vector along the mesh axes, at a point given
/// in mesh coordinates a distance `r` from the origin. Zero at the origin.
fn radial_direction(geometry: Geometry, c: [f64; 3], r: f64) -> [f64; 3] {
    if r == 0.0 {
        return [0.0; 3];
    }
    match geometry {
        Geometry::Spherical => [1.0, 0.0, 0.0],
        Geometry::Cylindrical => [c[0] / r, c[1] / r, 0.0],
        Geometry::Cartesian => [c[0] / r, c[1] / r, c[2] / r],
    }
}

/// A uniform medium at rest.
pub struct Uniform {
    pub dens: f64,
    pub pres: f64,
    pub entr: f64,
    pub ye: f64,
    form: kind_config::Form,
}

impl FromStr for Uniform {
    type Err = error::Error;

    fn from_str(parameters: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let form = kind_config::Form::new()
            .item("dens", 1.0, "mass density (g/cm^3)")
            .item("pres", 1.0, "gas pressure (erg/cm^3)")
            .item("entr", 1.0, "specific entropy (kB/by)")
            .item("ye",   0.5, "electron fraction")
            .merge_string_args_allowing_duplicates(parameters.split(':').filter(|s| !s.is_empty()))
            .map_err(|e| InvalidSetup(format!("{}", e)))?;

        let setup = Self {
            dens: form.get("dens").into(),
            pres: form.get("pres").into(),
            entr: form.get("entr").into(),
            ye: form.get("ye").into(),
            form,
        };
        if setup.dens <= 0.0 || setup.pres <= 0.0 {
            return Err(InvalidSetup("dens and pres must be positive".into()));
        }
        Ok(setup)
    }
}

impl Setup for Uniform {
    fn primitive(&self, _r: f64) -> Primitive {
        Primitive {
            dens: self.dens,
            radial_velocity: 0.0,
            pres: self.pres,
            entr: self.entr,
            ye: self.ye,
        }
    }

    fn form(&self) -> &kind_config::Form {
        &self.form
    }
}

/// A collapsing stellar core.
///
/// The density has a flat core of radius `core_radius` and falls off as a
/// power law `r^-index` outside it. Gas falls inward with a speed that rises
/// linearly through the core and approaches `infall_speed` outside it. The
/// pressure follows a polytrope through the central density and pressure,
/// and the entropy and electron fraction rise from their central to their
/// outer values across the core.
pub struct Collapse {
    pub central_density: f64,
    pub central_pressure: f64,
    pub core_radius: f64,
    pub index: f64,
    pub infall_speed: f64,
    pub gamma_law_index: f64,
    pub entr_center: f64,
    pub entr_outer: f64,
    pub ye_center: f64,
    pub ye_outer: f64,
    form: kind_config::Form,
}

impl FromStr for Collapse {
    type Err = error::Error;

    fn from_str(parameters: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let form = kind_config::Form::new()
            .item("central_density",  1e10,      "core density (g/cm^3)")
            .item("central_pressure", 1e28,      "core pressure (erg/cm^3)")
            .item("core_radius",      1e7,       "radius of the flat core (cm)")
            .item("index",            2.0,       "power-law index of the envelope density")
            .item("infall_speed",     1e8,       "asymptotic infall speed (cm/s)")
            .item("gamma_law_index",  4.0 / 3.0, "polytropic index of the pressure")
            .item("entr_center",      1.0,       "central entropy (kB/by)")
            .item("entr_outer",       6.0,       "envelope entropy (kB/by)")
            .item("ye_center",        0.42,      "central electron fraction")
            .item("ye_outer",         0.5,       "envelope electron fraction")
            .merge_string_args_allowing_duplicates(parameters.split(':').filter(|s| !s.is_empty()))
            .map_err(|e| InvalidSetup(format!("{}", e)))?;

        let setup = Self {
            central_density: form.get("central_density").into(),
            central_pressure: form.get("central_pressure").into(),
            core_radius: form.get("core_radius").into(),
            index: form.get("index").into(),
            infall_speed: form.get("infall_speed").into(),
            gamma_law_index: form.get("gamma_law_index").into(),
            entr_center: form.get("entr_center").into(),
            entr_outer: form.get("entr_outer").into(),
            ye_center: form.get("ye_center").into(),
            ye_outer: form.get("ye_outer").into(),
            form,
        };
        if setup.central_density <= 0.0 || setup.central_pressure <= 0.0 {
            return Err(InvalidSetup("central density and pressure must be positive".into()));
        }
        if setup.core_radius <= 0.0 {
            return Err(InvalidSetup("core_radius must be positive".into()));
        }
        Ok(setup)
    }
}

impl Setup for Collapse {
    fn primitive(&self, r: f64) -> Primitive {
        let x = r / self.core_radius;
        let s = x * x / (1.0 + x * x);
        let dens = self.central_density * (1.0 + x * x).powf(-0.5 * self.index);
        Primitive {
            dens,
            radial_velocity: -self.infall_speed * x / (1.0 + x * x).sqrt(),
            pres: self.central_pressure * (dens / self.central_density).powf(self.gamma_law_index),
            entr: self.entr_center + (self.entr_outer - self.entr_center) * s,
            ye: self.ye_center + (self.ye_outer - self.ye_center) * s,
        }
    }

    fn form(&self) -> &kind_config::Form {
        &self.form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn unknown_setup_lists_the_known_ones() {
        match make_setup("sedov", "") {
            Err(PrintUserInformation(message)) => {
                assert!(message.contains("collapse"));
                assert!(message.contains("uniform"));
            }
            _ => panic!("expected a list of setups"),
        }
    }

    #[test]
    fn parameters_override_defaults() {
        let setup = Uniform::from_str("dens=3.5:ye=0.4").unwrap();
        assert_eq!(setup.dens, 3.5);
        assert_eq!(setup.pres, 1.0);
        assert_eq!(setup.ye, 0.4);
    }

    #[test]
    fn bad_parameters_are_invalid_setups() {
        assert!(matches!(Uniform::from_str("mass=1"), Err(InvalidSetup(_))));
        assert!(matches!(Uniform::from_str("dens=heavy"), Err(InvalidSetup(_))));
        assert!(matches!(Uniform::from_str("dens=-1"), Err(InvalidSetup(_))));
        assert!(matches!(Collapse::from_str("core_radius=0"), Err(InvalidSetup(_))));
    }

    #[test]
    fn parameter_string_lists_every_parameter() {
        let setup = Uniform::from_str("dens=3.5").unwrap();
        let string = setup.model_parameter_string();
        let mut keys: Vec<_> = string
            .split(':')
            .map(|item| item.split('=').next().unwrap())
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["dens", "entr", "pres", "ye"]);
        assert!(string.contains("dens=3.5"));
    }

    #[test]
    fn parameter_string_parses_back_to_the_same_model() {
        let setup = make_setup("collapse", "core_radius=2e7:index=3").unwrap();
        let again = make_setup("collapse", &setup.model_parameter_string()).unwrap();
        for r in [0.0, 1e6, 1e7, 3e7, 1e9] {
            assert_eq!(setup.primitive(r), again.primitive(r));
        }
    }

    #[test]
    fn collapse_profile_is_monotone() {
        let setup = Collapse::from_str("").unwrap();
        let center = setup.primitive(0.0);
        assert_eq!(center.dens, setup.central_density);
        assert_eq!(center.radial_velocity, 0.0);
        let mut last = center;
        for k in 1..50 {
            let p = setup.primitive(k as f64 * 1e6);
            assert!(p.dens < last.dens);
            assert!(p.pres < last.pres);
            assert!(p.radial_velocity < last.radial_velocity);
            assert!(p.ye > last.ye);
            last = p;
        }
    }

    #[test]
    fn generated_checkpoint_has_geometry_velocities() {
        let setup = make_setup("collapse", "").unwrap();
        for dim in 1..=3 {
            let mesh = Mesh::for_dimension(dim, 1e8, 8).unwrap();
            let chkpt = generate(setup.as_ref(), mesh).unwrap();
            assert_eq!(chkpt.dimensionality(), dim);
            assert!(chkpt.variable("velx").is_some());
            assert_eq!(chkpt.variable("vely").is_some(), dim >= 2);
            assert_eq!(chkpt.variable("velz").is_some(), dim == 3);
            assert!(chkpt.validate().is_ok());
        }
    }

    #[test]
    fn projected_velocity_recovers_radial_velocity() {
        let setup = make_setup("collapse", "").unwrap();
        let mesh = Mesh::for_dimension(3, 1e8, 4).unwrap();
        let chkpt = generate(setup.as_ref(), mesh).unwrap();
        let vr = chkpt.values("radial_velocity").unwrap();
        let r = chkpt.values("radius").unwrap();
        let vt = chkpt.values("tangential_velocity").unwrap();
        for ((vr, r), vt) in vr.iter().zip(&r).zip(&vt) {
            let expected = setup.primitive(*r).radial_velocity;
            assert!((vr - expected).abs() <= 1e-9 * expected.abs());
            assert!(vt.abs() <= 1e-6 * expected.abs());
        }
    }
}
