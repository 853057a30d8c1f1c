use crate::error::Error;

/// Coordinate system of a simulation mesh. The number of mesh axes is fixed
/// by the geometry: `Spherical` is `(r)`, `Cylindrical` is `(r, z)`, and
/// `Cartesian` is `(x, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Geometry {
    Spherical,
    Cylindrical,
    Cartesian,
}

impl Geometry {
    pub fn num_axes(&self) -> usize {
        match self {
            Self::Spherical => 1,
            Self::Cylindrical => 2,
            Self::Cartesian => 3,
        }
    }

    pub fn axis_names(&self) -> &'static [&'static str] {
        match self {
            Self::Spherical => &["r"],
            Self::Cylindrical => &["r", "z"],
            Self::Cartesian => &["x", "y", "z"],
        }
    }

    /// Returns the geometry conventionally used for data of the given
    /// dimensionality.
    pub fn for_dimension(dim: usize) -> Result<Self, Error> {
        match dim {
            1 => Ok(Self::Spherical),
            2 => Ok(Self::Cylindrical),
            3 => Ok(Self::Cartesian),
            _ => Err(Error::UnsupportedDimension(dim)),
        }
    }

    /// Maps a point in 3D Cartesian space to this geometry's mesh
    /// coordinates. Unused trailing components are zero.
    pub fn mesh_coordinates(&self, p: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = p;
        match self {
            Self::Spherical => [(x * x + y * y + z * z).sqrt(), 0.0, 0.0],
            Self::Cylindrical => [(x * x + y * y).sqrt(), z, 0.0],
            Self::Cartesian => p,
        }
    }

    /// Distance from the origin of a point given in mesh coordinates.
    pub fn spherical_radius(&self, c: [f64; 3]) -> f64 {
        match self {
            Self::Spherical => c[0].abs(),
            Self::Cylindrical => (c[0] * c[0] + c[1] * c[1]).sqrt(),
            Self::Cartesian => (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt(),
        }
    }
}

/// A rectilinear mesh described by the face positions on each axis. Cells
/// are addressed by `[i, j, k]`, with the index on absent axes always zero,
/// and are stored row-major (last axis fastest).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mesh {
    geometry: Geometry,
    faces: Vec<Vec<f64>>,
}

impl Mesh {
    /// Creates a mesh from face positions. There must be one face list per
    /// geometry axis, each with at least two strictly increasing entries.
    /// Radial faces may not be negative.
    pub fn new(geometry: Geometry, faces: Vec<Vec<f64>>) -> Result<Self, Error> {
        let mesh = Self { geometry, faces };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Creates a mesh with uniformly spaced faces between `lower` and
    /// `upper` on each axis.
    pub fn uniform(
        geometry: Geometry,
        lower: &[f64],
        upper: &[f64],
        shape: &[usize],
    ) -> Result<Self, Error> {
        if lower.len() != geometry.num_axes()
            || upper.len() != geometry.num_axes()
            || shape.len() != geometry.num_axes()
        {
            return Err(Error::InvalidCheckpoint(format!(
                "{:?} mesh needs {} axes",
                geometry,
                geometry.num_axes()
            )));
        }
        let faces = (0..geometry.num_axes())
            .map(|a| {
                let n = shape[a];
                let dx = (upper[a] - lower[a]) / n as f64;
                (0..=n).map(|i| lower[a] + i as f64 * dx).collect::<Vec<f64>>()
            })
            .collect();
        Self::new(geometry, faces)
    }

    /// Creates the default mesh for data of a given dimensionality, covering
    /// a sphere of radius `rmax` with `resolution` zones along the radius:
    /// spherical shells in 1D, an `(r, z)` half plane in 2D, and a cube in
    /// 3D.
    pub fn for_dimension(dim: usize, rmax: f64, resolution: usize) -> Result<Self, Error> {
        let n = resolution;
        match Geometry::for_dimension(dim)? {
            Geometry::Spherical => Self::uniform(Geometry::Spherical, &[0.0], &[rmax], &[n]),
            Geometry::Cylindrical => Self::uniform(
                Geometry::Cylindrical,
                &[0.0, -rmax],
                &[rmax, rmax],
                &[n, 2 * n],
            ),
            Geometry::Cartesian => Self::uniform(
                Geometry::Cartesian,
                &[-rmax, -rmax, -rmax],
                &[rmax, rmax, rmax],
                &[2 * n, 2 * n, 2 * n],
            ),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.faces.len() != self.geometry.num_axes() {
            return Err(Error::InvalidCheckpoint(format!(
                "{:?} mesh has {} face lists, expected {}",
                self.geometry,
                self.faces.len(),
                self.geometry.num_axes()
            )));
        }
        for (axis, faces) in self.faces.iter().enumerate() {
            if faces.len() < 2 {
                return Err(Error::InvalidCheckpoint(format!(
                    "axis {} has no zones",
                    axis
                )));
            }
            if faces.iter().any(|f| !f.is_finite()) {
                return Err(Error::InvalidCheckpoint(format!(
                    "axis {} has non-finite faces",
                    axis
                )));
            }
            if faces.windows(2).any(|w| w[1] <= w[0]) {
                return Err(Error::InvalidCheckpoint(format!(
                    "faces on axis {} must increase monotonically",
                    axis
                )));
            }
        }
        let radial = matches!(self.geometry, Geometry::Spherical | Geometry::Cylindrical);
        if radial && self.faces[0][0] < 0.0 {
            return Err(Error::InvalidCheckpoint("radial faces must be non-negative".into()));
        }
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn faces(&self, axis: usize) -> &[f64] {
        &self.faces[axis]
    }

    /// Number of zones on each axis, padded with 1 for absent axes.
    pub fn shape(&self) -> [usize; 3] {
        let mut shape = [1; 3];
        for (s, f) in shape.iter_mut().zip(&self.faces) {
            *s = f.len() - 1;
        }
        shape
    }

    /// Dimensionality inferred from the domain shape: one zone on the
    /// second and third axes is 1D, one zone on the third axis only is 2D,
    /// anything else is 3D.
    pub fn dimensionality(&self) -> usize {
        match self.shape() {
            [_, 1, 1] => 1,
            [_, _, 1] => 2,
            _ => 3,
        }
    }

    pub fn num_total_zones(&self) -> usize {
        self.shape().iter().product()
    }

    /// Returns the flat storage index of a cell.
    pub fn index(&self, [i, j, k]: [usize; 3]) -> usize {
        let [_, nj, nk] = self.shape();
        (i * nj + j) * nk + k
    }

    /// Returns the `[i, j, k]` index of a flat storage index.
    pub fn unravel(&self, n: usize) -> [usize; 3] {
        let [_, nj, nk] = self.shape();
        [n / (nj * nk), (n / nk) % nj, n % nk]
    }

    /// Iterates over all cell indexes in storage order.
    pub fn cells(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (0..self.num_total_zones()).map(move |n| self.unravel(n))
    }

    /// Returns the cell-center coordinates, with zero on absent axes.
    pub fn cell_center(&self, ijk: [usize; 3]) -> [f64; 3] {
        let mut c = [0.0; 3];
        for (a, faces) in self.faces.iter().enumerate() {
            c[a] = 0.5 * (faces[ijk[a]] + faces[ijk[a] + 1]);
        }
        c
    }

    /// Returns the cell widths, with zero on absent axes.
    pub fn cell_width(&self, ijk: [usize; 3]) -> [f64; 3] {
        let mut w = [0.0; 3];
        for (a, faces) in self.faces.iter().enumerate() {
            w[a] = faces[ijk[a] + 1] - faces[ijk[a]];
        }
        w
    }

    /// Finds the cell containing a point given in mesh coordinates. Points
    /// on the upper domain edge belong to the last cell; points outside the
    /// domain return `None`.
    pub fn locate(&self, c: [f64; 3]) -> Option<[usize; 3]> {
        let mut ijk = [0; 3];
        for (a, faces) in self.faces.iter().enumerate() {
            ijk[a] = locate_on_axis(faces, c[a])?;
        }
        Some(ijk)
    }

    /// Finds the cell containing a point in 3D Cartesian space.
    pub fn locate_point(&self, p: [f64; 3]) -> Option<[usize; 3]> {
        self.locate(self.geometry.mesh_coordinates(p))
    }

    /// Splits the segment `start -> end` at every crossing of a cell face.
    /// Returns `(t, cell)` pairs where `t` is the parametric midpoint of a
    /// sub-segment lying inside the mesh, in increasing order.
    pub fn ray_segments(&self, start: [f64; 3], end: [f64; 3]) -> Vec<(f64, [usize; 3])> {
        let d = [end[0] - start[0], end[1] - start[1], end[2] - start[2]];
        let mut ts = vec![0.0, 1.0];

        match self.geometry {
            Geometry::Cartesian => {
                for a in 0..3 {
                    planar_crossings(&self.faces[a], start[a], d[a], &mut ts);
                }
            }
            Geometry::Cylindrical => {
                let qa = d[0] * d[0] + d[1] * d[1];
                let qb = 2.0 * (start[0] * d[0] + start[1] * d[1]);
                let qc = start[0] * start[0] + start[1] * start[1];
                radial_crossings(&self.faces[0], qa, qb, qc, &mut ts);
                planar_crossings(&self.faces[1], start[2], d[2], &mut ts);
            }
            Geometry::Spherical => {
                let qa = dot(d, d);
                let qb = 2.0 * dot(start, d);
                let qc = dot(start, start);
                radial_crossings(&self.faces[0], qa, qb, qc, &mut ts);
            }
        }
        ts.sort_by(f64::total_cmp);
        ts.dedup_by(|b, a| (*b - *a).abs() <= 1e-14);

        ts.windows(2)
            .filter_map(|w| {
                let t = 0.5 * (w[0] + w[1]);
                let p = [
                    start[0] + t * d[0],
                    start[1] + t * d[1],
                    start[2] + t * d[2],
                ];
                self.locate_point(p).map(|cell| (t, cell))
            })
            .collect()
    }

    /// Returns the storage indexes of cells whose centers lie within
    /// `radius` of `center`, the distance being measured in mesh
    /// coordinates after mapping `center` into them.
    pub fn cells_within(&self, center: [f64; 3], radius: f64) -> Vec<usize> {
        let c0 = self.geometry.mesh_coordinates(center);
        let naxes = self.geometry.num_axes();
        self.cells()
            .enumerate()
            .filter(|(_, ijk)| {
                let c = self.cell_center(*ijk);
                let r2: f64 = (0..naxes).map(|a| (c[a] - c0[a]).powi(2)).sum();
                r2 <= radius * radius
            })
            .map(|(n, _)| n)
            .collect()
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn locate_on_axis(faces: &[f64], x: f64) -> Option<usize> {
    let n = faces.len() - 1;
    if !(x >= faces[0] && x <= faces[n]) {
        return None;
    }
    match faces.binary_search_by(|f| f.total_cmp(&x)) {
        Ok(i) => Some(i.min(n - 1)),
        Err(i) => Some(i - 1),
    }
}

fn planar_crossings(faces: &[f64], x0: f64, dx: f64, ts: &mut Vec<f64>) {
    if dx == 0.0 {
        return;
    }
    ts.extend(
        faces
            .iter()
            .map(|f| (f - x0) / dx)
            .filter(|t| *t > 0.0 && *t < 1.0),
    );
}

/// Parameters `t` where `qa t^2 + qb t + qc = f^2` for each face `f`.
fn radial_crossings(faces: &[f64], qa: f64, qb: f64, qc: f64, ts: &mut Vec<f64>) {
    if qa == 0.0 {
        return;
    }
    for f in faces {
        let disc = qb * qb - 4.0 * qa * (qc - f * f);
        if disc < 0.0 {
            continue;
        }
        let s = disc.sqrt();
        for t in [(-qb - s) / (2.0 * qa), (-qb + s) / (2.0 * qa)] {
            if t > 0.0 && t < 1.0 {
                ts.push(t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensionality_follows_domain_shape() {
        let m1 = Mesh::for_dimension(1, 1.0, 8).unwrap();
        let m2 = Mesh::for_dimension(2, 1.0, 8).unwrap();
        let m3 = Mesh::for_dimension(3, 1.0, 4).unwrap();
        assert_eq!(m1.dimensionality(), 1);
        assert_eq!(m2.dimensionality(), 2);
        assert_eq!(m3.dimensionality(), 3);
        assert_eq!(m2.shape(), [8, 16, 1]);
        assert!(Mesh::for_dimension(4, 1.0, 8).is_err());
    }

    #[test]
    fn invalid_faces_are_rejected() {
        assert!(Mesh::new(Geometry::Spherical, vec![vec![0.0]]).is_err());
        assert!(Mesh::new(Geometry::Spherical, vec![vec![0.0, 1.0, 1.0]]).is_err());
        assert!(Mesh::new(Geometry::Spherical, vec![vec![-1.0, 1.0]]).is_err());
        assert!(Mesh::new(Geometry::Cylindrical, vec![vec![0.0, 1.0]]).is_err());
    }

    #[test]
    fn index_and_unravel_agree() {
        let mesh = Mesh::uniform(Geometry::Cartesian, &[0.0; 3], &[1.0; 3], &[2, 3, 4]).unwrap();
        for (n, ijk) in mesh.cells().enumerate() {
            assert_eq!(mesh.index(ijk), n);
        }
        assert_eq!(mesh.unravel(23), [1, 2, 3]);
    }

    #[test]
    fn locate_finds_containing_cell() {
        let mesh = Mesh::for_dimension(1, 4.0, 4).unwrap();
        assert_eq!(mesh.locate([0.5, 0.0, 0.0]), Some([0, 0, 0]));
        assert_eq!(mesh.locate([1.0, 0.0, 0.0]), Some([1, 0, 0]));
        assert_eq!(mesh.locate([4.0, 0.0, 0.0]), Some([3, 0, 0]));
        assert_eq!(mesh.locate([4.5, 0.0, 0.0]), None);
    }

    #[test]
    fn ray_through_spherical_shells_visits_each_shell_once() {
        let mesh = Mesh::for_dimension(1, 10.0, 10).unwrap();
        let segments = mesh.ray_segments([0.0; 3], [10.0, 0.0, 0.0]);
        assert_eq!(segments.len(), 10);
        for (n, (t, cell)) in segments.iter().enumerate() {
            assert_eq!(cell[0], n);
            assert!((t * 10.0 - (n as f64 + 0.5)).abs() < 1e-12);
        }
    }

    #[test]
    fn ray_through_cylindrical_mesh_crosses_radial_and_axial_faces() {
        let mesh = Mesh::uniform(Geometry::Cylindrical, &[0.0, -2.0], &[2.0, 2.0], &[2, 4]).unwrap();
        let segments = mesh.ray_segments([0.0, 0.0, -2.0], [0.0, 0.0, 2.0]);
        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(|(_, c)| c[0] == 0));
        let segments = mesh.ray_segments([0.0, 0.0, 0.5], [2.0, 0.0, 0.5]);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].1, [1, 2, 0]);
    }

    #[test]
    fn ray_leaving_the_mesh_is_truncated() {
        let mesh = Mesh::uniform(Geometry::Cartesian, &[0.0; 3], &[1.0; 3], &[4, 4, 4]).unwrap();
        let segments = mesh.ray_segments([0.1, 0.1, 0.1], [2.1, 0.1, 0.1]);
        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(|(t, _)| *t < 0.5));
    }

    #[test]
    fn cells_within_selects_by_center_distance() {
        let mesh = Mesh::for_dimension(1, 10.0, 10).unwrap();
        assert_eq!(mesh.cells_within([0.0; 3], 5.0), vec![0, 1, 2, 3, 4]);
        let mesh = Mesh::for_dimension(3, 1.0, 2).unwrap();
        assert_eq!(mesh.cells_within([0.0; 3], 0.5).len(), 8);
    }
}
