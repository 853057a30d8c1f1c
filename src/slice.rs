//! Planar slices of checkpoint data, resampled onto a uniform image grid.

use crate::checkpoint::Checkpoint;
use crate::error::Error;
use crate::mesh::Geometry;
use std::str::FromStr;
use tracing::debug;

/// The rule mapping data values to gray levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalingRule {
    Linear,
    Log,
    PowerLaw(f64),
}

impl FromStr for ScalingRule {
    type Err = Error;

    /// Parses one of `linear`, `log`, or `plaw:n`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "log" => Ok(Self::Log),
            _ => match s.strip_prefix("plaw:") {
                Some(index) => Ok(Self::PowerLaw(index.parse()?)),
                None => Err(Error::CommandLineParse(format!(
                    "scaling must be [log|linear|plaw:n], got {}",
                    s
                ))),
            },
        }
    }
}

/// Maps data values to `[0, 1]`. The rule is applied first, and the result
/// is normalized so that `vmin` maps to 0 and `vmax` to 1. For log scaling
/// `vmin` and `vmax` are exponents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaling {
    pub rule: ScalingRule,
    pub vmin: f64,
    pub vmax: f64,
}

impl Scaling {
    pub fn new(rule: ScalingRule, vmin: f64, vmax: f64) -> Result<Self, Error> {
        if !(vmax > vmin) {
            return Err(Error::CommandLineParse(format!(
                "vmax ({}) must exceed vmin ({})",
                vmax, vmin
            )));
        }
        Ok(Self { rule, vmin, vmax })
    }

    pub fn scale(&self, x: f64) -> f64 {
        let y = match self.rule {
            ScalingRule::Linear => x,
            ScalingRule::Log => x.log10(),
            ScalingRule::PowerLaw(index) => x.powf(index),
        };
        (y - self.vmin) / (self.vmax - self.vmin)
    }
}

/// A field sampled at the pixel centers of a uniform image. Rows run from the
/// top of the image (largest vertical coordinate) down. Pixels outside the
/// mesh are NaN.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    extent: [f64; 4],
    data: Vec<f64>,
}

impl FrameBuffer {
    /// Samples `field` on a slice through the origin. Cylindrical data is
    /// sliced in the meridional plane over `[0, rmax] x [-rmax, rmax]`;
    /// spherical and Cartesian data in the `z = 0` plane over
    /// `[-rmax, rmax]^2`. `resolution` is the number of pixels per `rmax`.
    pub fn from_checkpoint(
        chkpt: &Checkpoint,
        field: &str,
        rmax: f64,
        resolution: usize,
    ) -> Result<Self, Error> {
        if !(rmax.is_finite() && rmax > 0.0) || resolution == 0 {
            return Err(Error::InvalidGrid(format!(
                "slice needs positive rmax and resolution, got {} and {}",
                rmax, resolution
            )));
        }
        let geometry = chkpt.mesh.geometry();
        let (extent, width) = match geometry {
            Geometry::Cylindrical => ([0.0, rmax, -rmax, rmax], resolution),
            _ => ([-rmax, rmax, -rmax, rmax], 2 * resolution),
        };
        let height = 2 * resolution;
        let [u0, u1, v0, v1] = extent;
        let du = (u1 - u0) / width as f64;
        let dv = (v1 - v0) / height as f64;

        let mut pixels = Vec::with_capacity(width * height);
        let mut cells = Vec::with_capacity(width * height);
        for row in 0..height {
            let v = v1 - (row as f64 + 0.5) * dv;
            for col in 0..width {
                let u = u0 + (col as f64 + 0.5) * du;
                let point = match geometry {
                    Geometry::Cylindrical => [u, 0.0, v],
                    _ => [u, v, 0.0],
                };
                if let Some(ijk) = chkpt.mesh.locate_point(point) {
                    pixels.push(row * width + col);
                    cells.push(chkpt.mesh.index(ijk));
                }
            }
        }
        debug!(width, height, covered = pixels.len(), field, "slice");

        let mut data = vec![f64::NAN; width * height];
        for (pixel, value) in pixels.iter().zip(chkpt.values_at(field, &cells)?) {
            data[*pixel] = value;
        }
        Ok(Self {
            width,
            height,
            extent,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The image bounds `[u0, u1, v0, v1]` in physical coordinates.
    pub fn extent(&self) -> [f64; 4] {
        self.extent
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// Converts the frame to 8-bit grayscale RGBA. Values are clamped to the
    /// scaled range; pixels outside the mesh, or whose scaled value is not a
    /// number, are transparent.
    pub fn to_rgba(&self, scaling: &Scaling) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(4 * self.data.len());
        for x in &self.data {
            rgba.extend_from_slice(&float_to_rgba(scaling.scale(*x)));
        }
        rgba
    }
}

fn float_to_rgba(x: f64) -> [u8; 4] {
    if x.is_nan() {
        return [0, 0, 0, 0];
    }
    let c = (x.clamp(0.0, 1.0) * 255.0) as u8;
    [c, c, c, 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn checkpoint(dim: usize, rmax: f64, n: usize) -> Checkpoint {
        let mesh = Mesh::for_dimension(dim, rmax, n).unwrap();
        let cells = mesh.num_total_zones();
        let mut chkpt = Checkpoint::new(mesh, 0.0);
        chkpt.add_variable("dens", "g/cm**3", vec![4.0; cells]).unwrap();
        chkpt
    }

    #[test]
    fn scaling_maps_range_to_unit_interval() {
        let s = Scaling::new(ScalingRule::Linear, 2.0, 6.0).unwrap();
        assert_eq!(s.scale(2.0), 0.0);
        assert_eq!(s.scale(4.0), 0.5);
        assert_eq!(s.scale(6.0), 1.0);

        let s = Scaling::new(ScalingRule::Log, 0.0, 2.0).unwrap();
        assert_eq!(s.scale(1.0), 0.0);
        assert_eq!(s.scale(100.0), 1.0);

        let s = Scaling::new(ScalingRule::PowerLaw(0.5), 0.0, 2.0).unwrap();
        assert_eq!(s.scale(4.0), 1.0);
        assert!(Scaling::new(ScalingRule::Linear, 1.0, 1.0).is_err());
    }

    #[test]
    fn scaling_rules_parse() {
        assert_eq!("linear".parse::<ScalingRule>().unwrap(), ScalingRule::Linear);
        assert_eq!("log".parse::<ScalingRule>().unwrap(), ScalingRule::Log);
        assert_eq!("plaw:0.25".parse::<ScalingRule>().unwrap(), ScalingRule::PowerLaw(0.25));
        assert!("plaw:x".parse::<ScalingRule>().is_err());
        assert!("sqrt".parse::<ScalingRule>().is_err());
    }

    #[test]
    fn cylindrical_slice_covers_the_meridional_plane() {
        let chkpt = checkpoint(2, 8.0, 8);
        let frame = FrameBuffer::from_checkpoint(&chkpt, "dens", 8.0, 16).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 32));
        assert_eq!(frame.extent(), [0.0, 8.0, -8.0, 8.0]);
        assert!(frame.data().iter().all(|x| *x == 4.0));
    }

    #[test]
    fn spherical_slice_is_blank_outside_the_star() {
        let chkpt = checkpoint(1, 8.0, 8);
        let frame = FrameBuffer::from_checkpoint(&chkpt, "dens", 8.0, 8).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 16));
        assert!(frame.get(0, 0).is_nan());
        assert_eq!(frame.get(8, 8), 4.0);

        let rgba = frame.to_rgba(&Scaling::new(ScalingRule::Linear, 0.0, 8.0).unwrap());
        assert_eq!(rgba.len(), 16 * 16 * 4);
        assert_eq!(&rgba[..4], &[0, 0, 0, 0]);
        let n = 4 * (8 * 16 + 8);
        assert_eq!(&rgba[n..n + 4], &[127, 127, 127, 255]);
    }

    #[test]
    fn slice_values_follow_the_field() {
        let mesh = Mesh::for_dimension(3, 4.0, 4).unwrap();
        let mut chkpt = Checkpoint::new(mesh, 0.0);
        chkpt.add_variable("dens", "g/cm**3", vec![1.0; 512]).unwrap();
        let frame = FrameBuffer::from_checkpoint(&chkpt, "radius", 4.0, 4).unwrap();
        assert!(frame.data().iter().all(|r| r.is_finite() && *r > 0.0));
        assert!(frame.get(0, 0) > frame.get(3, 3));
    }

    #[test]
    fn values_are_clamped_to_gray_levels() {
        assert_eq!(float_to_rgba(-1.0), [0, 0, 0, 255]);
        assert_eq!(float_to_rgba(2.0), [255, 255, 255, 255]);
        assert_eq!(float_to_rgba(f64::NAN), [0, 0, 0, 0]);
    }
}
