use anyhow::Result;
use ccsn::slice::{FrameBuffer, Scaling, ScalingRule};
use ccsn::Checkpoint;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

struct Process {
    first_call: bool,
}

impl Process {
    fn new() -> Self {
        Self { first_call: true }
    }
}

fn sorted_field(chkpt: &Checkpoint, field: &str) -> Result<Vec<f64>> {
    let mut data = chkpt.values(field)?;
    if data.iter().any(|x| !x.is_finite()) {
        anyhow::bail!("field {} contains nan or inf", field)
    }
    if data.is_empty() {
        anyhow::bail!("field {} is empty", field)
    }
    data.sort_by(f64::total_cmp);
    Ok(data)
}

fn print_quantiles(filename: &str, field: &str) -> Result<()> {
    let chkpt = Checkpoint::from_file(filename)?;
    let data = sorted_field(&chkpt, field)?;
    let last = data.len() - 1;
    println!("quantiles of {} for {}:", field, filename);
    println!("    max                {:+.03e}", data[last]);
    for x in (1..5).rev() {
        let y = libm::erf(x as f64 / f64::sqrt(2.0));
        let i = ((data.len() as f64 * y).floor() as usize).min(last);
        println!("    +{} sigma ({:>6.3}%) {:+.03e}", x, y * 100.0, data[i]);
    }
    for x in 1..5 {
        let y = 1.0 - libm::erf(x as f64 / f64::sqrt(2.0));
        let i = ((data.len() as f64 * y).ceil() as usize).min(last);
        println!("    -{} sigma ({:>6.3}%) {:+.03e}", x, y * 100.0, data[i]);
    }
    println!("    min                {:+.03e}", data[0]);
    Ok(())
}

fn make_image(
    filename: &str,
    field: &str,
    rmax: Option<f64>,
    resolution: usize,
    scaling: &Scaling,
    process: &mut Process,
) -> Result<()> {
    let chkpt = Checkpoint::from_file(filename)?;
    let rmax = match rmax {
        Some(rmax) => rmax,
        None => chkpt
            .mesh
            .faces(0)
            .last()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("mesh has no faces"))?,
    };
    let frame = FrameBuffer::from_checkpoint(&chkpt, field, rmax, resolution)?;

    if process.first_call {
        info!("mesh shape is {:?}", chkpt.mesh.shape());
        info!("geometry is {:?}", chkpt.mesh.geometry());
        info!("image shape is [{}, {}]", frame.width(), frame.height());
        info!("image extent is {:?}", frame.extent());
    }
    let rgba_data = frame.to_rgba(scaling);

    let png_name = Path::new(filename)
        .with_extension(format!("{}.png", field))
        .to_string_lossy()
        .into_owned();
    let file = File::create(&png_name)?;
    let w = BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, frame.width() as u32, frame.height() as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    info!("write {}", png_name);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba_data)?;

    process.first_call = false;
    Ok(())
}

#[derive(Parser)]
#[clap(version, about = "Slice images of ccsn checkpoints")]
struct Opts {
    /// Location to read checkpoint files from
    #[clap(required = true)]
    paths: Vec<String>,

    /// The field to read
    #[clap(long, short, default_value = "dens")]
    field: String,

    /// Half-width of the image (cm) [default: the mesh outer radius]
    #[clap(long)]
    rmax: Option<f64>,

    /// Number of pixels per rmax
    #[clap(long, short = 'n', default_value = "256")]
    resolution: usize,

    /// Just print the data quantiles and exit
    #[clap(long, short = 'q')]
    show_quantiles: bool,

    /// Scaling rule: [log|linear|plaw:n]
    #[clap(long, short, default_value = "linear")]
    scaling: String,

    /// The minimum data value (an exponent for log scaling)
    #[clap(long, default_value = "0.0")]
    vmin: f64,

    /// The maximum data value (an exponent for log scaling)
    #[clap(long, default_value = "1.0")]
    vmax: f64,
}

fn main() -> Result<()> {
    ccsn::init_logging();
    let opts: Opts = Opts::parse();
    let rule: ScalingRule = opts.scaling.parse()?;
    let scaling = Scaling::new(rule, opts.vmin, opts.vmax)?;

    let mut process = Process::new();

    for filename in &opts.paths {
        if opts.show_quantiles {
            print_quantiles(filename, &opts.field)?;
        } else {
            make_image(
                filename,
                &opts.field,
                opts.rmax,
                opts.resolution,
                &scaling,
                &mut process,
            )?;
        }
    }
    Ok(())
}
