use anyhow::{Context, Result};
use ccsn::parse::{last_in_dir_ending_with, parent_dir, parse_field_list};
use ccsn::{setups, Checkpoint, Dataset, Error, Mesh, RadialProfileBuilder};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Parser)]
#[clap(version, about = "Radial profiles of core-collapse supernova checkpoints")]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write radial profiles of checkpoint fields as ASCII tables
    Profile(ProfileOpts),
    /// Generate a checkpoint from an analytic model
    Setup(SetupOpts),
    /// List the stored and derived fields of a checkpoint
    Fields(FieldsOpts),
}

#[derive(Args)]
struct ProfileOpts {
    /// Checkpoint files, or directories to take the last checkpoint from
    #[clap(required = true)]
    paths: Vec<String>,

    /// Comma-separated list of fields to profile
    #[clap(long, short = 'v', default_value = "dens")]
    fields: String,

    /// Radial bin width (cm)
    #[clap(long, default_value = "1e5")]
    spacing: f64,

    /// Outer radius of the profile (cm)
    #[clap(long, default_value = "5e7")]
    rmax: f64,

    /// Dimensionality of the data [default: from the mesh shape]
    #[clap(long)]
    dim: Option<usize>,

    /// Directory to write profiles to [default: next to each checkpoint]
    #[clap(long)]
    outdir: Option<String>,

    /// Write the raw samples along a ray instead of the resampled profile
    #[clap(long)]
    raw: bool,
}

#[derive(Args)]
struct SetupOpts {
    /// Name of the model setup
    name: String,

    /// Model parameters, as key=value:key=value
    #[clap(default_value = "")]
    parameters: String,

    /// Dimensionality of the mesh
    #[clap(long, default_value = "1")]
    dim: usize,

    /// Number of zones per rmax
    #[clap(long, short = 'n', default_value = "256")]
    resolution: usize,

    /// Outer radius of the mesh (cm)
    #[clap(long, default_value = "1e9")]
    rmax: f64,

    /// Output file [default: <name>.ccsn]
    #[clap(long, short = 'o')]
    output: Option<String>,
}

#[derive(Args)]
struct FieldsOpts {
    /// Checkpoint file to inspect
    path: String,
}

/// Resolves a command line path to a checkpoint file: directories are
/// searched for their last `.ccsn` file.
fn checkpoint_path(path: &str) -> Result<String> {
    if Path::new(path).is_dir() {
        last_in_dir_ending_with(path, ".ccsn")
            .with_context(|| format!("no checkpoint files in directory {}", path))
    } else {
        Ok(path.to_owned())
    }
}

fn output_path(checkpoint: &str, outdir: Option<&str>, suffix: &str) -> String {
    let stem = Path::new(checkpoint)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("profile");
    let dir = outdir.or_else(|| parent_dir(checkpoint)).unwrap_or(".");
    Path::new(dir)
        .join(format!("{}.{}", stem, suffix))
        .to_string_lossy()
        .into_owned()
}

fn create_file(filename: &str) -> Result<BufWriter<File>> {
    if let Some(parent) = Path::new(filename).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(filename).with_context(|| format!("creating {}", filename))?;
    Ok(BufWriter::new(file))
}

/// Writes the samples along a ray from the origin to `rmax`, ordered by
/// radius, one row per sample.
fn write_ray_table<W: Write>(
    chkpt: &Checkpoint,
    rmax: f64,
    fields: &[String],
    mut w: W,
) -> Result<()> {
    let samples = chkpt.ray([0.0; 3], [rmax, 0.0, 0.0], fields)?;
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| samples.t()[a].total_cmp(&samples.t()[b]));

    let columns = fields
        .iter()
        .map(|f| samples.column(f).ok_or_else(|| Error::MissingField(f.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    write!(w, "# {:<14}", "radius")?;
    for field in fields {
        write!(w, " {:<14}", field)?;
    }
    writeln!(w)?;
    for n in order {
        write!(w, "{:+.6e}", samples.t()[n] * rmax)?;
        for column in &columns {
            write!(w, " {:+.6e}", column[n])?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn profile(opts: ProfileOpts) -> Result<()> {
    let fields = parse_field_list(&opts.fields)?;
    let builder = RadialProfileBuilder::build(opts.spacing, opts.rmax)?;

    for path in &opts.paths {
        let filename = checkpoint_path(path)?;
        let chkpt = Checkpoint::from_file(&filename)?;
        let dim = opts.dim.unwrap_or_else(|| chkpt.dimensionality());

        if opts.raw {
            let output = output_path(&filename, opts.outdir.as_deref(), "ray.dat");
            write_ray_table(&chkpt, opts.rmax, &fields, create_file(&output)?)?;
            info!("write {}", output);
        } else {
            let profiles = builder.profile(&chkpt, dim, &fields)?;
            let output = output_path(&filename, opts.outdir.as_deref(), "profile.dat");
            profiles.write_table(create_file(&output)?)?;
            info!("write {}", output);
        }
    }
    Ok(())
}

fn setup(opts: SetupOpts) -> Result<()> {
    let setup = setups::make_setup(&opts.name, &opts.parameters)?;
    setup.print_parameters();

    let mesh = Mesh::for_dimension(opts.dim, opts.rmax, opts.resolution)?;
    info!(
        "mesh has {} zones over {:?}",
        mesh.num_total_zones(),
        mesh.geometry().axis_names()
    );
    let mut chkpt = setups::generate(setup.as_ref(), mesh)?;
    chkpt.setup_name = opts.name.clone();

    let output = opts.output.unwrap_or_else(|| format!("{}.ccsn", opts.name));
    chkpt.write_file(&output)?;
    Ok(())
}

fn fields(opts: FieldsOpts) -> Result<()> {
    let chkpt = Checkpoint::from_file(&checkpoint_path(&opts.path)?)?;
    let mesh = &chkpt.mesh;
    println!(
        "{:?} mesh, shape {:?}, dimensionality {}, time {}",
        mesh.geometry(),
        &mesh.shape()[..mesh.geometry().num_axes()],
        chkpt.dimensionality(),
        chkpt.time
    );
    if !chkpt.setup_name.is_empty() {
        println!("setup {} {}", chkpt.setup_name, chkpt.parameters);
    }
    for v in chkpt.variables() {
        println!("{:.<24} [{}] stored", v.name, chkpt.field_units(&v.name)?);
    }
    for f in chkpt.registry()?.fields() {
        println!("{:.<24} [{}] derived", f.name(), f.units());
    }
    Ok(())
}

fn run(opts: Opts) -> Result<()> {
    match opts.command {
        Command::Profile(opts) => profile(opts),
        Command::Setup(opts) => setup(opts),
        Command::Fields(opts) => fields(opts),
    }
}

fn main() -> Result<()> {
    ccsn::init_logging();
    let opts = Opts::parse();
    info!("{}", ccsn::ccsn_version());

    match run(opts) {
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::PrintUserInformation(message)) => {
                print!("{}", message);
                Ok(())
            }
            _ => Err(e),
        },
        result => result,
    }
}
