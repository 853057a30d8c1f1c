pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod fields;
pub mod grid;
pub mod interp;
pub mod mesh;
pub mod parse;
pub mod profile;
pub mod setups;
pub mod slice;
pub mod units;

pub use crate::checkpoint::Checkpoint;
pub use crate::dataset::{Dataset, EMPTY_BIN_FILL};
pub use crate::error::Error;
pub use crate::fields::FieldRegistry;
pub use crate::grid::RadialGrid;
pub use crate::mesh::{Geometry, Mesh};
pub use crate::profile::{ProfileSet, ProfileStrategy, RadialProfileBuilder};
pub use crate::setups::Setup;
pub use crate::units::Units;

use git_version::git_version;
use tracing_subscriber::{fmt, EnvFilter};

/// The git revision this crate was built from, or `unknown`.
pub const GIT_VERSION: &str = git_version!(args = ["--always", "--dirty=-modified"], fallback = "unknown");

/// Returns the current version number (should be consistent with Cargo
/// meta-data).
pub fn ccsn_version() -> String {
    format!("ccsn version {} ({})", env!("CARGO_PKG_VERSION"), GIT_VERSION)
}

/// Initializes logging to stderr. The filter defaults to `info` and can be
/// overridden with `RUST_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
