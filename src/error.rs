use std::num::ParseFloatError;

/// Errors raised while loading datasets, deriving fields, or building
/// profiles. None of these are transient; they are all returned to the
/// caller as soon as they are detected.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("field {field} has fewer than two distinct sample radii")]
    InsufficientSamples { field: String },

    #[error("unsupported dimensionality {0} (expected 1, 2, or 3)")]
    UnsupportedDimension(usize),

    #[error("no such field: {0}")]
    MissingField(String),

    #[error("invalid radial grid: {0}")]
    InvalidGrid(String),

    #[error("invalid units: {0}")]
    InvalidUnits(String),

    #[error("field registration failed: {0}")]
    FieldRegistration(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("{0}")]
    CommandLineParse(String),

    #[error("invalid setup: {0}")]
    InvalidSetup(String),

    #[error(transparent)]
    ParseFloatError(#[from] ParseFloatError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error("{0}")]
    PrintUserInformation(String),
}
