use curve_fit_gui::{FitDataError, MetaValues, SolverError};

pub(crate) mod exponential;
pub(crate) mod multi_key;
pub(crate) mod polynomial;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("meta value {0:?} must be a positive integer")]
    InvalidMeta(&'static str),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Data(#[from] FitDataError),
}

pub(crate) fn positive_integer(meta: &MetaValues, name: &'static str) -> Result<usize, DemoError> {
    match meta.number(name) {
        Some(x) if x >= 1.0 && x.fract() == 0.0 => Ok(x as usize),
        _ => Err(DemoError::InvalidMeta(name)),
    }
}
