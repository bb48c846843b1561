/// Error returned when a flat form cannot be mapped back onto a [crate::ParameterSet]
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum DecodeError {
    #[error("form field {0:?} is missing")]
    MissingField(String),

    #[error("parameter {0:?} has no form fields")]
    MissingParameter(String),

    #[error("form field {field:?} has non-numeric value {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("received {ids} parameter identifiers but {values} values")]
    LengthMismatch { ids: usize, values: usize },

    #[error("form field {0:?} is given more than once")]
    DuplicateField(String),

    #[error("form fields of {field:?} do not describe a valid estimate: {source}")]
    InvalidEstimate {
        field: String,
        source: ValidationError,
    },
}

/// Error returned when meta declarations and meta values disagree
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ConfigMismatchError {
    #[error("improperly configured: received {0} meta values but no meta config")]
    ValuesWithoutConfig(usize),

    #[error("improperly configured: received {0} meta config declarations but no values")]
    ConfigWithoutValues(usize),

    #[error(
        "improperly configured: meta config has {declarations} declarations but {values} values were received"
    )]
    LengthMismatch { declarations: usize, values: usize },
}

/// Error returned by [crate::validation] guards
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("standard deviations must be larger than zero, {field:?} is {sdev}")]
    NonPositiveUncertainty { field: String, sdev: f64 },

    #[error("{field:?} must be finite, got {value}")]
    NonFiniteValue { field: String, value: f64 },

    #[error(
        "prior contains correlations, {first:?} and {second:?} have correlation coefficient {correlation}"
    )]
    CorrelatedPriorUnsupported {
        first: String,
        second: String,
        correlation: f64,
    },

    #[error("meta value {name:?} = {value} is outside of [{min}, {max}]")]
    MetaOutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("meta value {name:?} = {value:?} is not one of {options:?}")]
    MetaNotAnOption {
        name: String,
        value: String,
        options: Vec<String>,
    },

    #[error("meta value {name:?} has type {actual}, {expected} is expected")]
    MetaWrongType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("meta values rejected: {0}")]
    MetaRejected(String),
}

/// Error returned by a [crate::CurveFitTrait] implementation
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum SolverError {
    #[error("model returned {actual} values but data has {expected} points")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("model output keys {actual:?} do not match data keys {expected:?}")]
    KeysMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("normal equations matrix is singular")]
    SingularMatrix,

    #[error("residuals are not finite at iteration {0}")]
    NonFiniteResidual(usize),

    #[error("fit did not converge after {0} iterations")]
    NotConverged(usize),
}

/// Error returned when fit data are inconsistent
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum FitDataError {
    #[error("x has {x} points but y has {y} points")]
    LengthMismatch { x: usize, y: usize },

    #[error("x is keyed by {x:?} but y is keyed by {y:?}")]
    KeysMismatch { x: Vec<String>, y: Vec<String> },

    #[error("data is empty")]
    Empty,
}

/// Error returned by [crate::FitRecomputer]
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum FitError {
    #[error("fit failed: {0}")]
    FitFailure(#[from] SolverError),

    #[error("fit construction failed: {0}")]
    FitConstructionFailure(String),
}

/// Any error surfaced by [crate::FitGuiSession::handle_event]
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum GuiError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    ConfigMismatch(#[from] ConfigMismatchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Error aborting [crate::FitGuiSession] construction
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum SetupError {
    #[error("encountered errors when setting up the GUI: {0}")]
    InitialFit(#[from] FitError),

    #[error("initial fit is not supported: {0}")]
    InvalidInitialFit(#[from] ValidationError),

    #[error("initial meta values do not match meta config: {0}")]
    MetaConfig(#[from] ConfigMismatchError),

    #[error("initial meta values lack {0:?} declared in meta config")]
    MissingMetaDefault(String),
}
