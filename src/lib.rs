#![doc = include_str!("../README.md")]

mod classify;
pub use classify::{ChangeKind, FormSnapshot, classify};

pub mod codec;
pub use codec::{FlatForm, FlatFormEntry, MetaConfig, MetaDeclaration, MetaValue, MetaValues};

mod config;
pub use config::GuiConfig;

mod error;
pub use error::{
    ConfigMismatchError, DecodeError, FitDataError, FitError, GuiError, SetupError, SolverError,
    ValidationError,
};

mod estimate;
pub use estimate::ScalarEstimate;

mod event;
pub use event::{FieldId, FormEvent, FormValue};

pub mod export;
pub use export::{ExportedPrior, export_json};

pub mod fit;
pub use fit::{
    CurveFitAlgorithm, CurveFitResult, CurveFitTrait, FitData, FitMetrics, FitModel, FitResult,
    LmCurveFit, Shaped,
};

pub mod layout;
pub use layout::DashboardLayout;

pub mod logging;

mod parameters;
pub use parameters::{ParameterPoint, ParameterSet, ParameterValue, PointValue};

pub mod plot;
pub use plot::{Figure, PlotParameters, PlotRegistry};

mod recompute;
pub use recompute::{BoxError, FitFactory, FitRecomputer, RecomputeCounts};

mod session;
pub use session::{EventResponse, FitGuiSession, MetaValidator};

pub mod validation;

pub use ndarray;
