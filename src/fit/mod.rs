//! Fit records and the least-squares machinery behind them.

pub mod data;
pub use data::{FitData, Shaped};

pub mod model;
pub use model::{FitModel, ModelFn};

pub mod result;
pub use result::FitResult;

pub mod solver;
pub use solver::{CurveFitAlgorithm, CurveFitResult, CurveFitTrait, FitMetrics, LmCurveFit};
