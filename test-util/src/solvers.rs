use curve_fit_gui::{
    CurveFitAlgorithm, CurveFitResult, CurveFitTrait, FitData, FitModel, ParameterSet,
    SolverError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Solver counting its invocations, clones share the counter
#[derive(Clone, Debug, Default)]
pub struct CountingFitter {
    inner: CurveFitAlgorithm,
    calls: Arc<AtomicUsize>,
}

impl CountingFitter {
    pub fn new(inner: impl Into<CurveFitAlgorithm>) -> Self {
        Self {
            inner: inner.into(),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CurveFitTrait for CountingFitter {
    fn curve_fit(
        &self,
        data: &FitData,
        model: &FitModel,
        prior: &ParameterSet,
    ) -> Result<CurveFitResult, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.curve_fit(data, model, prior)
    }
}

/// Solver always failing with the given error
#[derive(Clone, Debug)]
pub struct FailingFitter(pub SolverError);

impl CurveFitTrait for FailingFitter {
    fn curve_fit(
        &self,
        _data: &FitData,
        _model: &FitModel,
        _prior: &ParameterSet,
    ) -> Result<CurveFitResult, SolverError> {
        Err(self.0.clone())
    }
}
