use crate::codec::meta::MetaValues;
use crate::error::FitError;
use crate::fit::result::FitResult;
use crate::fit::solver::CurveFitTrait;
use crate::parameters::ParameterSet;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Error type fit factories may return
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied construction of a complete fit from meta values
///
/// A factory is free to build new data, a new model and a new default prior. Implemented for
/// every `Fn(&MetaValues) -> Result<FitResult, BoxError>`.
pub trait FitFactory: Send + Sync {
    fn construct(&self, meta: &MetaValues) -> Result<FitResult, BoxError>;
}

impl<F> FitFactory for F
where
    F: Fn(&MetaValues) -> Result<FitResult, BoxError> + Send + Sync,
{
    fn construct(&self, meta: &MetaValues) -> Result<FitResult, BoxError> {
        self(meta)
    }
}

/// Number of recomputations performed by a [FitRecomputer]
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecomputeCounts {
    pub refits: usize,
    pub regenerations: usize,
}

/// Produces new fits, either by re-running the solver or by calling a [FitFactory]
///
/// Attempts are counted whether they succeed or not.
#[derive(Clone)]
pub struct FitRecomputer {
    solver: Arc<dyn CurveFitTrait>,
    counts: RecomputeCounts,
}

impl FitRecomputer {
    pub fn new(solver: impl CurveFitTrait + 'static) -> Self {
        Self::from_shared(Arc::new(solver))
    }

    pub fn from_shared(solver: Arc<dyn CurveFitTrait>) -> Self {
        Self {
            solver,
            counts: RecomputeCounts::default(),
        }
    }

    pub fn solver(&self) -> &dyn CurveFitTrait {
        self.solver.as_ref()
    }

    pub fn counts(&self) -> RecomputeCounts {
        self.counts
    }

    /// Re-run the solver on the data and model of `base` with `new_prior`
    ///
    /// The new fit shares the data of `base` and keeps its meta values.
    pub fn refit_with_prior(
        &mut self,
        base: &FitResult,
        new_prior: ParameterSet,
    ) -> Result<FitResult, FitError> {
        self.counts.refits += 1;
        let result = self
            .solver
            .curve_fit(base.data(), base.model(), &new_prior)?;
        let fit = FitResult::new(
            base.shared_data(),
            base.model().clone(),
            new_prior,
            result.posterior,
            Some(result.metrics),
        );
        Ok(match base.meta() {
            Some(meta) => fit.with_meta(meta.clone()),
            None => fit,
        })
    }

    /// Build a new fit with `construct`, the fit is stamped with `meta`
    pub fn regenerate_from_meta(
        &mut self,
        construct: &dyn FitFactory,
        meta: &MetaValues,
    ) -> Result<FitResult, FitError> {
        self.counts.regenerations += 1;
        construct
            .construct(meta)
            .map(|fit| fit.with_meta(meta.clone()))
            .map_err(|err| FitError::FitConstructionFailure(err.to_string()))
    }
}

impl fmt::Debug for FitRecomputer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitRecomputer")
            .field("solver", &self.solver)
            .field("counts", &self.counts)
            .finish()
    }
}
