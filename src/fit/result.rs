use crate::codec::meta::MetaValues;
use crate::error::SolverError;
use crate::estimate::ScalarEstimate;
use crate::fit::data::{FitData, Shaped};
use crate::fit::model::{FitModel, diff_step};
use crate::fit::solver::{CurveFitTrait, FitMetrics, to_dmatrix};
use crate::parameters::ParameterSet;

use itertools::Itertools;
use std::fmt::Write;
use std::sync::Arc;

/// Result of a non-linear least-squares fit
///
/// A [FitResult] is never changed after construction: recomputations produce new objects, so
/// holders of an `Arc<FitResult>` can compare identities with [Arc::ptr_eq].
#[derive(Clone, Debug)]
pub struct FitResult {
    data: Arc<FitData>,
    model: FitModel,
    prior: ParameterSet,
    posterior: ParameterSet,
    metrics: Option<FitMetrics>,
    meta: Option<MetaValues>,
}

impl FitResult {
    /// Assemble a fit from already computed parts
    pub fn new(
        data: impl Into<Arc<FitData>>,
        model: FitModel,
        prior: ParameterSet,
        posterior: ParameterSet,
        metrics: Option<FitMetrics>,
    ) -> Self {
        Self {
            data: data.into(),
            model,
            prior,
            posterior,
            metrics,
            meta: None,
        }
    }

    /// Run `solver` and assemble the fit
    pub fn fit(
        data: impl Into<Arc<FitData>>,
        model: FitModel,
        prior: ParameterSet,
        solver: &dyn CurveFitTrait,
    ) -> Result<Self, SolverError> {
        let data = data.into();
        let result = solver.curve_fit(&data, &model, &prior)?;
        Ok(Self::new(
            data,
            model,
            prior,
            result.posterior,
            Some(result.metrics),
        ))
    }

    /// Attach the meta values this fit was generated from
    pub fn with_meta(mut self, meta: MetaValues) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn data(&self) -> &FitData {
        &self.data
    }

    pub(crate) fn shared_data(&self) -> Arc<FitData> {
        self.data.clone()
    }

    pub fn model(&self) -> &FitModel {
        &self.model
    }

    pub fn prior(&self) -> &ParameterSet {
        &self.prior
    }

    pub fn posterior(&self) -> &ParameterSet {
        &self.posterior
    }

    pub fn metrics(&self) -> Option<&FitMetrics> {
        self.metrics.as_ref()
    }

    pub fn meta(&self) -> Option<&MetaValues> {
        self.meta.as_ref()
    }

    pub fn x(&self) -> &Shaped<f64> {
        self.data.x()
    }

    pub fn y(&self) -> &Shaped<ScalarEstimate> {
        self.data.y()
    }

    /// Model evaluated at `x` with posterior uncertainty propagated to first order
    ///
    /// Points where the model output or its uncertainty is not finite are `None`.
    pub fn predict(&self, x: &Shaped<f64>) -> Shaped<Option<ScalarEstimate>> {
        let point = self.posterior.means();
        let steps: Vec<_> = self
            .posterior
            .iter_estimates()
            .map(|(_, p)| diff_step(p.mean(), p.sdev()))
            .collect();
        let (f, jac) = self.model.jacobian(x, &point, &steps);
        let cov = to_dmatrix(&self.posterior.covariance_matrix());
        let f_cov = &jac * cov * jac.transpose();
        let flat: Vec<_> = f
            .iter_flat()
            .enumerate()
            .map(|(i, &mean)| {
                // zero variance happens for parameter-free outputs, keep them visible
                let sdev = f_cov[(i, i)].max(0.0).sqrt().max(f64::MIN_POSITIVE);
                ScalarEstimate::try_new(mean, sdev).ok()
            })
            .collect();
        f.reshape(&flat)
    }

    /// Normalized residuals `(y_mean - f(x)) / y_sdev`
    ///
    /// The uncertainty of the residual comes from the posterior uncertainty of the model. Points
    /// where the model is undefined are `None`.
    pub fn residuals(&self) -> Shaped<Option<ScalarEstimate>> {
        let fit = self.predict(self.x());
        let flat: Vec<_> = self
            .y()
            .iter_flat()
            .zip(fit.iter_flat())
            .map(|(y, f)| {
                let f = f.as_ref()?;
                let mean = (y.mean() - f.mean()) / y.sdev();
                let sdev = (f.sdev() / y.sdev()).max(f64::MIN_POSITIVE);
                ScalarEstimate::try_new(mean, sdev).ok()
            })
            .collect();
        self.y().reshape(&flat)
    }

    /// Dense grid between the smallest and largest `x` for band plots
    ///
    /// Parts with fewer than two distinct points or without `x` keep the original data `x`.
    pub fn band_grid(&self, n: usize) -> Shaped<f64> {
        let dense = |x: &[f64]| -> Vec<f64> {
            let (min, max) = match x.iter().copied().minmax().into_option() {
                Some((min, max)) if max > min && n > 1 => (min, max),
                _ => return x.to_vec(),
            };
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|i| min + step * i as f64).collect()
        };
        match self.x() {
            Shaped::Single(x) => Shaped::Single(dense(x)),
            Shaped::Keyed(items) => Shaped::Keyed(
                items
                    .iter()
                    .map(|(key, x)| (key.clone(), dense(x)))
                    .collect(),
            ),
        }
    }

    /// Fit band `(x, f(x))` on a dense grid of `n` points
    ///
    /// The model is evaluated on the data `x` when it has no independent variable or when the
    /// model output on the dense grid does not have the structure of the data.
    pub fn fit_band(&self, n: usize) -> (Shaped<f64>, Shaped<Option<ScalarEstimate>>) {
        let grid = self.band_grid(n);
        if !self.x().is_empty() {
            let band = self.predict(&grid);
            let grid_for_y = self.grid_matching_output(&grid, &band);
            if let Some(grid) = grid_for_y {
                return (grid, band);
            }
        }
        let x = self.x().clone();
        let band = self.predict(&x);
        (x, band)
    }

    // model output may be keyed while a single x is shared by all keys
    fn grid_matching_output(
        &self,
        grid: &Shaped<f64>,
        band: &Shaped<Option<ScalarEstimate>>,
    ) -> Option<Shaped<f64>> {
        if grid.same_structure(band) {
            return Some(grid.clone());
        }
        match (grid, band) {
            (Shaped::Single(x), Shaped::Keyed(items))
                if items.iter().all(|(_, v)| v.len() == x.len()) =>
            {
                Some(Shaped::Keyed(
                    items.iter().map(|(k, _)| (k.clone(), x.clone())).collect(),
                ))
            }
            _ => None,
        }
    }

    /// Text summary of the fit in the spirit of a least-squares report
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("Least Square Fit:\n");
        match &self.metrics {
            Some(m) => {
                let _ = writeln!(
                    s,
                    "  chi2/dof = {:.2} [{}]    logGBF = {:.5}    nit = {}",
                    m.chi2_dof(),
                    m.dof,
                    m.log_gbf,
                    m.n_iterations,
                );
            }
            None => s.push_str("  no fit metrics\n"),
        }
        s.push('\n');
        s.push_str(&self.parameter_table());
        s
    }

    /// Table of prior and posterior estimates, one row per flattened estimate
    pub fn parameter_table(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Parameters:");
        let rows: Vec<_> = self
            .prior
            .iter()
            .flat_map(|(key, prior)| {
                let posterior = self.posterior.get(key);
                let is_array = prior.is_array();
                prior
                    .estimates()
                    .iter()
                    .enumerate()
                    .map(move |(i, p)| {
                        let label = if is_array {
                            format!("{key} {i}")
                        } else {
                            key.to_owned()
                        };
                        let post = posterior
                            .and_then(|v| v.estimates().get(i))
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "-".to_owned());
                        (label, post, p.to_string())
                    })
            })
            .collect();
        let width = rows.iter().map(|(l, _, _)| l.len()).max().unwrap_or(0);
        for (label, post, prior) in rows {
            let _ = writeln!(s, "  {label:>width$}   {post:<20} [ {prior:<16} ]");
        }
        s
    }

    /// Whether the posterior has the same structure as the prior
    pub fn is_consistent(&self) -> bool {
        self.prior.same_shape(&self.posterior)
    }
}
