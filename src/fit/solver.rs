//! Least-squares solvers consumed by the fit recomputation layer.
//!
//! The objective follows the usual Bayesian least-squares formulation: data residuals
//! `(f(x, p) - y) / sigma_y` are augmented by prior residuals, so that
//!
//! ```text
//! chi2(p) = |(f(x, p) - y) / sigma_y|^2 + (p - p_prior)^T C_prior^-1 (p - p_prior)
//! ```
//!
//! The posterior is approximated by a normal distribution centered at the minimum of `chi2`
//! with covariance equal to the inverse of the Gauss-Newton normal matrix at the minimum.

use crate::error::SolverError;
use crate::estimate::ScalarEstimate;
use crate::fit::data::{FitData, Shaped};
use crate::fit::model::{FitModel, diff_step};
use crate::parameters::ParameterSet;

use enum_dispatch::enum_dispatch;
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use ordered_float::NotNan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Fit quality metrics reported together with a posterior
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FitMetrics {
    /// Minimum of the augmented chi2, including the prior term
    pub chi2: f64,
    /// Prior contribution to [FitMetrics::chi2]
    pub chi2_prior: f64,
    /// Degrees of freedom, equal to the number of data points
    pub dof: usize,
    /// Logarithm of the Gaussian Bayes factor
    pub log_gbf: f64,
    pub n_iterations: usize,
}

impl FitMetrics {
    pub fn chi2_dof(&self) -> f64 {
        self.chi2 / self.dof as f64
    }
}

/// Output of [CurveFitTrait::curve_fit]
#[derive(Clone, Debug, PartialEq)]
pub struct CurveFitResult {
    pub posterior: ParameterSet,
    pub metrics: FitMetrics,
}

/// Trait for least-squares solvers with a normal prior
#[enum_dispatch]
pub trait CurveFitTrait: Debug + Send + Sync {
    fn curve_fit(
        &self,
        data: &FitData,
        model: &FitModel,
        prior: &ParameterSet,
    ) -> Result<CurveFitResult, SolverError>;
}

/// Available solvers
#[enum_dispatch(CurveFitTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CurveFitAlgorithm {
    Lm(LmCurveFit),
}

impl Default for CurveFitAlgorithm {
    fn default() -> Self {
        LmCurveFit::default().into()
    }
}

/// Levenberg–Marquardt least-squares with a normal prior
///
/// The model Jacobian is computed with central finite differences, initial guess is the prior
/// mean. Fails with [SolverError::NotConverged] if `niterations` is exhausted before the relative
/// change of chi2 drops below `ftol_rel`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename = "Lm")]
pub struct LmCurveFit {
    pub niterations: u32,
    pub ftol_rel: NotNan<f64>,
    pub initial_lambda: NotNan<f64>,
}

impl LmCurveFit {
    pub fn new(niterations: u32, ftol_rel: f64, initial_lambda: f64) -> Self {
        assert!(niterations > 0, "niterations must be positive");
        assert!(ftol_rel >= 0.0, "ftol_rel must be non-negative");
        assert!(initial_lambda >= 0.0, "initial_lambda must be non-negative");
        Self {
            niterations,
            ftol_rel: NotNan::new(ftol_rel).expect("ftol_rel must be not NaN"),
            initial_lambda: NotNan::new(initial_lambda).expect("initial_lambda must be not NaN"),
        }
    }

    #[inline]
    pub fn default_niterations() -> u32 {
        100
    }

    #[inline]
    pub fn default_ftol_rel() -> f64 {
        1e-10
    }

    #[inline]
    pub fn default_initial_lambda() -> f64 {
        1e-3
    }
}

impl Default for LmCurveFit {
    fn default() -> Self {
        Self::new(
            Self::default_niterations(),
            Self::default_ftol_rel(),
            Self::default_initial_lambda(),
        )
    }
}

const MAX_LAMBDA: f64 = 1e12;

struct Problem<'a> {
    data: &'a FitData,
    model: &'a FitModel,
    prior: &'a ParameterSet,
    y_mean: DVector<f64>,
    y_inv_sdev: DVector<f64>,
    prior_mean: DVector<f64>,
    prior_inv_cov: DMatrix<f64>,
    steps_scale: Vec<f64>,
}

struct Evaluation {
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
    chi2_data: f64,
    chi2_prior: f64,
}

impl Evaluation {
    fn chi2(&self) -> f64 {
        self.chi2_data + self.chi2_prior
    }
}

impl<'a> Problem<'a> {
    fn new(
        data: &'a FitData,
        model: &'a FitModel,
        prior: &'a ParameterSet,
    ) -> Result<Self, SolverError> {
        let y = data.y();
        let y_mean = DVector::from_iterator(y.len(), y.iter_flat().map(ScalarEstimate::mean));
        let y_inv_sdev =
            DVector::from_iterator(y.len(), y.iter_flat().map(|x| x.sdev().recip()));
        let n = prior.n_estimates();
        let prior_mean =
            DVector::from_iterator(n, prior.iter_estimates().map(|(_, x)| x.mean()));
        let prior_cov = to_dmatrix(&prior.covariance_matrix());
        let prior_inv_cov = if n == 0 {
            prior_cov
        } else {
            prior_cov
                .cholesky()
                .ok_or(SolverError::SingularMatrix)?
                .inverse()
        };
        let steps_scale = prior.iter_estimates().map(|(_, x)| x.sdev()).collect();
        Ok(Self {
            data,
            model,
            prior,
            y_mean,
            y_inv_sdev,
            prior_mean,
            prior_inv_cov,
            steps_scale,
        })
    }

    fn check_output(&self, output: &Shaped<f64>) -> Result<(), SolverError> {
        let y = self.data.y();
        if y.same_structure(output) {
            return Ok(());
        }
        match (y.keys(), output.keys()) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(SolverError::KeysMismatch {
                    expected: expected.into_iter().map(str::to_owned).collect(),
                    actual: actual.into_iter().map(str::to_owned).collect(),
                })
            }
            _ => Err(SolverError::ShapeMismatch {
                expected: y.len(),
                actual: output.len(),
            }),
        }
    }

    fn evaluate(&self, p: &DVector<f64>, iteration: usize) -> Result<Evaluation, SolverError> {
        let mut point = self.prior.means();
        point.set_flat(p.as_slice());
        let steps: Vec<_> = p
            .iter()
            .zip(self.steps_scale.iter())
            .map(|(&x, &scale)| diff_step(x, scale))
            .collect();
        let (f, jac) = self.model.jacobian(self.data.x(), &point, &steps);
        self.check_output(&f)?;

        let f = DVector::from_iterator(f.len(), f.iter_flat().copied());
        let residuals = (f - &self.y_mean).component_mul(&self.y_inv_sdev);
        let mut jacobian = jac;
        for (mut row, &w) in jacobian.row_iter_mut().zip(self.y_inv_sdev.iter()) {
            row *= w;
        }
        let dp = p - &self.prior_mean;
        let chi2_data = residuals.norm_squared();
        let chi2_prior = dp.dot(&(&self.prior_inv_cov * &dp));
        if !chi2_data.is_finite() || !chi2_prior.is_finite() {
            return Err(SolverError::NonFiniteResidual(iteration));
        }
        Ok(Evaluation {
            residuals,
            jacobian,
            chi2_data,
            chi2_prior,
        })
    }

    /// Normal matrix and gradient of chi2 / 2
    fn normal_equations(
        &self,
        p: &DVector<f64>,
        ev: &Evaluation,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let jt = ev.jacobian.transpose();
        let a = &jt * &ev.jacobian + &self.prior_inv_cov;
        let g = &jt * &ev.residuals + &self.prior_inv_cov * (p - &self.prior_mean);
        (a, g)
    }

    fn y_log_det(&self) -> f64 {
        -2.0 * self.y_inv_sdev.iter().map(|x| x.ln()).sum::<f64>()
    }

    fn prior_log_det(&self) -> f64 {
        // prior_inv_cov is positive definite, it was produced by a Cholesky inversion
        match self.prior_inv_cov.clone().cholesky() {
            Some(ch) => -2.0 * ch.l().diagonal().iter().map(|x| x.ln()).sum::<f64>(),
            None => 0.0,
        }
    }
}

impl CurveFitTrait for LmCurveFit {
    fn curve_fit(
        &self,
        data: &FitData,
        model: &FitModel,
        prior: &ParameterSet,
    ) -> Result<CurveFitResult, SolverError> {
        let problem = Problem::new(data, model, prior)?;
        let n = prior.n_estimates();
        let ftol_rel = self.ftol_rel.into_inner();

        let mut p = problem.prior_mean.clone();
        let mut current = problem.evaluate(&p, 0)?;
        let mut lambda = self.initial_lambda.into_inner();
        let mut n_iterations = 0;
        let mut converged = n == 0;

        while !converged {
            if n_iterations >= self.niterations as usize {
                return Err(SolverError::NotConverged(n_iterations));
            }
            n_iterations += 1;

            let (a, g) = problem.normal_equations(&p, &current);
            let mut damped = a.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * a[(i, i)];
            }
            let step = damped
                .cholesky()
                .ok_or(SolverError::SingularMatrix)?
                .solve(&(-g));
            let candidate_p = &p + &step;
            let candidate = match problem.evaluate(&candidate_p, n_iterations) {
                Ok(ev) => Some(ev),
                Err(SolverError::NonFiniteResidual(_)) => None,
                Err(err) => return Err(err),
            };

            match candidate {
                Some(ev) if ev.chi2() <= current.chi2() => {
                    let decrease = current.chi2() - ev.chi2();
                    p = candidate_p;
                    current = ev;
                    lambda *= 0.1;
                    converged = decrease <= ftol_rel * f64::max(current.chi2(), 1.0);
                }
                _ => {
                    lambda = f64::max(lambda * 10.0, 1e-6);
                    // no descent direction left within numerical precision
                    converged = lambda > MAX_LAMBDA;
                }
            }
        }

        let (a, _g) = problem.normal_equations(&p, &current);
        let (posterior, log_det_a) = if n == 0 {
            (prior.clone(), 0.0)
        } else {
            let cholesky = a.cholesky().ok_or(SolverError::SingularMatrix)?;
            let log_det_a = 2.0 * cholesky.l().diagonal().iter().map(|x| x.ln()).sum::<f64>();
            let cov = cholesky.inverse();
            (posterior_from(prior, &p, &cov)?, log_det_a)
        };

        let n_points = data.n_points();
        let log_gbf = -0.5
            * (current.chi2()
                + problem.y_log_det()
                + problem.prior_log_det()
                + log_det_a
                + n_points as f64 * f64::ln(std::f64::consts::TAU));

        Ok(CurveFitResult {
            posterior,
            metrics: FitMetrics {
                chi2: current.chi2(),
                chi2_prior: current.chi2_prior,
                dof: n_points,
                log_gbf,
                n_iterations,
            },
        })
    }
}

fn posterior_from(
    prior: &ParameterSet,
    p: &DVector<f64>,
    cov: &DMatrix<f64>,
) -> Result<ParameterSet, SolverError> {
    let n = p.len();
    let sdev: Vec<_> = (0..n).map(|i| cov[(i, i)].sqrt()).collect();
    let estimates = p
        .iter()
        .zip(sdev.iter())
        .map(|(&mean, &sdev)| {
            ScalarEstimate::try_new(mean, sdev).map_err(|_| SolverError::SingularMatrix)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let correlation = Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            1.0
        } else {
            cov[(i, j)] / (sdev[i] * sdev[j])
        }
    });
    let posterior = prior
        .with_same_shape(&estimates)
        .ok_or(SolverError::ShapeMismatch {
            expected: prior.n_estimates(),
            actual: n,
        })?;
    Ok(posterior.with_correlation(correlation))
}

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = a.dim();
    DMatrix::from_fn(nrows, ncols, |i, j| a[(i, j)])
}
