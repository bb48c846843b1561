use crate::demos::{DemoError, positive_integer};

use curve_fit_gui::{
    BoxError, FitData, FitModel, FitResult, LmCurveFit, MetaConfig, MetaDeclaration, MetaValues,
    ParameterSet, ScalarEstimate,
};
use itertools::izip;
use lazy_static::lazy_static;
use std::sync::Arc;

const X: [f64; 8] = [5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 12.0, 14.0];
const Y_MEAN: [f64; 8] = [
    4.5022829417e-03,
    1.8170543788e-03,
    7.3618847843e-04,
    2.9872730036e-04,
    1.2128831367e-04,
    4.9256559129e-05,
    8.1263644483e-06,
    1.3415253536e-06,
];
const Y_VAR: [f64; 8] = [
    2.1537808808e-09,
    3.6193461816e-10,
    6.1710468826e-11,
    1.0632830128e-11,
    1.8496194125e-12,
    3.2498644263e-13,
    1.0403917951e-14,
    3.5672355835e-16,
];

lazy_static! {
    /// Correlator-like data decaying with `x`
    pub static ref EXP_SUM_DATA: Arc<FitData> = {
        let y: Vec<_> = izip!(Y_MEAN, Y_VAR)
            .map(|(mean, var)| ScalarEstimate::new(mean, var.sqrt()))
            .collect();
        Arc::new(FitData::new(X.to_vec(), y).expect("x and y have the same length"))
    };
}

/// `f(x) = sum_i a_i exp(-E_i x)` over array parameters `a` and `E`
pub fn exp_sum_model() -> FitModel {
    FitModel::new("exponential sum", |x, p| {
        let a = p.array("a").unwrap_or_default().to_vec();
        let e = p.array("E").unwrap_or_default().to_vec();
        x.map(|&x| a.iter().zip(&e).map(|(a, e)| a * f64::exp(-e * x)).sum::<f64>())
    })
    .with_latex(r"f(x) = \sum_i a_i e^{-E_i x}")
}

/// `a = [0.5 ± 0.4, ...]`, `E = [1 ± 0.4, 2 ± 0.4, ...]`
pub fn exp_sum_prior(n_exp: usize) -> ParameterSet {
    let a: Vec<_> = (0..n_exp).map(|_| (0.5, 0.4)).collect();
    let e: Vec<_> = (0..n_exp).map(|i| ((i + 1) as f64, 0.4)).collect();
    ParameterSet::new().with_array("a", &a).with_array("E", &e)
}

/// Solver with enough iterations for the poorly constrained high exponents
pub fn exp_sum_solver() -> LmCurveFit {
    LmCurveFit::new(
        1000,
        LmCurveFit::default_ftol_rel(),
        LmCurveFit::default_initial_lambda(),
    )
}

pub fn exp_sum_fit(n_exp: usize) -> Result<FitResult, DemoError> {
    Ok(FitResult::fit(
        EXP_SUM_DATA.clone(),
        exp_sum_model(),
        exp_sum_prior(n_exp),
        &exp_sum_solver(),
    )?)
}

/// Fit factory reading the number of exponents from `n_exp`
pub fn exp_sum_factory(meta: &MetaValues) -> Result<FitResult, BoxError> {
    let n_exp = positive_integer(meta, "n_exp")?;
    Ok(exp_sum_fit(n_exp)?)
}

pub fn exp_sum_meta_config() -> MetaConfig {
    [MetaDeclaration::number("n_exp", Some(1.0), Some(10.0), Some(1.0))]
        .into_iter()
        .collect()
}
