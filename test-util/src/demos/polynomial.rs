use crate::demos::{DemoError, positive_integer};

use curve_fit_gui::{
    BoxError, FitData, FitModel, FitResult, LmCurveFit, MetaConfig, MetaDeclaration, MetaValues,
    ParameterSet, ScalarEstimate,
};
use lazy_static::lazy_static;
use rand::prelude::*;
use rand_distr::StandardNormal;
use std::sync::Arc;

const N_POLY_TRUE: usize = 5;
const N_DATA: usize = 50;
const SEED: u64 = 42;

lazy_static! {
    /// Synthetic data of a degree-4 polynomial on `[0, 2]` with 5-10% uncertainties
    pub static ref POLY_DATA: Arc<FitData> = Arc::new(generate_data(N_POLY_TRUE, N_DATA, SEED));
}

fn polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn generate_data(n_poly: usize, n_data: usize, seed: u64) -> FitData {
    let mut rng = StdRng::seed_from_u64(seed);
    let coefficients: Vec<f64> = (0..n_poly)
        .map(|_| rng.sample::<f64, _>(StandardNormal))
        .collect();
    let x: Vec<_> = (0..n_data)
        .map(|i| 2.0 * i as f64 / (n_data - 1) as f64)
        .collect();
    let y: Vec<_> = x
        .iter()
        .map(|&x| {
            let mean = polynomial(&coefficients, x);
            let sdev = f64::max(mean.abs() * rng.random_range(0.05..0.1), 1e-3);
            let noise: f64 = rng.sample(StandardNormal);
            ScalarEstimate::new(mean + sdev * noise, sdev)
        })
        .collect();
    FitData::new(x, y).expect("x and y have the same length")
}

/// `f(x) = sum_n a_n x^n` over parameters named `a{n}`
pub fn poly_model() -> FitModel {
    FitModel::new("polynomial", |x, p| {
        let terms: Vec<(i32, f64)> = p
            .iter()
            .filter_map(|(key, value)| {
                let power = key.strip_prefix('a')?.parse().ok()?;
                Some((power, *value.as_slice().first()?))
            })
            .collect();
        x.map(|&x| terms.iter().map(|&(n, a)| a * x.powi(n)).sum::<f64>())
    })
    .with_latex(r"f(x) = \sum_n a_n x^n")
    .with_description("Polynomial, parameter a{n} is the coefficient of x^n")
}

/// `a{n} = 0 ± (n + 1)` for `n < n_poly`
pub fn poly_prior(n_poly: usize) -> ParameterSet {
    (0..n_poly)
        .map(|n| (format!("a{n}"), ScalarEstimate::new(0.0, (n + 1) as f64)))
        .collect()
}

pub fn poly_fit(n_poly: usize) -> Result<FitResult, DemoError> {
    Ok(FitResult::fit(
        POLY_DATA.clone(),
        poly_model(),
        poly_prior(n_poly),
        &LmCurveFit::default(),
    )?)
}

/// Fit factory reading the number of coefficients from `n_poly`
pub fn poly_factory(meta: &MetaValues) -> Result<FitResult, BoxError> {
    let n_poly = positive_integer(meta, "n_poly")?;
    Ok(poly_fit(n_poly)?)
}

pub fn poly_meta_config() -> MetaConfig {
    [MetaDeclaration::number("n_poly", Some(1.0), Some(10.0), Some(1.0)).with_label("Polynomial degree + 1")]
        .into_iter()
        .collect()
}
