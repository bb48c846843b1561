use crate::demos::DemoError;

use curve_fit_gui::{
    FitData, FitModel, FitResult, LmCurveFit, ParameterSet, ScalarEstimate, Shaped,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const KEYS: [&str; 5] = ["d1", "d2", "d3", "d4", "d5"];
const Y_MEAN: [[f64; 4]; 5] = [
    [1.154, 2.107, 3.042, 3.978],
    [0.692, 1.196, 1.657, 2.189],
    [0.107, 0.030, -0.027, -0.149],
    [0.002, -0.197, -0.382, -0.627],
    [1.869, 2.198, 2.502, 2.791],
];
const Y_SDEV: [f64; 4] = [0.010, 0.016, 0.022, 0.029];

lazy_static! {
    /// Five linear data sets sharing the intercept
    pub static ref MULTI_KEY_DATA: Arc<FitData> = {
        let x = KEYS.iter().enumerate().map(|(i, &key)| {
            let start = if i == 4 { 5.0 } else { 1.0 };
            (key, (0..4).map(|j| start + j as f64).collect::<Vec<_>>())
        });
        let y = KEYS.iter().zip(Y_MEAN).map(|(&key, means)| {
            let estimates: Vec<_> = means
                .iter()
                .zip(Y_SDEV)
                .map(|(&mean, sdev)| ScalarEstimate::new(mean, sdev))
                .collect();
            (key, estimates)
        });
        Arc::new(FitData::new(Shaped::keyed(x), Shaped::keyed(y)).expect("keys and lengths match"))
    };
}

/// `f_n(x) = a + s_n x` for data key `d{n}`
pub fn multi_key_model() -> FitModel {
    FitModel::new("multi-linear", |x, p| {
        let a = p.scalar("a").unwrap_or_default();
        Shaped::Keyed(
            x.parts()
                .into_iter()
                .map(|(key, xs)| {
                    let key = key.unwrap_or_default();
                    let slope_key = format!("s{}", key.get(1..).unwrap_or_default());
                    let s = p.scalar(&slope_key).unwrap_or_default();
                    (key.to_owned(), xs.iter().map(|x| a + s * x).collect())
                })
                .collect(),
        )
    })
    .with_latex(r"f(x; a, s_n) = a + s_n x")
}

pub fn multi_key_prior() -> ParameterSet {
    ["a", "s1", "s2", "s3", "s4", "s5"]
        .into_iter()
        .map(|key| (key, ScalarEstimate::new(0.0, 1.0)))
        .collect()
}

pub fn multi_key_fit() -> Result<FitResult, DemoError> {
    Ok(FitResult::fit(
        MULTI_KEY_DATA.clone(),
        multi_key_model(),
        multi_key_prior(),
        &LmCurveFit::default(),
    )?)
}
