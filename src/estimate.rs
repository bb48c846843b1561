use crate::error::ValidationError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single uncertain quantity: mean and standard deviation
///
/// Standard deviation is always positive and both components are finite, use
/// [ScalarEstimate::try_new] for values coming from user input.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(try_from = "ScalarEstimateParameters")]
pub struct ScalarEstimate {
    mean: f64,
    sdev: f64,
}

impl ScalarEstimate {
    /// New [ScalarEstimate], panics if `sdev` is not positive or any value is not finite
    pub fn new(mean: f64, sdev: f64) -> Self {
        Self::try_new(mean, sdev).expect("mean must be finite and sdev must be positive")
    }

    pub fn try_new(mean: f64, sdev: f64) -> Result<Self, ValidationError> {
        if !mean.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "mean".into(),
                value: mean,
            });
        }
        if !sdev.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "sdev".into(),
                value: sdev,
            });
        }
        if sdev <= 0.0 {
            return Err(ValidationError::NonPositiveUncertainty {
                field: "sdev".into(),
                sdev,
            });
        }
        Ok(Self { mean, sdev })
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    #[inline]
    pub fn sdev(&self) -> f64 {
        self.sdev
    }

    #[inline]
    pub fn var(&self) -> f64 {
        self.sdev * self.sdev
    }

    /// Normal probability density of this estimate at `x`
    pub fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sdev;
        (-0.5 * z * z).exp() / (self.sdev * std::f64::consts::TAU.sqrt())
    }

    pub fn approx_eq(&self, other: &Self, rtol: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= rtol * f64::max(a.abs(), b.abs());
        close(self.mean, other.mean) && close(self.sdev, other.sdev)
    }
}

#[derive(Deserialize)]
struct ScalarEstimateParameters {
    mean: f64,
    sdev: f64,
}

impl TryFrom<ScalarEstimateParameters> for ScalarEstimate {
    type Error = ValidationError;

    fn try_from(p: ScalarEstimateParameters) -> Result<Self, Self::Error> {
        Self::try_new(p.mean, p.sdev)
    }
}

/// Compact `mean(sdev)` notation with two significant digits of the uncertainty,
/// e.g. `0.50(40)` or `1234(12)`
impl fmt::Display for ScalarEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.sdev.log10().floor() as i32;
        let decimals = 1 - magnitude;
        if decimals <= 0 {
            // uncertainty is at least 10, print integers
            return write!(f, "{:.0}({:.0})", self.mean, self.sdev);
        }
        let decimals = decimals as usize;
        if decimals > 12 || self.mean.abs() >= 1e12 {
            return write!(f, "{:e} +- {:e}", self.mean, self.sdev);
        }
        let sdev_digits = (self.sdev * 10_f64.powi(decimals as i32)).round();
        write!(f, "{:.*}({:.0})", decimals, self.mean, sdev_digits)
    }
}
