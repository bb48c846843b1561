use crate::fit::data::Shaped;
use crate::parameters::ParameterPoint;

use nalgebra::DMatrix;
use std::fmt;
use std::sync::Arc;

/// Signature of a model function: `f(x, p)`
pub type ModelFn = dyn Fn(&Shaped<f64>, &ParameterPoint) -> Shaped<f64> + Send + Sync;

/// Named model function with optional documentation shown next to the fit
///
/// Cloning is cheap, the function itself is shared.
#[derive(Clone)]
pub struct FitModel {
    name: String,
    func: Arc<ModelFn>,
    latex: Option<String>,
    description: Option<String>,
}

impl FitModel {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Shaped<f64>, &ParameterPoint) -> Shaped<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            latex: None,
            description: None,
        }
    }

    /// LaTeX representation of the model, e.g. `f(x) = \sum_n a_n x^n`
    pub fn with_latex(mut self, latex: impl Into<String>) -> Self {
        self.latex = Some(latex.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latex(&self) -> Option<&str> {
        self.latex.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn eval(&self, x: &Shaped<f64>, p: &ParameterPoint) -> Shaped<f64> {
        (self.func)(x, p)
    }

    /// Model output and its Jacobian with respect to the flattened parameters
    ///
    /// Central finite differences are used, `steps` holds one step per flattened parameter.
    pub fn jacobian(
        &self,
        x: &Shaped<f64>,
        p: &ParameterPoint,
        steps: &[f64],
    ) -> (Shaped<f64>, DMatrix<f64>) {
        let f0 = self.eval(x, p);
        let n_out = f0.len();
        let flat = p.to_flat_vec();
        assert_eq!(flat.len(), steps.len(), "one step per parameter is required");

        let mut jac = DMatrix::zeros(n_out, flat.len());
        let mut shifted = p.clone();
        let mut buffer = flat.clone();
        for (j, &h) in steps.iter().enumerate() {
            buffer[j] = flat[j] + h;
            shifted.set_flat(&buffer);
            let plus: Vec<_> = self.eval(x, &shifted).iter_flat().copied().collect();
            buffer[j] = flat[j] - h;
            shifted.set_flat(&buffer);
            let minus: Vec<_> = self.eval(x, &shifted).iter_flat().copied().collect();
            buffer[j] = flat[j];
            for (i, (a, b)) in plus.iter().zip(minus.iter()).take(n_out).enumerate() {
                jac[(i, j)] = (a - b) / (2.0 * h);
            }
        }
        (f0, jac)
    }
}

impl fmt::Debug for FitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitModel")
            .field("name", &self.name)
            .field("latex", &self.latex)
            .finish_non_exhaustive()
    }
}

/// Finite-difference step for a parameter with value `x` and prior width `scale`
pub(crate) fn diff_step(x: f64, scale: f64) -> f64 {
    const REL_STEP: f64 = 1e-6;
    let step = REL_STEP * f64::max(x.abs(), scale);
    if step > 0.0 { step } else { REL_STEP }
}
