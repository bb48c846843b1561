use crate::fit::solver::CurveFitAlgorithm;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Session configuration
///
/// - Attribute `name`: dashboard title, default is "Curve fit GUI"
/// - Attribute `band_points`: number of grid points of the fit band, default is 100
/// - Attribute `pdf_points`: number of points of prior and posterior density curves, default is 200
/// - Attribute `prior_precision`: digits after the decimal point of prior fields shown in
///   scientific notation, default is 4
/// - Attribute `use_default_plots`: whether the fit, residuals and prior vs posterior plots are
///   registered, default is `true`
/// - Attribute `show_details`: whether the data table tab is rendered, default is `true`
/// - Attribute `solver`: least-squares solver used for re-fits
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct GuiConfig {
    pub name: String,
    pub band_points: usize,
    pub pdf_points: usize,
    pub prior_precision: usize,
    pub use_default_plots: bool,
    pub show_details: bool,
    pub solver: CurveFitAlgorithm,
}

impl GuiConfig {
    #[inline]
    pub fn default_name() -> String {
        "Curve fit GUI".to_owned()
    }

    #[inline]
    pub fn default_band_points() -> usize {
        100
    }

    #[inline]
    pub fn default_pdf_points() -> usize {
        200
    }

    #[inline]
    pub fn default_prior_precision() -> usize {
        4
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_solver(mut self, solver: impl Into<CurveFitAlgorithm>) -> Self {
        self.solver = solver.into();
        self
    }

    /// Format a prior field value the way the sidebar shows it
    pub fn format_prior_value(&self, value: f64) -> String {
        format!("{value:.prec$e}", prec = self.prior_precision)
    }
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            band_points: Self::default_band_points(),
            pdf_points: Self::default_pdf_points(),
            prior_precision: Self::default_prior_precision(),
            use_default_plots: true,
            show_details: true,
            solver: CurveFitAlgorithm::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::solver::LmCurveFit;

    #[test]
    fn partial_json_uses_defaults() {
        let config: GuiConfig = serde_json::from_str(r#"{"name": "Poly fit", "band_points": 50}"#).unwrap();
        assert_eq!(config.name, "Poly fit");
        assert_eq!(config.band_points, 50);
        assert_eq!(config.pdf_points, GuiConfig::default_pdf_points());
        assert_eq!(config.solver, CurveFitAlgorithm::Lm(LmCurveFit::default()));
    }

    #[test]
    fn prior_value_format() {
        let config = GuiConfig::default();
        assert_eq!(config.format_prior_value(0.5), "5.0000e-1");
        assert_eq!(config.format_prior_value(-1234.5), "-1.2345e3");
    }

    #[test]
    fn schema_is_generated() {
        let schema = schemars::schema_for!(GuiConfig);
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["properties"]["band_points"].is_object());
    }
}
