//! Figures derived from a fit.
//!
//! Figures are plain serializable data, drawing them is left to the presentation layer. A
//! [PlotRegistry] holds the `(label, render function, parameters)` entries a dashboard shows as
//! tabs; every registry starts as a copy of an immutable default template.

use crate::config::GuiConfig;
use crate::estimate::ScalarEstimate;
use crate::fit::result::FitResult;

use itertools::Itertools;
use lazy_static::lazy_static;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Geometry of a single trace
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceShape {
    /// Markers with symmetric error bars
    ErrorBars {
        x: Vec<f64>,
        y: Vec<f64>,
        error: Vec<f64>,
    },
    /// Central line with a filled `[lower, upper]` band
    Band {
        x: Vec<f64>,
        lower: Vec<f64>,
        center: Vec<f64>,
        upper: Vec<f64>,
    },
    Line {
        x: Vec<f64>,
        y: Vec<f64>,
    },
    /// Horizontal reference line across the subplot
    HLine {
        y: f64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub name: String,
    /// Index into [Figure::subplot_titles]
    pub subplot: usize,
    #[serde(flatten)]
    pub shape: TraceShape,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Figure {
    pub title: Option<String>,
    pub subplot_titles: Vec<String>,
    pub traces: Vec<Trace>,
}

impl Figure {
    fn new(title: Option<String>) -> Self {
        Self {
            title,
            ..Self::default()
        }
    }

    fn add_subplot(&mut self, title: impl Into<String>) -> usize {
        self.subplot_titles.push(title.into());
        self.subplot_titles.len() - 1
    }

    fn push(&mut self, name: impl Into<String>, subplot: usize, shape: TraceShape) {
        self.traces.push(Trace {
            name: name.into(),
            subplot,
            shape,
        });
    }

    pub fn n_subplots(&self) -> usize {
        self.subplot_titles.len()
    }
}

/// Parameters passed to a [RenderFn]
///
/// - Attribute `title`: figure title, the registry label is used if not set
/// - Attribute `n_points`: resolution of sampled curves, the renderer picks a default if not set
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PlotParameters {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub n_points: Option<usize>,
}

impl PlotParameters {
    pub fn with_n_points(n_points: usize) -> Self {
        Self {
            title: None,
            n_points: Some(n_points),
        }
    }
}

/// Contract of a registered figure
pub type RenderFn = fn(&FitResult, &PlotParameters) -> Figure;

#[derive(Clone, Debug)]
pub struct PlotEntry {
    pub label: String,
    pub render: RenderFn,
    pub parameters: PlotParameters,
}

impl PlotEntry {
    pub fn render(&self, fit: &FitResult) -> Figure {
        let mut figure = (self.render)(fit, &self.parameters);
        if figure.title.is_none() {
            figure.title = Some(self.label.clone());
        }
        figure
    }
}

pub const FIT_PLOT: &str = "Fit";
pub const RESIDUALS_PLOT: &str = "Residuals";
pub const PRIOR_POSTERIOR_PLOT: &str = "Prior vs posterior";

lazy_static! {
    static ref DEFAULT_PLOTS: Vec<PlotEntry> = vec![
        PlotEntry {
            label: FIT_PLOT.to_owned(),
            render: plot_fit,
            parameters: PlotParameters::default(),
        },
        PlotEntry {
            label: RESIDUALS_PLOT.to_owned(),
            render: plot_residuals,
            parameters: PlotParameters::default(),
        },
        PlotEntry {
            label: PRIOR_POSTERIOR_PLOT.to_owned(),
            render: plot_prior_posterior,
            parameters: PlotParameters::default(),
        },
    ];
}

/// Ordered collection of figures rendered for a fit
#[derive(Clone, Debug)]
pub struct PlotRegistry {
    entries: Vec<PlotEntry>,
}

impl PlotRegistry {
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// Registry holding the fit, residuals and prior vs posterior plots
    pub fn with_defaults() -> Self {
        Self {
            entries: DEFAULT_PLOTS.clone(),
        }
    }

    /// Registry for a session, default plots sample with the configured resolution
    pub fn from_config(config: &GuiConfig) -> Self {
        if !config.use_default_plots {
            return Self::empty();
        }
        let mut registry = Self::with_defaults();
        for (label, n_points) in [
            (FIT_PLOT, config.band_points),
            (PRIOR_POSTERIOR_PLOT, config.pdf_points),
        ] {
            if let Some(entry) = registry.get_mut(label) {
                entry.parameters.n_points = Some(n_points);
            }
        }
        registry
    }

    /// Register a figure, an entry with the same label is replaced
    pub fn register(&mut self, label: impl Into<String>, render: RenderFn, parameters: PlotParameters) {
        let entry = PlotEntry {
            label: label.into(),
            render,
            parameters,
        };
        match self.entries.iter_mut().find(|e| e.label == entry.label) {
            Some(e) => *e = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, label: &str) -> Option<PlotEntry> {
        let i = self.entries.iter().position(|e| e.label == label)?;
        Some(self.entries.remove(i))
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut PlotEntry> {
        self.entries.iter_mut().find(|e| e.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render all figures in registration order
    pub fn render_all(&self, fit: &FitResult) -> Vec<(String, Figure)> {
        self.entries
            .iter()
            .map(|e| (e.label.clone(), e.render(fit)))
            .collect()
    }
}

impl Default for PlotRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const DEFAULT_BAND_POINTS: usize = 100;
const DEFAULT_PDF_POINTS: usize = 200;

// data without an independent variable is drawn against point indices
fn abscissa(x: &[f64], n: usize) -> Vec<f64> {
    if x.len() == n {
        x.to_vec()
    } else {
        (0..n).map(|i| i as f64).collect()
    }
}

// points where the model is undefined are left out
fn defined_points(x: Vec<f64>, values: &[Option<ScalarEstimate>]) -> (Vec<f64>, Vec<ScalarEstimate>) {
    x.into_iter()
        .zip(values)
        .filter_map(|(x, value)| Some((x, (*value)?)))
        .unzip()
}

fn error_bars(y: &[ScalarEstimate], x: Vec<f64>) -> TraceShape {
    TraceShape::ErrorBars {
        x,
        y: y.iter().map(ScalarEstimate::mean).collect(),
        error: y.iter().map(ScalarEstimate::sdev).collect(),
    }
}

fn subplot_title(key: Option<&str>) -> String {
    key.unwrap_or_default().to_owned()
}

/// Data with error bars and the posterior fit band, one subplot per data key
pub fn plot_fit(fit: &FitResult, parameters: &PlotParameters) -> Figure {
    let n = parameters.n_points.unwrap_or(DEFAULT_BAND_POINTS);
    let mut figure = Figure::new(parameters.title.clone());
    let (grid, band) = fit.fit_band(n);
    for (key, y) in fit.y().parts() {
        let subplot = figure.add_subplot(subplot_title(key));
        figure.push("Data", subplot, error_bars(y, abscissa(fit.data().x_for(key), y.len())));

        let band_part = match key {
            Some(key) => band.get(key),
            None => band.parts().first().map(|&(_, v)| v),
        };
        if let Some(band_part) = band_part {
            let x = key.and_then(|k| grid.get(k)).or_else(|| grid.parts().first().map(|&(_, v)| v));
            let (x, band_part) = defined_points(abscissa(x.unwrap_or(&[]), band_part.len()), band_part);
            figure.push(
                "Fit",
                subplot,
                TraceShape::Band {
                    x,
                    lower: band_part.iter().map(|e| e.mean() - e.sdev()).collect(),
                    center: band_part.iter().map(ScalarEstimate::mean).collect(),
                    upper: band_part.iter().map(|e| e.mean() + e.sdev()).collect(),
                },
            );
        }
    }
    figure
}

/// Normalized residuals with a zero reference line, one subplot per data key
pub fn plot_residuals(fit: &FitResult, parameters: &PlotParameters) -> Figure {
    let mut figure = Figure::new(parameters.title.clone());
    let residuals = fit.residuals();
    for (key, r) in residuals.parts() {
        let subplot = figure.add_subplot(subplot_title(key));
        let (x, r) = defined_points(abscissa(fit.data().x_for(key), r.len()), r);
        figure.push("Residuals", subplot, error_bars(&r, x));
        figure.push("", subplot, TraceShape::HLine { y: 0.0 });
    }
    figure
}

/// Normal densities of prior and posterior over `mean ± 3 sdev`, one subplot per estimate
pub fn plot_prior_posterior(fit: &FitResult, parameters: &PlotParameters) -> Figure {
    let n = parameters.n_points.unwrap_or(DEFAULT_PDF_POINTS).max(2);
    let mut figure = Figure::new(parameters.title.clone());
    let posterior: Vec<_> = fit.posterior().iter_estimates().collect();
    for (label, prior) in fit.prior().iter_estimates() {
        let subplot = figure.add_subplot(label.clone());
        let post = posterior
            .iter()
            .find(|(l, _)| *l == label)
            .map(|&(_, e)| e);
        let (min, max) = std::iter::once(prior)
            .chain(post)
            .flat_map(|e| [e.mean() - 3.0 * e.sdev(), e.mean() + 3.0 * e.sdev()])
            .minmax()
            .into_option()
            .unwrap_or((prior.mean(), prior.mean()));
        let x: Vec<_> = (0..n)
            .map(|i| min + (max - min) * i as f64 / (n - 1) as f64)
            .collect();
        for (name, estimate) in [("Prior", Some(prior)), ("Posterior", post)] {
            if let Some(estimate) = estimate {
                figure.push(
                    name,
                    subplot,
                    TraceShape::Line {
                        y: x.iter().map(|&x| estimate.pdf(x)).collect(),
                        x: x.clone(),
                    },
                );
            }
        }
    }
    figure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::data::{FitData, Shaped};
    use crate::fit::model::FitModel;
    use crate::fit::solver::LmCurveFit;
    use crate::parameters::ParameterSet;

    use approx::assert_relative_eq;

    fn fit() -> FitResult {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y: Vec<_> = x
            .iter()
            .map(|&x| ScalarEstimate::new(1.0 - x, 0.2))
            .collect();
        let data = FitData::new(x, y).unwrap();
        let model = FitModel::new("line", |x: &Shaped<f64>, p| {
            let (a, b) = (p.scalar("a").unwrap(), p.scalar("b").unwrap());
            x.map(|x| a + b * x)
        });
        let prior = ParameterSet::new()
            .with_scalar("a", 0.0, 5.0)
            .with_scalar("b", 0.0, 5.0);
        FitResult::fit(data, model, prior, &LmCurveFit::default()).unwrap()
    }

    #[test]
    fn default_template_is_copied() {
        let mut registry = PlotRegistry::default();
        registry.remove(RESIDUALS_PLOT);
        assert_eq!(registry.labels().collect::<Vec<_>>(), [FIT_PLOT, PRIOR_POSTERIOR_PLOT]);
        assert_eq!(PlotRegistry::default().len(), 3);
    }

    #[test]
    fn config_sets_resolution() {
        let config = GuiConfig {
            band_points: 7,
            ..GuiConfig::default()
        };
        let registry = PlotRegistry::from_config(&config);
        let figures = registry.render_all(&fit());
        let TraceShape::Band { x, .. } = &figures[0].1.traces[1].shape else {
            panic!("fit band is expected");
        };
        assert_eq!(x.len(), 7);

        let config = GuiConfig {
            use_default_plots: false,
            ..GuiConfig::default()
        };
        assert!(PlotRegistry::from_config(&config).is_empty());
    }

    #[test]
    fn register_replaces_label() {
        let mut registry = PlotRegistry::empty();
        registry.register("Fit", plot_fit, PlotParameters::with_n_points(10));
        registry.register("Fit", plot_fit, PlotParameters::with_n_points(20));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_mut("Fit").unwrap().parameters.n_points, Some(20));
    }

    #[test]
    fn fit_figure() {
        let figure = PlotEntry {
            label: "Fit".into(),
            render: plot_fit,
            parameters: PlotParameters::with_n_points(7),
        }
        .render(&fit());
        assert_eq!(figure.title.as_deref(), Some("Fit"));
        assert_eq!(figure.n_subplots(), 1);
        match &figure.traces[1].shape {
            TraceShape::Band { x, lower, upper, .. } => {
                assert_eq!(x.len(), 7);
                assert_relative_eq!(x[6], 3.0);
                assert!(lower.iter().zip(upper).all(|(l, u)| l < u));
            }
            shape => panic!("band expected, got {shape:?}"),
        }
    }

    #[test]
    fn residuals_have_reference_line() {
        let figure = plot_residuals(&fit(), &PlotParameters::default());
        assert_eq!(figure.traces.len(), 2);
        assert_eq!(figure.traces[1].shape, TraceShape::HLine { y: 0.0 });
    }

    #[test]
    fn prior_posterior_per_estimate() {
        let figure = plot_prior_posterior(&fit(), &PlotParameters::with_n_points(11));
        assert_eq!(figure.subplot_titles, ["a", "b"]);
        assert_eq!(figure.traces.len(), 4);
        match &figure.traces[0].shape {
            TraceShape::Line { x, y } => {
                assert_eq!(x.len(), 11);
                // prior is centered at zero with sdev 5, the range covers it
                assert!(x[0] <= -15.0 && x[10] >= 15.0);
                assert!(y.iter().all(|&p| p > 0.0));
            }
            shape => panic!("line expected, got {shape:?}"),
        }
    }

    #[test]
    fn trace_json_is_flat() {
        let trace = Trace {
            name: "".into(),
            subplot: 0,
            shape: TraceShape::HLine { y: 0.0 },
        };
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json, serde_json::json!({"name": "", "subplot": 0, "kind": "h_line", "y": 0.0}));
    }
}
