//! Dashboard layout derived from the current fit.

use crate::codec::flat::{FlatFormEntry, flatten};
use crate::codec::meta::{MetaConfig, MetaValue, MetaValues, MetaWidget};
use crate::config::GuiConfig;
use crate::event::{FieldId, FormEvent};
use crate::fit::result::FitResult;
use crate::plot::{Figure, PlotRegistry};

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Editable prior field of the sidebar
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PriorField {
    pub id: FieldId,
    /// Value shown in the input, scientific notation
    pub text: String,
    pub value: f64,
}

/// Prior fields of a single estimate, `mean` and `sdev` side by side
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PriorRow {
    pub label: String,
    pub mean: PriorField,
    pub sdev: PriorField,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MetaField {
    pub name: String,
    pub label: String,
    pub widget: MetaWidget,
    pub value: MetaValue,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Sidebar {
    pub prior: Vec<PriorRow>,
    pub meta: Vec<MetaField>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    pub label: String,
    pub figure: Figure,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub model_name: String,
    pub latex: Option<String>,
    pub description: Option<String>,
    pub summary: String,
    pub tabs: Vec<Tab>,
    pub details: Option<String>,
}

/// Everything the presentation layer needs to draw the dashboard
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardLayout {
    pub title: String,
    pub sidebar: Sidebar,
    pub content: Content,
}

impl DashboardLayout {
    pub fn from_fit(
        fit: &FitResult,
        config: &GuiConfig,
        meta_config: Option<&MetaConfig>,
        meta: &MetaValues,
        plots: &PlotRegistry,
    ) -> Self {
        Self {
            title: config.name.clone(),
            sidebar: Sidebar {
                prior: prior_rows(fit, config),
                meta: meta_fields(meta_config, meta),
            },
            content: Content {
                model_name: fit.model().name().to_owned(),
                latex: fit.model().latex().map(str::to_owned),
                description: fit.model().description().map(str::to_owned),
                summary: fit.summary(),
                tabs: plots
                    .render_all(fit)
                    .into_iter()
                    .map(|(label, figure)| Tab { label, figure })
                    .collect(),
                details: config.show_details.then(|| details_table(fit)),
            },
        }
    }

    pub fn prior_fields(&self) -> impl Iterator<Item = &PriorField> {
        self.sidebar.prior.iter().flat_map(|row| [&row.mean, &row.sdev])
    }

    /// Event the dashboard would send if nothing was edited
    pub fn echo_event(&self) -> FormEvent {
        let entries: Vec<_> = self
            .prior_fields()
            .map(|f| FlatFormEntry::new(&f.id.name, f.value))
            .collect();
        let meta = self.sidebar.meta.iter().map(|f| f.value.clone()).collect();
        FormEvent::from_entries(&entries, meta)
    }
}

fn prior_rows(fit: &FitResult, config: &GuiConfig) -> Vec<PriorRow> {
    let field = |entry: FlatFormEntry| PriorField {
        text: config.format_prior_value(entry.value),
        value: entry.value,
        id: FieldId::prior(entry.qualified_id),
    };
    let labels = fit.prior().iter_estimates().map(|(label, _)| label);
    let mut entries = flatten(fit.prior()).into_iter();
    labels
        .filter_map(|label| {
            let mean = entries.next()?;
            let sdev = entries.next()?;
            Some(PriorRow {
                label,
                mean: field(mean),
                sdev: field(sdev),
            })
        })
        .collect()
}

fn meta_fields(meta_config: Option<&MetaConfig>, meta: &MetaValues) -> Vec<MetaField> {
    meta_config
        .into_iter()
        .flat_map(MetaConfig::iter)
        .map(|declaration| MetaField {
            name: declaration.name.clone(),
            label: declaration.display_label().to_owned(),
            widget: declaration.widget.clone(),
            value: meta
                .get(&declaration.name)
                .cloned()
                .unwrap_or(MetaValue::Empty),
        })
        .collect()
}

/// Data, posterior prediction and normalized residual per point
fn details_table(fit: &FitResult) -> String {
    let mut s = String::new();
    let prediction = fit.predict(fit.x());
    let residuals = fit.residuals();
    let _ = writeln!(s, "{:>8} {:>14} {:>20} {:>20} {:>10}", "key", "x", "y", "fit", "residual");
    let rows = fit
        .y()
        .parts()
        .into_iter()
        .zip(prediction.parts())
        .zip(residuals.parts());
    for (((key, y), (_, f)), (_, r)) in rows {
        let x = fit.data().x_for(key);
        for (i, ((y, f), r)) in y.iter().zip(f).zip(r).enumerate() {
            let x = x.get(i).map_or_else(|| i.to_string(), |x| format!("{x:.6}"));
            let _ = writeln!(
                s,
                "{:>8} {:>14} {:>20} {:>20} {:>10}",
                key.unwrap_or("-"),
                x,
                y.to_string(),
                f.map_or_else(|| "-".to_owned(), |f| f.to_string()),
                r.map_or_else(|| "-".to_owned(), |r| format!("{:.3}", r.mean()))
            );
        }
    }
    s
}
