use crate::codec::meta::MetaValues;
use crate::fit::result::FitResult;
use crate::fit::solver::FitMetrics;
use crate::parameters::{ParameterSet, ParameterValue};

use serde::{Serialize, Serializer};

/// Parameters as a JSON object keeping insertion order
#[derive(Clone, Debug, PartialEq)]
pub struct ExportedParameters(Vec<(String, ParameterValue)>);

impl From<&ParameterSet> for ExportedParameters {
    fn from(params: &ParameterSet) -> Self {
        Self(
            params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.clone()))
                .collect(),
        )
    }
}

impl Serialize for ExportedParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Prior and posterior of a fit in a transport-friendly shape
///
/// Every parameter is `{"mean": .., "sdev": ..}` or an array of such objects.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExportedPrior {
    pub model: String,
    pub prior: ExportedParameters,
    pub posterior: ExportedParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FitMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaValues>,
}

impl ExportedPrior {
    pub fn from_fit(fit: &FitResult) -> Self {
        Self {
            model: fit.model().name().to_owned(),
            prior: fit.prior().into(),
            posterior: fit.posterior().into(),
            metrics: fit.metrics().cloned(),
            meta: fit.meta().cloned(),
        }
    }
}

/// Pretty-printed JSON export of a fit
pub fn export_json(fit: &FitResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ExportedPrior::from_fit(fit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::ScalarEstimate;
    use crate::fit::data::FitData;
    use crate::fit::model::FitModel;

    use serde_json::json;

    #[test]
    fn nested_mean_sdev() {
        let data = FitData::y_only(vec![ScalarEstimate::new(1.0, 0.1)]).unwrap();
        let model = FitModel::new("const", |_, p| vec![p.scalar("z").unwrap()].into());
        let prior = ParameterSet::new()
            .with_scalar("z", 0.0, 1.0)
            .with_array("a", &[(1.0, 0.5), (2.0, 0.5)]);
        let fit = FitResult::new(data, model, prior.clone(), prior, None)
            .with_meta(MetaValues::new().with("n", 2));
        let value: serde_json::Value = serde_json::from_str(&export_json(&fit).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "const",
                "prior": {
                    "z": {"mean": 0.0, "sdev": 1.0},
                    "a": [{"mean": 1.0, "sdev": 0.5}, {"mean": 2.0, "sdev": 0.5}],
                },
                "posterior": {
                    "z": {"mean": 0.0, "sdev": 1.0},
                    "a": [{"mean": 1.0, "sdev": 0.5}, {"mean": 2.0, "sdev": 0.5}],
                },
                "meta": {"n": 2.0},
            })
        );
    }

    #[test]
    fn keys_keep_insertion_order() {
        let params = ParameterSet::new()
            .with_scalar("z", 0.0, 1.0)
            .with_scalar("a", 0.0, 1.0);
        let json = serde_json::to_string(&ExportedParameters::from(&params)).unwrap();
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
    }
}
