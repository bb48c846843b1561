use crate::error::DecodeError;
use crate::estimate::ScalarEstimate;
use crate::event::{FieldId, FormValue};
use crate::parameters::{ARRAY_LABEL, ParameterSet, ParameterValue, element_label};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which moment of an estimate a form field holds
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Moment {
    Mean,
    Sdev,
}

impl Moment {
    pub const ALL: [Moment; 2] = [Moment::Mean, Moment::Sdev];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sdev => "sdev",
        }
    }

    fn of(&self, x: &ScalarEstimate) -> f64 {
        match self {
            Self::Mean => x.mean(),
            Self::Sdev => x.sdev(),
        }
    }
}

/// Structured form of a qualified form field identifier
///
/// `slope-mean` is `{key: "slope", index: None, moment: Mean}`, `a__array_2-sdev` is
/// `{key: "a", index: Some(2), moment: Sdev}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedId {
    pub key: String,
    pub index: Option<usize>,
    pub moment: Moment,
}

impl QualifiedId {
    pub fn new(key: impl Into<String>, index: Option<usize>, moment: Moment) -> Self {
        Self {
            key: key.into(),
            index,
            moment,
        }
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            element_label(&self.key, self.index),
            self.moment.as_str()
        )
    }
}

impl FromStr for QualifiedId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, moment) = s.rsplit_once('-').ok_or(())?;
        let moment = match moment {
            "mean" => Moment::Mean,
            "sdev" => Moment::Sdev,
            _ => return Err(()),
        };
        let (key, index) = match label.rsplit_once(ARRAY_LABEL) {
            Some((key, index)) => (key, Some(index.parse::<usize>().map_err(|_| ())?)),
            None => (label, None),
        };
        if key.is_empty() {
            return Err(());
        }
        Ok(Self::new(key, index, moment))
    }
}

/// Parse a qualified identifier, `None` if it does not follow the naming scheme
pub fn parse_qualified_id(s: &str) -> Option<QualifiedId> {
    s.parse().ok()
}

/// A single form field: qualified identifier and numeric value
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FlatFormEntry {
    pub qualified_id: String,
    pub value: f64,
}

impl FlatFormEntry {
    pub fn new(qualified_id: impl Into<String>, value: f64) -> Self {
        Self {
            qualified_id: qualified_id.into(),
            value,
        }
    }
}

/// Flattened form keyed by qualified identifier
///
/// Comparison is by identifier, the order fields were delivered in does not matter.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatForm(BTreeMap<String, f64>);

impl FlatForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip identifiers with raw form values
    ///
    /// Text values are parsed as numbers, lengths must agree and identifiers must be unique.
    pub fn from_fields(ids: &[FieldId], values: &[FormValue]) -> Result<Self, DecodeError> {
        if ids.len() != values.len() {
            return Err(DecodeError::LengthMismatch {
                ids: ids.len(),
                values: values.len(),
            });
        }
        let mut form = Self::new();
        for (id, value) in ids.iter().zip(values) {
            let number = value.to_f64().ok_or_else(|| DecodeError::InvalidNumber {
                field: id.name.clone(),
                value: value.to_string(),
            })?;
            if form.0.insert(id.name.clone(), number).is_some() {
                return Err(DecodeError::DuplicateField(id.name.clone()));
            }
        }
        Ok(form)
    }

    pub fn get(&self, qualified_id: &str) -> Option<f64> {
        self.0.get(qualified_id).copied()
    }

    pub fn insert(&mut self, qualified_id: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(qualified_id.into(), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same identifiers and values, NaN is equal to NaN
    pub fn same_as(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && same_number(*v1, *v2))
    }

    fn has_any_field_of(&self, key: &str, value: &ParameterValue) -> bool {
        let index = |i| if value.is_array() { Some(i) } else { None };
        (0..value.len()).any(|i| {
            Moment::ALL
                .iter()
                .any(|&m| self.0.contains_key(&QualifiedId::new(key, index(i), m).to_string()))
        })
    }
}

impl FromIterator<FlatFormEntry> for FlatForm {
    fn from_iter<I: IntoIterator<Item = FlatFormEntry>>(iter: I) -> Self {
        Self(iter.into_iter().map(|e| (e.qualified_id, e.value)).collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for FlatForm {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
    }
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Flatten a parameter set into form entries
///
/// Keys keep insertion order, every estimate emits its `-mean` entry followed by `-sdev`.
pub fn flatten(params: &ParameterSet) -> Vec<FlatFormEntry> {
    params
        .iter()
        .flat_map(|(key, value)| {
            let is_array = value.is_array();
            value
                .estimates()
                .iter()
                .enumerate()
                .flat_map(move |(i, x)| {
                    let index = if is_array { Some(i) } else { None };
                    Moment::ALL.into_iter().map(move |m| {
                        FlatFormEntry::new(QualifiedId::new(key, index, m).to_string(), m.of(x))
                    })
                })
        })
        .collect()
}

/// Rebuild a parameter set from form entries
///
/// `shape_hint` only tells which keys exist, which of them are arrays and how long they are, all
/// values come from `entries`. Entries not described by the hint are ignored.
pub fn unflatten(entries: &FlatForm, shape_hint: &ParameterSet) -> Result<ParameterSet, DecodeError> {
    let mut params = ParameterSet::new();
    for (key, hint) in shape_hint.iter() {
        if !entries.has_any_field_of(key, hint) {
            return Err(DecodeError::MissingParameter(key.to_owned()));
        }
        let estimate = |index: Option<usize>| -> Result<ScalarEstimate, DecodeError> {
            let field = |m| {
                let id = QualifiedId::new(key, index, m).to_string();
                entries.get(&id).ok_or(DecodeError::MissingField(id))
            };
            let mean = field(Moment::Mean)?;
            let sdev = field(Moment::Sdev)?;
            ScalarEstimate::try_new(mean, sdev).map_err(|source| DecodeError::InvalidEstimate {
                field: element_label(key, index),
                source,
            })
        };
        match hint {
            ParameterValue::Scalar(_) => params.insert(key, estimate(None)?),
            ParameterValue::Array(v) => {
                let array = (0..v.len())
                    .map(|i| estimate(Some(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                params.insert(key, array)
            }
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(mean: f64, sdev: f64) -> ScalarEstimate {
        ScalarEstimate::new(mean, sdev)
    }

    #[test]
    fn flatten_scalar_and_array() {
        let p = ParameterSet::new()
            .with_scalar("slope", 0.5, 0.4)
            .with_array("a", &[(0.0, 1.0), (1.0, 2.0)]);
        let ids: Vec<_> = flatten(&p).into_iter().map(|e| e.qualified_id).collect();
        assert_eq!(
            ids,
            [
                "slope-mean",
                "slope-sdev",
                "a__array_0-mean",
                "a__array_0-sdev",
                "a__array_1-mean",
                "a__array_1-sdev",
            ]
        );
    }

    #[test]
    fn round_trip() {
        let p = ParameterSet::new()
            .with_scalar("slope", 0.5, 0.4)
            .with_array("E", &[(1.0, 0.4), (2.0, 0.4), (3.0, 0.4)])
            .with_scalar("b", -3.0, 1e-3);
        let form: FlatForm = flatten(&p).into_iter().collect();
        let restored = unflatten(&form, &p).unwrap();
        assert_eq!(restored, p);
    }

    #[test]
    fn array_index_order_is_numeric() {
        let values: Vec<_> = (0..12).map(|i| (i as f64, 1.0)).collect();
        let p = ParameterSet::new().with_array("a", &values);
        let form: FlatForm = flatten(&p).into_iter().collect();
        let restored = unflatten(&form, &p).unwrap();
        match restored.get("a").unwrap() {
            ParameterValue::Array(v) => {
                let means: Vec<_> = v.iter().map(|x| x.mean()).collect();
                assert_eq!(means, (0..12).map(|i| i as f64).collect::<Vec<_>>());
            }
            _ => panic!("array expected"),
        }
    }

    #[test]
    fn values_come_from_entries() {
        let hint = ParameterSet::new().with_scalar("slope", 0.5, 0.4);
        let form: FlatForm = [("slope-mean", 0.5), ("slope-sdev", 2.0)].into_iter().collect();
        let p = unflatten(&form, &hint).unwrap();
        assert_eq!(p.get("slope"), Some(&ParameterValue::Scalar(est(0.5, 2.0))));
    }

    #[test]
    fn missing_field() {
        let hint = ParameterSet::new().with_scalar("slope", 0.5, 0.4);
        let form: FlatForm = [("slope-mean", 0.5)].into_iter().collect();
        assert_eq!(
            unflatten(&form, &hint),
            Err(DecodeError::MissingField("slope-sdev".into()))
        );
    }

    #[test]
    fn missing_parameter_is_not_skipped() {
        let hint = ParameterSet::new()
            .with_scalar("slope", 0.5, 0.4)
            .with_scalar("offset", 0.0, 1.0);
        let form: FlatForm = [("slope-mean", 0.5), ("slope-sdev", 0.4)].into_iter().collect();
        assert_eq!(
            unflatten(&form, &hint),
            Err(DecodeError::MissingParameter("offset".into()))
        );
    }

    #[test]
    fn invalid_sdev_is_reported_by_label() {
        let hint = ParameterSet::new().with_array("a", &[(0.0, 1.0)]);
        let form: FlatForm = [("a__array_0-mean", 0.0), ("a__array_0-sdev", 0.0)]
            .into_iter()
            .collect();
        assert!(matches!(
            unflatten(&form, &hint),
            Err(DecodeError::InvalidEstimate { field, .. }) if field == "a__array_0"
        ));
    }

    #[test]
    fn parse_ids() {
        assert_eq!(
            parse_qualified_id("a__array_10-sdev"),
            Some(QualifiedId::new("a", Some(10), Moment::Sdev))
        );
        assert_eq!(
            parse_qualified_id("log-amp-mean"),
            Some(QualifiedId::new("log-amp", None, Moment::Mean))
        );
        assert_eq!(parse_qualified_id("slope"), None);
        assert_eq!(parse_qualified_id("a__array_x-mean"), None);
        assert_eq!(parse_qualified_id("-mean"), None);
        let id = QualifiedId::new("E", Some(3), Moment::Mean);
        assert_eq!(parse_qualified_id(&id.to_string()), Some(id));
    }

    #[test]
    fn fields_from_form() {
        let ids = vec![FieldId::prior("slope-mean"), FieldId::prior("slope-sdev")];
        let values = vec![FormValue::Text("5.0000e-01".into()), FormValue::Number(2.0)];
        let form = FlatForm::from_fields(&ids, &values).unwrap();
        assert_eq!(form.get("slope-mean"), Some(0.5));
        assert_eq!(form.get("slope-sdev"), Some(2.0));

        assert_eq!(
            FlatForm::from_fields(&ids, &values[..1]).unwrap_err(),
            DecodeError::LengthMismatch { ids: 2, values: 1 }
        );
        let bad = vec![FormValue::Text("abc".into()), FormValue::Number(2.0)];
        assert!(matches!(
            FlatForm::from_fields(&ids, &bad),
            Err(DecodeError::InvalidNumber { .. })
        ));
        let dup = vec![FieldId::prior("slope-mean"), FieldId::prior("slope-mean")];
        assert_eq!(
            FlatForm::from_fields(&dup, &values).unwrap_err(),
            DecodeError::DuplicateField("slope-mean".into())
        );
    }

    #[test]
    fn same_as_ignores_delivery_order() {
        let a: FlatForm = [("x-mean", 1.0), ("x-sdev", f64::NAN)].into_iter().collect();
        let b: FlatForm = [("x-sdev", f64::NAN), ("x-mean", 1.0)].into_iter().collect();
        assert!(a.same_as(&b));
        let c: FlatForm = [("x-sdev", 1.0), ("x-mean", 1.0)].into_iter().collect();
        assert!(!a.same_as(&c));
    }
}
