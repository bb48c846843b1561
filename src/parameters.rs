use crate::estimate::ScalarEstimate;

use itertools::Itertools;
use ndarray::Array2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Label used for array elements when a parameter set is flattened
pub const ARRAY_LABEL: &str = "__array_";

/// Label of a single flattened estimate: `key` or `key__array_{index}`
pub fn element_label(key: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{key}{ARRAY_LABEL}{i}"),
        None => key.to_owned(),
    }
}

/// Value of a single named parameter
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum ParameterValue {
    Scalar(ScalarEstimate),
    Array(Vec<ScalarEstimate>),
}

impl ParameterValue {
    /// Number of estimates this value flattens to
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Array(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn estimates(&self) -> &[ScalarEstimate] {
        match self {
            Self::Scalar(x) => std::slice::from_ref(x),
            Self::Array(v) => v,
        }
    }
}

impl From<ScalarEstimate> for ParameterValue {
    fn from(x: ScalarEstimate) -> Self {
        Self::Scalar(x)
    }
}

impl From<Vec<ScalarEstimate>> for ParameterValue {
    fn from(v: Vec<ScalarEstimate>) -> Self {
        Self::Array(v)
    }
}

/// Ordered collection of named parameter estimates, used for both priors and posteriors
///
/// Keys are unique and keep insertion order. An optional correlation matrix spans all flattened
/// estimates in the same order as [ParameterSet::iter_estimates], no matrix means the estimates
/// are independent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParameterValue)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation: Option<Array2<f64>>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter, keeping the position of an existing key
    ///
    /// The correlation matrix is dropped because it may no longer match the flattened layout.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) {
        let key = key.into();
        let value = value.into();
        self.correlation = None;
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_scalar(self, key: impl Into<String>, mean: f64, sdev: f64) -> Self {
        self.with(key, ScalarEstimate::new(mean, sdev))
    }

    pub fn with_array(self, key: impl Into<String>, values: &[(f64, f64)]) -> Self {
        let array: Vec<_> = values
            .iter()
            .map(|&(mean, sdev)| ScalarEstimate::new(mean, sdev))
            .collect();
        self.with(key, array)
    }

    /// Attach a correlation matrix, panics if its shape does not match the number of estimates
    pub fn with_correlation(mut self, correlation: Array2<f64>) -> Self {
        let n = self.n_estimates();
        assert_eq!(
            correlation.dim(),
            (n, n),
            "correlation matrix must be square with a side equal to the number of estimates"
        );
        self.correlation = Some(correlation);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of named parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of scalar estimates after flattening
    pub fn n_estimates(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.len()).sum()
    }

    /// All estimates in flattening order, labelled with [element_label]
    pub fn iter_estimates(&self) -> impl Iterator<Item = (String, &ScalarEstimate)> {
        self.entries.iter().flat_map(|(key, value)| {
            let is_array = value.is_array();
            value.estimates().iter().enumerate().map(move |(i, x)| {
                let index = if is_array { Some(i) } else { None };
                (element_label(key, index), x)
            })
        })
    }

    pub fn correlation(&self) -> Option<&Array2<f64>> {
        self.correlation.as_ref()
    }

    /// Correlation matrix of the flattened estimates, identity when none is attached
    pub fn correlation_matrix(&self) -> Array2<f64> {
        match &self.correlation {
            Some(c) => c.clone(),
            None => Array2::eye(self.n_estimates()),
        }
    }

    pub fn covariance_matrix(&self) -> Array2<f64> {
        let sdev: Vec<_> = self.iter_estimates().map(|(_, x)| x.sdev()).collect();
        let mut cov = self.correlation_matrix();
        for ((i, j), c) in cov.indexed_iter_mut() {
            *c *= sdev[i] * sdev[j];
        }
        cov
    }

    /// Means of all estimates with the same structure
    pub fn means(&self) -> ParameterPoint {
        ParameterPoint {
            entries: self
                .entries
                .iter()
                .map(|(key, value)| {
                    let point = match value {
                        ParameterValue::Scalar(x) => PointValue::Scalar(x.mean()),
                        ParameterValue::Array(v) => {
                            PointValue::Array(v.iter().map(ScalarEstimate::mean).collect())
                        }
                    };
                    (key.clone(), point)
                })
                .collect(),
        }
    }

    /// Same structure as `self` filled with the given estimates in flattening order
    ///
    /// Returns `None` if the number of estimates is wrong.
    pub fn with_same_shape(&self, estimates: &[ScalarEstimate]) -> Option<Self> {
        if estimates.len() != self.n_estimates() {
            return None;
        }
        let mut it = estimates.iter().copied();
        let entries = self
            .entries
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    ParameterValue::Scalar(_) => ParameterValue::Scalar(it.next()?),
                    ParameterValue::Array(v) => {
                        ParameterValue::Array(it.by_ref().take(v.len()).collect())
                    }
                };
                Some((key.clone(), value))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            entries,
            correlation: None,
        })
    }

    /// Whether both sets have the same keys, array flags and lengths in the same order
    pub fn same_shape(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip_eq(other.entries.iter())
                .all(|((k1, v1), (k2, v2))| {
                    k1 == k2 && v1.is_array() == v2.is_array() && v1.len() == v2.len()
                })
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<ParameterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Plain value of a single parameter, the mean-only counterpart of [ParameterValue]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PointValue {
    Scalar(f64),
    Array(Vec<f64>),
}

impl PointValue {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Scalar(x) => std::slice::from_ref(x),
            Self::Array(v) => v,
        }
    }
}

/// Parameter values passed to a [crate::FitModel]
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterPoint {
    entries: Vec<(String, PointValue)>,
}

impl ParameterPoint {
    pub fn get(&self, key: &str) -> Option<&PointValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Value of a scalar parameter
    pub fn scalar(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            PointValue::Scalar(x) => Some(*x),
            PointValue::Array(_) => None,
        }
    }

    /// Values of an array parameter
    pub fn array(&self, key: &str) -> Option<&[f64]> {
        match self.get(key)? {
            PointValue::Array(v) => Some(v),
            PointValue::Scalar(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PointValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_flat_vec(&self) -> Vec<f64> {
        self.entries
            .iter()
            .flat_map(|(_, v)| v.as_slice().iter().copied())
            .collect()
    }

    /// Overwrite values in flattening order, `flat` must have the same total length
    pub(crate) fn set_flat(&mut self, flat: &[f64]) {
        let mut it = flat.iter().copied();
        for (_, value) in self.entries.iter_mut() {
            match value {
                PointValue::Scalar(x) => *x = it.next().expect("flat vector is too short"),
                PointValue::Array(v) => {
                    for x in v.iter_mut() {
                        *x = it.next().expect("flat vector is too short");
                    }
                }
            }
        }
    }
}

impl Index<&str> for ParameterPoint {
    type Output = PointValue;

    fn index(&self, key: &str) -> &Self::Output {
        self.get(key)
            .unwrap_or_else(|| panic!("parameter {key:?} is not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    fn prior() -> ParameterSet {
        ParameterSet::new()
            .with_scalar("slope", 0.5, 0.4)
            .with_array("a", &[(0.0, 1.0), (1.0, 2.0)])
    }

    #[test]
    fn insert_keeps_position() {
        let mut p = prior();
        p.insert("slope", ScalarEstimate::new(1.0, 1.0));
        assert_eq!(p.keys().collect::<Vec<_>>(), ["slope", "a"]);
        assert_eq!(
            p.get("slope"),
            Some(&ParameterValue::Scalar(ScalarEstimate::new(1.0, 1.0)))
        );
    }

    #[test]
    fn estimates_are_labelled_in_order() {
        let labels: Vec<_> = prior().iter_estimates().map(|(l, _)| l).collect();
        assert_eq!(labels, ["slope", "a__array_0", "a__array_1"]);
    }

    #[test]
    fn covariance_is_diagonal_without_correlation() {
        let cov = ParameterSet::new()
            .with_scalar("x", 1.0, 0.5)
            .with_array("a", &[(0.0, 1.0), (1.0, 2.0)])
            .covariance_matrix();
        assert_eq!(cov, array![[0.25, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 4.0]]);
    }

    #[test]
    fn correlated_covariance() {
        let p = ParameterSet::new()
            .with_scalar("x", 0.0, 2.0)
            .with_scalar("y", 0.0, 3.0)
            .with_correlation(array![[1.0, 0.5], [0.5, 1.0]]);
        assert_eq!(p.covariance_matrix(), array![[4.0, 3.0], [3.0, 9.0]]);
    }

    #[test]
    #[should_panic]
    fn correlation_shape_is_checked() {
        let _ = prior().with_correlation(Array2::eye(2));
    }

    #[test]
    fn means_keep_structure() {
        let point = prior().means();
        assert_eq!(point.scalar("slope"), Some(0.5));
        assert_eq!(point.array("a"), Some(&[0.0, 1.0][..]));
        assert_eq!(point.to_flat_vec(), vec![0.5, 0.0, 1.0]);
        assert_eq!(point.scalar("a"), None);
    }

    #[test]
    fn same_shape_refill() {
        let p = prior();
        let estimates = vec![ScalarEstimate::new(1.0, 1.0); 3];
        let q = p.with_same_shape(&estimates).unwrap();
        assert!(p.same_shape(&q));
        assert_ne!(p, q);
        assert!(p.with_same_shape(&estimates[..2]).is_none());
    }

    #[test]
    fn json_shape() {
        let p = ParameterSet::new().with_scalar("x", 1.0, 0.5);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"entries": [["x", {"mean": 1.0, "sdev": 0.5}]]})
        );
    }
}
