use crate::error::ConfigMismatchError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a meta control: a number, a text or nothing at all
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum MetaValue {
    Number(f64),
    Text(String),
    Empty,
}

impl MetaValue {
    /// Numeric value, text is parsed after trimming
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Number(x) => Some(*x),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Empty => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true` for a missing value or blank text
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
            Self::Empty => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Empty => "empty",
        }
    }

    // NaN == NaN so that a form showing NaN does not look changed forever
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{x:.0}"),
            Self::Number(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Empty => Ok(()),
        }
    }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self {
        Self::Number(x)
    }
}

impl From<i32> for MetaValue {
    fn from(x: i32) -> Self {
        Self::Number(x.into())
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Mapping from meta control name to its value
///
/// Equality does not depend on insertion order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct MetaValues(BTreeMap<String, MetaValue>);

impl MetaValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetaValue>) -> Option<MetaValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&MetaValue> {
        self.0.get(name)
    }

    /// Numeric value of `name`, numeric text is accepted too
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(MetaValue::to_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(MetaValue::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.same_as(v2))
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for MetaValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Kind of control a meta declaration is rendered as
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetaWidget {
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Text,
    Dropdown {
        options: Vec<String>,
    },
}

impl MetaWidget {
    /// Value in the representation the control holds
    ///
    /// Numeric text becomes a number for numeric controls, numbers become text for dropdowns since
    /// their options are text.
    pub fn coerce(&self, value: &MetaValue) -> MetaValue {
        match (self, value) {
            (Self::Number { .. }, MetaValue::Text(_)) => {
                value.to_f64().map_or_else(|| value.clone(), MetaValue::Number)
            }
            (Self::Dropdown { .. }, MetaValue::Number(_)) => MetaValue::Text(value.to_string()),
            _ => value.clone(),
        }
    }
}

/// Declaration of a single meta control
///
/// Serialized in the same flat shape the dashboard consumes, for example
/// `{"name": "n_poly", "type": "number", "min": 1, "max": 10, "step": 1}`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MetaDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub widget: MetaWidget,
}

impl MetaDeclaration {
    /// New numeric [MetaDeclaration] with optional bounds
    pub fn number(name: impl Into<String>, min: Option<f64>, max: Option<f64>, step: Option<f64>) -> Self {
        Self {
            name: name.into(),
            label: None,
            widget: MetaWidget::Number { min, max, step },
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            widget: MetaWidget::Text,
        }
    }

    pub fn dropdown<S: Into<String>>(name: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            label: None,
            widget: MetaWidget::Dropdown {
                options: options.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label shown next to the control, the name if no label is set
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Ordered list of meta control declarations
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct MetaConfig(Vec<MetaDeclaration>);

impl MetaConfig {
    pub fn new(declarations: Vec<MetaDeclaration>) -> Self {
        Self(declarations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetaDeclaration> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|d| d.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&MetaDeclaration> {
        self.0.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl MetaConfig {
    /// Coerce declared values with [MetaWidget::coerce], undeclared values are kept
    pub fn normalize(&self, values: &MetaValues) -> MetaValues {
        values
            .iter()
            .map(|(name, value)| match self.get(name) {
                Some(declaration) => (name, declaration.widget.coerce(value)),
                None => (name, value.clone()),
            })
            .collect()
    }
}

impl FromIterator<MetaDeclaration> for MetaConfig {
    fn from_iter<I: IntoIterator<Item = MetaDeclaration>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Pair positional form values with the declarations
///
/// Values are coerced with [MetaWidget::coerce], anything that cannot be coerced is kept as
/// delivered and left for validation.
pub fn decode(values: &[MetaValue], config: Option<&MetaConfig>) -> Result<MetaValues, ConfigMismatchError> {
    let config = match config {
        Some(config) => config,
        None if values.is_empty() => return Ok(MetaValues::new()),
        None => return Err(ConfigMismatchError::ValuesWithoutConfig(values.len())),
    };
    if values.is_empty() && !config.is_empty() {
        return Err(ConfigMismatchError::ConfigWithoutValues(config.len()));
    }
    if values.len() != config.len() {
        return Err(ConfigMismatchError::LengthMismatch {
            declarations: config.len(),
            values: values.len(),
        });
    }
    Ok(config
        .iter()
        .zip(values)
        .map(|(declaration, value)| (declaration.name.clone(), declaration.widget.coerce(value)))
        .collect())
}

/// Fill empty or missing entries of `decoded` from `defaults`
///
/// The result has exactly the keys of `defaults`.
pub fn merge_with_defaults(decoded: &MetaValues, defaults: &MetaValues) -> MetaValues {
    defaults
        .iter()
        .map(|(name, default)| {
            let value = decoded
                .get(name)
                .filter(|v| !v.is_empty())
                .unwrap_or(default);
            (name, value.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MetaConfig {
        [
            MetaDeclaration::number("n_poly", Some(1.0), Some(10.0), Some(1.0)),
            MetaDeclaration::dropdown("kind", ["exp", "poly"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn declaration_json_shape() {
        let json = r#"[
            {"name": "n_poly", "type": "number", "min": 1, "max": 10, "step": 1},
            {"name": "kind", "type": "dropdown", "options": ["exp", "poly"]}
        ]"#;
        let parsed: MetaConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, config());
        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value[0]["type"], "number");
        assert_eq!(value[0]["max"], 10.0);
        assert!(value[1].get("label").is_none());
    }

    #[test]
    fn decode_pairs_positionally() {
        let values = vec![MetaValue::Text("4".into()), MetaValue::from("exp")];
        let decoded = decode(&values, Some(&config())).unwrap();
        assert_eq!(decoded.get("n_poly"), Some(&MetaValue::Number(4.0)));
        assert_eq!(decoded.text("kind"), Some("exp"));
    }

    #[test]
    fn dropdown_numbers_become_text() {
        let config: MetaConfig = [MetaDeclaration::dropdown("n", ["2", "4"])].into_iter().collect();
        let from_number = decode(&[MetaValue::Number(4.0)], Some(&config)).unwrap();
        let from_text = decode(&[MetaValue::from("4")], Some(&config)).unwrap();
        assert_eq!(from_number, from_text);
        assert_eq!(from_text.text("n"), Some("4"));

        let defaults = config.normalize(&MetaValues::new().with("n", 4).with("other", 1));
        assert_eq!(defaults, MetaValues::new().with("n", "4").with("other", 1));
        assert!(defaults.same_as(&merge_with_defaults(&from_text, &defaults)));
    }

    #[test]
    fn decode_asymmetric() {
        assert_eq!(
            decode(&[MetaValue::Number(1.0)], None),
            Err(ConfigMismatchError::ValuesWithoutConfig(1))
        );
        assert_eq!(
            decode(&[], Some(&config())),
            Err(ConfigMismatchError::ConfigWithoutValues(2))
        );
        assert_eq!(
            decode(&[MetaValue::Number(1.0)], Some(&config())),
            Err(ConfigMismatchError::LengthMismatch {
                declarations: 2,
                values: 1
            })
        );
        assert_eq!(decode(&[], None), Ok(MetaValues::new()));
    }

    #[test]
    fn defaults_fill_blanks() {
        let defaults = MetaValues::new().with("n_poly", 3).with("kind", "poly");
        let decoded = MetaValues::new()
            .with("n_poly", MetaValue::Empty)
            .with("kind", "exp")
            .with("unknown", 1);
        let merged = merge_with_defaults(&decoded, &defaults);
        assert_eq!(merged, MetaValues::new().with("n_poly", 3).with("kind", "exp"));
    }

    #[test]
    fn null_is_empty() {
        let v: Vec<MetaValue> = serde_json::from_str(r#"[null, 2, "a"]"#).unwrap();
        assert_eq!(v, [MetaValue::Empty, MetaValue::Number(2.0), MetaValue::from("a")]);
        assert_eq!(MetaValue::Number(4.0).to_string(), "4");
        assert_eq!(MetaValue::Number(0.5).to_string(), "0.5");
    }
}
