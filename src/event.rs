use crate::codec::flat::FlatFormEntry;
use crate::codec::meta::MetaValue;

use serde::{Deserialize, Serialize};

/// Raw value delivered by a form control, numbers may arrive as text
pub type FormValue = MetaValue;

/// Identifier of a form control as delivered by the dashboard
///
/// Only `name` is used to recover the qualified identifier, `kind` is whatever the dashboard
/// tagged the control with.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FieldId {
    #[serde(rename = "type", default = "FieldId::default_kind")]
    pub kind: String,
    pub name: String,
}

impl FieldId {
    pub const PRIOR_KIND: &'static str = "prior";

    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Identifier of a prior field
    pub fn prior(name: impl Into<String>) -> Self {
        Self::new(Self::PRIOR_KIND, name)
    }

    fn default_kind() -> String {
        Self::PRIOR_KIND.to_owned()
    }
}

/// Snapshot of the whole form delivered on every change notification
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FormEvent {
    #[serde(default)]
    pub parameter_ids: Vec<FieldId>,
    #[serde(default)]
    pub parameter_values: Vec<FormValue>,
    #[serde(default)]
    pub meta_values: Vec<FormValue>,
}

impl FormEvent {
    pub fn new(
        parameter_ids: Vec<FieldId>,
        parameter_values: Vec<FormValue>,
        meta_values: Vec<FormValue>,
    ) -> Self {
        Self {
            parameter_ids,
            parameter_values,
            meta_values,
        }
    }

    /// Event holding the given prior fields in order
    pub fn from_entries(entries: &[FlatFormEntry], meta_values: Vec<FormValue>) -> Self {
        let (parameter_ids, parameter_values) = entries
            .iter()
            .map(|e| (FieldId::prior(&e.qualified_id), FormValue::Number(e.value)))
            .unzip();
        Self::new(parameter_ids, parameter_values, meta_values)
    }

    /// Replace the value of the field `name`, returns `false` if no such field exists
    pub fn set_parameter(&mut self, name: &str, value: impl Into<FormValue>) -> bool {
        match self.parameter_ids.iter().position(|id| id.name == name) {
            Some(i) if i < self.parameter_values.len() => {
                self.parameter_values[i] = value.into();
                true
            }
            _ => false,
        }
    }
}
