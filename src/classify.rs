use crate::codec::flat::{FlatForm, flatten};
use crate::codec::meta::MetaValues;
use crate::parameters::ParameterSet;

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a form event changed compared to the last observed form
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Duplicate or echoed notification
    NoOp,
    /// Meta values are unchanged while prior fields differ
    PriorChanged,
    /// Meta values differ, prior fields are ignored
    MetaChanged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoOp => "no-op",
            Self::PriorChanged => "prior changed",
            Self::MetaChanged => "meta changed",
        })
    }
}

/// Last observed state of the form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FormSnapshot {
    prior: FlatForm,
    meta: MetaValues,
}

impl FormSnapshot {
    pub fn new(prior: FlatForm, meta: MetaValues) -> Self {
        Self { prior, meta }
    }

    /// Snapshot of the form showing `prior` and `meta`
    pub fn from_prior(prior: &ParameterSet, meta: MetaValues) -> Self {
        Self::new(flatten(prior).into_iter().collect(), meta)
    }

    pub fn prior(&self) -> &FlatForm {
        &self.prior
    }

    pub fn meta(&self) -> &MetaValues {
        &self.meta
    }

    /// Same snapshot with new prior fields
    pub fn with_prior(self, prior: FlatForm) -> Self {
        Self { prior, ..self }
    }

    pub fn meta_differs(&self, meta: &MetaValues) -> bool {
        !self.meta.same_as(meta)
    }

    /// Fields are compared by identifier, the order they were delivered in does not matter
    pub fn prior_differs(&self, prior: &FlatForm) -> bool {
        !self.prior.same_as(prior)
    }
}

/// Classify an observed form against `snapshot`, meta changes take precedence
pub fn classify(snapshot: &FormSnapshot, meta: &MetaValues, prior: &FlatForm) -> ChangeKind {
    if snapshot.meta_differs(meta) {
        ChangeKind::MetaChanged
    } else if snapshot.prior_differs(prior) {
        ChangeKind::PriorChanged
    } else {
        ChangeKind::NoOp
    }
}
