//! Conversions between the dashboard form and structured values

pub mod flat;
pub use flat::{
    FlatForm, FlatFormEntry, Moment, QualifiedId, flatten, parse_qualified_id, unflatten,
};

pub mod meta;
pub use meta::{
    MetaConfig, MetaDeclaration, MetaValue, MetaValues, MetaWidget, decode, merge_with_defaults,
};
