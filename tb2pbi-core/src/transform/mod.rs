//! Translation of the workbook model into the tabular model.

mod mquery;
mod translate;
mod types;

pub use mquery::placeholder_expression;
pub use translate::{translate_datasource, translate_field, translate_workbook};
pub use types::{
    is_identifier_name, map_datatype, map_declared_type, parse_aggregation, summarize_for,
};
