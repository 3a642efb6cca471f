//! Type and aggregation mapping from Tableau fields to tabular columns.

use crate::model::{DataType, FieldDescriptor, SourceType, SummarizeBy};

/// Map a declared source type to the target data type.
pub fn map_datatype(source: &SourceType) -> DataType {
    match source {
        SourceType::Integer => DataType::Int64,
        SourceType::Real => DataType::Double,
        SourceType::String => DataType::String,
        SourceType::Date | SourceType::DateTime => DataType::DateTime,
        SourceType::Boolean => DataType::Boolean,
        SourceType::Other(_) => DataType::String,
    }
}

/// Map a free-text declared type to the target data type.
pub fn map_declared_type(declared: &str) -> DataType {
    map_datatype(&SourceType::parse(declared))
}

/// Parse a Tableau aggregation hint.
pub fn parse_aggregation(hint: &str) -> Option<SummarizeBy> {
    match hint.trim().to_lowercase().as_str() {
        "sum" => Some(SummarizeBy::Sum),
        "avg" | "average" => Some(SummarizeBy::Average),
        "min" => Some(SummarizeBy::Min),
        "max" => Some(SummarizeBy::Max),
        "count" => Some(SummarizeBy::Count),
        "countd" => Some(SummarizeBy::DistinctCount),
        _ => None,
    }
}

/// Whether a field name looks like a key or identifier.
pub fn is_identifier_name(name: &str) -> bool {
    let name = name.trim();
    let lower = name.to_lowercase();

    if lower == "id" || lower == "key" {
        return true;
    }

    // Camel-case suffixes are case-sensitive so that `Paid` is not an id.
    if name.ends_with("ID") || name.ends_with("Id") || name.ends_with("Key") {
        return true;
    }

    ["_id", "_key", " id", " key"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

/// Default aggregation for a field, `None` when the column gets no `summarizeBy`.
///
/// Measures and numeric fields aggregate by their hint, else by sum.
/// Identifier fields among them are not aggregated at all.
pub fn summarize_for(field: &FieldDescriptor) -> Option<SummarizeBy> {
    let numeric = map_datatype(&field.source_type()).is_numeric();
    if !field.is_measure() && !numeric {
        return None;
    }

    if is_identifier_name(&field.raw_name) || is_identifier_name(&field.name) {
        return Some(SummarizeBy::None);
    }

    Some(
        field
            .aggregation
            .as_deref()
            .and_then(parse_aggregation)
            .unwrap_or(SummarizeBy::Sum),
    )
}
