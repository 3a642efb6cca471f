//! Workbook to tabular model translation.

use super::mquery::placeholder_expression;
use super::types::{map_datatype, summarize_for};
use crate::config::{
    ConvertOptions, ANNOTATION_CALCULATED_FIELDS, ANNOTATION_CALCULATED_FIELD_COUNT,
    ANNOTATION_CAPTION, ANNOTATION_PARAMETERS, ANNOTATION_QUERY_ORDER,
    ANNOTATION_SERIALIZE_OPTIONS, ANNOTATION_SOURCE_FIELD_COUNT, DEFAULT_COLUMN_NAME,
    SERIALIZE_OPTIONS,
};
use crate::model::{
    Annotation, ColumnDefinition, DataSourceDescriptor, DataType, FieldDescriptor,
    PartitionDefinition, TableDefinition, TabularModel, Workbook,
};
use crate::parser::sanitize_name;
use serde_json::{json, Value};

/// Translate a workbook into a tabular model.
///
/// Each data source becomes one table, in document order. Duplicate data
/// source names yield duplicate tables. The result depends only on the
/// workbook and the options, so repeated translations serialize identically.
pub fn translate_workbook(workbook: &Workbook, options: &ConvertOptions) -> TabularModel {
    let mut model = TabularModel::new(&options.model_name, &options.culture);

    model.model.tables = workbook.datasources.iter().map(translate_datasource).collect();
    model.model.annotations = model_annotations(workbook, &model.model.tables);

    tracing::debug!(
        tables = model.model.tables.len(),
        columns = model.model.tables.iter().map(|t| t.columns.len()).sum::<usize>(),
        "Translated workbook"
    );

    model
}

/// Translate one data source into a table.
pub fn translate_datasource(datasource: &DataSourceDescriptor) -> TableDefinition {
    let name = sanitize_name(&datasource.name);

    let mut columns: Vec<ColumnDefinition> = datasource.fields.iter().map(translate_field).collect();

    if columns.is_empty() {
        let mut placeholder = ColumnDefinition::new(DEFAULT_COLUMN_NAME, DataType::String);
        placeholder.is_hidden = true;
        columns.push(placeholder);
    }

    let partition = PartitionDefinition::import_m(
        format!("{}_Partition", name),
        placeholder_expression(&columns),
    );

    let mut annotations = Vec::new();
    if !datasource.calculated_fields.is_empty() {
        let calculations: Vec<Value> = datasource
            .calculated_fields
            .iter()
            .map(|calc| {
                let mut entry = json!({
                    "name": calc.name,
                    "formula": calc.formula,
                    "dependencies": calc.dependencies,
                });
                if let Some(caption) = &calc.caption {
                    entry["caption"] = json!(caption);
                }
                entry
            })
            .collect();
        annotations.push(Annotation::new(
            ANNOTATION_CALCULATED_FIELDS,
            Value::Array(calculations).to_string(),
        ));
    }

    TableDefinition {
        name,
        columns,
        partitions: vec![partition],
        annotations,
    }
}

/// Translate one field into a column.
pub fn translate_field(field: &FieldDescriptor) -> ColumnDefinition {
    let mut column = ColumnDefinition::new(&field.name, map_datatype(&field.source_type()));
    column.summarize_by = summarize_for(field);

    if let Some(caption) = &field.caption {
        if caption != &field.name && caption != &field.raw_name {
            column
                .annotations
                .push(Annotation::new(ANNOTATION_CAPTION, caption));
        }
    }

    column
}

fn model_annotations(workbook: &Workbook, tables: &[TableDefinition]) -> Vec<Annotation> {
    let query_order: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();

    let mut annotations = vec![
        Annotation::new(ANNOTATION_SERIALIZE_OPTIONS, SERIALIZE_OPTIONS),
        Annotation::new(ANNOTATION_QUERY_ORDER, json!(query_order).to_string()),
        Annotation::new(
            ANNOTATION_SOURCE_FIELD_COUNT,
            workbook.field_count().to_string(),
        ),
        Annotation::new(
            ANNOTATION_CALCULATED_FIELD_COUNT,
            workbook.calculated_field_count().to_string(),
        ),
    ];

    if !workbook.parameters.is_empty() {
        let parameters: Vec<Value> = workbook
            .parameters
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "caption": p.caption,
                    "datatype": p.declared_type,
                    "domain": p.domain_type,
                    "value": p.value,
                })
            })
            .collect();
        annotations.push(Annotation::new(
            ANNOTATION_PARAMETERS,
            Value::Array(parameters).to_string(),
        ));
    }

    annotations
}
