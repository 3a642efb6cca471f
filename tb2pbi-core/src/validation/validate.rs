//! Validation of the extracted workbook and the translated model.

use crate::config::DEFAULT_COLUMN_NAME;
use crate::error::{ConvertError, Result};
use crate::model::{TableDefinition, TabularModel, Workbook};
use serde::Serialize;
use std::collections::HashSet;

/// Validation result with warnings.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ValidationResult {
    /// Whether validation passed.
    pub passed: bool,
    /// Warning messages.
    pub warnings: Vec<String>,
    /// Error messages.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Create a passing result.
    pub fn ok() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    /// Add a warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Add an error.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.passed = false;
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
        if !other.passed {
            self.passed = false;
        }
    }
}

/// Report what the conversion will not carry over from the workbook.
///
/// Only warnings; nothing here stops a conversion.
pub fn validate_workbook(workbook: &Workbook) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for name in workbook.duplicate_datasource_names() {
        result.add_warning(format!(
            "Data source '{}' appears more than once; each occurrence becomes its own table",
            name
        ));
    }

    for ds in &workbook.datasources {
        if !ds.calculated_fields.is_empty() {
            result.add_warning(format!(
                "Data source '{}': {} calculated field(s) kept as annotations, not translated",
                ds.name,
                ds.calculated_fields.len()
            ));
        }
    }

    if !workbook.extracts.is_empty() {
        result.add_warning(format!(
            "{} embedded data extract(s) not converted; re-point data sources after opening",
            workbook.extracts.len()
        ));
    }

    result
}

/// Validate the translated model.
pub fn validate_model(model: &TabularModel) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();

    if model.tables().is_empty() {
        return Err(ConvertError::NoDataSource);
    }

    let mut seen = HashSet::new();
    for (idx, table) in model.tables().iter().enumerate() {
        if !seen.insert(table.name.to_lowercase()) {
            result.add_warning(format!(
                "Table {} ('{}'): duplicate table name",
                idx + 1,
                table.name
            ));
        }
        result.merge(validate_table(table, idx + 1));
    }

    Ok(result)
}

/// Validate a single table.
pub fn validate_table(table: &TableDefinition, table_num: usize) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if table.name.trim().is_empty() {
        result.add_error(format!("Table {}: empty name", table_num));
    }

    if table.partitions.is_empty() {
        result.add_error(format!("Table {} ('{}'): no partition", table_num, table.name));
    }

    for partition in &table.partitions {
        if partition.source.expression.is_empty() {
            result.add_error(format!(
                "Table {} ('{}'): partition '{}' has no expression",
                table_num, table.name, partition.name
            ));
        }
    }

    if table.columns.is_empty() {
        result.add_error(format!("Table {} ('{}'): no column", table_num, table.name));
    }

    let mut names = HashSet::new();
    for (idx, column) in table.columns.iter().enumerate() {
        if column.name.trim().is_empty() {
            result.add_error(format!(
                "Table {} ('{}'): column {} has an empty name",
                table_num,
                table.name,
                idx + 1
            ));
            continue;
        }
        if !names.insert(column.name.to_lowercase()) {
            result.add_error(format!(
                "Table {} ('{}'): duplicate column '{}'",
                table_num, table.name, column.name
            ));
        }
    }

    if table.columns.len() == 1 && table.columns[0].name == DEFAULT_COLUMN_NAME {
        result.add_warning(format!(
            "Table {} ('{}'): no fields found, placeholder column added",
            table_num, table.name
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::model::{
        ColumnDefinition, DataSourceDescriptor, DataType, ExtractEntry, FieldDescriptor,
        PartitionDefinition,
    };
    use crate::transform::translate_workbook;

    fn table(name: &str, columns: &[&str]) -> TableDefinition {
        TableDefinition {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|c| ColumnDefinition::new(*c, DataType::String))
                .collect(),
            partitions: vec![PartitionDefinition::import_m(
                format!("{}_Partition", name),
                vec!["let".to_string()],
            )],
            annotations: Vec::new(),
        }
    }

    fn model_with(tables: Vec<TableDefinition>) -> TabularModel {
        let mut model = TabularModel::default();
        model.model.tables = tables;
        model
    }

    // ==================== ValidationResult tests ====================

    #[test]
    fn test_validation_result_ok() {
        let result = ValidationResult::ok();
        assert!(result.passed);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result1 = ValidationResult::ok();
        result1.add_warning("Warning 1");

        let mut result2 = ValidationResult::ok();
        result2.add_error("Error 1");
        result2.add_warning("Warning 2");

        result1.merge(result2);
        assert!(!result1.passed);
        assert_eq!(result1.warnings.len(), 2);
        assert_eq!(result1.errors.len(), 1);
    }

    // ==================== validate_model tests ====================

    #[test]
    fn test_validate_model_empty() {
        let result = validate_model(&TabularModel::default());
        assert!(matches!(result, Err(ConvertError::NoDataSource)));
    }

    #[test]
    fn test_validate_model_duplicate_tables_warn() {
        let model = model_with(vec![table("Sales", &["A"]), table("sales", &["A"])]);
        let result = validate_model(&model).unwrap();
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("duplicate table name"));
    }

    #[test]
    fn test_validate_table_errors() {
        let mut broken = table("Orders", &["Id", "", "id"]);
        broken.partitions.clear();
        let result = validate_table(&broken, 1);
        assert!(!result.passed);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().any(|e| e.contains("no partition")));
        assert!(result.errors.iter().any(|e| e.contains("empty name")));
        assert!(result.errors.iter().any(|e| e.contains("duplicate column 'id'")));
    }

    #[test]
    fn test_validate_placeholder_column_warning() {
        let mut placeholder = table("Empty", &["DefaultColumn"]);
        placeholder.columns[0].is_hidden = true;
        let result = validate_table(&placeholder, 1);
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_translated_model_passes() {
        let mut ds = DataSourceDescriptor::new("Sales");
        ds.fields.push(FieldDescriptor::new("Amount", "real"));
        let workbook = Workbook {
            datasources: vec![ds, DataSourceDescriptor::new("Returns")],
            ..Default::default()
        };
        let model = translate_workbook(&workbook, &ConvertOptions::default());
        let result = validate_model(&model).unwrap();
        assert!(result.passed);
    }

    // ==================== validate_workbook tests ====================

    #[test]
    fn test_validate_workbook_warnings() {
        let mut sales = DataSourceDescriptor::new("Sales");
        sales
            .calculated_fields
            .push(crate::model::CalculatedFieldDescriptor::default());
        let workbook = Workbook {
            datasources: vec![sales, DataSourceDescriptor::new("Sales")],
            extracts: vec![ExtractEntry {
                name: "Data/sales.hyper".to_string(),
                size: 10,
            }],
            ..Default::default()
        };
        let result = validate_workbook(&workbook);
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 3);
    }
}
