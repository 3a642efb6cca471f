//! Tabular model - the translated Power BI semantic model (`Model.bim`).
//!
//! Field order of every struct is the serialization order, so the generated
//! document is stable between runs.

use crate::config::{
    COMPATIBILITY_LEVEL, DEFAULT_CULTURE, DEFAULT_MODEL_NAME, POWERBI_DATA_SOURCE_VERSION,
};
use serde::{Deserialize, Serialize};

/// Target column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "dateTime")]
    DateTime,
    #[serde(rename = "boolean")]
    Boolean,
}

impl DataType {
    /// Whether the type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Double)
    }

    /// Power Query M type used in partition expressions.
    pub fn m_type(&self) -> &'static str {
        match self {
            DataType::Int64 => "Int64.Type",
            DataType::Double => "type number",
            DataType::String => "type text",
            DataType::DateTime => "type datetime",
            DataType::Boolean => "type logical",
        }
    }
}

/// Default aggregation of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SummarizeBy {
    Sum,
    Average,
    Min,
    Max,
    Count,
    DistinctCount,
    None,
}

/// Named string annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

impl Annotation {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub source_column: String,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarize_by: Option<SummarizeBy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl ColumnDefinition {
    /// Create a visible column reading the source column of the same name.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            source_column: name.clone(),
            name,
            data_type,
            is_hidden: false,
            summarize_by: None,
            annotations: Vec::new(),
        }
    }
}

/// Partition source: a Power Query M expression split into lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub expression: Vec<String>,
}

/// One data-load unit of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDefinition {
    pub name: String,
    pub mode: String,
    pub source: PartitionSource,
}

impl PartitionDefinition {
    /// Create an import partition with an M expression.
    pub fn import_m(name: impl Into<String>, expression: Vec<String>) -> Self {
        Self {
            name: name.into(),
            mode: "import".to_string(),
            source: PartitionSource {
                source_type: "m".to_string(),
                expression,
            },
        }
    }
}

/// One table of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub partitions: Vec<PartitionDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl TableDefinition {
    /// Find a column by name.
    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find an annotation value by name.
    pub fn annotation(&self, name: &str) -> Option<&str> {
        find_annotation(&self.annotations, name)
    }
}

/// Data access options of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAccessOptions {
    pub legacy_redirects: bool,
    pub return_error_values_as_null: bool,
}

impl Default for DataAccessOptions {
    fn default() -> Self {
        Self {
            legacy_redirects: true,
            return_error_values_as_null: true,
        }
    }
}

/// The `model` object of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub culture: String,
    pub data_access_options: DataAccessOptions,
    #[serde(rename = "defaultPowerBIDataSourceVersion")]
    pub default_power_bi_data_source_version: String,
    pub source_query_culture: String,
    pub tables: Vec<TableDefinition>,
    pub annotations: Vec<Annotation>,
}

/// The whole translated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularModel {
    pub name: String,
    pub compatibility_level: u32,
    pub model: ModelDefinition,
}

impl Default for TabularModel {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_NAME, DEFAULT_CULTURE)
    }
}

impl TabularModel {
    /// Create an empty model.
    pub fn new(name: impl Into<String>, culture: impl Into<String>) -> Self {
        let culture = culture.into();
        Self {
            name: name.into(),
            compatibility_level: COMPATIBILITY_LEVEL,
            model: ModelDefinition {
                source_query_culture: culture.clone(),
                culture,
                data_access_options: DataAccessOptions::default(),
                default_power_bi_data_source_version: POWERBI_DATA_SOURCE_VERSION.to_string(),
                tables: Vec::new(),
                annotations: Vec::new(),
            },
        }
    }

    /// Tables in query order.
    pub fn tables(&self) -> &[TableDefinition] {
        &self.model.tables
    }

    /// Find the first table with a given name.
    pub fn find_table(&self, name: &str) -> Option<&TableDefinition> {
        self.model.tables.iter().find(|t| t.name == name)
    }

    /// Find a model annotation value by name.
    pub fn annotation(&self, name: &str) -> Option<&str> {
        find_annotation(&self.model.annotations, name)
    }

    /// Serialize to the pretty-printed `Model.bim` text.
    pub fn to_bim_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn find_annotation<'a>(annotations: &'a [Annotation], name: &str) -> Option<&'a str> {
    annotations
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_data_type_serialization() {
        assert_eq!(serde_json::to_value(DataType::Int64).unwrap(), json!("int64"));
        assert_eq!(
            serde_json::to_value(DataType::DateTime).unwrap(),
            json!("dateTime")
        );
        assert_eq!(
            serde_json::to_value(SummarizeBy::DistinctCount).unwrap(),
            json!("distinctCount")
        );
    }

    #[test]
    fn test_column_serialization_omits_empty_parts() {
        let column = ColumnDefinition::new("Region", DataType::String);
        assert_eq!(
            serde_json::to_value(&column).unwrap(),
            json!({
                "name": "Region",
                "dataType": "string",
                "sourceColumn": "Region",
                "isHidden": false
            })
        );
    }

    #[test]
    fn test_model_header_keys() {
        let model = TabularModel::default();
        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["name"], json!("SemanticModel"));
        assert_eq!(value["compatibilityLevel"], json!(1550));
        assert_eq!(
            value["model"]["defaultPowerBIDataSourceVersion"],
            json!("powerBI_V3")
        );
        assert_eq!(value["model"]["dataAccessOptions"]["legacyRedirects"], json!(true));
        assert_eq!(value["model"]["tables"], json!([]));
    }
}
