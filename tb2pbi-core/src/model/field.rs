//! Field definitions extracted from a Tableau data source.

use serde::{Deserialize, Serialize};

/// Declared Tableau data type.
///
/// Parsing is total: anything not recognized is kept as [`SourceType::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceType {
    Integer,
    Real,
    String,
    Date,
    DateTime,
    Boolean,
    Other(String),
}

impl SourceType {
    /// Parse a `datatype` attribute value (case-insensitive).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "integer" => SourceType::Integer,
            "real" | "float" | "decimal" | "number" => SourceType::Real,
            "string" | "text" => SourceType::String,
            "date" => SourceType::Date,
            "datetime" => SourceType::DateTime,
            "boolean" => SourceType::Boolean,
            other => SourceType::Other(other.to_string()),
        }
    }

    /// Whether values of this type are numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, SourceType::Integer | SourceType::Real)
    }
}

/// Tableau field role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Dimension,
    Measure,
    #[default]
    Unknown,
}

impl FieldRole {
    /// Parse a `role` attribute value.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "dimension" => FieldRole::Dimension,
            "measure" => FieldRole::Measure,
            _ => FieldRole::Unknown,
        }
    }
}

/// A plain (non-calculated) field of a data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Sanitized name, unique within its data source.
    pub name: String,
    /// Name as declared in the workbook (brackets stripped).
    pub raw_name: String,
    /// Declared type, free text from the workbook.
    pub declared_type: String,
    /// Dimension or measure.
    pub role: FieldRole,
    /// Display-name override (`caption` attribute).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Default aggregation hint (`aggregation` attribute).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

impl FieldDescriptor {
    /// Create a field with a name and declared type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            raw_name: name.clone(),
            name,
            declared_type: declared_type.into(),
            ..Default::default()
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }

    /// Parsed source type.
    pub fn source_type(&self) -> SourceType {
        SourceType::parse(&self.declared_type)
    }

    /// Whether the field is a measure.
    pub fn is_measure(&self) -> bool {
        self.role == FieldRole::Measure
    }
}

/// A calculated field. The formula is kept verbatim and never evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatedFieldDescriptor {
    /// Sanitized name.
    pub name: String,
    /// Display caption, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Tableau formula text.
    pub formula: String,
    /// Names of the fields referenced by the formula.
    pub dependencies: Vec<String>,
    /// Declared result type.
    pub declared_type: String,
}

/// A workbook parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Sanitized name.
    pub name: String,
    /// Display caption, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Declared type.
    pub declared_type: String,
    /// `param-domain-type` (list, range, any).
    pub domain_type: String,
    /// Current value as written in the workbook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}
