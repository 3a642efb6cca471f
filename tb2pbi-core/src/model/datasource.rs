//! Data source definition for one Tableau data source.

use super::{CalculatedFieldDescriptor, FieldDescriptor};
use serde::{Deserialize, Serialize};

/// Connection attributes of a data source. Reporting only; never written to
/// the target model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Connection class (`excel-direct`, `sqlserver`, `federated`, ...).
    pub class: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dbname: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub authentication: String,
}

/// A join relation between two tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinDescriptor {
    /// Join kind (`inner`, `left`, ...).
    pub kind: String,
    /// Join clause expressions rendered as text.
    pub clauses: Vec<String>,
}

/// One Tableau data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Display name (caption, or the identifier when no caption exists).
    pub name: String,
    /// Unique identifier (`name` attribute).
    pub identifier: String,
    /// Plain fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Calculated fields in declaration order.
    pub calculated_fields: Vec<CalculatedFieldDescriptor>,
    /// Connections declared by the data source.
    pub connections: Vec<ConnectionDescriptor>,
    /// Joins declared by the data source.
    pub joins: Vec<JoinDescriptor>,
}

impl DataSourceDescriptor {
    /// Create an empty data source.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            identifier: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Find a field by sanitized name.
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether this data source only references another one (no fields at all).
    pub fn is_reference(&self) -> bool {
        self.fields.is_empty() && self.calculated_fields.is_empty()
    }
}
