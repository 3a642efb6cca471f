//! Workbook - intermediate representation of a whole Tableau workbook.

use super::{DataSourceDescriptor, ParameterDescriptor};
use serde::{Deserialize, Serialize};

/// Embedded data extract found in a `.twbx` package. Content is never decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractEntry {
    /// Archive entry name.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
}

/// A worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetDescriptor {
    pub name: String,
}

/// A dashboard and the worksheets it places.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardDescriptor {
    pub name: String,
    pub worksheets: Vec<String>,
}

/// Everything extracted from one workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    /// Workbook format version (`version` attribute of the root element).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Data sources in document order. Duplicates are kept.
    pub datasources: Vec<DataSourceDescriptor>,
    /// Workbook parameters.
    pub parameters: Vec<ParameterDescriptor>,
    /// Worksheets in document order.
    pub worksheets: Vec<WorksheetDescriptor>,
    /// Dashboards in document order.
    pub dashboards: Vec<DashboardDescriptor>,
    /// Data extracts embedded in the package.
    pub extracts: Vec<ExtractEntry>,
}

impl Workbook {
    /// Total number of plain fields across all data sources.
    pub fn field_count(&self) -> usize {
        self.datasources.iter().map(|ds| ds.fields.len()).sum()
    }

    /// Total number of calculated fields across all data sources.
    pub fn calculated_field_count(&self) -> usize {
        self.datasources
            .iter()
            .map(|ds| ds.calculated_fields.len())
            .sum()
    }

    /// Find the first data source with a given display name.
    pub fn find_datasource(&self, name: &str) -> Option<&DataSourceDescriptor> {
        self.datasources.iter().find(|ds| ds.name == name)
    }

    /// Data source names that appear more than once, in first-seen order.
    pub fn duplicate_datasource_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for ds in &self.datasources {
            if !seen.insert(ds.name.as_str()) && !duplicates.contains(&ds.name.as_str()) {
                duplicates.push(ds.name.as_str());
            }
        }
        duplicates
    }
}
