//! Data model types for Tableau to Power BI conversion.

mod datasource;
mod field;
mod tabular;
mod workbook;

pub use datasource::{ConnectionDescriptor, DataSourceDescriptor, JoinDescriptor};
pub use field::{
    CalculatedFieldDescriptor, FieldDescriptor, FieldRole, ParameterDescriptor, SourceType,
};
pub use tabular::{
    Annotation, ColumnDefinition, DataAccessOptions, DataType, ModelDefinition,
    PartitionDefinition, PartitionSource, SummarizeBy, TableDefinition, TabularModel,
};
pub use workbook::{DashboardDescriptor, ExtractEntry, WorksheetDescriptor, Workbook};
