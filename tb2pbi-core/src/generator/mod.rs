//! Project file generation.

mod documents;
mod package;

pub use documents::{
    content_types_xml, DiagramLayout, Metadata, ReportLayout, ReportSection, SecurityBindings,
};
pub use package::{
    archive_entry_name, assemble_package, validate_package, write_project, PackageFile,
    PackageFileSet, DIAGRAM_LAYOUT_PATH, LAYOUT_PATH, METADATA_PATH, MODEL_PATH, REQUIRED_PATHS,
    SECURITY_BINDINGS_PATH, SETTINGS_PATH, STATIC_RESOURCES_PATH, VERSION_PATH,
};
