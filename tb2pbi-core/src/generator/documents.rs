//! Auxiliary project documents.
//!
//! Typed so that key order in the written files is fixed.

use crate::config::{FORMAT_VERSION, REPORT_LAYOUT_VERSION, REPORT_THEME};
use serde::Serialize;

/// `Metadata` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub version: String,
    pub created_from_template: bool,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            created_from_template: true,
        }
    }
}

/// `SecurityBindings` document.
#[derive(Debug, Serialize)]
pub struct SecurityBindings {
    pub version: String,
    pub bindings: Vec<String>,
}

impl Default for SecurityBindings {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            bindings: Vec::new(),
        }
    }
}

/// `DataModelSchema/DiagramLayout` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramLayout {
    pub version: u32,
    pub diagram_layouts: Vec<String>,
}

impl Default for DiagramLayout {
    fn default() -> Self {
        Self {
            version: 1,
            diagram_layouts: Vec::new(),
        }
    }
}

/// One report page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    pub visual_containers: Vec<String>,
    /// Embedded JSON document.
    pub config: String,
    pub display_option: u32,
    pub width: u32,
    pub height: u32,
}

/// `Report/Layout` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLayout {
    pub id: u32,
    pub resource_packages: Vec<String>,
    /// Embedded JSON document.
    pub config: String,
    pub layout_optimization: u32,
    pub sections: Vec<ReportSection>,
    pub public_custom_visuals: Vec<String>,
}

impl Default for ReportLayout {
    /// A layout with a single empty page.
    fn default() -> Self {
        Self {
            id: 0,
            resource_packages: Vec::new(),
            config: format!(
                r#"{{"version":"{}","themeCollection":{{"baseTheme":{{"name":"{}"}}}}}}"#,
                REPORT_LAYOUT_VERSION, REPORT_THEME
            ),
            layout_optimization: 0,
            sections: vec![ReportSection {
                id: 0,
                name: "ReportSection".to_string(),
                display_name: "Page 1".to_string(),
                visual_containers: Vec::new(),
                config: r#"{"visibility":0}"#.to_string(),
                display_option: 1,
                width: 1280,
                height: 720,
            }],
            public_custom_visuals: Vec::new(),
        }
    }
}

/// `[Content_Types].xml` for an archive holding the given entries.
pub fn content_types_xml<'a>(entries: impl IntoIterator<Item = &'a str>) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"json\" ContentType=\"\" />",
    );
    for entry in entries {
        if entry.ends_with(".json") {
            continue;
        }
        xml.push_str(&format!(
            "<Override PartName=\"/{}\" ContentType=\"\" />",
            escape_xml_attr(entry)
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
