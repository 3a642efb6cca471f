//! Workbook model extraction from the workbook XML tree.

use super::names::{strip_brackets, NameAllocator};
use super::package::RawWorkbookDocument;
use crate::config::PARAMETERS_DATASOURCE;
use crate::error::{ConvertError, Result};
use crate::model::{
    CalculatedFieldDescriptor, ConnectionDescriptor, DashboardDescriptor, DataSourceDescriptor,
    FieldDescriptor, FieldRole, JoinDescriptor, ParameterDescriptor, Workbook,
    WorksheetDescriptor,
};
use roxmltree::{Document, Node};
use std::collections::HashMap;

/// Display name for data sources with neither caption nor name.
const UNNAMED_DATASOURCE: &str = "UnnamedDataSource";

/// Extract the workbook model from a raw document.
pub fn extract_workbook(raw: &RawWorkbookDocument) -> Result<Workbook> {
    let doc = raw.document()?;
    let mut workbook = extract_from_document(&doc)?;
    workbook.extracts = raw.extracts.clone();
    Ok(workbook)
}

/// Extract the workbook model from a parsed XML tree.
pub fn extract_from_document(doc: &Document<'_>) -> Result<Workbook> {
    let root = doc.root_element();
    let mut workbook = Workbook {
        version: attr(root, "version").map(str::to_string),
        ..Default::default()
    };

    let mut parameter_names = NameAllocator::new();

    for node in root.descendants().filter(|n| n.has_tag_name("datasource")) {
        if attr(node, "name") == Some(PARAMETERS_DATASOURCE) {
            for column in node.descendants().filter(|n| n.has_tag_name("column")) {
                if let Some(parameter) = extract_parameter(column, &mut parameter_names) {
                    workbook.parameters.push(parameter);
                }
            }
            continue;
        }

        let datasource = extract_datasource(node, &mut workbook.parameters, &mut parameter_names);
        tracing::debug!(
            datasource = %datasource.name,
            fields = datasource.fields.len(),
            calculated = datasource.calculated_fields.len(),
            "Extracted data source"
        );
        workbook.datasources.push(datasource);
    }

    if workbook.datasources.is_empty() {
        return Err(ConvertError::NoDataSource);
    }

    workbook.worksheets = root
        .descendants()
        .filter(|n| n.has_tag_name("worksheet") && parent_is(*n, "worksheets"))
        .filter_map(|n| attr(n, "name"))
        .map(|name| WorksheetDescriptor {
            name: name.to_string(),
        })
        .collect();

    workbook.dashboards = root
        .descendants()
        .filter(|n| n.has_tag_name("dashboard") && parent_is(*n, "dashboards"))
        .map(|n| extract_dashboard(n, &workbook.worksheets))
        .collect();

    for name in workbook.duplicate_datasource_names() {
        tracing::debug!(datasource = %name, "Data source name appears more than once");
    }

    Ok(workbook)
}

fn extract_datasource(
    node: Node<'_, '_>,
    parameters: &mut Vec<ParameterDescriptor>,
    parameter_names: &mut NameAllocator,
) -> DataSourceDescriptor {
    let identifier = attr(node, "name").unwrap_or_default();
    let name = attr(node, "caption")
        .or(attr(node, "name"))
        .unwrap_or(UNNAMED_DATASOURCE);

    let mut datasource = DataSourceDescriptor::new(name);
    datasource.identifier = if identifier.is_empty() {
        name.to_string()
    } else {
        identifier.to_string()
    };

    let mut names = NameAllocator::new();
    let mut calculations = Vec::new();

    for column in collect_columns(node) {
        let raw_name = match column_name(column) {
            Some(name) => name,
            None => continue,
        };

        if attr(column, "param-domain-type").is_some() {
            if let Some(parameter) = extract_parameter(column, parameter_names) {
                parameters.push(parameter);
            }
            continue;
        }

        match column.children().find(|n| n.has_tag_name("calculation")) {
            Some(calculation) => calculations.push((raw_name, column, calculation)),
            None => {
                datasource.fields.push(FieldDescriptor {
                    name: names.allocate(&raw_name),
                    raw_name,
                    declared_type: attr(column, "datatype").unwrap_or("string").to_string(),
                    role: attr(column, "role")
                        .map(FieldRole::parse)
                        .unwrap_or_default(),
                    caption: attr(column, "caption").map(str::to_string),
                    aggregation: attr(column, "aggregation").map(str::to_string),
                });
            }
        }
    }

    // Calculations are named after every plain field so they never displace a column.
    for (raw_name, column, calculation) in calculations {
        let formula = attr(calculation, "formula").unwrap_or_default().to_string();
        datasource.calculated_fields.push(CalculatedFieldDescriptor {
            name: names.allocate(&raw_name),
            caption: attr(column, "caption").map(str::to_string),
            dependencies: formula_dependencies(&formula),
            formula,
            declared_type: attr(column, "datatype").unwrap_or("string").to_string(),
        });
    }

    datasource.connections = node
        .descendants()
        .filter(|n| n.has_tag_name("connection"))
        .map(extract_connection)
        .collect();

    datasource.joins = node
        .descendants()
        .filter(|n| n.has_tag_name("relation") && attr(*n, "type") == Some("join"))
        .map(extract_join)
        .collect();

    datasource
}

/// Every `column` element of a data source, one per field name, in document order.
///
/// Relation and extract metadata repeat fields declared directly on the data
/// source; the direct declaration wins since it carries role, caption and
/// calculation.
fn collect_columns<'a, 'input>(datasource: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut order: Vec<String> = Vec::new();
    let mut chosen: HashMap<String, Node<'a, 'input>> = HashMap::new();

    for column in datasource.descendants().filter(|n| n.has_tag_name("column")) {
        let key = match attr(column, "name") {
            Some(name) => strip_brackets(name).trim().to_string(),
            None => continue,
        };
        let direct = column.parent_element() == Some(datasource);

        match chosen.get(&key) {
            None => {
                order.push(key.clone());
                chosen.insert(key, column);
            }
            Some(existing) if direct && existing.parent_element() != Some(datasource) => {
                chosen.insert(key, column);
            }
            Some(_) => {}
        }
    }

    order
        .into_iter()
        .filter_map(|key| chosen.remove(&key))
        .collect()
}

/// Column name with brackets stripped, or `None` for columns that are not fields.
fn column_name(column: Node<'_, '_>) -> Option<String> {
    let name = attr(column, "name")?;
    if name.contains("[Parameters]") {
        return None;
    }
    let stripped = strip_brackets(name).trim().to_string();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

fn extract_parameter(
    column: Node<'_, '_>,
    names: &mut NameAllocator,
) -> Option<ParameterDescriptor> {
    let domain_type = attr(column, "param-domain-type")?;
    let raw_name = strip_brackets(attr(column, "name")?).trim().to_string();
    if raw_name.is_empty() {
        return None;
    }

    let sanitized = super::names::sanitize_name(&raw_name);
    if names.contains(&sanitized) {
        return None;
    }

    let value = attr(column, "value").map(str::to_string).or_else(|| {
        column
            .children()
            .find(|n| n.has_tag_name("calculation"))
            .and_then(|c| attr(c, "formula"))
            .map(str::to_string)
    });

    Some(ParameterDescriptor {
        name: names.allocate(&raw_name),
        caption: attr(column, "caption").map(str::to_string),
        declared_type: attr(column, "datatype").unwrap_or("string").to_string(),
        domain_type: domain_type.to_string(),
        value,
    })
}

fn extract_connection(node: Node<'_, '_>) -> ConnectionDescriptor {
    let get = |name: &str| attr(node, name).unwrap_or_default().to_string();
    ConnectionDescriptor {
        class: get("class"),
        server: get("server"),
        dbname: get("dbname"),
        port: get("port"),
        username: get("username"),
        authentication: get("authentication"),
    }
}

fn extract_join(node: Node<'_, '_>) -> JoinDescriptor {
    let clauses = node
        .children()
        .filter(|n| n.has_tag_name("clause"))
        .filter_map(|clause| clause.children().find(|n| n.has_tag_name("expression")))
        .map(render_expression)
        .collect();

    JoinDescriptor {
        kind: attr(node, "join").unwrap_or("inner").to_string(),
        clauses,
    }
}

/// Render a join clause expression tree as infix text.
fn render_expression(node: Node<'_, '_>) -> String {
    let op = attr(node, "op").unwrap_or_default();
    let operands: Vec<String> = node
        .children()
        .filter(|n| n.has_tag_name("expression"))
        .map(render_expression)
        .collect();

    match operands.as_slice() {
        [] => op.to_string(),
        [operand] => format!("{} {}", op, operand),
        [left, right] => format!("{} {} {}", left, op, right),
        _ => format!("{}({})", op, operands.join(", ")),
    }
}

fn extract_dashboard(node: Node<'_, '_>, worksheets: &[WorksheetDescriptor]) -> DashboardDescriptor {
    let mut placed: Vec<String> = Vec::new();
    for zone in node.descendants().filter(|n| n.has_tag_name("zone")) {
        if let Some(name) = attr(zone, "name") {
            let is_sheet = worksheets.iter().any(|w| w.name == name);
            if is_sheet && !placed.iter().any(|p| p == name) {
                placed.push(name.to_string());
            }
        }
    }

    DashboardDescriptor {
        name: attr(node, "name").unwrap_or_default().to_string(),
        worksheets: placed,
    }
}

/// Field references of a formula, distinct and in first-seen order.
///
/// Qualified references (`[source].[field]`) yield only the field. References
/// into the parameters pseudo source, quoted strings and `//` comments are
/// ignored.
pub fn formula_dependencies(formula: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    let mut qualifier: Option<String> = None;
    let mut chars = formula.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                // String literal; a doubled quote is an escaped quote.
                while let Some(inner) = chars.next() {
                    if inner == c {
                        if chars.peek() == Some(&c) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                qualifier = None;
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
                qualifier = None;
            }
            '[' => {
                let mut name = String::new();
                while let Some(inner) = chars.next() {
                    if inner == ']' {
                        if chars.peek() == Some(&']') {
                            chars.next();
                            name.push(']');
                        } else {
                            break;
                        }
                    } else {
                        name.push(inner);
                    }
                }

                let mut lookahead = chars.clone();
                if lookahead.next() == Some('.') && lookahead.peek() == Some(&'[') {
                    chars.next();
                    qualifier = Some(name);
                    continue;
                }

                let from_parameters = qualifier.as_deref() == Some(PARAMETERS_DATASOURCE);
                qualifier = None;
                let name = name.trim().to_string();
                if from_parameters || name.is_empty() || refs.contains(&name) {
                    continue;
                }
                refs.push(name);
            }
            _ => qualifier = None,
        }
    }

    refs
}

fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).filter(|v| !v.is_empty())
}

fn parent_is(node: Node<'_, '_>, tag: &str) -> bool {
    node.parent_element()
        .map(|p| p.has_tag_name(tag))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SALES: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<workbook source-build='2023.3.0' version='18.1'>
  <datasources>
    <datasource hasconnection='false' inline='true' name='Parameters' version='18.1'>
      <column caption='Target Margin' datatype='real' name='[Parameter 1]' param-domain-type='range' role='measure' type='quantitative' value='0.25'>
        <calculation class='tableau' formula='0.25' />
      </column>
    </datasource>
    <datasource caption='Sales' inline='true' name='federated.0abc123' version='18.1'>
      <connection class='federated'>
        <named-connections>
          <named-connection caption='orders' name='excel-direct.1'>
            <connection class='excel-direct' filename='orders.xlsx' server='' />
          </named-connection>
        </named-connections>
        <relation join='left' type='join'>
          <clause type='join'>
            <expression op='='>
              <expression op='[Orders].[Region]' />
              <expression op='[People].[Region]' />
            </expression>
          </clause>
          <relation name='Orders' table='[Orders$]' type='table' />
          <relation name='People' table='[People$]' type='table' />
        </relation>
      </connection>
      <column aggregation='Sum' datatype='real' name='[Amount]' role='measure' type='quantitative' />
      <column caption='Sales Region' datatype='string' name='[Region]' role='dimension' type='nominal' />
      <column caption='Margin' datatype='real' name='[Calculation_1]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='[Amount] - [Cost] * [Parameters].[Parameter 1]' />
      </column>
      <column datatype='real' name='[Parameters].[Parameter 1]' role='measure' />
    </datasource>
  </datasources>
  <worksheets>
    <worksheet name='Revenue'>
      <table>
        <view>
          <datasources>
            <datasource caption='Sales' name='federated.0abc123' />
          </datasources>
        </view>
      </table>
    </worksheet>
  </worksheets>
  <dashboards>
    <dashboard name='Overview'>
      <zones>
        <zone id='1' type='layout-basic'>
          <zone id='2' name='Revenue' />
          <zone id='3' name='Revenue' />
          <zone id='4' name='Legend' type='text' />
        </zone>
      </zones>
    </dashboard>
  </dashboards>
</workbook>"#;

    fn extract(xml: &str) -> Result<Workbook> {
        extract_workbook(&RawWorkbookDocument::from_xml(xml))
    }

    // ==================== data source tests ====================

    #[test]
    fn test_extract_sales_workbook() {
        let workbook = extract(SALES).unwrap();
        assert_eq!(workbook.version.as_deref(), Some("18.1"));

        // The worksheet-level reference is kept as a second entry.
        assert_eq!(workbook.datasources.len(), 2);
        assert_eq!(workbook.duplicate_datasource_names(), vec!["Sales"]);

        let sales = &workbook.datasources[0];
        assert_eq!(sales.name, "Sales");
        assert_eq!(sales.identifier, "federated.0abc123");

        let names: Vec<&str> = sales.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Amount", "Region"]);

        let amount = sales.find_field("Amount").unwrap();
        assert_eq!(amount.declared_type, "real");
        assert_eq!(amount.role, FieldRole::Measure);
        assert_eq!(amount.aggregation.as_deref(), Some("Sum"));

        let region = sales.find_field("Region").unwrap();
        assert_eq!(region.caption.as_deref(), Some("Sales Region"));
        assert_eq!(region.role, FieldRole::Dimension);

        assert!(workbook.datasources[1].is_reference());
    }

    #[test]
    fn test_extract_calculated_field() {
        let workbook = extract(SALES).unwrap();
        let sales = &workbook.datasources[0];
        assert_eq!(sales.calculated_fields.len(), 1);

        let calc = &sales.calculated_fields[0];
        assert_eq!(calc.name, "Calculation_1");
        assert_eq!(calc.caption.as_deref(), Some("Margin"));
        assert_eq!(calc.formula, "[Amount] - [Cost] * [Parameters].[Parameter 1]");
        assert_eq!(calc.dependencies, vec!["Amount", "Cost"]);
    }

    #[test]
    fn test_extract_parameters() {
        let workbook = extract(SALES).unwrap();
        assert_eq!(workbook.parameters.len(), 1);
        let parameter = &workbook.parameters[0];
        assert_eq!(parameter.name, "Parameter_1");
        assert_eq!(parameter.caption.as_deref(), Some("Target Margin"));
        assert_eq!(parameter.domain_type, "range");
        assert_eq!(parameter.value.as_deref(), Some("0.25"));
    }

    #[test]
    fn test_extract_connections_and_joins() {
        let workbook = extract(SALES).unwrap();
        let sales = &workbook.datasources[0];

        let classes: Vec<&str> = sales.connections.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(classes, vec!["federated", "excel-direct"]);

        assert_eq!(sales.joins.len(), 1);
        assert_eq!(sales.joins[0].kind, "left");
        assert_eq!(
            sales.joins[0].clauses,
            vec!["[Orders].[Region] = [People].[Region]"]
        );
    }

    #[test]
    fn test_extract_worksheets_and_dashboards() {
        let workbook = extract(SALES).unwrap();
        assert_eq!(workbook.worksheets.len(), 1);
        assert_eq!(workbook.worksheets[0].name, "Revenue");
        assert_eq!(
            workbook.dashboards,
            vec![DashboardDescriptor {
                name: "Overview".to_string(),
                worksheets: vec!["Revenue".to_string()],
            }]
        );
    }

    #[test]
    fn test_extract_fallback_to_relation_columns() {
        let xml = r#"<workbook>
          <datasources>
            <datasource name='extract.1'>
              <connection class='hyper'>
                <relation name='Extract' type='table'>
                  <columns>
                    <column datatype='integer' name='Order ID' ordinal='0' />
                    <column datatype='date' name='Order Date' ordinal='1' />
                  </columns>
                </relation>
              </connection>
            </datasource>
          </datasources>
        </workbook>"#;
        let workbook = extract(xml).unwrap();
        let ds = &workbook.datasources[0];
        assert_eq!(ds.name, "extract.1");
        let names: Vec<&str> = ds.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Order_ID", "Order_Date"]);
        assert_eq!(ds.fields[0].raw_name, "Order ID");
    }

    #[test]
    fn test_extract_missing_attributes_default() {
        let xml = r#"<workbook><datasource><column name='[x]' /><column name='' /></datasource></workbook>"#;
        let workbook = extract(xml).unwrap();
        let ds = &workbook.datasources[0];
        assert_eq!(ds.name, "UnnamedDataSource");
        assert_eq!(ds.fields.len(), 1);
        assert_eq!(ds.fields[0].declared_type, "string");
        assert_eq!(ds.fields[0].role, FieldRole::Unknown);
        assert!(workbook.version.is_none());
    }

    #[test]
    fn test_extract_relation_columns_with_direct_calculation() {
        let xml = r#"<workbook>
          <datasources>
            <datasource caption='Orders' name='textscan.1'>
              <connection class='textscan' filename='orders.csv'>
                <relation name='orders.csv' table='[orders#csv]' type='table'>
                  <columns>
                    <column datatype='real' name='Amount' ordinal='0' />
                    <column datatype='string' name='Region' ordinal='1' />
                  </columns>
                </relation>
              </connection>
              <column caption='Sales Region' datatype='string' name='[Region]' role='dimension' type='nominal' />
              <column caption='Double' datatype='real' name='[Calculation_1]' role='measure' type='quantitative'>
                <calculation class='tableau' formula='[Amount] * 2' />
              </column>
            </datasource>
          </datasources>
        </workbook>"#;
        let workbook = extract(xml).unwrap();
        let ds = &workbook.datasources[0];

        let names: Vec<&str> = ds.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Amount", "Region"]);
        assert_eq!(ds.fields[0].declared_type, "real");

        // The direct declaration of Region replaces its relation twin.
        let region = ds.find_field("Region").unwrap();
        assert_eq!(region.caption.as_deref(), Some("Sales Region"));
        assert_eq!(region.role, FieldRole::Dimension);

        assert_eq!(ds.calculated_fields.len(), 1);
        assert_eq!(ds.calculated_fields[0].dependencies, vec!["Amount"]);
    }

    #[test]
    fn test_extract_calculation_does_not_rename_later_field() {
        let xml = r#"<workbook><datasource name='ds'>
            <column name='[Order.Date]' datatype='string'>
              <calculation class='tableau' formula='STR([Order Date])' />
            </column>
            <column name='[Order Date]' datatype='date' />
        </datasource></workbook>"#;
        let workbook = extract(xml).unwrap();
        let ds = &workbook.datasources[0];
        assert_eq!(ds.fields[0].name, "Order_Date");
        assert_eq!(ds.calculated_fields[0].name, "Order_Date_2");
    }

    #[test]
    fn test_extract_name_collisions_shared_with_calculations() {
        let xml = r#"<workbook><datasource name='ds'>
            <column name='[Order Date]' datatype='date' />
            <column name='[Order-Date]' datatype='date' />
            <column name='[Order.Date]' datatype='string'>
              <calculation class='tableau' formula='STR([Order Date])' />
            </column>
        </datasource></workbook>"#;
        let workbook = extract(xml).unwrap();
        let ds = &workbook.datasources[0];
        assert_eq!(ds.fields[0].name, "Order_Date");
        assert_eq!(ds.fields[1].name, "Order_Date_2");
        assert_eq!(ds.calculated_fields[0].name, "Order_Date_3");
    }

    #[test]
    fn test_extract_no_datasource() {
        let err = extract("<workbook><worksheets /></workbook>").unwrap_err();
        assert!(matches!(err, ConvertError::NoDataSource));
    }

    #[test]
    fn test_extract_only_parameters_is_no_datasource() {
        let xml = r#"<workbook><datasource name='Parameters'>
            <column name='[P]' param-domain-type='list' datatype='string' value='"a"' />
        </datasource></workbook>"#;
        let err = extract(xml).unwrap_err();
        assert!(matches!(err, ConvertError::NoDataSource));
    }

    // ==================== formula_dependencies tests ====================

    #[test]
    fn test_dependencies_distinct_in_order() {
        assert_eq!(
            formula_dependencies("SUM([Profit]) / SUM([Sales]) + [Profit]"),
            vec!["Profit", "Sales"]
        );
    }

    #[test]
    fn test_dependencies_qualified() {
        assert_eq!(
            formula_dependencies("[federated.1].[Amount] * [Parameters].[Rate]"),
            vec!["Amount"]
        );
    }

    #[test]
    fn test_dependencies_ignore_literals_and_comments() {
        let formula = "IF [Region] = '[East]' THEN \"[x]\" END // uses [Hidden]\n+ [Sales]";
        assert_eq!(formula_dependencies(formula), vec!["Region", "Sales"]);
    }

    #[test]
    fn test_dependencies_escaped_bracket() {
        assert_eq!(formula_dependencies("[a]]b] + 1"), vec!["a]b"]);
        assert!(formula_dependencies("").is_empty());
        assert!(formula_dependencies("TODAY()").is_empty());
    }
}
