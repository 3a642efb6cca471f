//! Placeholder Power Query M expressions for table partitions.
//!
//! The expression builds an empty typed table. It carries no connection
//! string; the data source has to be re-pointed in the target tool.

use crate::model::ColumnDefinition;

const EMPTY_ROWS: &str = "Table.FromRows(Json.Document(Binary.Decompress(Binary.FromText(\"\", BinaryEncoding.Base64), Compression.Deflate))";

/// Build the partition expression lines for the given columns.
pub fn placeholder_expression(columns: &[ColumnDefinition]) -> Vec<String> {
    let schema = columns
        .iter()
        .map(|c| format!("{} = _t", quote_identifier(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");

    let transforms = columns
        .iter()
        .map(|c| format!("{{{}, {}}}", quote_text(&c.name), c.data_type.m_type()))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        "let".to_string(),
        format!(
            "    Source = {}, let _t = ((type nullable text) meta [Serialized.Text = true]) in type table [{}]),",
            EMPTY_ROWS, schema
        ),
        format!(
            "    #\"Changed Type\" = Table.TransformColumnTypes(Source,{{{}}})",
            transforms
        ),
        "in".to_string(),
        "    #\"Changed Type\"".to_string(),
    ]
}

/// Quote a name as an M identifier (`#"name"`).
fn quote_identifier(name: &str) -> String {
    format!("#{}", quote_text(name))
}

/// Quote a name as an M text literal, doubling embedded quotes.
fn quote_text(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;

    #[test]
    fn test_placeholder_expression() {
        let columns = vec![
            ColumnDefinition::new("Amount", DataType::Double),
            ColumnDefinition::new("Region", DataType::String),
            ColumnDefinition::new("OrderDate", DataType::DateTime),
        ];
        insta::assert_snapshot!(placeholder_expression(&columns).join("\n"), @r###"
        let
            Source = Table.FromRows(Json.Document(Binary.Decompress(Binary.FromText("", BinaryEncoding.Base64), Compression.Deflate)), let _t = ((type nullable text) meta [Serialized.Text = true]) in type table [#"Amount" = _t, #"Region" = _t, #"OrderDate" = _t]),
            #"Changed Type" = Table.TransformColumnTypes(Source,{{"Amount", type number}, {"Region", type text}, {"OrderDate", type datetime}})
        in
            #"Changed Type"
        "###);
    }

    #[test]
    fn test_quote_text_escapes_quotes() {
        assert_eq!(quote_text("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_identifier("Amount"), "#\"Amount\"");
    }
}
