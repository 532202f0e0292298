//! Terminal rendering of report output and the report catalogue.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use salesql::{BuiltQuery, ReportDescriptor, ReportOutput, Value};

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold).fg(Color::Cyan)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Text of a value as shown in a table cell: strings unquoted, NULL blank.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_cell(value: &Value) -> Cell {
    let cell = Cell::new(cell_text(value));
    match value {
        Value::Int(_) | Value::Float(_) => cell.fg(Color::Green),
        Value::Date(_) | Value::Timestamp(_) => cell.fg(Color::Yellow),
        _ => cell,
    }
}

/// Summary table followed by the row table.
pub fn output_tables(output: &ReportOutput) -> String {
    let mut summary = new_table();
    summary.set_header(vec![header_cell(&output.kind), header_cell("value")]);
    for (key, value) in &output.summary {
        summary.add_row(vec![Cell::new(key), value_cell(value)]);
    }

    let Some(first) = output.rows.first() else {
        return format!("{summary}\n(no rows)");
    };

    let mut rows = new_table();
    rows.set_header(first.columns().map(header_cell).collect::<Vec<_>>());
    for record in &output.rows {
        rows.add_row(
            first
                .columns()
                .map(|col| record.get(col).map(value_cell).unwrap_or_else(|| Cell::new("")))
                .collect::<Vec<_>>(),
        );
    }

    format!("{summary}\n{rows}\n{} row(s)", output.rows.len())
}

pub fn output_json(output: &ReportOutput) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}

pub fn catalogue<'a>(descriptors: impl Iterator<Item = &'a ReportDescriptor>) -> String {
    let mut table = new_table();
    table.set_header(vec![
        header_cell("type"),
        header_cell("required"),
        header_cell("optional"),
        header_cell("description"),
    ]);
    for d in descriptors {
        table.add_row(vec![
            Cell::new(d.tag).fg(Color::Yellow),
            Cell::new(d.required.join(", ")),
            Cell::new(d.optional.join(", ")).fg(Color::DarkGrey),
            Cell::new(d.description),
        ]);
    }
    table.to_string()
}

/// The query text followed by one `name = value` line per binding.
pub fn query_listing(query: &BuiltQuery) -> String {
    let mut out = query.sql().to_string();
    for (name, value) in query.params().iter() {
        out.push_str(&format!("\n  :{name} = {value}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesql::{Record, ReportFactory, SalesQueryBuilder};

    fn sample() -> ReportOutput {
        ReportOutput::new(
            "product",
            vec![
                Record::from_iter([
                    ("productname", Value::from("Bread")),
                    ("total_revenue", Value::Float(12.5)),
                ]),
                Record::from_iter([
                    ("productname", Value::from("Milk")),
                    ("total_revenue", Value::Null),
                ]),
            ],
        )
        .with_summary("total_products", 2)
    }

    #[test]
    fn cell_text_unquotes_strings_and_blanks_null() {
        assert_eq!(cell_text(&Value::from("Bread")), "Bread");
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&Value::Int(3)), "3");
    }

    #[test]
    fn tables_contain_summary_and_rows() {
        let text = output_tables(&sample());
        assert!(text.contains("total_products"));
        assert!(text.contains("productname"));
        assert!(text.contains("Milk"));
        assert!(text.ends_with("2 row(s)"));
    }

    #[test]
    fn empty_output_says_so() {
        let text = output_tables(&ReportOutput::new("sales", Vec::new()));
        assert!(text.ends_with("(no rows)"));
    }

    #[test]
    fn json_output_keeps_structure() {
        let json: serde_json::Value =
            serde_json::from_str(&output_json(&sample()).unwrap()).unwrap();
        assert_eq!(json["kind"], "product");
        assert_eq!(json["rows"][1]["total_revenue"], serde_json::Value::Null);
    }

    #[test]
    fn catalogue_lists_every_builtin() {
        let factory = ReportFactory::with_builtin_reports();
        let text = catalogue(factory.descriptors());
        for tag in factory.tags() {
            assert!(text.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn listing_shows_bindings() {
        let query = SalesQueryBuilder::new().with_customer(9).build().unwrap();
        let text = query_listing(&query);
        assert!(text.starts_with("SELECT * FROM sales WHERE sales.CustomerID = :customer_id"));
        assert!(text.ends_with("\n  :customer_id = 9"));
    }
}
