//! Plain-text table rendering for result sets.

use comfy_table::{Cell, Table, presets::ASCII_FULL};

use crate::value::ResultSet;

/// Renders a result as a table with a leading 1-based `id` column.
pub fn render_table(result: &ResultSet) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);

    table.set_header(
        std::iter::once("id")
            .chain(result.columns.iter().map(String::as_str))
            .map(Cell::new),
    );

    for (i, row) in result.rows.iter().enumerate() {
        table.add_row(
            std::iter::once(Cell::new(i + 1)).chain(row.values().iter().map(Cell::new)),
        );
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ResultRow, Value};

    #[test]
    fn renders_header_and_numbered_rows() {
        let rs = ResultSet::new(
            vec!["name".to_string(), "count".to_string()],
            vec![
                ResultRow::new(vec![Value::from("orders"), Value::Int(42)]),
                ResultRow::new(vec![Value::from("users"), Value::Null]),
            ],
        );
        let out = render_table(&rs);

        let lines: Vec<&str> = out.lines().collect();
        let header = lines.iter().find(|l| l.contains("name")).unwrap();
        assert!(header.contains("id"));
        assert!(header.contains("count"));

        let first = lines.iter().find(|l| l.contains("orders")).unwrap();
        assert!(first.contains(" 1 "));
        assert!(first.contains("42"));
        let second = lines.iter().find(|l| l.contains("users")).unwrap();
        assert!(second.contains(" 2 "));
    }
}
