//! Table output formatting

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

/// Format data as a table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "Nothing to show.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Tabled)]
    struct NamespaceRow {
        #[tabled(rename = "NAMESPACE")]
        name: String,
        #[tabled(rename = "ENTRIES")]
        entries: usize,
    }

    fn row(name: &str, entries: usize) -> NamespaceRow {
        NamespaceRow {
            name: name.to_string(),
            entries,
        }
    }

    #[test]
    fn test_format_table_empty() {
        let rows: Vec<NamespaceRow> = vec![];
        assert_eq!(format_table(&rows), "Nothing to show.");
    }

    #[test]
    fn test_format_table_rows_and_headers() {
        let result = format_table(&[row("learnhub-static-v2", 4), row("learnhub-dynamic-v2", 0)]);

        assert!(result.contains("NAMESPACE"));
        assert!(result.contains("ENTRIES"));
        assert!(result.contains("learnhub-static-v2"));
        assert!(result.contains("learnhub-dynamic-v2"));
    }

    #[test]
    fn test_format_table_uses_rounded_style() {
        let result = format_table(&[row("learnhub-static-v2", 4)]);

        assert!(result.contains("╭"));
        assert!(result.contains("╰"));
    }
}
